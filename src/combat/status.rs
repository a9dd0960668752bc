//! Status effect tracking
//!
//! Per-hero timed and stacked conditions: poison, taunt, silence, stun,
//! untargetability, advantage grants, stat modifiers, summon counters, and
//! health links. Durations are consumed at exactly three checkpoints: the end
//! of the owning hero's turn, the start of the casting hero's next turn, or
//! the next attack roll involving the owner. Expiry deletes the whole entry,
//! value and metadata together.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Stat;
use crate::game::HeroRef;

/// Named conditions a hero can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Stacking counter; deals stack-count damage at the owner's turn end
    Poison,
    /// The owner must aim its next actions at the taunting hero
    Taunt,
    /// The owner cannot use abilities
    Silence,
    /// The owner cannot use its basic attack
    Stun,
    /// The owner cannot be targeted, except by listed attackers
    Untargetable,
    /// One-turn guard set when a hero is pulled back from death
    JustResurrected,
    /// Temporary advantage counts on the owner's attack rolls
    Advantage,
    /// Temporary disadvantage counts on the owner's attack rolls
    Disadvantage,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusKind::Poison => "poison",
            StatusKind::Taunt => "taunt",
            StatusKind::Silence => "silence",
            StatusKind::Stun => "stun",
            StatusKind::Untargetable => "untargetable",
            StatusKind::JustResurrected => "just resurrected",
            StatusKind::Advantage => "advantage",
            StatusKind::Disadvantage => "disadvantage",
        };
        write!(f, "{}", s)
    }
}

/// Which checkpoint consumes a duration tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    /// End of the owning hero's turn
    OwnerTurnEnd,
    /// Start of the casting hero's next turn
    CasterTurnStart,
    /// The next attack roll the owner is part of
    NextAttack,
}

/// A live status condition on a hero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Magnitude: poison stacks, advantage counts, or 1 for markers
    pub value: i32,
    /// Checkpoint ticks left; `None` lasts until removed
    pub remaining: Option<u32>,
    pub unit: DurationUnit,
    /// Hero that applied the condition
    pub source: Option<HeroRef>,
    /// Attackers allowed to bypass untargetability
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exempt: Vec<HeroRef>,
}

impl StatusEntry {
    /// Entry that never expires on its own
    pub fn permanent(value: i32, source: Option<HeroRef>) -> Self {
        Self {
            value,
            remaining: None,
            unit: DurationUnit::OwnerTurnEnd,
            source,
            exempt: Vec::new(),
        }
    }

    /// Entry consumed after `ticks` of the given checkpoint
    pub fn timed(value: i32, ticks: u32, unit: DurationUnit, source: Option<HeroRef>) -> Self {
        Self {
            value,
            remaining: Some(ticks),
            unit,
            source,
            exempt: Vec::new(),
        }
    }

    pub fn with_exempt(mut self, exempt: Vec<HeroRef>) -> Self {
        self.exempt = exempt;
        self
    }

    fn tick(&mut self) -> bool {
        tick_remaining(&mut self.remaining)
    }
}

/// One stat modifier, keyed by (stat, caster) so independent sources stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: Stat,
    pub amount: i32,
    pub caster: HeroRef,
    pub remaining: Option<u32>,
    pub unit: DurationUnit,
}

/// All tracked conditions on one hero
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSet {
    effects: HashMap<StatusKind, StatusEntry>,
    stat_mods: Vec<StatModifier>,
    summons: HashMap<String, u32>,
    /// Ally that mirrored damage is redirected onto
    pub linked_ally: Option<HeroRef>,
}

impl StatusSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a condition. Poison and advantage/disadvantage counts add;
    /// anything else refreshes to the stronger value and longer duration.
    pub fn apply(&mut self, kind: StatusKind, entry: StatusEntry) {
        match self.effects.get_mut(&kind) {
            Some(existing) if stacks(kind) => {
                existing.value += entry.value;
                existing.remaining = longest(existing.remaining, entry.remaining);
            }
            Some(existing) => {
                existing.value = existing.value.max(entry.value);
                existing.remaining = longest(existing.remaining, entry.remaining);
                existing.unit = entry.unit;
                existing.source = entry.source;
                existing.exempt = entry.exempt;
            }
            None => {
                self.effects.insert(kind, entry);
            }
        }
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.effects.contains_key(&kind)
    }

    /// Magnitude of a condition, 0 when absent
    pub fn value(&self, kind: StatusKind) -> i32 {
        self.effects.get(&kind).map(|e| e.value).unwrap_or(0)
    }

    pub fn get(&self, kind: StatusKind) -> Option<&StatusEntry> {
        self.effects.get(&kind)
    }

    pub fn remove(&mut self, kind: StatusKind) -> Option<StatusEntry> {
        self.effects.remove(&kind)
    }

    /// Hero this one is forced to target, if taunted
    pub fn taunt_target(&self) -> Option<HeroRef> {
        self.effects.get(&StatusKind::Taunt).and_then(|e| e.source)
    }

    /// Whether `attacker` is barred from targeting the owner
    pub fn blocks_targeting_by(&self, attacker: HeroRef) -> bool {
        match self.effects.get(&StatusKind::Untargetable) {
            Some(entry) => !entry.exempt.contains(&attacker),
            None => false,
        }
    }

    pub fn silenced(&self) -> bool {
        self.has(StatusKind::Silence)
    }

    pub fn attack_disabled(&self) -> bool {
        self.has(StatusKind::Stun)
    }

    /// Add or replace the modifier for (stat, caster)
    pub fn set_stat_mod(&mut self, modifier: StatModifier) {
        if let Some(existing) = self
            .stat_mods
            .iter_mut()
            .find(|m| m.stat == modifier.stat && m.caster == modifier.caster)
        {
            *existing = modifier;
        } else {
            self.stat_mods.push(modifier);
        }
    }

    /// Accumulate onto the modifier for (stat, caster); each application
    /// adds another stack
    pub fn stack_stat_mod(&mut self, modifier: StatModifier) {
        if let Some(existing) = self
            .stat_mods
            .iter_mut()
            .find(|m| m.stat == modifier.stat && m.caster == modifier.caster)
        {
            existing.amount += modifier.amount;
            existing.remaining = longest(existing.remaining, modifier.remaining);
        } else {
            self.stat_mods.push(modifier);
        }
    }

    /// Sum of live modifiers for a stat
    pub fn stat_mod_total(&self, stat: Stat) -> i32 {
        self.stat_mods
            .iter()
            .filter(|m| m.stat == stat)
            .map(|m| m.amount)
            .sum()
    }

    pub fn stat_mods(&self) -> &[StatModifier] {
        &self.stat_mods
    }

    // --- summon counters ---

    pub fn summon_count(&self, name: &str) -> u32 {
        self.summons.get(name).copied().unwrap_or(0)
    }

    pub fn total_summons(&self) -> u32 {
        self.summons.values().sum()
    }

    pub fn summons(&self) -> impl Iterator<Item = (&str, u32)> {
        self.summons.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add one summon; refused at the cap
    pub fn try_add_summon(&mut self, name: &str, cap: u32) -> bool {
        let count = self.summons.entry(name.to_string()).or_insert(0);
        if *count >= cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Spend one summon of the given name
    pub fn consume_summon(&mut self, name: &str) -> bool {
        match self.summons.get_mut(name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.summons.remove(name);
                }
                true
            }
            _ => false,
        }
    }

    /// Zero out every summon counter, returning how many were dismissed
    pub fn clear_summons(&mut self) -> u32 {
        let total = self.total_summons();
        self.summons.clear();
        total
    }

    // --- lifecycle ---

    /// Drop every condition and modifier applied by `caster`
    pub fn purge_from_source(&mut self, caster: HeroRef) {
        self.effects.retain(|_, e| e.source != Some(caster));
        self.stat_mods.retain(|m| m.caster != caster);
        if self.linked_ally == Some(caster) {
            self.linked_ally = None;
        }
    }

    /// Wipe transient state after a resurrection, leaving only the guard
    pub fn reset_for_resurrection(&mut self, owner: HeroRef) {
        self.effects.clear();
        self.stat_mods.clear();
        self.linked_ally = None;
        self.effects.insert(
            StatusKind::JustResurrected,
            StatusEntry::timed(1, 1, DurationUnit::OwnerTurnEnd, Some(owner)),
        );
    }

    // --- duration checkpoints ---

    /// End of the owning hero's turn: tick `OwnerTurnEnd` durations
    pub fn expire_owner_turn_end(&mut self) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        self.effects.retain(|kind, entry| {
            if entry.unit == DurationUnit::OwnerTurnEnd && entry.tick() {
                expired.push(*kind);
                false
            } else {
                true
            }
        });
        self.tick_stat_mods(DurationUnit::OwnerTurnEnd);
        expired
    }

    /// Start of `caster`'s turn: tick the `CasterTurnStart` durations it cast
    pub fn expire_caster_turn_start(&mut self, caster: HeroRef) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        self.effects.retain(|kind, entry| {
            if entry.unit == DurationUnit::CasterTurnStart
                && entry.source == Some(caster)
                && entry.tick()
            {
                expired.push(*kind);
                false
            } else {
                true
            }
        });
        self.stat_mods.retain_mut(|m| {
            if m.unit == DurationUnit::CasterTurnStart && m.caster == caster {
                !tick_remaining(&mut m.remaining)
            } else {
                true
            }
        });
        expired
    }

    /// An attack roll involving the owner resolved: tick `NextAttack` durations
    pub fn expire_after_attack(&mut self) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        self.effects.retain(|kind, entry| {
            if entry.unit == DurationUnit::NextAttack && entry.tick() {
                expired.push(*kind);
                false
            } else {
                true
            }
        });
        self.stat_mods.retain_mut(|m| {
            if m.unit == DurationUnit::NextAttack {
                !tick_remaining(&mut m.remaining)
            } else {
                true
            }
        });
        expired
    }

    fn tick_stat_mods(&mut self, unit: DurationUnit) {
        self.stat_mods.retain_mut(|m| {
            if m.unit == unit {
                !tick_remaining(&mut m.remaining)
            } else {
                true
            }
        });
    }

    /// Names of live conditions, for snapshots
    pub fn describe(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .effects
            .iter()
            .map(|(kind, entry)| {
                if entry.value > 1 {
                    format!("{} ({})", kind, entry.value)
                } else {
                    kind.to_string()
                }
            })
            .collect();
        out.sort();
        out
    }
}

fn stacks(kind: StatusKind) -> bool {
    matches!(
        kind,
        StatusKind::Poison | StatusKind::Advantage | StatusKind::Disadvantage
    )
}

fn longest(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (None, _) | (_, None) => None,
        (Some(x), Some(y)) => Some(x.max(y)),
    }
}

/// Consume one checkpoint tick; returns true once the duration is spent
fn tick_remaining(remaining: &mut Option<u32>) -> bool {
    match remaining {
        Some(n) if *n <= 1 => true,
        Some(n) => {
            *n -= 1;
            false
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero(player: usize, slot: usize) -> HeroRef {
        HeroRef { player, slot }
    }

    #[test]
    fn test_poison_stacks_add() {
        let mut set = StatusSet::new();
        set.apply(StatusKind::Poison, StatusEntry::permanent(2, None));
        set.apply(StatusKind::Poison, StatusEntry::permanent(2, None));
        assert_eq!(set.value(StatusKind::Poison), 4);
    }

    #[test]
    fn test_non_stacking_refreshes() {
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Silence,
            StatusEntry::timed(1, 1, DurationUnit::OwnerTurnEnd, None),
        );
        set.apply(
            StatusKind::Silence,
            StatusEntry::timed(1, 3, DurationUnit::OwnerTurnEnd, None),
        );
        assert_eq!(set.get(StatusKind::Silence).unwrap().remaining, Some(3));
    }

    #[test]
    fn test_owner_turn_end_expiry() {
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Stun,
            StatusEntry::timed(1, 2, DurationUnit::OwnerTurnEnd, None),
        );
        assert!(set.expire_owner_turn_end().is_empty());
        assert!(set.attack_disabled());
        let expired = set.expire_owner_turn_end();
        assert_eq!(expired, vec![StatusKind::Stun]);
        assert!(!set.attack_disabled());
        // Metadata went with the value
        assert!(set.get(StatusKind::Stun).is_none());
    }

    #[test]
    fn test_caster_turn_expiry_only_for_caster() {
        let caster = hero(0, 1);
        let other = hero(0, 2);
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Taunt,
            StatusEntry::timed(1, 1, DurationUnit::CasterTurnStart, Some(caster)),
        );
        set.expire_caster_turn_start(other);
        assert!(set.has(StatusKind::Taunt));
        set.expire_caster_turn_start(caster);
        assert!(!set.has(StatusKind::Taunt));
    }

    #[test]
    fn test_next_attack_expiry() {
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Advantage,
            StatusEntry::timed(1, 1, DurationUnit::NextAttack, None),
        );
        assert_eq!(set.value(StatusKind::Advantage), 1);
        set.expire_after_attack();
        assert_eq!(set.value(StatusKind::Advantage), 0);
    }

    #[test]
    fn test_untargetable_exceptions() {
        let allowed = hero(1, 0);
        let blocked = hero(1, 1);
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Untargetable,
            StatusEntry::permanent(1, None).with_exempt(vec![allowed]),
        );
        assert!(!set.blocks_targeting_by(allowed));
        assert!(set.blocks_targeting_by(blocked));
    }

    #[test]
    fn test_taunt_target_is_source() {
        let tank = hero(1, 0);
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Taunt,
            StatusEntry::timed(1, 1, DurationUnit::CasterTurnStart, Some(tank)),
        );
        assert_eq!(set.taunt_target(), Some(tank));
    }

    #[test]
    fn test_stat_mods_keyed_by_caster() {
        let a = hero(0, 0);
        let b = hero(0, 1);
        let mut set = StatusSet::new();
        set.set_stat_mod(StatModifier {
            stat: Stat::Defense,
            amount: 2,
            caster: a,
            remaining: None,
            unit: DurationUnit::OwnerTurnEnd,
        });
        set.set_stat_mod(StatModifier {
            stat: Stat::Defense,
            amount: 1,
            caster: b,
            remaining: None,
            unit: DurationUnit::OwnerTurnEnd,
        });
        // Two sources coexist
        assert_eq!(set.stat_mod_total(Stat::Defense), 3);

        // Same caster replaces rather than stacking
        set.set_stat_mod(StatModifier {
            stat: Stat::Defense,
            amount: 4,
            caster: a,
            remaining: None,
            unit: DurationUnit::OwnerTurnEnd,
        });
        assert_eq!(set.stat_mod_total(Stat::Defense), 5);
    }

    #[test]
    fn test_summon_cap() {
        let mut set = StatusSet::new();
        assert!(set.try_add_summon("spiderling", 2));
        assert!(set.try_add_summon("spiderling", 2));
        assert!(!set.try_add_summon("spiderling", 2));
        assert_eq!(set.summon_count("spiderling"), 2);

        assert!(set.consume_summon("spiderling"));
        assert_eq!(set.summon_count("spiderling"), 1);
        assert_eq!(set.clear_summons(), 1);
        assert!(!set.consume_summon("spiderling"));
    }

    #[test]
    fn test_purge_from_source() {
        let dead = hero(1, 2);
        let mut set = StatusSet::new();
        set.apply(
            StatusKind::Taunt,
            StatusEntry::timed(1, 1, DurationUnit::CasterTurnStart, Some(dead)),
        );
        set.set_stat_mod(StatModifier {
            stat: Stat::Accuracy,
            amount: -1,
            caster: dead,
            remaining: None,
            unit: DurationUnit::OwnerTurnEnd,
        });
        set.linked_ally = Some(dead);

        set.purge_from_source(dead);
        assert!(!set.has(StatusKind::Taunt));
        assert_eq!(set.stat_mod_total(Stat::Accuracy), 0);
        assert!(set.linked_ally.is_none());
    }

    #[test]
    fn test_resurrection_reset_keeps_guard() {
        let owner = hero(0, 0);
        let mut set = StatusSet::new();
        set.apply(StatusKind::Poison, StatusEntry::permanent(4, None));
        set.apply(StatusKind::Silence, StatusEntry::permanent(1, None));

        set.reset_for_resurrection(owner);
        assert!(!set.has(StatusKind::Poison));
        assert!(!set.silenced());
        assert!(set.has(StatusKind::JustResurrected));

        // Guard lapses at the end of the owner's next turn
        set.expire_owner_turn_end();
        assert!(!set.has(StatusKind::JustResurrected));
    }
}
