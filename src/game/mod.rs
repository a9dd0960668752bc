//! Battle state store
//!
//! The authoritative in-memory representation of one match: two players,
//! their rosters of live hero instances, turn pointers, and the append-only
//! battle log. Mutation happens only through the scheduler, pipeline, and
//! cascade modules.

pub mod scheduler;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{EffectDescriptor, HeroTemplate, Stat};
use crate::combat::dice::DicePool;
use crate::combat::status::StatusSet;
use crate::error::{GameError, GameResult};

/// Address of a hero within a game: owning seat and roster slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeroRef {
    pub player: usize,
    pub slot: usize,
}

impl HeroRef {
    pub fn new(player: usize, slot: usize) -> Self {
        Self { player, slot }
    }
}

impl std::fmt::Display for HeroRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}h{}", self.player, self.slot)
    }
}

/// Match lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Draft,
    Setup,
    Initiative,
    Battle,
    Ended,
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Draft => "draft",
            GamePhase::Setup => "setup",
            GamePhase::Initiative => "initiative",
            GamePhase::Battle => "battle",
            GamePhase::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// How the match's rosters are selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Ban/pick alternation from the full catalog
    Draft,
    /// Rosters dealt at random from the catalog
    Random,
    /// Rosters supplied by the survival meta-game
    Gauntlet,
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GameMode::Draft => "draft",
            GameMode::Random => "random",
            GameMode::Gauntlet => "gauntlet",
        };
        write!(f, "{}", s)
    }
}

/// Final result of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Winner(usize),
    Tie,
}

/// One-shot combat flags on a hero.
///
/// Only the status tracker, pipeline, and death cascade mutate these; they
/// are never poked directly from call sites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatFlags {
    /// The special's activated part has been consumed this match
    pub special_used: bool,
    /// This hero's resurrection has been granted to an ally already
    pub resurrection_used: bool,
    /// The current death event for this hero has been processed
    pub death_processed: bool,
    /// The once-per-round deflect has been consumed
    pub deflect_used: bool,
    /// The consumable damage negation has been consumed
    pub negation_used: bool,
}

/// A buff re-derived by the aura engine from live board state.
///
/// Non-permanent buffs are wiped and rebuilt on every recompute; permanent
/// ones (battle-start) survive for the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveBuff {
    pub source: HeroRef,
    pub source_name: String,
    pub stat: Stat,
    pub amount: i32,
    pub permanent: bool,
}

/// A live, mutable combat participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroInstance {
    /// This hero's own address
    pub hero: HeroRef,
    /// Immutable authored definition, copied at roster assembly
    pub template: HeroTemplate,
    pub hp: i32,
    pub max_hp: i32,
    /// Derived defense, rebuilt by the aura engine
    pub defense: i32,
    /// Derived accuracy, rebuilt by the aura engine
    pub accuracy: i32,
    /// Derived critical threshold, rebuilt by the aura engine
    pub crit_threshold: u32,
    /// Derived basic-attack dice (base + scaling + collected, regrouped)
    pub attack_dice: Option<DicePool>,
    /// Scaling and collected bonus dice, merged into the attack on recompute
    pub bonus_dice: DicePool,
    /// Permanent stat bonuses accrued from battle events (ally deaths)
    pub scaling: Vec<(Stat, i32)>,
    /// Transient defensive-stance bonus, cleared when the owner's turn starts
    pub stance_bonus: i32,
    pub passive_buffs: Vec<PassiveBuff>,
    /// Set when a defense-sharing link currently overrides this defense
    pub shared_defense_from: Option<HeroRef>,
    pub statuses: StatusSet,
    pub flags: CombatFlags,
}

impl HeroInstance {
    /// Deep reset to pristine state from a template
    pub fn new(hero: HeroRef, template: HeroTemplate) -> Self {
        let max_hp = template.max_hp;
        let defense = template.defense;
        let accuracy = template.accuracy;
        let attack_dice = template.attack.clone();
        Self {
            hero,
            template,
            hp: max_hp,
            max_hp,
            defense,
            accuracy,
            crit_threshold: crate::combat::dice::BASE_CRIT_THRESHOLD,
            attack_dice,
            bonus_dice: DicePool::default(),
            scaling: Vec::new(),
            stance_bonus: 0,
            passive_buffs: Vec::new(),
            shared_defense_from: None,
            statuses: StatusSet::new(),
            flags: CombatFlags::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Reduce HP, clamped at zero; returns the damage actually applied
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let actual = amount.clamp(0, self.hp);
        self.hp -= actual;
        actual
    }

    /// Restore HP, clamped at max; returns the healing actually applied
    pub fn heal(&mut self, amount: i32) -> i32 {
        let actual = amount.clamp(0, self.max_hp - self.hp);
        self.hp += actual;
        actual
    }

    /// Sum of permanent scaling bonuses for a stat
    pub fn scaling_total(&self, stat: Stat) -> i32 {
        self.scaling
            .iter()
            .filter(|(s, _)| *s == stat)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Sum of live passive aura buffs for a stat
    pub fn passive_buff_total(&self, stat: Stat) -> i32 {
        self.passive_buffs
            .iter()
            .filter(|b| b.stat == stat)
            .map(|b| b.amount)
            .sum()
    }

    /// The special's effect descriptors, empty when the hero has none
    pub fn special_effects(&self) -> &[EffectDescriptor] {
        self.template
            .special
            .as_ref()
            .map(|s| s.effects.as_slice())
            .unwrap_or(&[])
    }

    /// Name for the battle log
    pub fn name(&self) -> &str {
        &self.template.name
    }
}

/// Per-turn action allotment for the acting player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub attacks_left: u32,
    pub ability_used: bool,
    pub selected_target: Option<HeroRef>,
}

/// One seat in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub heroes: Vec<HeroInstance>,
    /// Index of the hero that acted most recently for this player
    pub cursor: usize,
    pub turn: TurnState,
    pub connected: bool,
}

impl Player {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            heroes: Vec::new(),
            cursor: 0,
            turn: TurnState::default(),
            connected: true,
        }
    }

    pub fn living(&self) -> impl Iterator<Item = &HeroInstance> {
        self.heroes.iter().filter(|h| h.is_alive())
    }

    pub fn has_living_hero(&self) -> bool {
        self.heroes.iter().any(|h| h.is_alive())
    }
}

/// One entry in the append-only battle log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Human-readable record of resolved events, replayable for spectators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleLog {
    entries: Vec<LogEntry>,
}

impl BattleLog {
    pub fn push(&mut self, text: impl Into<String>) {
        let seq = self.entries.len() as u64;
        self.entries.push(LogEntry {
            seq,
            at: Utc::now(),
            text: text.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last_text(&self) -> Option<&str> {
        self.entries.last().map(|e| e.text.as_str())
    }
}

/// One match: exactly two players, a phase, and a winner slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub mode: GameMode,
    pub phase: GamePhase,
    pub players: [Player; 2],
    pub active_player: usize,
    pub winner: Option<MatchResult>,
    pub team_size: usize,
    pub turn_count: u32,
    pub seed: u64,
    pub log: BattleLog,
}

impl Game {
    /// Create a match shell with empty rosters
    pub fn new(id: String, mode: GameMode, users: [&str; 2], team_size: usize, seed: u64) -> Self {
        Self {
            id,
            mode,
            phase: GamePhase::Waiting,
            players: [Player::new(users[0]), Player::new(users[1])],
            active_player: 0,
            winner: None,
            team_size,
            turn_count: 0,
            seed,
            log: BattleLog::default(),
        }
    }

    /// Add a hero to a player's roster, instantiated pristine from a template
    pub fn add_hero(&mut self, player: usize, template: HeroTemplate) -> GameResult<HeroRef> {
        let slot = self.players[player].heroes.len();
        if slot >= self.team_size {
            return Err(GameError::InvalidConfiguration(format!(
                "team already has {} heroes",
                self.team_size
            )));
        }
        let hero = HeroRef::new(player, slot);
        self.players[player]
            .heroes
            .push(HeroInstance::new(hero, template));
        Ok(hero)
    }

    /// Seat index of the opponent
    pub fn opponent(&self, player: usize) -> usize {
        1 - player
    }

    pub fn hero(&self, hero: HeroRef) -> GameResult<&HeroInstance> {
        self.players
            .get(hero.player)
            .and_then(|p| p.heroes.get(hero.slot))
            .ok_or_else(|| GameError::NotFound(format!("hero {}", hero)))
    }

    pub fn hero_mut(&mut self, hero: HeroRef) -> GameResult<&mut HeroInstance> {
        self.players
            .get_mut(hero.player)
            .and_then(|p| p.heroes.get_mut(hero.slot))
            .ok_or_else(|| GameError::NotFound(format!("hero {}", hero)))
    }

    /// Every hero address in the game, seat 0 first
    pub fn all_refs(&self) -> Vec<HeroRef> {
        let mut out = Vec::new();
        for (player, p) in self.players.iter().enumerate() {
            for slot in 0..p.heroes.len() {
                out.push(HeroRef::new(player, slot));
            }
        }
        out
    }

    /// Addresses of a player's living heroes, slot order
    pub fn living_refs(&self, player: usize) -> Vec<HeroRef> {
        self.players[player]
            .heroes
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_alive())
            .map(|(slot, _)| HeroRef::new(player, slot))
            .collect()
    }

    /// Living allies of a hero, excluding the hero itself
    pub fn living_allies(&self, hero: HeroRef) -> Vec<HeroRef> {
        self.living_refs(hero.player)
            .into_iter()
            .filter(|r| *r != hero)
            .collect()
    }

    /// Living heroes in the slots adjacent to the given one
    pub fn adjacent_allies(&self, hero: HeroRef) -> Vec<HeroRef> {
        let mut out = Vec::new();
        if hero.slot > 0 {
            let left = HeroRef::new(hero.player, hero.slot - 1);
            if self.hero(left).map(|h| h.is_alive()).unwrap_or(false) {
                out.push(left);
            }
        }
        let right = HeroRef::new(hero.player, hero.slot + 1);
        if self.hero(right).map(|h| h.is_alive()).unwrap_or(false) {
            out.push(right);
        }
        out
    }

    /// Next living ally to the right, wrapping past the end of the roster
    pub fn ally_right(&self, hero: HeroRef) -> Option<HeroRef> {
        let team = self.players[hero.player].heroes.len();
        for offset in 1..team {
            let slot = (hero.slot + offset) % team;
            let candidate = HeroRef::new(hero.player, slot);
            if self.hero(candidate).map(|h| h.is_alive()).unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }

    /// Living hero with the lowest HP on the given side
    pub fn lowest_hp(&self, player: usize) -> Option<HeroRef> {
        self.living_refs(player)
            .into_iter()
            .min_by_key(|r| self.hero(*r).map(|h| h.hp).unwrap_or(i32::MAX))
    }

    /// Seat index of the player controlling a user id
    pub fn seat_of(&self, user_id: &str) -> GameResult<usize> {
        self.players
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or_else(|| GameError::NotFound(format!("player '{}'", user_id)))
    }

    /// Append a line to the battle log
    pub fn record(&mut self, text: impl Into<String>) {
        self.log.push(text);
    }

    /// Enforce the phase invariant for an operation
    pub fn require_phase(&self, expected: GamePhase) -> GameResult<()> {
        if self.phase != expected {
            return Err(GameError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}
