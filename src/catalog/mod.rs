//! Hero content catalog
//!
//! Authored hero definitions: templates, abilities, and special effect
//! descriptors. Effect kinds are a closed enum validated at content-load
//! time; an unrecognized kind string deserializes to [`EffectKind::Unknown`],
//! which validation rejects while the battle pipeline skips it with a
//! warning.

mod roster;

pub use roster::builtin_heroes;

use serde::{Deserialize, Serialize};

use crate::combat::dice::DicePool;
use crate::error::{GameError, GameResult};

/// A derived stat that buffs and debuffs can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Defense,
    Accuracy,
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stat::Defense => write!(f, "defense"),
            Stat::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// When a special's effect descriptor fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTrigger {
    /// Continuously recomputed from live board state
    #[default]
    Aura,
    /// Applied once when the battle begins; permanent for the match
    BattleStart,
    /// Fires when the owning hero's turn starts
    TurnStart,
    /// Fires after the owning hero lands a hit
    OnHit,
    /// Fires when an attack against the owning hero misses
    OnMiss,
    /// Fires when the owning hero takes damage and survives
    OnTakeDamage,
    /// Fires after the owning hero takes damage (post-application reaction)
    AfterDamage,
    /// Fires when the owning hero dies
    OnDeath,
    /// Fires when an ally of the owning hero dies
    OnAllyDeath,
}

/// Who an effect resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelector {
    /// The hero carrying the effect
    #[default]
    SelfHero,
    /// The enemy chosen by the player
    Chosen,
    /// The ally chosen by the player
    ChosenAlly,
    /// The chosen enemy plus the enemies adjacent to it
    ChosenAndAdjacent,
    AllEnemies,
    AllAllies,
    /// Every ally except the hero itself
    OtherAllies,
    /// Allies in the slots next to the hero
    AdjacentAllies,
    /// The next living ally to the right (wrapping)
    AllyRight,
    LowestHpAlly,
    LowestHpEnemy,
    /// A random living ally other than the hero itself
    RandomAlly,
    /// The hero whose attack triggered this effect
    Attacker,
    /// The hero that dealt the killing blow
    Killer,
}

/// Gate on whether an effect applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCondition {
    #[default]
    Always,
    /// Owner's HP is strictly below the given percent of max
    SelfHpBelow { percent: u32 },
    /// Owner's HP is at or above the given percent of max
    SelfHpAbove { percent: u32 },
    /// The target's effective defense is at least the given value
    TargetDefenseAtLeast { value: i32 },
    /// At least one ally of the owner is dead
    AllyDown,
}

/// The closed set of effect kinds the engine resolves.
///
/// Authored content that names a kind outside this set parses to `Unknown`:
/// rejected by [`HeroCatalog::validate`], skipped with a warning if it ever
/// reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    /// Roll the dice against the resolved target
    Damage { dice: DicePool },
    /// Restore a flat amount of HP
    Heal { amount: i32 },
    /// Buff or debuff a stat; permanent modifiers survive aura recompute
    StatModifier {
        stat: Stat,
        amount: i32,
        #[serde(default)]
        permanent: bool,
    },
    /// Add poison stacks; the victim takes stack-count damage at turn end
    Poison { stacks: i32 },
    /// Force the target's next target selection onto the effect's owner
    Taunt,
    /// Block ability use for the given number of the victim's turns
    Silence { turns: u32 },
    /// Block basic attacks for the given number of the victim's turns
    Stun { turns: u32 },
    /// Add one active summon, capped per summon name
    Summon { name: String, cap: u32 },
    /// Deal reactive damage to the triggering attacker or killer
    CounterAttack { dice: DicePool },
    /// Redirect attacks on allies to this hero once per round
    Deflect { counter: DicePool },
    /// Consume once to absorb a single hit of at least `min_damage`
    NegateDamage { min_damage: i32 },
    /// Spend one active summon to absorb a hit entirely
    SacrificeSummonNegate { summon: String },
    /// Restore a dying ally to half HP, once per match
    Resurrect,
    /// Link the owner to an ally; damage the owner takes is mirrored once
    HealthLink,
    /// Override the target's defense with the owner's recomputed defense
    ShareDefense,
    /// Copy the attack dice of any hero that dies into the owner's pool
    CollectDice,
    /// Permanently gain a stat bonus whenever an ally dies
    ScalingStat { stat: Stat, amount: i32 },
    /// Permanently gain bonus attack dice whenever an ally dies
    ScalingDice { count: u32, sides: u32 },
    /// Become untargetable (except by the attacker) until the owner's next turn
    Untargetable,
    /// Debuff every living hero on both teams when the owner is hit
    GlobalDebuff { stat: Stat, amount: i32 },
    /// Grant an advantage count on attack rolls
    Advantage,
    /// Impose a disadvantage count on attack rolls
    Disadvantage,
    /// Lower the owner's critical threshold
    CritThreshold { value: u32 },
    /// The owner ignores taunts when choosing targets
    TauntImmunity,
    /// Transient defensive-stance defense bonus until the owner's next turn
    Stance { defense: i32 },
    /// Delegate: the resolved ally repeats the attack against the same target
    Command {
        #[serde(default)]
        inherit_roll: bool,
    },
    /// Forward-compatibility catchall for unrecognized kind strings
    #[serde(other)]
    Unknown,
}

impl EffectKind {
    /// Short name for logs and validation messages
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Damage { .. } => "damage",
            EffectKind::Heal { .. } => "heal",
            EffectKind::StatModifier { .. } => "stat_modifier",
            EffectKind::Poison { .. } => "poison",
            EffectKind::Taunt => "taunt",
            EffectKind::Silence { .. } => "silence",
            EffectKind::Stun { .. } => "stun",
            EffectKind::Summon { .. } => "summon",
            EffectKind::CounterAttack { .. } => "counter_attack",
            EffectKind::Deflect { .. } => "deflect",
            EffectKind::NegateDamage { .. } => "negate_damage",
            EffectKind::SacrificeSummonNegate { .. } => "sacrifice_summon_negate",
            EffectKind::Resurrect => "resurrect",
            EffectKind::HealthLink => "health_link",
            EffectKind::ShareDefense => "share_defense",
            EffectKind::CollectDice => "collect_dice",
            EffectKind::ScalingStat { .. } => "scaling_stat",
            EffectKind::ScalingDice { .. } => "scaling_dice",
            EffectKind::Untargetable => "untargetable",
            EffectKind::GlobalDebuff { .. } => "global_debuff",
            EffectKind::Advantage => "advantage",
            EffectKind::Disadvantage => "disadvantage",
            EffectKind::CritThreshold { .. } => "crit_threshold",
            EffectKind::TauntImmunity => "taunt_immunity",
            EffectKind::Stance { .. } => "stance",
            EffectKind::Command { .. } => "command",
            EffectKind::Unknown => "unknown",
        }
    }
}

/// One authored effect: what it does, on whom, when, and under what condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    #[serde(flatten)]
    pub kind: EffectKind,
    #[serde(default)]
    pub trigger: EffectTrigger,
    #[serde(default)]
    pub target: TargetSelector,
    #[serde(default)]
    pub condition: EffectCondition,
}

impl EffectDescriptor {
    /// Effect with default trigger/target/condition
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            trigger: EffectTrigger::default(),
            target: TargetSelector::default(),
            condition: EffectCondition::default(),
        }
    }

    pub fn trigger(mut self, trigger: EffectTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn target(mut self, target: TargetSelector) -> Self {
        self.target = target;
        self
    }

    pub fn condition(mut self, condition: EffectCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// What the caller must supply when invoking an ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRequirement {
    /// No chosen target; effects self-resolve
    #[default]
    None,
    /// A chosen enemy hero
    Enemy,
    /// A chosen ally hero
    Ally,
    /// A chosen enemy plus a chosen ally
    EnemyAndAlly,
}

/// A player-activated action consuming the turn's ability slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    /// Skip the attack roll entirely (self-heals, self-buffs)
    #[serde(default)]
    pub auto_hit: bool,
    #[serde(default)]
    pub requires: TargetRequirement,
    pub effects: Vec<EffectDescriptor>,
}

/// A hero's passive/triggered special: a set of effect descriptors plus an
/// optional once-per-match activatable part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Special {
    pub name: String,
    #[serde(default)]
    pub effects: Vec<EffectDescriptor>,
    #[serde(default)]
    pub activated: Option<Ability>,
}

/// Immutable authored hero definition; read-only input to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroTemplate {
    pub name: String,
    pub max_hp: i32,
    pub defense: i32,
    pub accuracy: i32,
    /// Basic-attack dice; `None` means the hero has no basic attack
    #[serde(default)]
    pub attack: Option<DicePool>,
    #[serde(default = "default_attacks_per_turn")]
    pub attacks_per_turn: u32,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub special: Option<Special>,
}

fn default_attacks_per_turn() -> u32 {
    1
}

impl HeroTemplate {
    /// All effect descriptors this template carries, with the owning
    /// ability/special name
    pub fn all_effects(&self) -> Vec<(&str, &EffectDescriptor)> {
        let mut out = Vec::new();
        for ability in &self.abilities {
            for effect in &ability.effects {
                out.push((ability.name.as_str(), effect));
            }
        }
        if let Some(special) = &self.special {
            for effect in &special.effects {
                out.push((special.name.as_str(), effect));
            }
            if let Some(activated) = &special.activated {
                for effect in &activated.effects {
                    out.push((activated.name.as_str(), effect));
                }
            }
        }
        out
    }

    /// Whether this template's special carries the given passive marker
    pub fn has_passive(&self, check: impl Fn(&EffectKind) -> bool) -> bool {
        self.special
            .as_ref()
            .map(|s| s.effects.iter().any(|e| check(&e.kind)))
            .unwrap_or(false)
    }
}

/// The loaded hero roster, validated once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroCatalog {
    pub heroes: Vec<HeroTemplate>,
}

impl HeroCatalog {
    /// Build a catalog from templates and validate it
    pub fn new(heroes: Vec<HeroTemplate>) -> GameResult<Self> {
        let catalog = Self { heroes };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The built-in authored roster
    pub fn builtin() -> Self {
        // The shipped roster must always validate
        Self::new(builtin_heroes()).expect("built-in roster failed validation")
    }

    /// Load a catalog from a JSON array of hero templates
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let heroes: Vec<HeroTemplate> = serde_json::from_str(json)?;
        Ok(Self::new(heroes)?)
    }

    /// Look up a template by name
    pub fn get(&self, name: &str) -> Option<&HeroTemplate> {
        self.heroes.iter().find(|h| h.name == name)
    }

    pub fn len(&self) -> usize {
        self.heroes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }

    /// Content-load-time validation: malformed or unknown authored content
    /// fails here instead of surfacing mid-battle.
    pub fn validate(&self) -> GameResult<()> {
        let mut seen = std::collections::HashSet::new();
        for hero in &self.heroes {
            if hero.name.trim().is_empty() {
                return Err(GameError::InvalidConfiguration(
                    "hero with empty name".to_string(),
                ));
            }
            if !seen.insert(hero.name.as_str()) {
                return Err(GameError::InvalidConfiguration(format!(
                    "duplicate hero name '{}'",
                    hero.name
                )));
            }
            if hero.max_hp <= 0 {
                return Err(GameError::InvalidConfiguration(format!(
                    "hero '{}' has non-positive max HP",
                    hero.name
                )));
            }
            if hero.attacks_per_turn == 0 {
                return Err(GameError::InvalidConfiguration(format!(
                    "hero '{}' has zero attacks per turn",
                    hero.name
                )));
            }
            for (owner, effect) in hero.all_effects() {
                Self::validate_effect(&hero.name, owner, effect)?;
            }
            for ability in hero
                .abilities
                .iter()
                .chain(hero.special.iter().filter_map(|s| s.activated.as_ref()))
            {
                Self::validate_ability_targets(&hero.name, ability)?;
            }
            // Special activation carries no target ids on the wire
            if let Some(activated) = hero.special.as_ref().and_then(|s| s.activated.as_ref()) {
                if activated.requires != TargetRequirement::None {
                    return Err(GameError::InvalidConfiguration(format!(
                        "hero '{}': activated special '{}' may not require chosen targets",
                        hero.name, activated.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_effect(hero: &str, owner: &str, effect: &EffectDescriptor) -> GameResult<()> {
        let fail = |detail: String| {
            Err(GameError::InvalidConfiguration(format!(
                "hero '{}', effect '{}': {}",
                hero, owner, detail
            )))
        };
        match &effect.kind {
            EffectKind::Unknown => fail("unknown effect kind".to_string()),
            EffectKind::Damage { dice } | EffectKind::CounterAttack { dice } => {
                if dice.terms.is_empty() {
                    fail("damage dice pool has no dice".to_string())
                } else {
                    Ok(())
                }
            }
            EffectKind::Heal { amount } => {
                if *amount <= 0 {
                    fail("heal amount must be positive".to_string())
                } else {
                    Ok(())
                }
            }
            EffectKind::Poison { stacks } => {
                if *stacks <= 0 {
                    fail("poison stacks must be positive".to_string())
                } else {
                    Ok(())
                }
            }
            EffectKind::Summon { name, cap } => {
                if name.trim().is_empty() {
                    fail("summon name is empty".to_string())
                } else if *cap == 0 {
                    fail("summon cap must be at least 1".to_string())
                } else {
                    Ok(())
                }
            }
            EffectKind::Silence { turns } | EffectKind::Stun { turns } => {
                if *turns == 0 {
                    fail("duration must be at least 1 turn".to_string())
                } else {
                    Ok(())
                }
            }
            EffectKind::CritThreshold { value } => {
                if !(2..=20).contains(value) {
                    fail("crit threshold must be between 2 and 20".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn validate_ability_targets(hero: &str, ability: &Ability) -> GameResult<()> {
        for effect in &ability.effects {
            let needs_enemy = matches!(
                effect.target,
                TargetSelector::Chosen | TargetSelector::ChosenAndAdjacent
            );
            let needs_ally = matches!(effect.target, TargetSelector::ChosenAlly);
            let has_enemy = matches!(
                ability.requires,
                TargetRequirement::Enemy | TargetRequirement::EnemyAndAlly
            );
            let has_ally = matches!(
                ability.requires,
                TargetRequirement::Ally | TargetRequirement::EnemyAndAlly
            );
            if (needs_enemy && !has_enemy) || (needs_ally && !has_ally) {
                return Err(GameError::InvalidConfiguration(format!(
                    "hero '{}', ability '{}': effect targets a chosen hero the ability never asks for",
                    hero, ability.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roster_validates() {
        let catalog = HeroCatalog::builtin();
        assert!(catalog.len() >= 12);
        assert!(catalog.get("Bram Ironwall").is_some());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let hero = HeroTemplate {
            name: "Twin".to_string(),
            max_hp: 10,
            defense: 10,
            accuracy: 0,
            attack: Some("1d6".parse().unwrap()),
            attacks_per_turn: 1,
            abilities: vec![],
            special: None,
        };
        let err = HeroCatalog::new(vec![hero.clone(), hero]).unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unknown_kind_rejected_at_load() {
        let json = r#"[{
            "name": "Mystery",
            "max_hp": 10,
            "defense": 10,
            "accuracy": 0,
            "special": {
                "name": "Future Tech",
                "effects": [{"kind": "quantum_entangle"}]
            }
        }]"#;
        let err = HeroCatalog::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("unknown effect kind"));
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = HeroCatalog::builtin();
        let json = serde_json::to_string(&catalog.heroes).unwrap();
        let reloaded = HeroCatalog::from_json_str(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
        assert_eq!(reloaded.heroes, catalog.heroes);
    }

    #[test]
    fn test_chosen_target_requires_declaration() {
        let hero = HeroTemplate {
            name: "Sniper".to_string(),
            max_hp: 10,
            defense: 10,
            accuracy: 0,
            attack: None,
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Aimed Shot".to_string(),
                auto_hit: false,
                requires: TargetRequirement::None,
                effects: vec![EffectDescriptor::new(EffectKind::Damage {
                    dice: "1d6".parse().unwrap(),
                })
                .target(TargetSelector::Chosen)],
            }],
            special: None,
        };
        let err = HeroCatalog::new(vec![hero]).unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_cap_summon_rejected() {
        let hero = HeroTemplate {
            name: "Broodless".to_string(),
            max_hp: 10,
            defense: 10,
            accuracy: 0,
            attack: None,
            attacks_per_turn: 1,
            abilities: vec![],
            special: Some(Special {
                name: "Empty Nest".to_string(),
                effects: vec![],
                activated: Some(Ability {
                    name: "Hatch".to_string(),
                    auto_hit: true,
                    requires: TargetRequirement::None,
                    effects: vec![EffectDescriptor::new(EffectKind::Summon {
                        name: "mite".to_string(),
                        cap: 0,
                    })],
                }),
            }),
        };
        let err = HeroCatalog::new(vec![hero]).unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration(_)));
    }
}
