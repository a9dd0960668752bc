//! Built-in hero roster
//!
//! The authored content shipped with the engine. Every effect kind the
//! pipeline resolves appears on at least one hero here, which keeps the
//! roster doubling as exercise material for the battle tests.

use super::{
    Ability, EffectCondition, EffectDescriptor, EffectKind, EffectTrigger, HeroTemplate, Special,
    Stat, TargetRequirement, TargetSelector,
};
use crate::combat::dice::DicePool;

fn dice(notation: &str) -> DicePool {
    notation.parse().expect("static dice notation")
}

fn effect(kind: EffectKind) -> EffectDescriptor {
    EffectDescriptor::new(kind)
}

/// The full built-in roster
pub fn builtin_heroes() -> Vec<HeroTemplate> {
    vec![
        // Taunt tank: pulls attacks onto himself and braces behind a stance.
        HeroTemplate {
            name: "Bram Ironwall".to_string(),
            max_hp: 26,
            defense: 16,
            accuracy: 2,
            attack: Some(dice("1d8")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Challenge".to_string(),
                auto_hit: true,
                requires: TargetRequirement::Enemy,
                effects: vec![effect(EffectKind::Taunt).target(TargetSelector::Chosen)],
            }],
            special: Some(Special {
                name: "Bulwark".to_string(),
                effects: vec![effect(EffectKind::StatModifier {
                    stat: Stat::Defense,
                    amount: 1,
                    permanent: false,
                })
                .target(TargetSelector::AdjacentAllies)],
                activated: Some(Ability {
                    name: "Shield Stance".to_string(),
                    auto_hit: true,
                    requires: TargetRequirement::None,
                    effects: vec![effect(EffectKind::Stance { defense: 4 })],
                }),
            }),
        },
        // Poisoner with advantage against heavily armored targets.
        HeroTemplate {
            name: "Vesper Thorn".to_string(),
            max_hp: 18,
            defense: 13,
            accuracy: 3,
            attack: Some(dice("1d6")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Venom Strike".to_string(),
                auto_hit: false,
                requires: TargetRequirement::Enemy,
                effects: vec![
                    effect(EffectKind::Damage { dice: dice("1d4") })
                        .target(TargetSelector::Chosen),
                    effect(EffectKind::Poison { stacks: 2 }).target(TargetSelector::Chosen),
                ],
            }],
            special: Some(Special {
                name: "Serpent's Eye".to_string(),
                effects: vec![effect(EffectKind::Advantage)
                    .condition(EffectCondition::TargetDefenseAtLeast { value: 15 })],
                activated: None,
            }),
        },
        // Healer carrying the roster's one resurrection.
        HeroTemplate {
            name: "Sister Maren".to_string(),
            max_hp: 20,
            defense: 12,
            accuracy: 1,
            attack: Some(dice("1d4")),
            attacks_per_turn: 1,
            abilities: vec![
                Ability {
                    name: "Mend".to_string(),
                    auto_hit: true,
                    requires: TargetRequirement::Ally,
                    effects: vec![effect(EffectKind::Heal { amount: 6 })
                        .target(TargetSelector::ChosenAlly)],
                },
                Ability {
                    name: "Triage".to_string(),
                    auto_hit: true,
                    requires: TargetRequirement::None,
                    effects: vec![effect(EffectKind::Heal { amount: 4 })
                        .target(TargetSelector::LowestHpAlly)],
                },
            ],
            special: Some(Special {
                name: "Last Rites".to_string(),
                effects: vec![effect(EffectKind::Resurrect).trigger(EffectTrigger::OnAllyDeath)],
                activated: None,
            }),
        },
        // Collector: copies the attack dice of anything that dies.
        HeroTemplate {
            name: "The Gravekeeper".to_string(),
            max_hp: 22,
            defense: 14,
            accuracy: 2,
            attack: Some(dice("1d8")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Reap".to_string(),
                auto_hit: false,
                requires: TargetRequirement::None,
                effects: vec![effect(EffectKind::Damage { dice: dice("2d4") })
                    .target(TargetSelector::LowestHpEnemy)],
            }],
            special: Some(Special {
                name: "Hungry Harvest".to_string(),
                effects: vec![
                    effect(EffectKind::CollectDice),
                    effect(EffectKind::ScalingDice { count: 1, sides: 4 })
                        .trigger(EffectTrigger::OnAllyDeath),
                ],
                activated: None,
            }),
        },
        // Deflector: steps in front of allies once per round.
        HeroTemplate {
            name: "Aegis Warden".to_string(),
            max_hp: 24,
            defense: 16,
            accuracy: 1,
            attack: Some(dice("1d6")),
            attacks_per_turn: 1,
            abilities: vec![],
            special: Some(Special {
                name: "Aegis Protocol".to_string(),
                effects: vec![
                    effect(EffectKind::Deflect { counter: dice("1d6") }),
                    effect(EffectKind::TauntImmunity),
                    effect(EffectKind::StatModifier {
                        stat: Stat::Accuracy,
                        amount: 1,
                        permanent: false,
                    })
                    .target(TargetSelector::OtherAllies),
                ],
                activated: None,
            }),
        },
        // Slow bruiser that shrugs off one big hit and regenerates.
        HeroTemplate {
            name: "Stonehide Golem".to_string(),
            max_hp: 30,
            defense: 15,
            accuracy: 0,
            attack: Some(dice("1d10")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Slam".to_string(),
                auto_hit: false,
                requires: TargetRequirement::Enemy,
                effects: vec![
                    effect(EffectKind::Damage { dice: dice("1d10") })
                        .target(TargetSelector::ChosenAndAdjacent),
                    effect(EffectKind::Stun { turns: 1 }).target(TargetSelector::Chosen),
                ],
            }],
            special: Some(Special {
                name: "Stoneskin".to_string(),
                effects: vec![
                    effect(EffectKind::NegateDamage { min_damage: 8 }),
                    effect(EffectKind::Heal { amount: 2 }).trigger(EffectTrigger::TurnStart),
                ],
                activated: None,
            }),
        },
        // Summoner whose brood doubles as ablative armor.
        HeroTemplate {
            name: "Broodmother Sylk".to_string(),
            max_hp: 19,
            defense: 13,
            accuracy: 2,
            attack: Some(dice("1d6")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Hatch Brood".to_string(),
                auto_hit: true,
                requires: TargetRequirement::None,
                effects: vec![effect(EffectKind::Summon {
                    name: "spiderling".to_string(),
                    cap: 3,
                })],
            }],
            special: Some(Special {
                name: "Chitin Shield".to_string(),
                effects: vec![effect(EffectKind::SacrificeSummonNegate {
                    summon: "spiderling".to_string(),
                })],
                activated: None,
            }),
        },
        // Links himself to an ally and mirrors the damage he takes.
        HeroTemplate {
            name: "Kael the Bound".to_string(),
            max_hp: 21,
            defense: 14,
            accuracy: 2,
            attack: Some(dice("1d8")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Blood Price".to_string(),
                auto_hit: true,
                requires: TargetRequirement::Enemy,
                effects: vec![
                    effect(EffectKind::Damage { dice: dice("2d6") })
                        .target(TargetSelector::Chosen),
                    effect(EffectKind::Damage { dice: dice("1d4") })
                        .target(TargetSelector::SelfHero),
                ],
            }],
            special: Some(Special {
                name: "Shared Torment".to_string(),
                effects: vec![effect(EffectKind::Advantage)
                    .condition(EffectCondition::SelfHpBelow { percent: 50 })],
                activated: Some(Ability {
                    name: "Soul Tether".to_string(),
                    auto_hit: true,
                    requires: TargetRequirement::None,
                    effects: vec![effect(EffectKind::HealthLink).target(TargetSelector::AllyRight)],
                }),
            }),
        },
        // Warlord whose hits order the next ally into the fray.
        HeroTemplate {
            name: "Warlord Khagan".to_string(),
            max_hp: 23,
            defense: 14,
            accuracy: 3,
            attack: Some(dice("1d10")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "War Banner".to_string(),
                auto_hit: true,
                requires: TargetRequirement::None,
                effects: vec![effect(EffectKind::StatModifier {
                    stat: Stat::Accuracy,
                    amount: 2,
                    permanent: false,
                })
                .target(TargetSelector::AllAllies)],
            }],
            special: Some(Special {
                name: "Battle Orders".to_string(),
                effects: vec![effect(EffectKind::Command { inherit_roll: true })
                    .trigger(EffectTrigger::OnHit)
                    .target(TargetSelector::AllyRight)],
                activated: None,
            }),
        },
        // Assassin: strikes twice, crits early, vanishes when struck.
        HeroTemplate {
            name: "Nyx Shadowblade".to_string(),
            max_hp: 16,
            defense: 15,
            accuracy: 4,
            attack: Some(dice("2d6")),
            attacks_per_turn: 2,
            abilities: vec![Ability {
                name: "Garrote".to_string(),
                auto_hit: false,
                requires: TargetRequirement::Enemy,
                effects: vec![
                    effect(EffectKind::Damage { dice: dice("1d6") })
                        .target(TargetSelector::Chosen),
                    effect(EffectKind::Silence { turns: 1 }).target(TargetSelector::Chosen),
                ],
            }],
            special: Some(Special {
                name: "Night's Edge".to_string(),
                effects: vec![
                    effect(EffectKind::CritThreshold { value: 19 }),
                    effect(EffectKind::Untargetable).trigger(EffectTrigger::AfterDamage),
                    effect(EffectKind::Disadvantage)
                        .target(TargetSelector::AllEnemies)
                        .condition(EffectCondition::SelfHpBelow { percent: 50 }),
                ],
                activated: None,
            }),
        },
        // Retaliator: punishes whiffs and wears spite into attackers.
        HeroTemplate {
            name: "Thornmail Shaman".to_string(),
            max_hp: 20,
            defense: 13,
            accuracy: 1,
            attack: Some(dice("1d6")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Earthshatter".to_string(),
                auto_hit: false,
                requires: TargetRequirement::None,
                effects: vec![effect(EffectKind::Damage { dice: dice("1d6") })
                    .target(TargetSelector::AllEnemies)],
            }],
            special: Some(Special {
                name: "Spite Thorns".to_string(),
                effects: vec![
                    effect(EffectKind::GlobalDebuff {
                        stat: Stat::Accuracy,
                        amount: -1,
                    })
                    .trigger(EffectTrigger::OnTakeDamage),
                    effect(EffectKind::CounterAttack { dice: dice("1d4") })
                        .trigger(EffectTrigger::OnMiss),
                ],
                activated: None,
            }),
        },
        // Line captain: shares her defense rightward, grows with losses.
        HeroTemplate {
            name: "Captain Lyra".to_string(),
            max_hp: 22,
            defense: 15,
            accuracy: 2,
            attack: Some(dice("1d8")),
            attacks_per_turn: 1,
            abilities: vec![Ability {
                name: "Rally".to_string(),
                auto_hit: true,
                requires: TargetRequirement::None,
                effects: vec![effect(EffectKind::Advantage).target(TargetSelector::RandomAlly)],
            }],
            special: Some(Special {
                name: "Hold the Line".to_string(),
                effects: vec![
                    effect(EffectKind::ShareDefense).target(TargetSelector::AllyRight),
                    effect(EffectKind::ScalingStat {
                        stat: Stat::Accuracy,
                        amount: 1,
                    })
                    .trigger(EffectTrigger::OnAllyDeath),
                    effect(EffectKind::StatModifier {
                        stat: Stat::Defense,
                        amount: 1,
                        permanent: true,
                    })
                    .trigger(EffectTrigger::BattleStart)
                    .target(TargetSelector::AllAllies),
                ],
                activated: None,
            }),
        },
    ]
}
