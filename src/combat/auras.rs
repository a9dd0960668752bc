//! Aura/passive recompute engine
//!
//! Rebuilds every hero's derived stats from scratch whenever board state
//! changes. Fully idempotent: recomputing twice with no intervening change
//! yields identical stats, since nothing here accumulates. Non-permanent
//! passive buffs are wiped and re-derived on every pass.
//!
//! Derived defense layers, in order: base, permanent stat modifiers,
//! status-effect stat modifiers, scaling buffs, transient stance bonus,
//! passive aura buffs. Defense-sharing runs as a second pass so it reads the
//! already-recomputed defense of its source hero.

use tracing::warn;

use crate::catalog::{EffectCondition, EffectKind, EffectTrigger, Stat, TargetSelector};
use crate::combat::dice::BASE_CRIT_THRESHOLD;
use crate::game::{Game, HeroRef, PassiveBuff};

/// Recompute every hero's derived stats from live board state.
///
/// Must be re-run after any death, any stat-modifying status change, and any
/// HP threshold crossing that could toggle a conditional special. Safe to
/// call arbitrarily often.
pub fn recompute(game: &mut Game) {
    let refs = game.all_refs();

    // Step 1: reset derived state to base; only permanent buffs survive.
    for &r in &refs {
        if let Ok(hero) = game.hero_mut(r) {
            hero.defense = hero.template.defense;
            hero.accuracy = hero.template.accuracy;
            hero.crit_threshold = BASE_CRIT_THRESHOLD;
            hero.shared_defense_from = None;
            hero.passive_buffs.retain(|b| b.permanent);
        }
    }

    // Step 2 (pass 1): evaluate every living hero's aura effects.
    for &source in &refs {
        let Ok(hero) = game.hero(source) else { continue };
        if !hero.is_alive() {
            continue;
        }
        let special_name = hero
            .template
            .special
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let effects: Vec<_> = hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::Aura)
            .cloned()
            .collect();

        for effect in effects {
            if !condition_holds(game, source, &effect.condition, None) {
                continue;
            }
            match effect.kind {
                EffectKind::StatModifier {
                    stat,
                    amount,
                    permanent: false,
                } => {
                    for target in resolve_aura_targets(game, source, effect.target) {
                        if let Ok(hero) = game.hero_mut(target) {
                            hero.passive_buffs.push(PassiveBuff {
                                source,
                                source_name: special_name.clone(),
                                stat,
                                amount,
                                permanent: false,
                            });
                        }
                    }
                }
                EffectKind::CritThreshold { value } => {
                    if let Ok(hero) = game.hero_mut(source) {
                        hero.crit_threshold = hero.crit_threshold.min(value);
                    }
                }
                // Advantage, disadvantage, deflect, negation, and the other
                // aura-trigger kinds are consulted live by the pipeline.
                _ => {}
            }
        }
    }

    // Step 3: recompute displayed stats from base + buffs.
    for &r in &refs {
        update_derived(game, r);
    }

    // Step 4 (pass 2): defense sharing reads the recomputed defenses above.
    let recomputed: Vec<(HeroRef, i32)> = refs
        .iter()
        .filter_map(|&r| game.hero(r).ok().map(|h| (r, h.defense)))
        .collect();
    let defense_of = |r: HeroRef| {
        recomputed
            .iter()
            .find(|(other, _)| *other == r)
            .map(|(_, d)| *d)
    };
    for &source in &refs {
        let Ok(hero) = game.hero(source) else { continue };
        if !hero.is_alive() {
            continue;
        }
        let shares: Vec<_> = hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::Aura && e.kind == EffectKind::ShareDefense)
            .map(|e| e.target)
            .collect();
        for selector in shares {
            let Some(shared) = defense_of(source) else { continue };
            for target in resolve_aura_targets(game, source, selector) {
                if let Ok(hero) = game.hero_mut(target) {
                    if shared > hero.defense {
                        hero.defense = shared;
                        hero.shared_defense_from = Some(source);
                    }
                }
            }
        }
    }

    // Steps 5-6: summon counters surface through snapshots directly; finish
    // by rebuilding each hero's derived attack dice.
    for &r in &refs {
        rebuild_attack_dice(game, r);
    }
}

/// Recompute a hero's displayed defense and accuracy, layer by layer
fn update_derived(game: &mut Game, r: HeroRef) {
    let Ok(hero) = game.hero_mut(r) else { return };

    let mut defense = hero.template.defense;
    defense += hero
        .passive_buffs
        .iter()
        .filter(|b| b.permanent && b.stat == Stat::Defense)
        .map(|b| b.amount)
        .sum::<i32>();
    defense += hero.statuses.stat_mod_total(Stat::Defense);
    defense += hero.scaling_total(Stat::Defense);
    defense += hero.stance_bonus;
    defense += hero
        .passive_buffs
        .iter()
        .filter(|b| !b.permanent && b.stat == Stat::Defense)
        .map(|b| b.amount)
        .sum::<i32>();
    hero.defense = defense;

    let mut accuracy = hero.template.accuracy;
    accuracy += hero
        .passive_buffs
        .iter()
        .filter(|b| b.permanent && b.stat == Stat::Accuracy)
        .map(|b| b.amount)
        .sum::<i32>();
    accuracy += hero.statuses.stat_mod_total(Stat::Accuracy);
    accuracy += hero.scaling_total(Stat::Accuracy);
    accuracy += hero
        .passive_buffs
        .iter()
        .filter(|b| !b.permanent && b.stat == Stat::Accuracy)
        .map(|b| b.amount)
        .sum::<i32>();
    hero.accuracy = accuracy;
}

/// Rebuild derived attack dice: base dice plus scaling and collected dice,
/// grouped so every die size appears once
fn rebuild_attack_dice(game: &mut Game, r: HeroRef) {
    let Ok(hero) = game.hero_mut(r) else { return };
    hero.attack_dice = match &hero.template.attack {
        Some(base) => {
            let mut pool = base.clone();
            pool.merge(&hero.bonus_dice);
            Some(pool)
        }
        // A hero with no basic attack never gains one from bonuses
        None => None,
    };
}

/// Apply the one-time battle-start buffs; these are permanent for the match
pub fn apply_battle_start_buffs(game: &mut Game) {
    for source in game.all_refs() {
        let Ok(hero) = game.hero(source) else { continue };
        if !hero.is_alive() {
            continue;
        }
        let special_name = hero
            .template
            .special
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let effects: Vec<_> = hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::BattleStart)
            .cloned()
            .collect();
        for effect in effects {
            match effect.kind {
                EffectKind::StatModifier { stat, amount, .. } => {
                    for target in resolve_aura_targets(game, source, effect.target) {
                        if let Ok(hero) = game.hero_mut(target) {
                            hero.passive_buffs.push(PassiveBuff {
                                source,
                                source_name: special_name.clone(),
                                stat,
                                amount,
                                permanent: true,
                            });
                        }
                    }
                }
                ref other => {
                    warn!(kind = other.name(), "unsupported battle-start effect, skipping");
                }
            }
        }
    }
}

/// Evaluate an effect condition for an owner, optionally against a target
pub fn condition_holds(
    game: &Game,
    owner: HeroRef,
    condition: &EffectCondition,
    target: Option<HeroRef>,
) -> bool {
    let Ok(hero) = game.hero(owner) else {
        return false;
    };
    match condition {
        EffectCondition::Always => true,
        EffectCondition::SelfHpBelow { percent } => {
            hero.hp * 100 < hero.max_hp * (*percent as i32)
        }
        EffectCondition::SelfHpAbove { percent } => {
            hero.hp * 100 >= hero.max_hp * (*percent as i32)
        }
        EffectCondition::TargetDefenseAtLeast { value } => match target {
            Some(t) => game.hero(t).map(|h| h.defense >= *value).unwrap_or(false),
            None => false,
        },
        EffectCondition::AllyDown => game.players[owner.player]
            .heroes
            .iter()
            .any(|h| !h.is_alive()),
    }
}

/// Resolve an aura-context target selector to living heroes.
///
/// Chosen and random selectors have no meaning during recompute and resolve
/// to nothing.
pub fn resolve_aura_targets(game: &Game, owner: HeroRef, selector: TargetSelector) -> Vec<HeroRef> {
    let enemy = game.opponent(owner.player);
    match selector {
        TargetSelector::SelfHero => vec![owner],
        TargetSelector::AllAllies => game.living_refs(owner.player),
        TargetSelector::OtherAllies => game.living_allies(owner),
        TargetSelector::AdjacentAllies => game.adjacent_allies(owner),
        TargetSelector::AllyRight => game.ally_right(owner).into_iter().collect(),
        TargetSelector::LowestHpAlly => game.lowest_hp(owner.player).into_iter().collect(),
        TargetSelector::LowestHpEnemy => game.lowest_hp(enemy).into_iter().collect(),
        TargetSelector::AllEnemies => game.living_refs(enemy),
        TargetSelector::Chosen
        | TargetSelector::ChosenAlly
        | TargetSelector::ChosenAndAdjacent
        | TargetSelector::RandomAlly
        | TargetSelector::Attacker
        | TargetSelector::Killer => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HeroCatalog;
    use crate::game::GameMode;

    fn game_with(team_a: [&str; 3], team_b: [&str; 3]) -> Game {
        let catalog = HeroCatalog::builtin();
        let mut game = Game::new("g".to_string(), GameMode::Random, ["alice", "bob"], 3, 1);
        for name in team_a {
            game.add_hero(0, catalog.get(name).unwrap().clone()).unwrap();
        }
        for name in team_b {
            game.add_hero(1, catalog.get(name).unwrap().clone()).unwrap();
        }
        game
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut game = game_with(
            ["Bram Ironwall", "Captain Lyra", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Vesper Thorn"],
        );
        apply_battle_start_buffs(&mut game);
        recompute(&mut game);
        let first: Vec<_> = game
            .all_refs()
            .iter()
            .map(|&r| {
                let h = game.hero(r).unwrap();
                (h.defense, h.accuracy, h.crit_threshold, h.passive_buffs.len())
            })
            .collect();

        recompute(&mut game);
        let second: Vec<_> = game
            .all_refs()
            .iter()
            .map(|&r| {
                let h = game.hero(r).unwrap();
                (h.defense, h.accuracy, h.crit_threshold, h.passive_buffs.len())
            })
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_adjacency_aura() {
        let mut game = game_with(
            ["Captain Lyra", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Vesper Thorn"],
        );
        recompute(&mut game);

        // Bram's Bulwark reaches both neighbors but not himself
        let lyra = game.hero(HeroRef::new(0, 0)).unwrap();
        assert_eq!(lyra.passive_buff_total(Stat::Defense), 1);
        let maren = game.hero(HeroRef::new(0, 2)).unwrap();
        assert_eq!(maren.passive_buff_total(Stat::Defense), 1);
        let bram = game.hero(HeroRef::new(0, 1)).unwrap();
        assert_eq!(bram.passive_buff_total(Stat::Defense), 0);
    }

    #[test]
    fn test_dead_hero_auras_stop() {
        let mut game = game_with(
            ["Captain Lyra", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Vesper Thorn"],
        );
        recompute(&mut game);
        assert_eq!(
            game.hero(HeroRef::new(0, 0)).unwrap().passive_buff_total(Stat::Defense),
            1
        );

        game.hero_mut(HeroRef::new(0, 1)).unwrap().hp = 0;
        recompute(&mut game);
        assert_eq!(
            game.hero(HeroRef::new(0, 0)).unwrap().passive_buff_total(Stat::Defense),
            0
        );
    }

    #[test]
    fn test_battle_start_buffs_survive_recompute() {
        let mut game = game_with(
            ["Captain Lyra", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Vesper Thorn"],
        );
        apply_battle_start_buffs(&mut game);
        recompute(&mut game);
        recompute(&mut game);

        // Lyra's battle-start +1 defense reaches all allies and persists
        for slot in 0..3 {
            let hero = game.hero(HeroRef::new(0, slot)).unwrap();
            assert!(
                hero.passive_buffs.iter().any(|b| b.permanent),
                "slot {} lost its battle-start buff",
                slot
            );
        }
    }

    #[test]
    fn test_defense_share_reads_recomputed_source() {
        // Lyra (base 15) stands next to Bram, whose Bulwark gives her +1.
        // Her ShareDefense must propagate the buffed 16, not the base 15.
        let mut game = game_with(
            ["Bram Ironwall", "Captain Lyra", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Vesper Thorn"],
        );
        recompute(&mut game);

        let lyra = game.hero(HeroRef::new(0, 1)).unwrap();
        assert_eq!(lyra.defense, 16);

        // Maren (base 12) sits to Lyra's right and inherits the shared value
        let maren = game.hero(HeroRef::new(0, 2)).unwrap();
        assert_eq!(maren.defense, 16);
        assert_eq!(maren.shared_defense_from, Some(HeroRef::new(0, 1)));
    }

    #[test]
    fn test_crit_threshold_from_special() {
        let mut game = game_with(
            ["Nyx Shadowblade", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Vesper Thorn"],
        );
        recompute(&mut game);
        assert_eq!(game.hero(HeroRef::new(0, 0)).unwrap().crit_threshold, 19);
        assert_eq!(game.hero(HeroRef::new(0, 1)).unwrap().crit_threshold, 20);
    }

    #[test]
    fn test_attack_dice_regroup_with_bonus() {
        let mut game = game_with(
            ["The Gravekeeper", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Vesper Thorn"],
        );
        let keeper = HeroRef::new(0, 0);
        game.hero_mut(keeper).unwrap().bonus_dice.add_dice(1, 8);
        game.hero_mut(keeper).unwrap().bonus_dice.add_dice(1, 4);
        recompute(&mut game);

        // Base 1d8 + collected 1d8 + 1d4 groups into 2d8+1d4
        let dice = game.hero(keeper).unwrap().attack_dice.clone().unwrap();
        assert_eq!(dice.to_string(), "2d8+1d4");
    }

    #[test]
    fn test_conditional_aura_toggles_with_hp() {
        let mut game = game_with(
            ["Kael the Bound", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Vesper Thorn"],
        );
        let kael = HeroRef::new(0, 0);
        let condition = EffectCondition::SelfHpBelow { percent: 50 };
        assert!(!condition_holds(&game, kael, &condition, None));

        game.hero_mut(kael).unwrap().hp = 5;
        assert!(condition_holds(&game, kael, &condition, None));
    }
}
