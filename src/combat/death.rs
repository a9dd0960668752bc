//! Death and resurrection cascade
//!
//! The ordered side effects that fire exactly once per hero death, processed
//! as a breadth-first queue of pending deaths so on-death reactions that kill
//! the killer cannot recurse unboundedly. A hard cap on dequeues makes
//! non-termination structurally impossible; past the cap, deaths still settle
//! but stop spawning reactions.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::catalog::{EffectKind, EffectTrigger};
use crate::combat::auras;
use crate::combat::dice::DiceRoller;
use crate::config::ArenaConfig;
use crate::game::scheduler;
use crate::game::{Game, HeroRef};

/// A death waiting to be settled: the fallen hero and, when known, its killer
pub type PendingDeath = (HeroRef, Option<HeroRef>);

/// Settle a batch of deaths and everything they trigger.
///
/// Recomputes auras and checks the win condition once the queue drains.
pub fn process_deaths(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    initial: Vec<PendingDeath>,
) {
    let mut queue: VecDeque<PendingDeath> = initial.into();
    if queue.is_empty() {
        return;
    }

    let total_heroes: usize = game.players.iter().map(|p| p.heroes.len()).sum();
    let cap = config.death_cascade_factor * total_heroes;
    let mut dequeued = 0usize;

    while let Some((dead, killer)) = queue.pop_front() {
        dequeued += 1;
        let reactions_allowed = dequeued <= cap;
        if !reactions_allowed {
            warn!(game_id = %game.id, "death cascade cap reached, suppressing further reactions");
        }
        settle_death(game, rng, dead, killer, &mut queue, reactions_allowed);
    }

    auras::recompute(game);
    scheduler::check_win(game);
}

/// The strict per-death step order. Fires at most once per death event,
/// guarded by the hero's `death_processed` flag.
fn settle_death(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    dead: HeroRef,
    killer: Option<HeroRef>,
    queue: &mut VecDeque<PendingDeath>,
    reactions_allowed: bool,
) {
    let (name, already_processed, alive) = match game.hero(dead) {
        Ok(hero) => (
            hero.name().to_string(),
            hero.flags.death_processed,
            hero.is_alive(),
        ),
        Err(_) => return,
    };
    if already_processed || alive {
        // Rescued by a resurrection earlier in this queue, or already settled
        return;
    }
    if let Ok(hero) = game.hero_mut(dead) {
        hero.flags.death_processed = true;
    }
    game.record(format!("{} falls", name));
    debug!(game_id = %game.id, hero = %dead, "processing death");

    // Step 1: resurrection short-circuits the whole cascade.
    if try_resurrect(game, dead, &name) {
        return;
    }

    // Step 2: the dead hero's summons are dismissed with it.
    if let Ok(hero) = game.hero_mut(dead) {
        let dismissed = hero.statuses.clear_summons();
        if dismissed > 0 {
            game.record(format!("{}'s {} summons scatter", name, dismissed));
        }
    }

    // Step 3: on-death reactions strike the killer, which can cascade.
    if reactions_allowed {
        strike_killer(game, rng, dead, killer, &name, queue);
    }

    // Step 4: allies that scale with losses grow.
    apply_ally_death_scaling(game, dead);

    // Step 5: collectors anywhere on the board copy the fallen attack dice.
    collect_attack_dice(game, dead, &name);

    // Steps 6-8: strip everything the dead hero was sustaining. The aura
    // recompute after the queue drains rebuilds defenses from scratch, which
    // also restores any defense-share override the dead hero was providing.
    for r in game.all_refs() {
        if let Ok(hero) = game.hero_mut(r) {
            hero.passive_buffs
                .retain(|b| b.permanent || b.source != dead);
            hero.statuses.purge_from_source(dead);
            if hero.shared_defense_from == Some(dead) {
                hero.shared_defense_from = None;
            }
        }
    }
}

/// Step 1: a living ally with an unused resurrection pulls the hero back to
/// half HP and aborts the rest of the cascade
fn try_resurrect(game: &mut Game, dead: HeroRef, name: &str) -> bool {
    let resurrector = game.living_allies(dead).into_iter().find(|&ally| {
        let Ok(hero) = game.hero(ally) else { return false };
        !hero.flags.resurrection_used
            && hero.special_effects().iter().any(|e| {
                e.trigger == EffectTrigger::OnAllyDeath && e.kind == EffectKind::Resurrect
            })
    });
    let Some(resurrector) = resurrector else {
        return false;
    };

    let resurrector_name = match game.hero_mut(resurrector) {
        Ok(hero) => {
            hero.flags.resurrection_used = true;
            hero.name().to_string()
        }
        Err(_) => return false,
    };
    if let Ok(hero) = game.hero_mut(dead) {
        // ceil(max/2), transient statuses wiped, one-turn guard left behind
        hero.hp = (hero.max_hp + 1) / 2;
        let owner = hero.hero;
        hero.statuses.reset_for_resurrection(owner);
    }
    game.record(format!(
        "{} pulls {} back from death",
        resurrector_name, name
    ));
    true
}

/// Step 3: the dying hero's on-death counter damage, queueing the killer's
/// own death if it drops
fn strike_killer(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    dead: HeroRef,
    killer: Option<HeroRef>,
    name: &str,
    queue: &mut VecDeque<PendingDeath>,
) {
    let Some(killer) = killer else { return };
    let reactions: Vec<_> = match game.hero(dead) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::OnDeath)
            .cloned()
            .collect(),
        Err(_) => return,
    };
    for effect in reactions {
        if let EffectKind::CounterAttack { dice } = &effect.kind {
            let killer_alive = game.hero(killer).map(|h| h.is_alive()).unwrap_or(false);
            if !killer_alive {
                continue;
            }
            let damage = dice.roll(rng);
            let (killer_name, dealt, now_dead) = match game.hero_mut(killer) {
                Ok(hero) => {
                    let dealt = hero.take_damage(damage);
                    (hero.name().to_string(), dealt, !hero.is_alive())
                }
                Err(_) => continue,
            };
            game.record(format!(
                "{}'s dying blow strikes {} for {}",
                name, killer_name, dealt
            ));
            if now_dead {
                queue.push_back((killer, Some(dead)));
            }
        }
    }
}

/// Step 4: surviving allies with loss-scaling specials accrue their bonuses
fn apply_ally_death_scaling(game: &mut Game, dead: HeroRef) {
    for ally in game.living_allies(dead) {
        let effects: Vec<_> = match game.hero(ally) {
            Ok(hero) => hero
                .special_effects()
                .iter()
                .filter(|e| e.trigger == EffectTrigger::OnAllyDeath)
                .cloned()
                .collect(),
            Err(_) => continue,
        };
        for effect in effects {
            match effect.kind {
                EffectKind::ScalingStat { stat, amount } => {
                    let hero_name = match game.hero_mut(ally) {
                        Ok(hero) => {
                            hero.scaling.push((stat, amount));
                            hero.name().to_string()
                        }
                        Err(_) => continue,
                    };
                    game.record(format!("{} hardens: {} {:+}", hero_name, stat, amount));
                }
                EffectKind::ScalingDice { count, sides } => {
                    let hero_name = match game.hero_mut(ally) {
                        Ok(hero) => {
                            hero.bonus_dice.add_dice(count, sides);
                            hero.name().to_string()
                        }
                        Err(_) => continue,
                    };
                    game.record(format!("{} gains {}d{} attack dice", hero_name, count, sides));
                }
                _ => {}
            }
        }
    }
}

/// Step 5: every living collector, ally or enemy, copies the dead hero's
/// authored attack dice into its stacking pool. Heroes that died without a
/// basic attack yield nothing.
fn collect_attack_dice(game: &mut Game, dead: HeroRef, name: &str) {
    let Some(fallen_dice) = game
        .hero(dead)
        .ok()
        .and_then(|h| h.template.attack.clone())
    else {
        return;
    };
    for r in game.all_refs() {
        if r == dead {
            continue;
        }
        let is_collector = match game.hero(r) {
            Ok(hero) => {
                hero.is_alive()
                    && hero.special_effects().iter().any(|e| {
                        e.trigger == EffectTrigger::Aura && e.kind == EffectKind::CollectDice
                    })
            }
            Err(_) => false,
        };
        if !is_collector {
            continue;
        }
        let collector_name = match game.hero_mut(r) {
            Ok(hero) => {
                hero.bonus_dice.merge(&fallen_dice);
                hero.name().to_string()
            }
            Err(_) => continue,
        };
        game.record(format!(
            "{} harvests {}'s attack dice ({})",
            collector_name, name, fallen_dice
        ));
    }
}
