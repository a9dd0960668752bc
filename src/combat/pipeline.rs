//! Effect resolution pipeline
//!
//! Resolves one attack, ability, or special activation into state mutations,
//! in strict order: legality checks, target resolution, attack roll,
//! interception (deflect, damage negation), damage/heal application with the
//! one-shot reflection recursion, reactive triggers, death cascade, and the
//! final win check plus aura recompute.
//!
//! Delegated ("commanded") strikes re-enter the same machinery with an
//! explicit context carrying the delegating hero's roll, guarded against
//! re-delegation.

use tracing::{debug, warn};

use crate::catalog::{
    Ability, EffectDescriptor, EffectKind, EffectTrigger, TargetRequirement, TargetSelector,
};
use crate::combat::auras::{self, condition_holds, resolve_aura_targets};
use crate::combat::death::{self, PendingDeath};
use crate::combat::dice::{is_critical, roll_d20, DicePool, DiceRoller, RollMode};
use crate::combat::status::{DurationUnit, StatModifier, StatusEntry, StatusKind};
use crate::config::ArenaConfig;
use crate::error::{GameError, GameResult};
use crate::game::scheduler;
use crate::game::{Game, GamePhase, HeroRef};

/// One player command against a game in the battle phase
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Basic attack with the hero's derived attack dice
    Attack { target: HeroRef },
    /// Activate an ability by index, with its required targets
    Ability {
        index: usize,
        target: Option<HeroRef>,
        ally: Option<HeroRef>,
    },
    /// Consume the hero's once-per-match activatable special
    Special,
}

/// Execution context for a strike; delegated strikes cannot re-delegate
#[derive(Debug, Clone, Copy, Default)]
struct StrikeContext {
    delegated: bool,
    /// Present when the triggering hero's roll is inherited: the strike
    /// hits outright and reuses the original critical status
    inherited_crit: Option<bool>,
}

/// Resolve a player action against the game.
///
/// The single entry point for battle commands; fully processes cascades and
/// recomputes derived stats before returning.
pub fn resolve_action(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    seat: usize,
    action: PlayerAction,
) -> GameResult<()> {
    game.require_phase(GamePhase::Battle)?;
    if seat != game.active_player {
        return Err(GameError::NotYourTurn);
    }
    scheduler::begin_action(game);
    let actor = scheduler::current_actor(game).ok_or(GameError::InvalidPhase {
        expected: GamePhase::Battle,
        actual: game.phase,
    })?;

    match action {
        PlayerAction::Attack { target } => resolve_basic_attack(game, rng, config, actor, target)?,
        PlayerAction::Ability { index, target, ally } => {
            resolve_ability_action(game, rng, config, actor, index, target, ally)?
        }
        PlayerAction::Special => resolve_special_activation(game, rng, config, actor)?,
    }

    auras::recompute(game);
    scheduler::check_win(game);
    scheduler::auto_advance_if_actor_down(game, actor);
    Ok(())
}

// ---------------------------------------------------------------------------
// Legality
// ---------------------------------------------------------------------------

fn validate_enemy_target(game: &Game, actor: HeroRef, target: HeroRef) -> GameResult<()> {
    if target.player != game.opponent(actor.player) {
        return Err(GameError::InvalidTarget("not an enemy hero".to_string()));
    }
    let hero = game.hero(target)?;
    if !hero.is_alive() {
        return Err(GameError::InvalidTarget("target is dead".to_string()));
    }
    if hero.statuses.blocks_targeting_by(actor) {
        return Err(GameError::InvalidTarget(
            "target is untargetable".to_string(),
        ));
    }
    if let Some(forced) = game.hero(actor)?.statuses.taunt_target() {
        let forced_alive = game.hero(forced).map(|h| h.is_alive()).unwrap_or(false);
        let immune = game
            .hero(actor)?
            .template
            .has_passive(|k| *k == EffectKind::TauntImmunity);
        if forced_alive && target != forced && !immune {
            return Err(GameError::InvalidTarget(format!(
                "taunted: must target {}",
                game.hero(forced)?.name()
            )));
        }
    }
    Ok(())
}

fn validate_ally_target(game: &Game, actor: HeroRef, ally: HeroRef) -> GameResult<()> {
    if ally.player != actor.player {
        return Err(GameError::InvalidTarget("not an allied hero".to_string()));
    }
    if !game.hero(ally)?.is_alive() {
        return Err(GameError::InvalidTarget("ally is dead".to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Basic attack
// ---------------------------------------------------------------------------

fn resolve_basic_attack(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    actor: HeroRef,
    target: HeroRef,
) -> GameResult<()> {
    if game.players[actor.player].turn.attacks_left == 0 {
        return Err(GameError::ActionAlreadyUsed("attack"));
    }
    if game.hero(actor)?.statuses.attack_disabled() {
        return Err(GameError::ActionBlocked("stunned"));
    }
    let dice = game
        .hero(actor)?
        .attack_dice
        .clone()
        .ok_or_else(|| GameError::InvalidConfiguration("hero has no basic attack".to_string()))?;
    validate_enemy_target(game, actor, target)?;

    game.players[actor.player].turn.attacks_left -= 1;
    game.players[actor.player].turn.selected_target = Some(target);

    let label = format!("{} attacks", game.hero(actor)?.name());
    perform_strike(
        game,
        rng,
        config,
        actor,
        target,
        Some(dice),
        &[],
        &label,
        StrikeContext::default(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Abilities and activated specials
// ---------------------------------------------------------------------------

fn resolve_ability_action(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    actor: HeroRef,
    index: usize,
    target: Option<HeroRef>,
    ally: Option<HeroRef>,
) -> GameResult<()> {
    if game.hero(actor)?.statuses.silenced() {
        return Err(GameError::ActionBlocked("silenced"));
    }
    if game.players[actor.player].turn.ability_used {
        return Err(GameError::ActionAlreadyUsed("ability"));
    }
    let ability = game
        .hero(actor)?
        .template
        .abilities
        .get(index)
        .cloned()
        .ok_or_else(|| GameError::InvalidConfiguration(format!("unknown ability index {}", index)))?;

    check_requirements(game, actor, &ability, target, ally)?;
    game.players[actor.player].turn.ability_used = true;
    if let Some(target) = target {
        game.players[actor.player].turn.selected_target = Some(target);
    }

    run_ability(game, rng, config, actor, &ability, target, ally)
}

fn resolve_special_activation(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    actor: HeroRef,
) -> GameResult<()> {
    let activated = game
        .hero(actor)?
        .template
        .special
        .as_ref()
        .and_then(|s| s.activated.clone())
        .ok_or_else(|| {
            GameError::InvalidConfiguration("special has no activatable part".to_string())
        })?;
    if game.hero(actor)?.flags.special_used {
        return Err(GameError::ActionAlreadyUsed("special"));
    }
    game.hero_mut(actor)?.flags.special_used = true;
    let (actor_name, special_name) = {
        let hero = game.hero(actor)?;
        (hero.name().to_string(), activated.name.clone())
    };
    game.record(format!("{} unleashes {}", actor_name, special_name));

    run_ability(game, rng, config, actor, &activated, None, None)
}

fn check_requirements(
    game: &Game,
    actor: HeroRef,
    ability: &Ability,
    target: Option<HeroRef>,
    ally: Option<HeroRef>,
) -> GameResult<()> {
    let needs_enemy = matches!(
        ability.requires,
        TargetRequirement::Enemy | TargetRequirement::EnemyAndAlly
    );
    let needs_ally = matches!(
        ability.requires,
        TargetRequirement::Ally | TargetRequirement::EnemyAndAlly
    );
    if needs_enemy {
        let target = target
            .ok_or_else(|| GameError::InvalidTarget("ability requires an enemy target".to_string()))?;
        validate_enemy_target(game, actor, target)?;
    }
    if needs_ally {
        let ally = ally
            .ok_or_else(|| GameError::InvalidTarget("ability requires an ally target".to_string()))?;
        validate_ally_target(game, actor, ally)?;
    }
    Ok(())
}

/// Resolve an ability's effects: auto-success effects apply directly, rolled
/// abilities expand to one independent attack roll per concrete target.
fn run_ability(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    actor: HeroRef,
    ability: &Ability,
    target: Option<HeroRef>,
    ally: Option<HeroRef>,
) -> GameResult<()> {
    if ability.auto_hit {
        let mut deaths: Vec<PendingDeath> = Vec::new();
        for effect in &ability.effects {
            let resolved = resolve_action_targets(game, rng, actor, effect.target, target, ally);
            for t in resolved {
                apply_effect(game, rng, actor, t, effect, &ability.name, &mut deaths);
            }
        }
        death::process_deaths(game, rng, config, deaths);
        return Ok(());
    }

    // Rolled ability: expand every effect's selector, then strike each
    // concrete target once, independently.
    let mut resolved: Vec<(usize, Vec<HeroRef>)> = Vec::new();
    for (idx, effect) in ability.effects.iter().enumerate() {
        let targets = resolve_action_targets(game, rng, actor, effect.target, target, ally);
        resolved.push((idx, targets));
    }
    let mut strike_targets: Vec<HeroRef> = Vec::new();
    for (_, targets) in &resolved {
        for t in targets {
            if !strike_targets.contains(t) {
                strike_targets.push(*t);
            }
        }
    }

    for t in strike_targets {
        if game.hero(t).map(|h| !h.is_alive()).unwrap_or(true) {
            continue;
        }
        // AOE expansion skips untargetable heroes instead of failing the action
        let is_chosen = target == Some(t);
        if !is_chosen && game.hero(t)?.statuses.blocks_targeting_by(actor) {
            let name = game.hero(t)?.name().to_string();
            game.record(format!("{} slips away, untargetable", name));
            continue;
        }
        let dice = resolved.iter().find_map(|(idx, targets)| {
            if !targets.contains(&t) {
                return None;
            }
            match &ability.effects[*idx].kind {
                EffectKind::Damage { dice } => Some(dice.clone()),
                _ => None,
            }
        });
        let riders: Vec<EffectDescriptor> = resolved
            .iter()
            .filter(|(idx, targets)| {
                targets.contains(&t)
                    && !matches!(ability.effects[*idx].kind, EffectKind::Damage { .. })
            })
            .map(|(idx, _)| ability.effects[*idx].clone())
            .collect();

        let label = format!("{}'s {}", game.hero(actor)?.name(), ability.name);
        perform_strike(
            game,
            rng,
            config,
            actor,
            t,
            dice,
            &riders,
            &label,
            StrikeContext::default(),
        );
        if game.phase != GamePhase::Battle {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// The strike: roll, interception, damage, reactions
// ---------------------------------------------------------------------------

/// Resolve one attack instance against one target, then settle any deaths it
/// caused. Riders are non-damage effects applied only on a hit.
#[allow(clippy::too_many_arguments)]
fn perform_strike(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    attacker: HeroRef,
    target: HeroRef,
    dice: Option<DicePool>,
    riders: &[EffectDescriptor],
    label: &str,
    ctx: StrikeContext,
) {
    let mut deaths: Vec<PendingDeath> = Vec::new();

    let (hit, critical) = match ctx.inherited_crit {
        Some(critical) => (true, critical),
        None => {
            let mode = count_roll_mode(game, attacker, target);
            let kept = roll_d20(rng, mode);
            let (accuracy, threshold) = match game.hero(attacker) {
                Ok(hero) => (hero.accuracy, hero.crit_threshold),
                Err(_) => return,
            };
            let total = kept as i32 + accuracy;
            let critical = is_critical(kept, threshold);

            // The roll consumes next-attack durations on both participants
            if let Ok(hero) = game.hero_mut(attacker) {
                hero.statuses.expire_after_attack();
            }
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.expire_after_attack();
            }

            // Interception: an unspent ally deflector redirects the attack
            if let Some(deflector) = find_deflector(game, attacker, target) {
                deflect_strike(
                    game, rng, config, attacker, target, deflector, &dice, total, critical, label,
                );
                return;
            }

            let defense = match game.hero(target) {
                Ok(hero) => hero.defense,
                Err(_) => return,
            };
            debug!(%attacker, %target, kept, total, defense, mode = ?mode, "attack roll");
            (total >= defense, critical)
        }
    };

    let target_name = game
        .hero(target)
        .map(|h| h.name().to_string())
        .unwrap_or_default();

    if !hit {
        game.record(format!("{} and misses {}", label, target_name));
        on_miss_reactions(game, rng, attacker, target, &mut deaths);
        death::process_deaths(game, rng, config, deaths);
        return;
    }

    let mut dealt = 0;
    if let Some(dice) = &dice {
        let amount = if critical { dice.max() } else { dice.roll(rng) };
        if critical {
            game.record(format!(
                "{} and crits {} for {}",
                label, target_name, amount
            ));
        } else {
            game.record(format!("{} and hits {} for {}", label, target_name, amount));
        }
        dealt = apply_damage(game, rng, target, amount, Some(attacker), true, &mut deaths);
    } else {
        game.record(format!("{} and hits {}", label, target_name));
    }

    // Riders land only while the target still stands
    if game.hero(target).map(|h| h.is_alive()).unwrap_or(false) {
        for rider in riders {
            apply_effect(game, rng, attacker, target, rider, label, &mut deaths);
        }
    }

    // Reactive triggers fire only if the target survived the hit
    if dealt > 0 && game.hero(target).map(|h| h.is_alive()).unwrap_or(false) {
        survived_hit_reactions(game, attacker, target);
    }

    // Delegated follow-up: the commander's special orders an ally to strike
    if hit && !ctx.delegated {
        command_follow_up(game, rng, config, attacker, target, critical);
    }

    death::process_deaths(game, rng, config, deaths);
}

/// Count every applicable advantage and disadvantage source and net them
fn count_roll_mode(game: &Game, attacker: HeroRef, target: HeroRef) -> RollMode {
    let mut advantage = 0u32;
    let mut disadvantage = 0u32;

    if let Ok(hero) = game.hero(attacker) {
        advantage += hero.statuses.value(StatusKind::Advantage).max(0) as u32;
        disadvantage += hero.statuses.value(StatusKind::Disadvantage).max(0) as u32;
    }

    for owner in game.all_refs() {
        let Ok(hero) = game.hero(owner) else { continue };
        if !hero.is_alive() {
            continue;
        }
        for effect in hero.special_effects() {
            if effect.trigger != EffectTrigger::Aura {
                continue;
            }
            let counts = match effect.kind {
                EffectKind::Advantage | EffectKind::Disadvantage => {
                    resolve_aura_targets(game, owner, effect.target).contains(&attacker)
                        && condition_holds(game, owner, &effect.condition, Some(target))
                }
                _ => false,
            };
            if counts {
                match effect.kind {
                    EffectKind::Advantage => advantage += 1,
                    EffectKind::Disadvantage => disadvantage += 1,
                    _ => {}
                }
            }
        }
    }
    RollMode::from_counts(advantage, disadvantage)
}

/// First living teammate of the target able to deflect this round
fn find_deflector(game: &Game, attacker: HeroRef, target: HeroRef) -> Option<HeroRef> {
    for candidate in game.living_refs(target.player) {
        if candidate == target || candidate == attacker {
            continue;
        }
        let Ok(hero) = game.hero(candidate) else { continue };
        if hero.flags.deflect_used {
            continue;
        }
        let deflects = hero
            .special_effects()
            .iter()
            .any(|e| e.trigger == EffectTrigger::Aura && matches!(e.kind, EffectKind::Deflect { .. }));
        if deflects {
            return Some(candidate);
        }
    }
    None
}

/// Redirect a strike onto the deflector: resolved against the deflector's
/// own defense, countering when it fails to land
#[allow(clippy::too_many_arguments)]
fn deflect_strike(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    attacker: HeroRef,
    target: HeroRef,
    deflector: HeroRef,
    dice: &Option<DicePool>,
    total: i32,
    critical: bool,
    label: &str,
) {
    let mut deaths: Vec<PendingDeath> = Vec::new();
    let counter = match game.hero(deflector) {
        Ok(hero) => hero.special_effects().iter().find_map(|e| match &e.kind {
            EffectKind::Deflect { counter } => Some(counter.clone()),
            _ => None,
        }),
        Err(_) => None,
    };
    let (deflector_name, deflector_defense) = match game.hero_mut(deflector) {
        Ok(hero) => {
            hero.flags.deflect_used = true;
            (hero.name().to_string(), hero.defense)
        }
        Err(_) => return,
    };
    let target_name = game
        .hero(target)
        .map(|h| h.name().to_string())
        .unwrap_or_default();
    game.record(format!(
        "{} steps in front of {} to deflect",
        deflector_name, target_name
    ));

    if total >= deflector_defense {
        // The redirected blow lands on the deflector instead
        if let Some(dice) = dice {
            let amount = if critical { dice.max() } else { dice.roll(rng) };
            game.record(format!(
                "{} and strikes {} for {}",
                label, deflector_name, amount
            ));
            apply_damage(game, rng, deflector, amount, Some(attacker), true, &mut deaths);
        }
    } else {
        game.record(format!("{} is turned aside by {}", label, deflector_name));
        if let Some(counter) = counter {
            let amount = counter.roll(rng);
            let attacker_name = game
                .hero(attacker)
                .map(|h| h.name().to_string())
                .unwrap_or_default();
            game.record(format!(
                "{} counters {} for {}",
                deflector_name, attacker_name, amount
            ));
            apply_damage(game, rng, attacker, amount, Some(deflector), true, &mut deaths);
        }
    }
    death::process_deaths(game, rng, config, deaths);
}

/// Apply damage to a hero: interception first, then the HP mutation, then the
/// one-shot mirror onto a linked ally. Deaths are queued, not settled here.
fn apply_damage(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    target: HeroRef,
    amount: i32,
    source: Option<HeroRef>,
    allow_reflect: bool,
    deaths: &mut Vec<PendingDeath>,
) -> i32 {
    if amount <= 0 {
        return 0;
    }
    if negate_damage(game, target, amount) {
        return 0;
    }

    let (name, dealt, hp, max_hp, now_dead, linked) = match game.hero_mut(target) {
        Ok(hero) => {
            let dealt = hero.take_damage(amount);
            (
                hero.name().to_string(),
                dealt,
                hero.hp,
                hero.max_hp,
                !hero.is_alive(),
                hero.statuses.linked_ally,
            )
        }
        Err(_) => return 0,
    };
    game.record(format!("{} takes {} damage ({}/{})", name, dealt, hp, max_hp));

    if now_dead {
        deaths.push((target, source));
    }

    // Mirrored damage re-enters this same path exactly once per instance
    if allow_reflect && dealt > 0 {
        if let Some(linked) = linked {
            let linked_alive = game.hero(linked).map(|h| h.is_alive()).unwrap_or(false);
            if linked_alive {
                let linked_name = game
                    .hero(linked)
                    .map(|h| h.name().to_string())
                    .unwrap_or_default();
                game.record(format!("{} mirrors the blow onto {}", name, linked_name));
                apply_damage(game, rng, linked, dealt, source, false, deaths);
            }
        }
    }
    dealt
}

/// Consumable damage negation, in the order the target's effect list declares.
/// Ally deflection has already had its chance; among the target's own
/// negation sources, the first applicable one consumes.
fn negate_damage(game: &mut Game, target: HeroRef, amount: i32) -> bool {
    let effects: Vec<EffectKind> = match game.hero(target) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::Aura)
            .map(|e| e.kind.clone())
            .collect(),
        Err(_) => return false,
    };
    for kind in effects {
        match kind {
            EffectKind::NegateDamage { min_damage } => {
                let Ok(hero) = game.hero_mut(target) else { continue };
                if !hero.flags.negation_used && amount >= min_damage {
                    hero.flags.negation_used = true;
                    let name = hero.name().to_string();
                    game.record(format!("{} shrugs off the hit entirely", name));
                    return true;
                }
            }
            EffectKind::SacrificeSummonNegate { ref summon } => {
                let Ok(hero) = game.hero_mut(target) else { continue };
                if hero.statuses.consume_summon(summon) {
                    let name = hero.name().to_string();
                    game.record(format!("A {} dies shielding {}", summon, name));
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Target's reactions to an attack that missed it
fn on_miss_reactions(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    attacker: HeroRef,
    target: HeroRef,
    deaths: &mut Vec<PendingDeath>,
) {
    let reactions: Vec<EffectDescriptor> = match game.hero(target) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::OnMiss)
            .cloned()
            .collect(),
        Err(_) => return,
    };
    for effect in reactions {
        match &effect.kind {
            EffectKind::CounterAttack { dice } => {
                let amount = dice.roll(rng);
                let (target_name, attacker_name) = (
                    game.hero(target).map(|h| h.name().to_string()).unwrap_or_default(),
                    game.hero(attacker).map(|h| h.name().to_string()).unwrap_or_default(),
                );
                game.record(format!(
                    "{} punishes the miss, striking {} for {}",
                    target_name, attacker_name, amount
                ));
                apply_damage(game, rng, attacker, amount, Some(target), true, deaths);
            }
            other => {
                warn!(kind = other.name(), "unsupported on-miss effect, skipping");
            }
        }
    }
}

/// Target's reactions after surviving a damaging hit
fn survived_hit_reactions(game: &mut Game, attacker: HeroRef, target: HeroRef) {
    let reactions: Vec<EffectDescriptor> = match game.hero(target) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| {
                matches!(
                    e.trigger,
                    EffectTrigger::AfterDamage | EffectTrigger::OnTakeDamage
                )
            })
            .cloned()
            .collect(),
        Err(_) => return,
    };
    for effect in reactions {
        match effect.kind {
            EffectKind::Untargetable => {
                let name = match game.hero_mut(target) {
                    Ok(hero) => {
                        let owner = hero.hero;
                        hero.statuses.apply(
                            StatusKind::Untargetable,
                            StatusEntry::timed(1, 1, DurationUnit::CasterTurnStart, Some(owner))
                                .with_exempt(vec![attacker]),
                        );
                        hero.name().to_string()
                    }
                    Err(_) => continue,
                };
                game.record(format!("{} melts into the shadows", name));
            }
            EffectKind::GlobalDebuff { stat, amount } => {
                for victim in game.all_refs() {
                    let Ok(hero) = game.hero_mut(victim) else { continue };
                    if !hero.is_alive() {
                        continue;
                    }
                    hero.statuses.stack_stat_mod(StatModifier {
                        stat,
                        amount,
                        caster: target,
                        remaining: None,
                        unit: DurationUnit::OwnerTurnEnd,
                    });
                }
                let name = game
                    .hero(target)
                    .map(|h| h.name().to_string())
                    .unwrap_or_default();
                game.record(format!(
                    "{}'s thorns sap everyone: {} {:+}",
                    name, stat, amount
                ));
            }
            ref other => {
                warn!(kind = other.name(), "unsupported reaction effect, skipping");
            }
        }
    }
}

/// The attacker's on-hit command: a resolved ally repeats the strike against
/// the same target, optionally inheriting the roll's critical status
fn command_follow_up(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    attacker: HeroRef,
    target: HeroRef,
    critical: bool,
) {
    let commands: Vec<EffectDescriptor> = match game.hero(attacker) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| {
                e.trigger == EffectTrigger::OnHit && matches!(e.kind, EffectKind::Command { .. })
            })
            .cloned()
            .collect(),
        Err(_) => return,
    };
    for effect in commands {
        let EffectKind::Command { inherit_roll } = effect.kind else {
            continue;
        };
        let target_alive = game.hero(target).map(|h| h.is_alive()).unwrap_or(false);
        if !target_alive {
            continue;
        }
        let Some(delegate) = resolve_aura_targets(game, attacker, effect.target)
            .into_iter()
            .next()
        else {
            continue;
        };
        let Some(dice) = game.hero(delegate).ok().and_then(|h| h.attack_dice.clone()) else {
            continue;
        };
        let (delegate_name, attacker_name) = (
            game.hero(delegate).map(|h| h.name().to_string()).unwrap_or_default(),
            game.hero(attacker).map(|h| h.name().to_string()).unwrap_or_default(),
        );
        game.record(format!(
            "{} commands {} to strike",
            attacker_name, delegate_name
        ));
        let label = format!("{} attacks", delegate_name);
        perform_strike(
            game,
            rng,
            config,
            delegate,
            target,
            Some(dice),
            &[],
            &label,
            StrikeContext {
                delegated: true,
                inherited_crit: inherit_roll.then_some(critical),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Direct effect application (auto-success effects and riders)
// ---------------------------------------------------------------------------

/// Resolve an action-context target selector, including chosen targets and
/// random picks
fn resolve_action_targets(
    game: &Game,
    rng: &mut dyn DiceRoller,
    actor: HeroRef,
    selector: TargetSelector,
    chosen: Option<HeroRef>,
    chosen_ally: Option<HeroRef>,
) -> Vec<HeroRef> {
    match selector {
        TargetSelector::Chosen => chosen.into_iter().collect(),
        TargetSelector::ChosenAlly => chosen_ally.into_iter().collect(),
        TargetSelector::ChosenAndAdjacent => match chosen {
            Some(primary) => {
                let mut out = vec![primary];
                out.extend(game.adjacent_allies(primary));
                out
            }
            None => Vec::new(),
        },
        TargetSelector::RandomAlly => {
            let allies = game.living_allies(actor);
            if allies.is_empty() {
                Vec::new()
            } else {
                let pick = (rng.roll(allies.len() as u32) - 1) as usize;
                vec![allies[pick]]
            }
        }
        other => resolve_aura_targets(game, actor, other),
    }
}

/// Apply one auto-success effect (or hit rider) to a resolved target
fn apply_effect(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    actor: HeroRef,
    target: HeroRef,
    effect: &EffectDescriptor,
    label: &str,
    deaths: &mut Vec<PendingDeath>,
) {
    if !condition_holds(game, actor, &effect.condition, Some(target)) {
        return;
    }
    let target_name = game
        .hero(target)
        .map(|h| h.name().to_string())
        .unwrap_or_default();

    match &effect.kind {
        EffectKind::Damage { dice } => {
            let amount = dice.roll(rng);
            game.record(format!("{} hits {} for {}", label, target_name, amount));
            apply_damage(game, rng, target, amount, Some(actor), true, deaths);
        }
        EffectKind::Heal { amount } => {
            let healed = match game.hero_mut(target) {
                Ok(hero) => hero.heal(*amount),
                Err(_) => return,
            };
            if healed > 0 {
                game.record(format!("{} restores {} HP to {}", label, healed, target_name));
            }
        }
        EffectKind::Poison { stacks } => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses
                    .apply(StatusKind::Poison, StatusEntry::permanent(*stacks, Some(actor)));
            }
            game.record(format!("{} poisons {} ({} stacks)", label, target_name, stacks));
        }
        EffectKind::Taunt => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.apply(
                    StatusKind::Taunt,
                    StatusEntry::timed(1, 1, DurationUnit::CasterTurnStart, Some(actor)),
                );
            }
            game.record(format!("{} taunts {}", label, target_name));
        }
        EffectKind::Silence { turns } => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.apply(
                    StatusKind::Silence,
                    StatusEntry::timed(1, *turns, DurationUnit::OwnerTurnEnd, Some(actor)),
                );
            }
            game.record(format!("{} silences {}", label, target_name));
        }
        EffectKind::Stun { turns } => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.apply(
                    StatusKind::Stun,
                    StatusEntry::timed(1, *turns, DurationUnit::OwnerTurnEnd, Some(actor)),
                );
            }
            game.record(format!("{} stuns {}", label, target_name));
        }
        EffectKind::Summon { name, cap } => {
            let added = match game.hero_mut(target) {
                Ok(hero) => hero.statuses.try_add_summon(name, *cap),
                Err(_) => return,
            };
            if added {
                game.record(format!("{} summons a {}", target_name, name));
            } else {
                game.record(format!(
                    "{} cannot sustain another {} (cap {})",
                    target_name, name, cap
                ));
            }
        }
        EffectKind::HealthLink => {
            if let Ok(hero) = game.hero_mut(actor) {
                hero.statuses.linked_ally = Some(target);
            }
            let actor_name = game
                .hero(actor)
                .map(|h| h.name().to_string())
                .unwrap_or_default();
            game.record(format!("{} tethers to {}", actor_name, target_name));
        }
        EffectKind::StatModifier { stat, amount, .. } => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.set_stat_mod(StatModifier {
                    stat: *stat,
                    amount: *amount,
                    caster: actor,
                    remaining: Some(1),
                    unit: DurationUnit::CasterTurnStart,
                });
            }
            game.record(format!("{}: {} {} {:+}", label, target_name, stat, amount));
        }
        EffectKind::Advantage => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.apply(
                    StatusKind::Advantage,
                    StatusEntry::timed(1, 1, DurationUnit::NextAttack, Some(actor)),
                );
            }
            game.record(format!("{} grants {} advantage", label, target_name));
        }
        EffectKind::Disadvantage => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.statuses.apply(
                    StatusKind::Disadvantage,
                    StatusEntry::timed(1, 1, DurationUnit::NextAttack, Some(actor)),
                );
            }
            game.record(format!("{} hampers {}", label, target_name));
        }
        EffectKind::Stance { defense } => {
            if let Ok(hero) = game.hero_mut(target) {
                hero.stance_bonus = hero.stance_bonus.max(*defense);
            }
            game.record(format!(
                "{} braces: defense +{} until next turn",
                target_name, defense
            ));
        }
        EffectKind::Unknown => {
            // Forward compatibility: authored content newer than this engine
            warn!(game_id = %game.id, "unknown effect kind in action, skipping");
        }
        other => {
            warn!(
                kind = other.name(),
                "effect kind not applicable in action context, skipping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HeroCatalog, Stat};
    use crate::combat::dice::ScriptedDice;
    use crate::game::GameMode;

    fn battle_ready(team_a: [&str; 3], team_b: [&str; 3], rolls: &[u32]) -> (Game, ScriptedDice) {
        let catalog = HeroCatalog::builtin();
        let mut game = Game::new("g".to_string(), GameMode::Random, ["alice", "bob"], 3, 1);
        for name in team_a {
            game.add_hero(0, catalog.get(name).unwrap().clone()).unwrap();
        }
        for name in team_b {
            game.add_hero(1, catalog.get(name).unwrap().clone()).unwrap();
        }
        game.phase = GamePhase::Initiative;
        // Seat 0 wins initiative 18 vs 6, then the scripted rolls follow
        let mut script = vec![18, 6];
        script.extend_from_slice(rolls);
        let mut rng = ScriptedDice::new(script);
        scheduler::begin_battle(&mut game, &mut rng, &ArenaConfig::default()).unwrap();
        (game, rng)
    }

    #[test]
    fn test_attack_requires_turn_ownership() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[],
        );
        let config = ArenaConfig::default();
        let err = resolve_action(
            &mut game,
            &mut rng,
            &config,
            1,
            PlayerAction::Attack { target: HeroRef::new(0, 0) },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
    }

    #[test]
    fn test_critical_hit_deals_max_damage() {
        // Scenario: accuracy +2, raw 20 vs defense 14 with 2d6 dice -> 12
        let catalog = HeroCatalog::builtin();
        let mut game = Game::new("g".to_string(), GameMode::Random, ["alice", "bob"], 3, 1);
        let mut striker = catalog.get("Vesper Thorn").unwrap().clone();
        striker.name = "Test Striker".to_string();
        striker.accuracy = 2;
        striker.attack = Some("2d6".parse().unwrap());
        striker.special = None;
        game.add_hero(0, striker).unwrap();
        game.add_hero(0, catalog.get("Sister Maren").unwrap().clone()).unwrap();
        game.add_hero(0, catalog.get("Bram Ironwall").unwrap().clone()).unwrap();
        let mut dummy = catalog.get("Stonehide Golem").unwrap().clone();
        dummy.name = "Test Dummy".to_string();
        dummy.defense = 14;
        dummy.special = None;
        game.add_hero(1, dummy).unwrap();
        game.add_hero(1, catalog.get("Nyx Shadowblade").unwrap().clone()).unwrap();
        game.add_hero(1, catalog.get("Warlord Khagan").unwrap().clone()).unwrap();
        game.phase = GamePhase::Initiative;

        let config = ArenaConfig::default();
        let mut rng = ScriptedDice::new([18, 6, 20]);
        scheduler::begin_battle(&mut game, &mut rng, &config).unwrap();

        let target = HeroRef::new(1, 0);
        let hp_before = game.hero(target).unwrap().hp;
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Attack { target },
        )
        .unwrap();
        // Critical: damage is the dice maximum, no damage roll consumed
        assert_eq!(game.hero(target).unwrap().hp, hp_before - 12);
    }

    #[test]
    fn test_attack_allotment_is_consumed() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[2, 3, 2],
        );
        let config = ArenaConfig::default();
        let target = HeroRef::new(1, 0);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target }).unwrap();
        let err = resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target })
            .unwrap_err();
        assert_eq!(err, GameError::ActionAlreadyUsed("attack"));
    }

    #[test]
    fn test_multi_attack_allotment() {
        let (mut game, mut rng) = battle_ready(
            ["Nyx Shadowblade", "Vesper Thorn", "Sister Maren"],
            ["Captain Lyra", "Stonehide Golem", "Bram Ironwall"],
            &[],
        );
        let config = ArenaConfig::default();
        let lyra = HeroRef::new(1, 0);

        // Two attacks in one turn, both critting at 19 for the 2d6 maximum
        rng.push([19]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: lyra })
            .unwrap();
        rng.push([19]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: lyra })
            .unwrap();
        assert!(!game.hero(lyra).unwrap().is_alive());

        // The allotment is spent after the second strike
        let err = resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Attack { target: HeroRef::new(1, 1) },
        )
        .unwrap_err();
        assert_eq!(err, GameError::ActionAlreadyUsed("attack"));
    }

    #[test]
    fn test_dead_target_rejected() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[],
        );
        let config = ArenaConfig::default();
        let target = HeroRef::new(1, 1);
        game.hero_mut(target).unwrap().hp = 0;
        let err = resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target })
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidTarget(_)));
    }

    #[test]
    fn test_taunt_forces_target_selection() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[],
        );
        let config = ArenaConfig::default();
        let bram = HeroRef::new(0, 0);

        // Bram taunts the Golem
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability {
                index: 0,
                target: Some(HeroRef::new(1, 0)),
                ally: None,
            },
        )
        .unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();

        // The Golem may not attack anyone but Bram
        let err = resolve_action(
            &mut game,
            &mut rng,
            &config,
            1,
            PlayerAction::Attack { target: HeroRef::new(0, 1) },
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidTarget(_)));

        rng.push([15, 4]);
        resolve_action(&mut game, &mut rng, &config, 1, PlayerAction::Attack { target: bram })
            .unwrap();
    }

    #[test]
    fn test_poison_stacks_through_ability() {
        let (mut game, mut rng) = battle_ready(
            ["Vesper Thorn", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[],
        );
        let config = ArenaConfig::default();
        let golem = HeroRef::new(1, 0);

        // Venom Strike hits: roll 18 (+3 acc) vs 15, then 1d4 damage
        rng.push([18, 2]);
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability {
                index: 0,
                target: Some(golem),
                ally: None,
            },
        )
        .unwrap();
        assert_eq!(game.hero(golem).unwrap().statuses.value(StatusKind::Poison), 2);

        // Second application on a later turn stacks to 4
        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 1).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 1).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 1).unwrap();
        assert_eq!(scheduler::current_actor(&mut game), Some(HeroRef::new(0, 0)));
        rng.push([18, 2]);
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability {
                index: 0,
                target: Some(golem),
                ally: None,
            },
        )
        .unwrap();
        assert_eq!(game.hero(golem).unwrap().statuses.value(StatusKind::Poison), 4);
    }

    #[test]
    fn test_silence_blocks_abilities_only() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Nyx Shadowblade", "Captain Lyra"],
            &[],
        );
        let config = ArenaConfig::default();
        let bram = HeroRef::new(0, 0);
        game.hero_mut(bram).unwrap().statuses.apply(
            StatusKind::Silence,
            StatusEntry::timed(1, 1, DurationUnit::OwnerTurnEnd, None),
        );

        let err = resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability {
                index: 0,
                target: Some(HeroRef::new(1, 0)),
                ally: None,
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::ActionBlocked("silenced"));

        // Basic attacks still work while silenced
        rng.push([19, 4]);
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Attack { target: HeroRef::new(1, 0) },
        )
        .unwrap();
    }

    #[test]
    fn test_deflect_scenario() {
        // Attack roll totalling 12; Aegis Warden (deflect unused) steps in
        // front of Lyra, turns the blow aside, and counters.
        let (mut game, mut rng) = battle_ready(
            ["Stonehide Golem", "Vesper Thorn", "Sister Maren"],
            ["Aegis Warden", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let golem = HeroRef::new(0, 0);
        let lyra = HeroRef::new(1, 1);
        let warden = HeroRef::new(1, 0);

        let golem_hp = game.hero(golem).unwrap().hp;
        let lyra_hp = game.hero(lyra).unwrap().hp;

        // Golem accuracy 0: raw 12 -> total 12; counter d6 rolls 4
        rng.push([12, 4]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: lyra })
            .unwrap();

        assert_eq!(game.hero(lyra).unwrap().hp, lyra_hp, "target took no damage");
        assert_eq!(game.hero(golem).unwrap().hp, golem_hp - 4, "counter-damage landed");
        assert!(game.hero(warden).unwrap().flags.deflect_used);
    }

    #[test]
    fn test_deflect_once_per_round() {
        let (mut game, mut rng) = battle_ready(
            ["Stonehide Golem", "Vesper Thorn", "Sister Maren"],
            ["Aegis Warden", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let lyra = HeroRef::new(1, 1);
        game.hero_mut(HeroRef::new(1, 0)).unwrap().flags.deflect_used = true;

        let lyra_hp = game.hero(lyra).unwrap().hp;
        // Roll 16 vs Lyra's 15: with the deflect spent, the hit lands
        rng.push([16, 5]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: lyra })
            .unwrap();
        assert!(game.hero(lyra).unwrap().hp < lyra_hp);
    }

    #[test]
    fn test_negation_absorbs_one_large_hit() {
        let (mut game, mut rng) = battle_ready(
            ["Nyx Shadowblade", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Bram Ironwall"],
            &[],
        );
        let config = ArenaConfig::default();
        let golem = HeroRef::new(1, 0);
        let golem_hp = game.hero(golem).unwrap().hp;

        // Nyx crits (19 meets her threshold): 2d6 max = 12 >= 8, negated
        rng.push([19]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: golem })
            .unwrap();
        assert_eq!(game.hero(golem).unwrap().hp, golem_hp);
        assert!(game.hero(golem).unwrap().flags.negation_used);

        // Cycle a full rotation so Nyx acts again: her second big hit lands
        for seat in [0, 1, 0, 1, 0, 1] {
            scheduler::end_turn(&mut game, &mut rng, &config, seat).unwrap();
        }
        assert_eq!(scheduler::current_actor(&mut game), Some(HeroRef::new(0, 0)));
        rng.push([19]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: golem })
            .unwrap();
        assert_eq!(game.hero(golem).unwrap().hp, golem_hp - 12);
    }

    #[test]
    fn test_summon_sacrifice_negates() {
        let (mut game, mut rng) = battle_ready(
            ["Broodmother Sylk", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Bram Ironwall"],
            &[],
        );
        let config = ArenaConfig::default();
        let sylk = HeroRef::new(0, 0);

        // Hatch a spiderling
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability { index: 0, target: None, ally: None },
        )
        .unwrap();
        assert_eq!(game.hero(sylk).unwrap().statuses.summon_count("spiderling"), 1);

        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();

        // The Golem's hit is eaten by the spiderling
        let sylk_hp = game.hero(sylk).unwrap().hp;
        rng.push([18, 7]);
        resolve_action(&mut game, &mut rng, &config, 1, PlayerAction::Attack { target: sylk })
            .unwrap();
        assert_eq!(game.hero(sylk).unwrap().hp, sylk_hp);
        assert_eq!(game.hero(sylk).unwrap().statuses.summon_count("spiderling"), 0);
    }

    #[test]
    fn test_health_link_mirrors_once() {
        let (mut game, mut rng) = battle_ready(
            ["Kael the Bound", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let kael = HeroRef::new(0, 0);

        // Soul Tether links Kael to the ally on his right (Bram)
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Special).unwrap();
        let bram = game.hero(kael).unwrap().statuses.linked_ally.unwrap();
        assert_eq!(bram, HeroRef::new(0, 1));

        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();

        let kael_hp = game.hero(kael).unwrap().hp;
        let bram_hp = game.hero(bram).unwrap().hp;
        // Golem hits Kael: 17 vs 14, 1d10 rolls 6; Bram mirrors the 6
        rng.push([17, 6]);
        resolve_action(&mut game, &mut rng, &config, 1, PlayerAction::Attack { target: kael })
            .unwrap();
        assert_eq!(game.hero(kael).unwrap().hp, kael_hp - 6);
        assert_eq!(game.hero(bram).unwrap().hp, bram_hp - 6);
    }

    #[test]
    fn test_untargetable_after_damage() {
        let (mut game, mut rng) = battle_ready(
            ["Stonehide Golem", "Vesper Thorn", "Sister Maren"],
            ["Captain Lyra", "Nyx Shadowblade", "Bram Ironwall"],
            &[],
        );
        let config = ArenaConfig::default();
        let golem = HeroRef::new(0, 0);
        let nyx = HeroRef::new(1, 1);

        // Golem wounds Nyx (17 vs 16, 1d10 rolls 3): she vanishes
        rng.push([17, 3]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: nyx })
            .unwrap();
        assert!(game.hero(nyx).unwrap().statuses.has(StatusKind::Untargetable));

        // Lyra's turn passes; Vesper still cannot touch Nyx, whose own turn
        // has not yet come around
        scheduler::end_turn(&mut game, &mut rng, &config, 0).unwrap();
        scheduler::end_turn(&mut game, &mut rng, &config, 1).unwrap();
        let err = resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: nyx })
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidTarget(_)));

        // ...but the attacker who drew blood is exempt
        assert!(!game
            .hero(nyx)
            .unwrap()
            .statuses
            .blocks_targeting_by(golem));
    }

    #[test]
    fn test_on_take_damage_global_debuff() {
        let (mut game, mut rng) = battle_ready(
            ["Stonehide Golem", "Vesper Thorn", "Sister Maren"],
            ["Thornmail Shaman", "Captain Lyra", "Bram Ironwall"],
            &[],
        );
        let config = ArenaConfig::default();
        let shaman = HeroRef::new(1, 0);

        // Golem hits the Shaman (16 vs 13, rolls 4): everyone is sapped
        rng.push([16, 4]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: shaman })
            .unwrap();
        for r in game.all_refs() {
            let hero = game.hero(r).unwrap();
            if hero.is_alive() {
                assert_eq!(
                    hero.statuses.stat_mod_total(Stat::Accuracy),
                    -1,
                    "hero {} missed the debuff",
                    r
                );
            }
        }
    }

    #[test]
    fn test_command_follow_up_inherits_crit() {
        let (mut game, mut rng) = battle_ready(
            ["Warlord Khagan", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let lyra = HeroRef::new(1, 1);
        let lyra_hp = game.hero(lyra).unwrap().hp;

        // Khagan crits with a natural 20 (1d10 max = 10); Bram is commanded
        // and inherits the crit (1d8 max = 8). One scripted die total.
        rng.push([20]);
        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Attack { target: lyra })
            .unwrap();
        assert_eq!(game.hero(lyra).unwrap().hp, lyra_hp - 18);
    }

    #[test]
    fn test_aoe_rolls_each_target_independently() {
        let (mut game, mut rng) = battle_ready(
            ["Thornmail Shaman", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();

        let hp_before: Vec<i32> = (0..3)
            .map(|slot| game.hero(HeroRef::new(1, slot)).unwrap().hp)
            .collect();
        // Earthshatter vs three defense-16 enemies, one roll each:
        // 16(hit, 4 dmg), 3(miss), 18(hit, 2 dmg). Shaman accuracy 1.
        rng.push([16, 4, 3, 18, 2]);
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability { index: 0, target: None, ally: None },
        )
        .unwrap();

        assert_eq!(game.hero(HeroRef::new(1, 0)).unwrap().hp, hp_before[0] - 4);
        assert_eq!(game.hero(HeroRef::new(1, 1)).unwrap().hp, hp_before[1]);
        assert_eq!(game.hero(HeroRef::new(1, 2)).unwrap().hp, hp_before[2] - 2);
    }

    #[test]
    fn test_advantage_and_disadvantage_net_to_plain_roll() {
        let (mut game, _rng) = battle_ready(
            ["Vesper Thorn", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let vesper = HeroRef::new(0, 0);
        let golem = HeroRef::new(1, 0);

        // Vesper vs Golem (defense 15): Serpent's Eye grants 1 advantage.
        assert_eq!(count_roll_mode(&game, vesper, golem), RollMode::Advantage);

        // Grant 1 disadvantage too: 1 vs 1 cancels to a plain roll
        game.hero_mut(vesper).unwrap().statuses.apply(
            StatusKind::Disadvantage,
            StatusEntry::timed(1, 1, DurationUnit::NextAttack, None),
        );
        assert_eq!(count_roll_mode(&game, vesper, golem), RollMode::Normal);

        // 2 vs 2 still cancels
        game.hero_mut(vesper).unwrap().statuses.apply(
            StatusKind::Advantage,
            StatusEntry::timed(1, 1, DurationUnit::NextAttack, None),
        );
        game.hero_mut(vesper).unwrap().statuses.apply(
            StatusKind::Disadvantage,
            StatusEntry::timed(1, 1, DurationUnit::NextAttack, None),
        );
        assert_eq!(count_roll_mode(&game, vesper, golem), RollMode::Normal);
    }

    #[test]
    fn test_conditional_advantage_depends_on_target_defense() {
        let (mut game, _rng) = battle_ready(
            ["Vesper Thorn", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let vesper = HeroRef::new(0, 0);

        // Golem defense 15 meets Serpent's Eye's threshold
        assert_eq!(
            count_roll_mode(&game, vesper, HeroRef::new(1, 0)),
            RollMode::Advantage
        );

        // Lower the Golem's defense below 15: the advantage evaporates
        game.hero_mut(HeroRef::new(1, 0)).unwrap().defense = 12;
        assert_eq!(
            count_roll_mode(&game, vesper, HeroRef::new(1, 0)),
            RollMode::Normal
        );
    }

    #[test]
    fn test_recoil_death_auto_advances_turn() {
        let (mut game, mut rng) = battle_ready(
            ["Kael the Bound", "Bram Ironwall", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let kael = HeroRef::new(0, 0);
        game.hero_mut(kael).unwrap().hp = 2;

        // Blood Price: 2d6 to the Golem, 1d4 recoil kills Kael mid-turn.
        // Maren resurrects him... no: Maren is on his team and has the
        // resurrection, so he comes back at half HP and the turn passes.
        rng.push([3, 3, 4]);
        resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability {
                index: 0,
                target: Some(HeroRef::new(1, 0)),
                ally: None,
            },
        )
        .unwrap();
        assert_eq!(game.hero(kael).unwrap().hp, 11); // ceil(21/2)
        assert_eq!(game.active_player, 0, "resurrected actor keeps the turn");
    }

    #[test]
    fn test_special_single_use() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();

        resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Special).unwrap();
        assert_eq!(game.hero(HeroRef::new(0, 0)).unwrap().stance_bonus, 4);
        let err =
            resolve_action(&mut game, &mut rng, &config, 0, PlayerAction::Special).unwrap_err();
        assert_eq!(err, GameError::ActionAlreadyUsed("special"));
    }

    #[test]
    fn test_unknown_ability_index() {
        let (mut game, mut rng) = battle_ready(
            ["Bram Ironwall", "Vesper Thorn", "Sister Maren"],
            ["Stonehide Golem", "Captain Lyra", "Nyx Shadowblade"],
            &[],
        );
        let config = ArenaConfig::default();
        let err = resolve_action(
            &mut game,
            &mut rng,
            &config,
            0,
            PlayerAction::Ability { index: 9, target: None, ally: None },
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration(_)));
    }
}
