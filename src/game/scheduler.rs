//! Turn scheduling
//!
//! The battle-phase state machine: initiative, whose hero acts, turn
//! alternation, per-turn flag resets, end-of-turn status processing, and
//! win-condition checks. Each player's hero cursor tracks the hero that acted
//! most recently; advancing the turn bumps the incoming player's cursor and
//! skips dead heroes.

use tracing::{debug, info, warn};

use crate::catalog::{EffectKind, EffectTrigger};
use crate::combat::auras;
use crate::combat::death;
use crate::combat::dice::DiceRoller;
use crate::config::ArenaConfig;
use crate::error::{GameError, GameResult};
use crate::game::{Game, GamePhase, HeroRef, MatchResult};

/// Validate rosters, roll initiative, and open the battle phase.
///
/// Ties reroll up to the configured bound; a still-standing tie breaks to
/// seat 0 so the outcome stays deterministic under a fixed seed.
pub fn begin_battle(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
) -> GameResult<()> {
    game.require_phase(GamePhase::Initiative)?;
    for player in &game.players {
        if player.heroes.len() != game.team_size {
            return Err(GameError::InvalidConfiguration(format!(
                "player '{}' has {} heroes, expected {}",
                player.user_id,
                player.heroes.len(),
                game.team_size
            )));
        }
    }

    let winner = roll_initiative(game, rng, config);
    game.active_player = winner;
    game.players[winner].cursor = 0;
    game.players[game.opponent(winner)].cursor = game.team_size - 1;
    game.phase = GamePhase::Battle;

    auras::apply_battle_start_buffs(game);
    auras::recompute(game);

    let first = game.players[winner].user_id.clone();
    game.record(format!("Battle begins: {} acts first", first));
    info!(game_id = %game.id, first_player = %first, "battle started");

    start_turn(game);
    Ok(())
}

/// Roll d20 initiative for both seats, rerolling ties up to the bound
fn roll_initiative(game: &mut Game, rng: &mut dyn DiceRoller, config: &ArenaConfig) -> usize {
    for _ in 0..config.initiative_reroll_max {
        let a = rng.roll(20);
        let b = rng.roll(20);
        game.record(format!(
            "Initiative: {} rolls {}, {} rolls {}",
            game.players[0].user_id, a, game.players[1].user_id, b
        ));
        if a != b {
            return if a > b { 0 } else { 1 };
        }
    }
    game.record("Initiative deadlock, first seat takes the turn");
    0
}

/// The hero whose turn it is, rotating past dead heroes.
///
/// Returns `None` outside the battle phase or when the active player has no
/// living hero left (which also resolves the match).
pub fn current_actor(game: &mut Game) -> Option<HeroRef> {
    if game.phase != GamePhase::Battle {
        return None;
    }
    let player = game.active_player;
    let team = game.players[player].heroes.len();
    for _ in 0..team {
        let slot = game.players[player].cursor;
        let hero = HeroRef::new(player, slot);
        if game.hero(hero).map(|h| h.is_alive()).unwrap_or(false) {
            return Some(hero);
        }
        game.players[player].cursor = (slot + 1) % team;
    }
    check_win(game);
    None
}

/// Finish the acting hero's turn and hand the turn over.
///
/// End-of-turn processing for the actor: poison tick (the stack itself is
/// untouched by the damage), then owner-turn-end status expiry. Deaths from
/// poison cascade before the hand-over.
pub fn end_turn(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    seat: usize,
) -> GameResult<()> {
    game.require_phase(GamePhase::Battle)?;
    if seat != game.active_player {
        return Err(GameError::NotYourTurn);
    }
    begin_action(game);

    if let Some(actor) = current_actor(game) {
        finish_turn_for(game, rng, config, actor);
    }
    if game.phase != GamePhase::Battle {
        return Ok(());
    }
    advance_turn(game);
    Ok(())
}

/// End-of-turn processing for a hero whose turn is over
fn finish_turn_for(
    game: &mut Game,
    rng: &mut dyn DiceRoller,
    config: &ArenaConfig,
    actor: HeroRef,
) {
    use crate::combat::status::StatusKind;

    let poison = game
        .hero(actor)
        .map(|h| h.statuses.value(StatusKind::Poison))
        .unwrap_or(0);
    if poison > 0 {
        let (name, dealt) = {
            let hero = match game.hero_mut(actor) {
                Ok(h) => h,
                Err(_) => return,
            };
            (hero.name().to_string(), hero.take_damage(poison))
        };
        game.record(format!("{} suffers {} poison damage", name, dealt));
        if !game.hero(actor).map(|h| h.is_alive()).unwrap_or(true) {
            death::process_deaths(game, rng, config, vec![(actor, None)]);
        }
        auras::recompute(game);
        check_win(game);
    }

    if let Ok(hero) = game.hero_mut(actor) {
        let expired = hero.statuses.expire_owner_turn_end();
        if !expired.is_empty() {
            debug!(hero = %actor, ?expired, "statuses expired at turn end");
        }
    }
    // Stat modifiers may have lapsed with the statuses
    auras::recompute(game);
}

/// Hand the turn to the other player: bump their cursor, switch sides,
/// reset per-turn flags, and fire the incoming hero's turn-start triggers.
pub fn advance_turn(game: &mut Game) {
    if game.phase != GamePhase::Battle {
        return;
    }
    let team = game.team_size;
    let other = game.opponent(game.active_player);
    game.players[other].cursor = (game.players[other].cursor + 1) % team;
    game.active_player = other;
    game.turn_count += 1;

    // The once-per-round deflect refreshes when the turn changes hands
    for r in game.all_refs() {
        if let Ok(hero) = game.hero_mut(r) {
            hero.flags.deflect_used = false;
        }
    }

    start_turn(game);
}

/// Per-turn setup for the hero now acting
fn start_turn(game: &mut Game) {
    let Some(actor) = current_actor(game) else {
        return;
    };

    // Stance bonuses lapse when their owner's next turn begins
    if let Ok(hero) = game.hero_mut(actor) {
        hero.stance_bonus = 0;
    }

    // Caster-turn durations cast by this hero lapse on every board member
    for r in game.all_refs() {
        if let Ok(hero) = game.hero_mut(r) {
            hero.statuses.expire_caster_turn_start(actor);
        }
    }

    // Fresh action allotment for the acting player
    let attacks = game
        .hero(actor)
        .map(|h| h.template.attacks_per_turn)
        .unwrap_or(1);
    let player = &mut game.players[actor.player];
    player.turn.attacks_left = attacks;
    player.turn.ability_used = false;
    player.turn.selected_target = None;

    fire_turn_start_triggers(game, actor);

    auras::recompute(game);
    check_win(game);
}

/// Resolve the acting hero's turn-start special effects
fn fire_turn_start_triggers(game: &mut Game, actor: HeroRef) {
    let effects: Vec<_> = match game.hero(actor) {
        Ok(hero) => hero
            .special_effects()
            .iter()
            .filter(|e| e.trigger == EffectTrigger::TurnStart)
            .cloned()
            .collect(),
        Err(_) => return,
    };
    for effect in effects {
        if !auras::condition_holds(game, actor, &effect.condition, None) {
            continue;
        }
        match effect.kind {
            EffectKind::Heal { amount } => {
                for target in auras::resolve_aura_targets(game, actor, effect.target) {
                    let (name, healed) = match game.hero_mut(target) {
                        Ok(hero) => (hero.name().to_string(), hero.heal(amount)),
                        Err(_) => continue,
                    };
                    if healed > 0 {
                        game.record(format!("{} regenerates {} HP", name, healed));
                    }
                }
            }
            ref other => {
                warn!(kind = other.name(), "unsupported turn-start effect, skipping");
            }
        }
    }
}

/// Clear per-action one-shot guards on living heroes.
///
/// Death-processed flags persist on dead heroes so a cascade never refires
/// for the same death; living heroes shed them at the start of the next
/// externally-visible action.
pub fn begin_action(game: &mut Game) {
    for r in game.all_refs() {
        if let Ok(hero) = game.hero_mut(r) {
            if hero.is_alive() {
                hero.flags.death_processed = false;
            }
        }
    }
}

/// Check the terminal condition; sets phase and winner when the match ends.
///
/// Called after every HP-changing operation.
pub fn check_win(game: &mut Game) -> Option<MatchResult> {
    if game.phase == GamePhase::Ended {
        return game.winner;
    }
    if game.phase != GamePhase::Battle {
        return None;
    }
    let alive = [
        game.players[0].has_living_hero(),
        game.players[1].has_living_hero(),
    ];
    let result = match alive {
        [false, false] => Some(MatchResult::Tie),
        [true, false] => Some(MatchResult::Winner(0)),
        [false, true] => Some(MatchResult::Winner(1)),
        [true, true] => None,
    };
    if let Some(result) = result {
        game.phase = GamePhase::Ended;
        game.winner = Some(result);
        match result {
            MatchResult::Winner(seat) => {
                let name = game.players[seat].user_id.clone();
                game.record(format!("{} wins the match", name));
            }
            MatchResult::Tie => game.record("Both teams are wiped out: the match is a tie"),
        }
        info!(game_id = %game.id, ?result, "match resolved");
    }
    result
}

/// End the match immediately with the given seat as the loser
pub fn forfeit(game: &mut Game, loser: usize, reason: &str) {
    if game.phase == GamePhase::Ended {
        return;
    }
    let winner = game.opponent(loser);
    game.phase = GamePhase::Ended;
    game.winner = Some(MatchResult::Winner(winner));
    let name = game.players[winner].user_id.clone();
    game.record(format!("{} wins: {}", name, reason));
    info!(game_id = %game.id, winner = %name, reason, "match forfeited");
}

/// Pass the turn when the acting hero died mid-turn, so the game never
/// waits on a dead actor
pub fn auto_advance_if_actor_down(game: &mut Game, actor: HeroRef) {
    if game.phase != GamePhase::Battle {
        return;
    }
    if actor.player != game.active_player {
        return;
    }
    let dead = game.hero(actor).map(|h| !h.is_alive()).unwrap_or(false);
    if dead {
        let name = game
            .hero(actor)
            .map(|h| h.name().to_string())
            .unwrap_or_default();
        game.record(format!("{} fell mid-turn: the turn passes", name));
        advance_turn(game);
    }
}
