//! Serializable game-state snapshots
//!
//! Nested plain data handed to the transport layer: rosters with live HP and
//! statuses, the active-turn indicator, the winner, and the battle log for
//! spectators and reconnection replay.

use serde::{Deserialize, Serialize};

use crate::game::{Game, GameMode, GamePhase, HeroRef, LogEntry, MatchResult};

/// Point-in-time view of one hero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroSnapshot {
    pub hero: HeroRef,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub alive: bool,
    pub defense: i32,
    pub accuracy: i32,
    /// Derived attack dice notation, if the hero has a basic attack
    pub attack: Option<String>,
    pub statuses: Vec<String>,
    /// Active summons by name
    pub summons: Vec<(String, u32)>,
    pub special_used: bool,
}

/// Point-in-time view of one seat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub user_id: String,
    pub connected: bool,
    pub heroes: Vec<HeroSnapshot>,
}

/// Full serializable view of a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub mode: GameMode,
    pub phase: GamePhase,
    pub active_player: usize,
    pub turn_count: u32,
    pub winner: Option<MatchResult>,
    pub players: Vec<PlayerSnapshot>,
    pub log: Vec<LogEntry>,
}

impl GameSnapshot {
    /// Capture the game's externally visible state
    pub fn capture(game: &Game) -> Self {
        Self {
            game_id: game.id.clone(),
            mode: game.mode,
            phase: game.phase,
            active_player: game.active_player,
            turn_count: game.turn_count,
            winner: game.winner,
            players: game
                .players
                .iter()
                .map(|player| PlayerSnapshot {
                    user_id: player.user_id.clone(),
                    connected: player.connected,
                    heroes: player
                        .heroes
                        .iter()
                        .map(|hero| HeroSnapshot {
                            hero: hero.hero,
                            name: hero.name().to_string(),
                            hp: hero.hp,
                            max_hp: hero.max_hp,
                            alive: hero.is_alive(),
                            defense: hero.defense,
                            accuracy: hero.accuracy,
                            attack: hero.attack_dice.as_ref().map(|d| d.to_string()),
                            statuses: hero.statuses.describe(),
                            summons: hero
                                .statuses
                                .summons()
                                .map(|(name, count)| (name.to_string(), count))
                                .collect(),
                            special_used: hero.flags.special_used,
                        })
                        .collect(),
                })
                .collect(),
            log: game.log.entries().to_vec(),
        }
    }
}
