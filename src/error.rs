//! Engine error taxonomy
//!
//! Every public operation returns these as data; nothing in the engine is
//! allowed to abort the process. The transport layer decides presentation.

use thiserror::Error;

use crate::game::GamePhase;

/// Errors surfaced by battle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Action attempted outside its legal phase
    #[error("action not allowed in {actual} phase (expected {expected})")]
    InvalidPhase { expected: GamePhase, actual: GamePhase },

    /// Action attempted by the player who does not hold the turn
    #[error("not your turn")]
    NotYourTurn,

    /// Target is dead, untargetable, taunt-violating, or does not exist
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The turn's allotment for this action is spent
    #[error("{0} already used this turn")]
    ActionAlreadyUsed(&'static str),

    /// A status effect forbids the action (silence, stun)
    #[error("action blocked: {0}")]
    ActionBlocked(&'static str),

    /// Game, player, or hero lookup failed
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed team size, unknown ability index, bad content
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Shorthand for results carried through the engine
pub type GameResult<T> = Result<T, GameError>;
