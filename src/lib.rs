//! heroarena - hero arena battle resolution engine
//!
//! Turn-based tactical combat between two teams of three heroes drawn from a
//! data-driven roster. The crate houses the battle resolution engine (dice,
//! statuses, auras, the effect pipeline, death cascades, turn scheduling)
//! and the match service that fronts it: matchmaking queues, draft, forfeit
//! timers, and serializable state snapshots.

pub mod catalog;
pub mod combat;
pub mod config;
pub mod error;
pub mod game;
pub mod progression;
pub mod service;

pub use config::ArenaConfig;
pub use error::{GameError, GameResult};
pub use service::ArenaService;
