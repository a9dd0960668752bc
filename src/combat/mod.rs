//! Battle resolution engine
//!
//! Turns declarative effect data and player actions into an ordered,
//! replayable sequence of state mutations:
//! - Dice pools, d20 rolls, advantage netting, criticals
//! - Status effect tracking with three duration checkpoints
//! - Idempotent aura/passive recompute of derived stats
//! - The effect pipeline for attacks, abilities, and specials
//! - The death/resurrection cascade

pub mod auras;
pub mod death;
pub mod dice;
pub mod pipeline;
pub mod status;

pub use dice::{DicePool, DiceRoller, ScriptedDice, SeededDice};
pub use pipeline::{resolve_action, PlayerAction};
pub use status::{DurationUnit, StatusEntry, StatusKind, StatusSet};
