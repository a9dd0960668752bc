//! Persistent progression interface
//!
//! The engine never writes progression state itself; it reports match
//! completion events (victory, tie, surrender, disconnect forfeit) through
//! this seam, exactly once per match, never mid-battle. Deployments plug in
//! a store-backed sink; tests and the simulator use the in-memory one.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::game::GameMode;

/// A player's outcome in one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Victory,
    Defeat,
    Tie,
}

/// Sink for progression events raised at match completion
pub trait ProgressionSink: Send + Sync {
    /// Record a finished match for a user
    fn record_match_result(&self, user_id: &str, outcome: MatchOutcome, mode: GameMode);

    /// Award victory points or similar currency
    fn award_points(&self, user_id: &str, amount: i64, reason: &str);
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NullProgression;

impl ProgressionSink for NullProgression {
    fn record_match_result(&self, _user_id: &str, _outcome: MatchOutcome, _mode: GameMode) {}

    fn award_points(&self, _user_id: &str, _amount: i64, _reason: &str) {}
}

/// In-memory sink for tests and the simulator
#[derive(Debug, Default)]
pub struct InMemoryProgression {
    results: Mutex<Vec<(String, MatchOutcome, GameMode)>>,
    points: Mutex<HashMap<String, i64>>,
}

impl InMemoryProgression {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded match results, in arrival order
    pub fn results(&self) -> Vec<(String, MatchOutcome, GameMode)> {
        self.results.lock().clone()
    }

    /// Current point balance for a user
    pub fn points_of(&self, user_id: &str) -> i64 {
        self.points.lock().get(user_id).copied().unwrap_or(0)
    }
}

impl ProgressionSink for InMemoryProgression {
    fn record_match_result(&self, user_id: &str, outcome: MatchOutcome, mode: GameMode) {
        self.results
            .lock()
            .push((user_id.to_string(), outcome, mode));
    }

    fn award_points(&self, user_id: &str, amount: i64, _reason: &str) {
        *self.points.lock().entry(user_id.to_string()).or_insert(0) += amount;
    }
}
