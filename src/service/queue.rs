//! Matchmaking queues and draft state
//!
//! Simple FIFO queues per game mode under a single-writer lock, plus the
//! ban/pick alternation state for draft-mode matches. Both live outside the
//! battle state store: the engine only sees the finished rosters.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::error::{GameError, GameResult};
use crate::game::GameMode;

/// FIFO matchmaking queues, one per mode
#[derive(Debug, Default)]
pub struct MatchQueues {
    queues: Mutex<HashMap<GameMode, VecDeque<String>>>,
}

impl MatchQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a user; when a second player is waiting, pops the pair.
    /// Joining a queue twice is a no-op.
    pub fn join(&self, user_id: &str, mode: GameMode) -> Option<(String, String)> {
        let mut queues = self.queues.lock();
        let queue = queues.entry(mode).or_default();
        if !queue.iter().any(|u| u == user_id) {
            queue.push_back(user_id.to_string());
        }
        if queue.len() >= 2 {
            let first = queue.pop_front().expect("len checked");
            let second = queue.pop_front().expect("len checked");
            Some((first, second))
        } else {
            None
        }
    }

    /// Remove a user from a queue; returns whether they were waiting
    pub fn leave(&self, user_id: &str, mode: GameMode) -> bool {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&mode) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|u| u != user_id);
        queue.len() != before
    }

    /// Number of users waiting in a mode's queue
    pub fn waiting(&self, mode: GameMode) -> usize {
        self.queues.lock().get(&mode).map(|q| q.len()).unwrap_or(0)
    }
}

/// Current stage of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStage {
    Banning,
    Picking,
    Complete,
}

/// Ban/pick alternation for one draft-mode match.
///
/// Each seat bans one hero, then picks alternate until both rosters are
/// full. Seat 0 opens both stages.
#[derive(Debug, Clone)]
pub struct DraftState {
    pool: Vec<String>,
    team_size: usize,
    bans_left: [usize; 2],
    picks: [Vec<String>; 2],
    turn: usize,
}

impl DraftState {
    /// Open a draft over the given hero pool
    pub fn new(pool: Vec<String>, team_size: usize) -> Self {
        Self {
            pool,
            team_size,
            bans_left: [1, 1],
            picks: [Vec::new(), Vec::new()],
            turn: 0,
        }
    }

    pub fn stage(&self) -> DraftStage {
        if self.bans_left.iter().any(|&b| b > 0) {
            DraftStage::Banning
        } else if self.picks.iter().any(|p| p.len() < self.team_size) {
            DraftStage::Picking
        } else {
            DraftStage::Complete
        }
    }

    /// Seat whose ban or pick is due
    pub fn current_seat(&self) -> usize {
        self.turn
    }

    /// Hero names still available
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// A seat's picked roster, in pick order
    pub fn roster(&self, seat: usize) -> &[String] {
        &self.picks[seat]
    }

    /// Ban a hero out of the pool
    pub fn ban(&mut self, seat: usize, hero: &str) -> GameResult<()> {
        if self.stage() != DraftStage::Banning {
            return Err(GameError::InvalidConfiguration(
                "draft is not in the ban stage".to_string(),
            ));
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        self.take_from_pool(hero)?;
        self.bans_left[seat] -= 1;
        self.turn = 1 - self.turn;
        Ok(())
    }

    /// Pick a hero into the seat's roster
    pub fn pick(&mut self, seat: usize, hero: &str) -> GameResult<()> {
        if self.stage() != DraftStage::Picking {
            return Err(GameError::InvalidConfiguration(
                "draft is not in the pick stage".to_string(),
            ));
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        self.take_from_pool(hero)?;
        self.picks[seat].push(hero.to_string());
        // Keep alternating while the other seat still has picks to make
        if self.picks[1 - seat].len() < self.team_size {
            self.turn = 1 - self.turn;
        }
        Ok(())
    }

    fn take_from_pool(&mut self, hero: &str) -> GameResult<()> {
        let position = self
            .pool
            .iter()
            .position(|h| h == hero)
            .ok_or_else(|| GameError::NotFound(format!("hero '{}' in draft pool", hero)))?;
        self.pool.remove(position);
        Ok(())
    }
}
