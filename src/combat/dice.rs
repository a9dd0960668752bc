//! Dice rolling primitives
//!
//! Parses and rolls dice notation like "2d6+3", "1d8+1d4", "d20". A pool may
//! hold several die sizes at once; merging pools regroups all dice of the
//! same size into a single term, which is how derived basic attacks are
//! rebuilt from base, scaling, and collected dice.

use std::collections::VecDeque;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Raw d20 value at or above which a hit is critical, absent hero modifiers
pub const BASE_CRIT_THRESHOLD: u32 = 20;

/// Source of individual die rolls.
///
/// The engine never touches a RNG directly; every roll goes through this
/// trait so matches can be replayed from a seed and tests can script exact
/// outcomes.
pub trait DiceRoller: Send + Sync {
    /// Roll a single die with the given number of sides (1..=sides)
    fn roll(&mut self, sides: u32) -> u32;
}

/// Default roller: a seeded PRNG, so a match replays identically from its seed
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    /// Create a roller from an explicit seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a roller seeded from entropy
    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }
}

impl DiceRoller for SeededDice {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Test/harness roller that plays back a fixed script of rolls.
///
/// Once the script is exhausted it keeps returning `fallback`.
pub struct ScriptedDice {
    rolls: VecDeque<u32>,
    fallback: u32,
}

impl ScriptedDice {
    /// Script the given rolls, falling back to 1 afterwards
    pub fn new<I: IntoIterator<Item = u32>>(rolls: I) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            fallback: 1,
        }
    }

    /// Change the value returned after the script runs out
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append more rolls to the script
    pub fn push<I: IntoIterator<Item = u32>>(&mut self, rolls: I) {
        self.rolls.extend(rolls);
    }
}

impl DiceRoller for ScriptedDice {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rolls
            .pop_front()
            .unwrap_or(self.fallback)
            .clamp(1, sides.max(1))
    }
}

/// One group of same-sized dice in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
}

/// A parsed dice expression: one or more terms plus a flat modifier
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DicePool {
    /// Dice terms, one per die size
    pub terms: Vec<DiceTerm>,
    /// Flat modifier added to the rolled total
    pub modifier: i32,
}

impl DicePool {
    /// Create a single-term pool
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        let mut pool = Self {
            terms: Vec::new(),
            modifier,
        };
        pool.add_dice(count, sides);
        pool
    }

    /// Whether the pool contains no dice and no modifier
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.modifier == 0
    }

    /// Add dice, regrouping into an existing same-size term if present
    pub fn add_dice(&mut self, count: u32, sides: u32) {
        if count == 0 {
            return;
        }
        if let Some(term) = self.terms.iter_mut().find(|t| t.sides == sides) {
            term.count += count;
        } else {
            self.terms.push(DiceTerm { count, sides });
        }
    }

    /// Merge another pool into this one, grouping same-size dice
    pub fn merge(&mut self, other: &DicePool) {
        for term in &other.terms {
            self.add_dice(term.count, term.sides);
        }
        self.modifier += other.modifier;
    }

    /// Roll every die in the pool and return the total
    pub fn roll(&self, rng: &mut dyn DiceRoller) -> i32 {
        let mut total = self.modifier;
        for term in &self.terms {
            for _ in 0..term.count {
                total += rng.roll(term.sides) as i32;
            }
        }
        total
    }

    /// Maximum possible result; critical hits deal this instead of rolling
    pub fn max(&self) -> i32 {
        let dice: i32 = self.terms.iter().map(|t| (t.count * t.sides) as i32).sum();
        dice + self.modifier
    }

    /// Minimum possible result
    pub fn min(&self) -> i32 {
        let dice: i32 = self.terms.iter().map(|t| t.count as i32).sum();
        dice + self.modifier
    }
}

impl FromStr for DicePool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pool(s)
    }
}

impl std::fmt::Display for DicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for term in &self.terms {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{}d{}", term.count, term.sides)?;
            first = false;
        }
        if self.modifier > 0 {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{}", self.modifier)?;
        } else if self.modifier < 0 {
            write!(f, "{}", self.modifier)?;
        } else if first {
            write!(f, "0")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for DicePool {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DicePool> for String {
    fn from(pool: DicePool) -> String {
        pool.to_string()
    }
}

/// Parse a dice expression like "2d6+1d4+3" or "1d8-1"
pub fn parse_pool(notation: &str) -> Result<DicePool, String> {
    let notation = notation.trim().to_lowercase();
    if notation.is_empty() {
        return Err("Empty dice notation".to_string());
    }

    let mut pool = DicePool::default();
    for token in notation.split('+') {
        let token = token.trim();
        if token.is_empty() {
            return Err("Empty term in dice notation".to_string());
        }
        if let Some(d_pos) = token.find('d') {
            // Dice term, possibly with a trailing "-n" modifier
            let count_str = &token[..d_pos];
            let count: u32 = if count_str.is_empty() {
                1 // "d6" means "1d6"
            } else {
                count_str
                    .parse()
                    .map_err(|_| format!("Invalid dice count: {}", count_str))?
            };
            if count == 0 {
                return Err("Dice count must be at least 1".to_string());
            }

            let rest = &token[d_pos + 1..];
            let (sides_str, modifier) = match rest.rfind('-') {
                Some(0) | None => (rest, 0),
                Some(minus_pos) => {
                    let mod_str = &rest[minus_pos..]; // includes the minus sign
                    let modifier: i32 = mod_str
                        .parse()
                        .map_err(|_| format!("Invalid modifier: {}", mod_str))?;
                    (&rest[..minus_pos], modifier)
                }
            };

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| format!("Invalid die sides: {}", sides_str))?;
            if sides == 0 {
                return Err("Die sides must be at least 1".to_string());
            }

            pool.add_dice(count, sides);
            pool.modifier += modifier;
        } else {
            let modifier: i32 = token
                .parse()
                .map_err(|_| format!("Invalid modifier: {}", token))?;
            pool.modifier += modifier;
        }
    }

    Ok(pool)
}

/// Net advantage state of an attack roll.
///
/// Advantage and disadvantage sources are each counted, then netted against
/// each other: equal counts cancel to a plain roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollMode {
    /// Roll twice, keep the higher
    Advantage,
    /// Single roll
    #[default]
    Normal,
    /// Roll twice, keep the lower
    Disadvantage,
}

impl RollMode {
    /// Net counted sources into a mode
    pub fn from_counts(advantage: u32, disadvantage: u32) -> Self {
        use std::cmp::Ordering;
        match advantage.cmp(&disadvantage) {
            Ordering::Greater => RollMode::Advantage,
            Ordering::Equal => RollMode::Normal,
            Ordering::Less => RollMode::Disadvantage,
        }
    }
}

/// Roll a d20 under the given mode, returning the kept raw die
pub fn roll_d20(rng: &mut dyn DiceRoller, mode: RollMode) -> u32 {
    match mode {
        RollMode::Normal => rng.roll(20),
        RollMode::Advantage => {
            let a = rng.roll(20);
            let b = rng.roll(20);
            a.max(b)
        }
        RollMode::Disadvantage => {
            let a = rng.roll(20);
            let b = rng.roll(20);
            a.min(b)
        }
    }
}

/// Check whether a kept raw die meets a critical threshold
pub fn is_critical(roll: u32, threshold: u32) -> bool {
    roll >= threshold
}
