//! Arena configuration
//!
//! Tunables for the battle engine and match service, loaded from an optional
//! TOML file with `ARENA_`-prefixed environment overrides.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Engine and service tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Heroes per team
    pub team_size: usize,
    /// Raw d20 value at or above which a hit is critical
    pub base_crit_threshold: u32,
    /// Maximum initiative rerolls before the tie breaks to seat 0
    pub initiative_reroll_max: u32,
    /// Pending-death dequeues allowed per action, as a multiple of total heroes
    pub death_cascade_factor: usize,
    /// Seconds a disconnected player has to reconnect before forfeiting
    pub forfeit_delay_secs: u64,
    /// Seed for match RNGs; `None` draws one from entropy per game
    pub default_seed: Option<u64>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            team_size: 3,
            base_crit_threshold: 20,
            initiative_reroll_max: 10,
            death_cascade_factor: 2,
            forfeit_delay_secs: 60,
            default_seed: None,
        }
    }
}

impl ArenaConfig {
    /// Load configuration, layering defaults, an optional TOML file, and
    /// `ARENA_*` environment variables (highest precedence).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment.merge(Env::prefixed("ARENA_")).extract()?;
        Ok(config)
    }
}
