//! Integration test harness
//!
//! Drives the arena through its public service surface with fully scripted
//! dice, so scenarios assert exact rolls end to end:
//!
//! ```rust,ignore
//! let arena = TestArena::start(
//!     ["Stonehide Golem", "Vesper Thorn", "Bram Ironwall"],
//!     ["Nyx Shadowblade", "Sister Maren", "Captain Lyra"],
//!     [18, 6], // initiative
//! ).await;
//! arena.dice.push([20]);
//! arena.service.basic_attack(&arena.id, "alice", HeroRef::new(1, 0)).await?;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use heroarena::catalog::HeroCatalog;
use heroarena::combat::{DiceRoller, ScriptedDice};
use heroarena::game::snapshot::{GameSnapshot, HeroSnapshot};
use heroarena::game::HeroRef;
use heroarena::progression::InMemoryProgression;
use heroarena::service::ArenaService;
use heroarena::ArenaConfig;

/// Cloneable roller over a shared script; tests keep one handle to push
/// rolls mid-match while the service holds the other
#[derive(Clone)]
pub struct SharedDice(Arc<Mutex<ScriptedDice>>);

impl SharedDice {
    pub fn new<I: IntoIterator<Item = u32>>(rolls: I) -> Self {
        Self(Arc::new(Mutex::new(ScriptedDice::new(rolls))))
    }

    /// Append rolls to the script
    pub fn push<I: IntoIterator<Item = u32>>(&self, rolls: I) {
        self.0.lock().push(rolls);
    }
}

impl DiceRoller for SharedDice {
    fn roll(&mut self, sides: u32) -> u32 {
        self.0.lock().roll(sides)
    }
}

/// A running match driven through the public service API
pub struct TestArena {
    pub service: ArenaService,
    pub id: String,
    pub dice: SharedDice,
    pub progression: Arc<InMemoryProgression>,
}

impl TestArena {
    /// Create a match between "alice" and "bob" with fixed rosters, roll
    /// the given initiative dice, and enter the battle phase
    pub async fn start(
        team_a: [&str; 3],
        team_b: [&str; 3],
        initiative_rolls: impl IntoIterator<Item = u32>,
    ) -> Self {
        let progression = Arc::new(InMemoryProgression::new());
        let service = ArenaService::with_parts(
            ArenaConfig::default(),
            Arc::new(HeroCatalog::builtin()),
            progression.clone(),
        );
        let dice = SharedDice::new(initiative_rolls);

        let snapshot = service
            .create_match_with_roller(
                ["alice", "bob"],
                [
                    team_a.iter().map(|s| s.to_string()).collect(),
                    team_b.iter().map(|s| s.to_string()).collect(),
                ],
                Box::new(dice.clone()),
            )
            .await
            .expect("match creation");
        let id = snapshot.game_id.clone();
        service
            .roll_initiative(&id, "alice")
            .await
            .expect("initiative");

        Self {
            service,
            id,
            dice,
            progression,
        }
    }

    pub async fn state(&self) -> GameSnapshot {
        self.service.get_state(&self.id).await.expect("game exists")
    }

    pub async fn hero(&self, hero: HeroRef) -> HeroSnapshot {
        self.state().await.players[hero.player].heroes[hero.slot].clone()
    }

    /// Assert the HP-bounds invariant over every hero in the game
    pub async fn assert_hp_bounds(&self) {
        for player in self.state().await.players {
            for hero in player.heroes {
                assert!(
                    hero.hp >= 0 && hero.hp <= hero.max_hp,
                    "{} has hp {} outside [0, {}]",
                    hero.name,
                    hero.hp,
                    hero.max_hp
                );
            }
        }
    }
}
