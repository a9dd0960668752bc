//! Arena match service
//!
//! The public operations surface: matchmaking, draft, setup, and the battle
//! commands, each returning a serializable snapshot. Games live in a shared
//! table keyed by id; every game gets its own lock, and one inbound command
//! is fully processed (cascades included) before the next is accepted.
//! Different games proceed concurrently with no shared mutable state.

pub mod queue;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::HeroCatalog;
use crate::combat::dice::{DiceRoller, SeededDice};
use crate::combat::pipeline::{self, PlayerAction};
use crate::config::ArenaConfig;
use crate::error::{GameError, GameResult};
use crate::game::scheduler;
use crate::game::snapshot::GameSnapshot;
use crate::game::{Game, GameMode, GamePhase, HeroRef, MatchResult};
use crate::progression::{MatchOutcome, NullProgression, ProgressionSink};
use queue::{DraftStage, DraftState, MatchQueues};

/// Points handed out at match completion
const VICTORY_POINTS: i64 = 20;
const TIE_POINTS: i64 = 8;

/// One live match and its per-game machinery
struct GameSession {
    game: Game,
    rng: Box<dyn DiceRoller>,
    draft: Option<DraftState>,
    forfeit_timer: Option<JoinHandle<()>>,
    reported: bool,
}

impl GameSession {
    fn new(game: Game, rng: Box<dyn DiceRoller>, draft: Option<DraftState>) -> Self {
        Self {
            game,
            rng,
            draft,
            forfeit_timer: None,
            reported: false,
        }
    }
}

/// The authoritative match service
pub struct ArenaService {
    config: ArenaConfig,
    catalog: Arc<HeroCatalog>,
    games: RwLock<HashMap<String, Arc<RwLock<GameSession>>>>,
    queues: MatchQueues,
    progression: Arc<dyn ProgressionSink>,
}

impl ArenaService {
    /// Service over the built-in catalog, dropping progression events
    pub fn new(config: ArenaConfig) -> Self {
        Self::with_parts(config, Arc::new(HeroCatalog::builtin()), Arc::new(NullProgression))
    }

    /// Service with an explicit catalog and progression sink
    pub fn with_parts(
        config: ArenaConfig,
        catalog: Arc<HeroCatalog>,
        progression: Arc<dyn ProgressionSink>,
    ) -> Self {
        Self {
            config,
            catalog,
            games: RwLock::new(HashMap::new()),
            queues: MatchQueues::new(),
            progression,
        }
    }

    /// Create a shared instance
    pub fn shared(config: ArenaConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn catalog(&self) -> &HeroCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Matchmaking
    // -----------------------------------------------------------------------

    /// Join a mode's queue. Returns the new game's snapshot once a pair is
    /// matched, `None` while still waiting.
    pub async fn join_queue(
        &self,
        user_id: &str,
        mode: GameMode,
    ) -> GameResult<Option<GameSnapshot>> {
        if mode == GameMode::Gauntlet {
            return Err(GameError::InvalidConfiguration(
                "gauntlet matches are created with explicit rosters".to_string(),
            ));
        }
        match self.queues.join(user_id, mode) {
            Some((first, second)) => {
                let id = self.create_match(&first, &second, mode, None).await?;
                Ok(Some(self.get_state(&id).await?))
            }
            None => Ok(None),
        }
    }

    /// Leave a mode's queue
    pub async fn leave_queue(&self, user_id: &str, mode: GameMode) -> bool {
        self.queues.leave(user_id, mode)
    }

    /// Create a gauntlet match from survival-meta rosters
    pub async fn create_gauntlet_match(
        &self,
        users: [&str; 2],
        rosters: [Vec<String>; 2],
    ) -> GameResult<GameSnapshot> {
        let id = self
            .create_match(users[0], users[1], GameMode::Gauntlet, Some(rosters))
            .await?;
        self.get_state(&id).await
    }

    /// Create a match with an explicit roller; lets harnesses script every
    /// die while going through the full public surface
    pub async fn create_match_with_roller(
        &self,
        users: [&str; 2],
        rosters: [Vec<String>; 2],
        rng: Box<dyn DiceRoller>,
    ) -> GameResult<GameSnapshot> {
        let mut game = Game::new(
            Uuid::new_v4().to_string(),
            GameMode::Gauntlet,
            users,
            self.config.team_size,
            0,
        );
        self.fill_rosters(&mut game, &rosters)?;
        game.phase = GamePhase::Setup;
        let id = game.id.clone();
        self.insert_session(GameSession::new(game, rng, None)).await;
        self.get_state(&id).await
    }

    async fn create_match(
        &self,
        first: &str,
        second: &str,
        mode: GameMode,
        rosters: Option<[Vec<String>; 2]>,
    ) -> GameResult<String> {
        let seed = self
            .config
            .default_seed
            .unwrap_or_else(|| rand::random::<u64>());
        let mut rng: Box<dyn DiceRoller> = Box::new(SeededDice::new(seed));
        let mut game = Game::new(
            Uuid::new_v4().to_string(),
            mode,
            [first, second],
            self.config.team_size,
            seed,
        );

        let draft = match mode {
            GameMode::Draft => {
                game.phase = GamePhase::Draft;
                let pool = self.catalog.heroes.iter().map(|h| h.name.clone()).collect();
                Some(DraftState::new(pool, self.config.team_size))
            }
            GameMode::Random => {
                let rosters = self.deal_random_rosters(rng.as_mut())?;
                self.fill_rosters(&mut game, &rosters)?;
                game.phase = GamePhase::Setup;
                None
            }
            GameMode::Gauntlet => {
                let rosters = rosters.ok_or_else(|| {
                    GameError::InvalidConfiguration("gauntlet match without rosters".to_string())
                })?;
                self.fill_rosters(&mut game, &rosters)?;
                game.phase = GamePhase::Setup;
                None
            }
        };

        game.record(format!("Match created: {} vs {} ({})", first, second, mode));
        info!(game_id = %game.id, %mode, seed, "match created");
        let id = game.id.clone();
        self.insert_session(GameSession::new(game, rng, draft)).await;
        Ok(id)
    }

    async fn insert_session(&self, session: GameSession) {
        let id = session.game.id.clone();
        self.games
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(session)));
    }

    /// Deal two distinct random rosters from the catalog
    fn deal_random_rosters(&self, rng: &mut dyn DiceRoller) -> GameResult<[Vec<String>; 2]> {
        let needed = self.config.team_size * 2;
        if self.catalog.len() < needed {
            return Err(GameError::InvalidConfiguration(format!(
                "catalog has {} heroes, {} needed for a random match",
                self.catalog.len(),
                needed
            )));
        }
        let mut remaining: Vec<String> = self.catalog.heroes.iter().map(|h| h.name.clone()).collect();
        let mut dealt = Vec::with_capacity(needed);
        for _ in 0..needed {
            let pick = (rng.roll(remaining.len() as u32) - 1) as usize;
            dealt.push(remaining.remove(pick));
        }
        let second = dealt.split_off(self.config.team_size);
        Ok([dealt, second])
    }

    fn fill_rosters(&self, game: &mut Game, rosters: &[Vec<String>; 2]) -> GameResult<()> {
        for (seat, roster) in rosters.iter().enumerate() {
            if roster.len() != self.config.team_size {
                return Err(GameError::InvalidConfiguration(format!(
                    "roster has {} heroes, expected {}",
                    roster.len(),
                    self.config.team_size
                )));
            }
            for name in roster {
                let template = self
                    .catalog
                    .get(name)
                    .ok_or_else(|| GameError::NotFound(format!("hero '{}'", name)))?
                    .clone();
                game.add_hero(seat, template)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Draft and setup
    // -----------------------------------------------------------------------

    /// Ban a hero from the draft pool
    pub async fn ban_hero(
        &self,
        game_id: &str,
        user_id: &str,
        hero: &str,
    ) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut guard = session.write().await;
        let session = &mut *guard;
        session.game.require_phase(GamePhase::Draft)?;
        let seat = session.game.seat_of(user_id)?;
        let draft = session
            .draft
            .as_mut()
            .ok_or_else(|| GameError::NotFound("draft state".to_string()))?;
        draft.ban(seat, hero)?;
        session.game.record(format!("{} bans {}", user_id, hero));
        Ok(GameSnapshot::capture(&session.game))
    }

    /// Pick a hero into the caller's roster; the last pick moves the game to
    /// setup
    pub async fn pick_hero(
        &self,
        game_id: &str,
        user_id: &str,
        hero: &str,
    ) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut guard = session.write().await;
        let session = &mut *guard;
        session.game.require_phase(GamePhase::Draft)?;
        let seat = session.game.seat_of(user_id)?;
        let draft = session
            .draft
            .as_mut()
            .ok_or_else(|| GameError::NotFound("draft state".to_string()))?;
        draft.pick(seat, hero)?;
        session.game.record(format!("{} picks {}", user_id, hero));

        if draft.stage() == DraftStage::Complete {
            let rosters = [draft.roster(0).to_vec(), draft.roster(1).to_vec()];
            self.fill_rosters(&mut session.game, &rosters)?;
            session.game.phase = GamePhase::Setup;
            session.draft = None;
            session.game.record("Draft complete: choose attack order");
        }
        Ok(GameSnapshot::capture(&session.game))
    }

    /// Reorder the caller's roster before battle
    pub async fn set_attack_order(
        &self,
        game_id: &str,
        user_id: &str,
        order: Vec<usize>,
    ) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        session.game.require_phase(GamePhase::Setup)?;
        let seat = session.game.seat_of(user_id)?;

        let team_size = session.game.team_size;
        let mut seen = vec![false; team_size];
        if order.len() != team_size || !order.iter().all(|&i| i < team_size && !std::mem::replace(&mut seen[i], true)) {
            return Err(GameError::InvalidConfiguration(format!(
                "attack order must be a permutation of 0..{}",
                team_size
            )));
        }

        let player = &mut session.game.players[seat];
        let mut reordered = Vec::with_capacity(team_size);
        for (new_slot, &old_slot) in order.iter().enumerate() {
            let mut hero = player.heroes[old_slot].clone();
            hero.hero = HeroRef::new(seat, new_slot);
            reordered.push(hero);
        }
        player.heroes = reordered;
        session.game.record(format!("{} sets the attack order", user_id));
        Ok(GameSnapshot::capture(&session.game))
    }

    /// Roll initiative and open the battle
    pub async fn roll_initiative(&self, game_id: &str, user_id: &str) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        session.game.require_phase(GamePhase::Setup)?;
        session.game.seat_of(user_id)?;
        session.game.phase = GamePhase::Initiative;
        let GameSession { game, rng, .. } = &mut *session;
        scheduler::begin_battle(game, rng.as_mut(), &self.config)?;
        Ok(GameSnapshot::capture(&session.game))
    }

    // -----------------------------------------------------------------------
    // Battle commands
    // -----------------------------------------------------------------------

    /// Basic attack with the acting hero
    pub async fn basic_attack(
        &self,
        game_id: &str,
        user_id: &str,
        target: HeroRef,
    ) -> GameResult<GameSnapshot> {
        self.battle_command(game_id, user_id, PlayerAction::Attack { target })
            .await
    }

    /// Use an ability of the acting hero
    pub async fn use_ability(
        &self,
        game_id: &str,
        user_id: &str,
        ability_index: usize,
        target: Option<HeroRef>,
        ally_target: Option<HeroRef>,
    ) -> GameResult<GameSnapshot> {
        self.battle_command(
            game_id,
            user_id,
            PlayerAction::Ability {
                index: ability_index,
                target,
                ally: ally_target,
            },
        )
        .await
    }

    /// Activate the acting hero's special
    pub async fn activate_special(&self, game_id: &str, user_id: &str) -> GameResult<GameSnapshot> {
        self.battle_command(game_id, user_id, PlayerAction::Special)
            .await
    }

    async fn battle_command(
        &self,
        game_id: &str,
        user_id: &str,
        action: PlayerAction,
    ) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        let seat = session.game.seat_of(user_id)?;
        let GameSession { game, rng, .. } = &mut *session;
        pipeline::resolve_action(game, rng.as_mut(), &self.config, seat, action)?;
        self.report_if_finished(&mut session);
        Ok(GameSnapshot::capture(&session.game))
    }

    /// End the caller's turn
    pub async fn end_turn(&self, game_id: &str, user_id: &str) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        let seat = session.game.seat_of(user_id)?;
        let GameSession { game, rng, .. } = &mut *session;
        scheduler::end_turn(game, rng.as_mut(), &self.config, seat)?;
        self.report_if_finished(&mut session);
        Ok(GameSnapshot::capture(&session.game))
    }

    /// Concede the match
    pub async fn surrender(&self, game_id: &str, user_id: &str) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        if session.game.phase == GamePhase::Ended {
            return Err(GameError::InvalidPhase {
                expected: GamePhase::Battle,
                actual: GamePhase::Ended,
            });
        }
        let seat = session.game.seat_of(user_id)?;
        scheduler::forfeit(&mut session.game, seat, "opponent surrendered");
        self.report_if_finished(&mut session);
        Ok(GameSnapshot::capture(&session.game))
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Mark a player disconnected and start the forfeit timer
    pub async fn handle_disconnect(&self, game_id: &str, user_id: &str) -> GameResult<()> {
        let session_arc = self.session(game_id).await?;
        let mut session = session_arc.write().await;
        let seat = session.game.seat_of(user_id)?;
        session.game.players[seat].connected = false;
        session
            .game
            .record(format!("{} disconnected", user_id));
        if session.game.phase == GamePhase::Ended {
            return Ok(());
        }

        // Replace any previous timer for this seat
        if let Some(old) = session.forfeit_timer.take() {
            old.abort();
        }
        let delay = Duration::from_secs(self.config.forfeit_delay_secs);
        let arc = session_arc.clone();
        let progression = self.progression.clone();
        let user = user_id.to_string();
        info!(game_id, user_id, delay_secs = delay.as_secs(), "forfeit timer armed");
        session.forfeit_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The connected flag is re-checked under the same lock that
            // reconnection takes, so the timer and a resume cannot interleave
            let mut session = arc.write().await;
            let Ok(seat) = session.game.seat_of(&user) else {
                return;
            };
            if session.game.players[seat].connected || session.game.phase == GamePhase::Ended {
                return;
            }
            scheduler::forfeit(&mut session.game, seat, "opponent failed to reconnect");
            report_completion(&mut session, progression.as_ref());
        }));
        Ok(())
    }

    /// Resume a disconnected player, cancelling the forfeit timer
    pub async fn handle_reconnect(&self, game_id: &str, user_id: &str) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let mut session = session.write().await;
        let seat = session.game.seat_of(user_id)?;
        session.game.players[seat].connected = true;
        if let Some(timer) = session.forfeit_timer.take() {
            timer.abort();
            debug!(game_id, user_id, "forfeit timer cancelled");
        }
        session.game.record(format!("{} reconnected", user_id));
        Ok(GameSnapshot::capture(&session.game))
    }

    /// Snapshot a game's externally visible state
    pub async fn get_state(&self, game_id: &str) -> GameResult<GameSnapshot> {
        let session = self.session(game_id).await?;
        let session = session.read().await;
        Ok(GameSnapshot::capture(&session.game))
    }

    async fn session(&self, game_id: &str) -> GameResult<Arc<RwLock<GameSession>>> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(format!("game '{}'", game_id)))
    }

    fn report_if_finished(&self, session: &mut GameSession) {
        report_completion(session, self.progression.as_ref());
    }
}

/// Report a finished match to the progression service, exactly once
fn report_completion(session: &mut GameSession, progression: &dyn ProgressionSink) {
    if session.game.phase != GamePhase::Ended || session.reported {
        return;
    }
    session.reported = true;
    let mode = session.game.mode;
    match session.game.winner {
        Some(MatchResult::Winner(seat)) => {
            let winner = session.game.players[seat].user_id.clone();
            let loser = session.game.players[1 - seat].user_id.clone();
            progression.record_match_result(&winner, MatchOutcome::Victory, mode);
            progression.record_match_result(&loser, MatchOutcome::Defeat, mode);
            progression.award_points(&winner, VICTORY_POINTS, "match victory");
        }
        Some(MatchResult::Tie) => {
            for player in &session.game.players {
                progression.record_match_result(&player.user_id, MatchOutcome::Tie, mode);
                progression.award_points(&player.user_id, TIE_POINTS, "match tie");
            }
        }
        None => {
            warn!(game_id = %session.game.id, "game ended without a recorded result");
        }
    }
}
