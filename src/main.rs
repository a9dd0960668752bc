//! arena-sim - scripted exhibition matches from the command line

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heroarena::catalog::HeroCatalog;
use heroarena::game::{GameMode, GamePhase, HeroRef};
use heroarena::progression::InMemoryProgression;
use heroarena::service::ArenaService;
use heroarena::ArenaConfig;

/// Run simulated arena matches and print their battle logs
#[derive(Debug, Parser)]
#[command(name = "arena-sim")]
struct Args {
    /// Number of matches to simulate
    #[arg(short, long, default_value_t = 1)]
    matches: u32,

    /// Seed for the match RNG; omit for a random seed per match
    #[arg(short, long)]
    seed: Option<u64>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every battle-log line instead of just the result
    #[arg(short, long)]
    verbose: bool,

    /// Give up on a match after this many turns
    #[arg(long, default_value_t = 300)]
    turn_limit: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heroarena=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = ArenaConfig::load(args.config.as_deref())?;
    if args.seed.is_some() {
        config.default_seed = args.seed;
    }

    let progression = Arc::new(InMemoryProgression::new());
    let service = ArenaService::with_parts(
        config,
        Arc::new(HeroCatalog::builtin()),
        progression.clone(),
    );

    for round in 1..=args.matches {
        run_match(&service, round, args.verbose, args.turn_limit).await?;
    }

    println!();
    println!(
        "sim-a: {} points, sim-b: {} points",
        progression.points_of("sim-a"),
        progression.points_of("sim-b")
    );
    Ok(())
}

/// Play one random-mode match with an attack-first policy for both seats
async fn run_match(service: &ArenaService, round: u32, verbose: bool, turn_limit: u32) -> Result<()> {
    service.join_queue("sim-a", GameMode::Random).await?;
    let snapshot = service
        .join_queue("sim-b", GameMode::Random)
        .await?
        .expect("two queued players must match");
    let id = snapshot.game_id.clone();

    let mut snapshot = service.roll_initiative(&id, "sim-a").await?;
    while snapshot.phase == GamePhase::Battle {
        if snapshot.turn_count > turn_limit {
            let active = snapshot.players[snapshot.active_player].user_id.clone();
            snapshot = service.surrender(&id, &active).await?;
            break;
        }
        let seat = snapshot.active_player;
        let user = snapshot.players[seat].user_id.clone();
        let targets: Vec<HeroRef> = snapshot.players[1 - seat]
            .heroes
            .iter()
            .filter(|h| h.alive)
            .map(|h| h.hero)
            .collect();

        // Attack the first enemy the rules allow, then pass the turn
        let mut acted = false;
        for target in targets {
            if let Ok(next) = service.basic_attack(&id, &user, target).await {
                snapshot = next;
                acted = true;
                break;
            }
        }
        if snapshot.phase != GamePhase::Battle {
            break;
        }
        if !acted || snapshot.active_player == seat {
            snapshot = service.end_turn(&id, &user).await?;
        }
    }

    let final_state = service.get_state(&id).await?;
    println!("=== match {} ===", round);
    if verbose {
        for entry in &final_state.log {
            println!("  {}", entry.text);
        }
    }
    if let Some(last) = final_state.log.last() {
        println!("  {}", last.text);
    }
    Ok(())
}
