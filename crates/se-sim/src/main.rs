//! Spin & Earn session simulator
//!
//! Usage:
//!   se-sim offers                  - List ad offers and their availability
//!   se-sim watch <OFFER>           - Watch an ad offer in real time
//!   se-sim spin [--rotation DEG]   - Spin the wheel in real time
//!   se-sim simulate --trials N     - Empirical wheel prize distribution
//!   se-sim preview                 - Print the wheel segment layout

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use se_reward::{geometry, resolver};
use se_reward::{
    EngineConfig, ManualClock, MonotonicClock, PollOutcome, RewardCatalog, RewardKind,
    RewardPayload, RewardSessionEngine, RewardSetup, SessionResult, SessionTicker, UserStats,
};

#[derive(Parser)]
#[command(name = "se-sim", about = "Spin & Earn reward session simulator")]
struct Cli {
    /// Reward setup file (.json, .yaml, .yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Player level
    #[arg(long, global = true, default_value_t = 1)]
    level: u32,

    /// Spins the player has left
    #[arg(long, global = true, default_value_t = 5)]
    spins: u32,

    /// Daily streak
    #[arg(long, global = true, default_value_t = 0)]
    streak: u32,

    /// Seed for reproducible draws
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List ad offers
    Offers,
    /// Watch an ad offer
    Watch {
        /// Offer id
        offer: String,
        /// Give up after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
    /// Spin the wheel
    Spin {
        /// Current wheel rotation in degrees
        #[arg(short, long, default_value_t = 0.0)]
        rotation: f64,
    },
    /// Draw many spins and report the prize distribution
    Simulate {
        #[arg(short, long, default_value_t = 10_000)]
        trials: u32,
        /// Print engine stats as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print wheel segments
    Preview,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let setup = match &cli.config {
        Some(path) => RewardSetup::load(path)
            .with_context(|| format!("loading reward setup {}", path.display()))?,
        None => RewardSetup::default(),
    };
    setup.engine.validate()?;
    let catalog = setup.catalog().context("building reward catalog")?;
    let stats = UserStats::new(cli.level, cli.spins).with_streak(cli.streak);

    match cli.command {
        Commands::Offers => list_offers(&catalog, &stats),
        Commands::Preview => preview(&catalog),
        Commands::Watch {
            offer,
            cancel_after_ms,
        } => {
            let engine = live_engine(catalog, setup.engine, cli.seed)?;
            watch(engine, &offer, &stats, cancel_after_ms)
        }
        Commands::Spin { rotation } => {
            let engine = live_engine(catalog, setup.engine, cli.seed)?;
            spin(engine, &stats, rotation)
        }
        Commands::Simulate { trials, json } => {
            simulate(catalog, setup.engine, cli.seed.unwrap_or(0), &stats, trials, json)
        }
    }
}

fn live_engine(
    catalog: RewardCatalog,
    config: EngineConfig,
    seed: Option<u64>,
) -> Result<Arc<RewardSessionEngine>> {
    let engine = match seed {
        Some(seed) => {
            RewardSessionEngine::seeded(catalog, config, Arc::new(MonotonicClock::new()), seed)?
        }
        None => RewardSessionEngine::new(catalog, config)?,
    };
    Ok(Arc::new(engine))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

fn list_offers(catalog: &RewardCatalog, stats: &UserStats) -> Result<()> {
    println!("{:<16} {:<16} {:>6}  {:<28} STATUS", "ID", "TITLE", "SECS", "REWARD");
    for offer in catalog.offers() {
        let reward = catalog.offer_reward(offer)?;
        let status = if catalog.offer_available(offer, stats) {
            "available".to_string()
        } else {
            format!("locked ({})", reward.eligibility.describe())
        };
        println!(
            "{:<16} {:<16} {:>6}  {:<28} {}",
            offer.id,
            offer.title,
            offer.duration_ms / 1000,
            describe_payload(&reward.payload),
            status
        );
    }
    Ok(())
}

fn preview(catalog: &RewardCatalog) -> Result<()> {
    let total = catalog.segment_count();
    let weight: f64 = catalog.wheel_prizes().map(|p| p.weight).sum();
    println!("{} segments, {:.1}° each", total, 360.0 / total as f64);
    for (index, prize) in catalog.wheel_prizes().enumerate() {
        let segment = geometry::segment_for(index, total)?;
        println!(
            "  [{}] {:>6.1}° – {:>6.1}°  {:<24} weight {:>5.2} ({:>5.1}%)",
            index,
            segment.start_angle,
            segment.end_angle,
            describe_payload(&prize.payload),
            prize.weight,
            prize.weight / weight * 100.0
        );
    }
    Ok(())
}

fn watch(
    engine: Arc<RewardSessionEngine>,
    offer_id: &str,
    stats: &UserStats,
    cancel_after_ms: Option<u64>,
) -> Result<()> {
    let cadence = Duration::from_millis(engine.config().tick_interval_ms);
    let ticker = SessionTicker::spawn(Arc::clone(&engine), cadence)?;
    let session = engine.start_ad_watch(offer_id, stats)?;
    let title = engine.catalog().offer(offer_id)?.title.clone();
    let started = Instant::now();
    let mut cancelled = false;

    let outcome = loop {
        match engine.poll(session.id)? {
            PollOutcome::Progress(tick) => {
                print!(
                    "\r{} {} {}s remaining   ",
                    title,
                    progress_bar(tick.progress_fraction),
                    tick.remaining_secs()
                );
                io::stdout().flush()?;
            }
            PollOutcome::Completed(result) => break Some(result),
            PollOutcome::Cancelled => break None,
        }
        if let Some(limit) = cancel_after_ms {
            if !cancelled && started.elapsed() >= Duration::from_millis(limit) {
                log::info!("Cancel outcome: {:?}", engine.cancel(session.id)?);
                cancelled = true;
            }
        }
        thread::sleep(cadence);
    };
    ticker.stop();
    println!();

    match outcome {
        Some(result) => print_result(&result),
        None => println!("Ad closed early, no reward"),
    }
    Ok(())
}

fn spin(engine: Arc<RewardSessionEngine>, stats: &UserStats, rotation: f64) -> Result<()> {
    let cadence = Duration::from_millis(engine.config().tick_interval_ms);
    let session = engine.start_spin(stats, rotation)?;
    let Some(target) = session.target_rotation_degrees else {
        bail!("{} has no target rotation", session.id);
    };
    println!("Spinning from {:.1}° to {:.1}°", rotation, target);

    let result = loop {
        match engine.poll(session.id)? {
            PollOutcome::Progress(tick) => {
                let angle = rotation + (target - rotation) * ease_out(tick.progress_fraction);
                print!("\r{} {:>8.1}°   ", progress_bar(tick.progress_fraction), angle);
                io::stdout().flush()?;
            }
            PollOutcome::Completed(result) => break result,
            PollOutcome::Cancelled => bail!("{} was cancelled", session.id),
        }
        thread::sleep(cadence);
    };
    println!();
    print_result(&result);
    Ok(())
}

fn simulate(
    catalog: RewardCatalog,
    config: EngineConfig,
    seed: u64,
    stats: &UserStats,
    trials: u32,
    json: bool,
) -> Result<()> {
    if trials == 0 {
        bail!("--trials must be positive");
    }
    let clock = Arc::new(ManualClock::new());
    let engine = RewardSessionEngine::seeded(catalog, config, clock.clone(), seed)?;
    let duration = engine.config().spin_duration_ms;
    // Spins are free here; only eligibility rules matter
    let player = UserStats {
        spins_remaining: stats.spins_remaining.max(1),
        ..stats.clone()
    };

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut rotation = 0.0;
    for _ in 0..trials {
        let session = engine.start_spin(&player, rotation)?;
        clock.advance(duration);
        let result = loop {
            if let PollOutcome::Completed(result) = engine.poll(session.id)? {
                break result;
            }
        };
        rotation = result.rotation_degrees.unwrap_or(rotation);
        *counts.entry(result.reward.id).or_insert(0) += 1;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&engine.stats())?);
        return Ok(());
    }

    let eligible = engine
        .catalog()
        .eligible_entries(RewardKind::WheelPrize, &player);
    let total_weight = resolver::total_weight(&eligible);
    println!("{} spins (seed {})", trials, seed);
    println!("{:<16} {:>8} {:>9} {:>9}", "PRIZE", "COUNT", "OBSERVED", "EXPECTED");
    for prize in &eligible {
        let count = counts.get(&prize.id).copied().unwrap_or(0);
        println!(
            "{:<16} {:>8} {:>8.2}% {:>8.2}%",
            prize.id,
            count,
            count as f64 / trials as f64 * 100.0,
            prize.weight / total_weight * 100.0
        );
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING
// ═══════════════════════════════════════════════════════════════════════════════

fn describe_payload(payload: &RewardPayload) -> String {
    match payload {
        RewardPayload::ExtraSpins { amount } => format!("+{} spins", amount),
        RewardPayload::XpMultiplier {
            multiplier,
            duration_minutes,
            spins,
        } => format!(
            "{}x XP, next {} spins / {} min",
            multiplier, spins, duration_minutes
        ),
        RewardPayload::InstantCash { amount, xp } => format!("${:.2} + {} XP", amount, xp),
        RewardPayload::PremiumSpin { rarity } => format!("{:?} product spin", rarity),
        RewardPayload::WheelPrize { category, icon } => match icon {
            Some(icon) => format!("{} {}", icon, category),
            None => category.clone(),
        },
    }
}

fn print_result(result: &SessionResult) {
    println!(
        "{} earned: {}",
        result.session_id,
        describe_payload(&result.reward.payload)
    );
    if let (Some(rotation), Some(index)) = (result.rotation_degrees, result.segment_index) {
        println!("  wheel stopped at {:.1}° on segment {}", rotation, index);
    }
}

fn progress_bar(fraction: f64) -> String {
    const WIDTH: usize = 30;
    let filled = ((fraction.clamp(0.0, 1.0) * WIDTH as f64).round() as usize).min(WIDTH);
    format!("[{}{}] {:>3.0}%", "#".repeat(filled), "-".repeat(WIDTH - filled), fraction * 100.0)
}

/// Cubic ease-out, matching the wheel's deceleration curve
fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}
