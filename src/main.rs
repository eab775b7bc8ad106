//! Egyptour command-line companion.
//!
//! Usage:
//!   egyptour init-trip [--days N] [--from FILE] [--replace]
//!   egyptour status
//!   egyptour start <MISSION>
//!   egyptour task <MISSION> <TASK> [--undo]
//!   egyptour photo <MISSION> <TASK> <IMAGE_BASE64_FILE>
//!   egyptour locate <LAT> <LNG>
//!   egyptour watch                 Read "lat lng" lines from stdin
//!   egyptour secrets [--mission ID]
//!   egyptour stats

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use egyptour::discovery::{DiscoveryEvent, DiscoveryService, LocationWatcher};
use egyptour::journey::{JourneyService, JourneyUpdate};
use egyptour::missions::{self, MissionStatus, ProgressOutcome, Trip};
use egyptour::rewards::rank_title;
use egyptour::secrets::SecretCatalog;
use egyptour::storage::{self, AppConfig, Database, JourneyStore};
use egyptour::vision::{RetryPolicy, VisionClient};
use egyptour::Coordinate;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type SharedStore = Arc<Mutex<Database>>;

/// Gamified travel companion for Egyptian historical sites
#[derive(Parser)]
#[command(name = "egyptour", version, about = "Missions, hidden secrets and rewards across Egypt")]
struct Cli {
    /// Path to config.toml (default: platform data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Traveller id
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the traveller's trip
    InitTrip {
        /// Number of trip days
        #[arg(long, default_value = "3")]
        days: u32,

        /// Generated itinerary (JSON) to use instead of the built-in one
        #[arg(long)]
        from: Option<PathBuf>,

        /// Replace an existing trip
        #[arg(long)]
        replace: bool,
    },

    /// Show missions, tasks and progress
    Status,

    /// Start a mission
    Start { mission: String },

    /// Mark a task completed
    Task {
        mission: String,
        task: String,

        /// Mark the task as not completed instead
        #[arg(long)]
        undo: bool,
    },

    /// Submit a photo for a photo task
    Photo {
        mission: String,
        task: String,

        /// File holding the base64-encoded JPEG
        image: PathBuf,
    },

    /// Check one position for hidden secrets
    Locate {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
    },

    /// Stream positions from stdin and report discoveries
    Watch,

    /// List hidden secrets
    Secrets {
        /// Only secrets of this mission
        #[arg(long)]
        mission: Option<String>,
    },

    /// Show XP, gold and level
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => storage::config::load_config_from(path),
        None => storage::config::load_config(),
    }
    .context("loading configuration")?;

    tracing::debug!("Starting Egyptour v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.database_path())?.with_reward_settings(config.rewards);
    let store: SharedStore = Arc::new(Mutex::new(db));
    let journey = JourneyService::new(store.clone());
    let user = cli.user.as_str();

    match cli.command {
        Commands::InitTrip {
            days,
            from,
            replace,
        } => cmd_init_trip(&journey, user, days, from, replace),
        Commands::Status => cmd_status(&journey, user),
        Commands::Start { mission } => {
            let trip = current_trip(&journey, user)?;
            let update = journey.start_mission(user, &trip.id, &mission)?;
            print_update(&update);
            Ok(())
        }
        Commands::Task {
            mission,
            task,
            undo,
        } => {
            let trip = current_trip(&journey, user)?;
            let update = journey.set_task_completion(user, &trip.id, &mission, &task, !undo)?;
            print_update(&update);
            Ok(())
        }
        Commands::Photo {
            mission,
            task,
            image,
        } => cmd_photo(&journey, &config, user, &mission, &task, image).await,
        Commands::Locate { lat, lng } => {
            let discovery = discovery_service(store, &config)?;
            cmd_locate(&discovery, user, Coordinate::new(lat, lng))
        }
        Commands::Watch => {
            let discovery = discovery_service(store, &config)?;
            cmd_watch(Arc::new(discovery), &config, user).await
        }
        Commands::Secrets { mission } => {
            let discovery = discovery_service(store, &config)?;
            cmd_secrets(&discovery, user, mission.as_deref())
        }
        Commands::Stats => cmd_stats(&journey, &config, user),
    }
}

fn discovery_service(store: SharedStore, config: &AppConfig) -> Result<DiscoveryService<SharedStore>> {
    let catalog = match &config.catalog_path {
        Some(path) => SecretCatalog::load(path)
            .with_context(|| format!("loading secret catalog {}", path.display()))?,
        None => SecretCatalog::builtin().clone(),
    };
    Ok(DiscoveryService::new(store, Arc::new(catalog)))
}

fn current_trip(journey: &JourneyService<SharedStore>, user: &str) -> Result<Trip> {
    match journey.load_trip(user)? {
        Some(trip) => Ok(trip),
        None => bail!("No trip for '{}'. Run `egyptour init-trip` first.", user),
    }
}

fn cmd_init_trip(
    journey: &JourneyService<SharedStore>,
    user: &str,
    days: u32,
    from: Option<PathBuf>,
    replace: bool,
) -> Result<()> {
    if !replace {
        if let Some(existing) = journey.load_trip(user)? {
            println!(
                "'{}' already has trip \"{}\" ({}%). Use --replace to start over.",
                user, existing.title, existing.progress_percent
            );
            return Ok(());
        }
    }

    let trip = match from {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            missions::trip_from_generated(&json).context("parsing generated itinerary")?
        }
        None => missions::default_trip(days),
    };

    let trip = journey.create_trip(user, trip)?;
    println!(
        "Created \"{}\": {} missions over {} day(s)",
        trip.title,
        trip.missions.len(),
        trip.day_count
    );
    Ok(())
}

fn cmd_status(journey: &JourneyService<SharedStore>, user: &str) -> Result<()> {
    let trip = current_trip(journey, user)?;

    println!("=== {} ===", trip.title);
    println!(
        "Progress: {}% ({}/{} missions)",
        trip.progress_percent,
        trip.completed_mission_count(),
        trip.missions.len()
    );
    match trip.current_mission() {
        Some(mission) => println!("Current:  {} [{}]", mission.title, mission.id),
        None if trip.is_finished() => println!("Every mission completed."),
        None => println!("No active mission. Start one with `egyptour start`."),
    }
    println!();

    for mission in &trip.missions {
        let marker = match mission.status {
            MissionStatus::Locked => " ",
            MissionStatus::Active => ">",
            MissionStatus::Completed => "*",
        };
        println!(
            "{} Day {} {:<24} {:<10} {}/{} tasks  [{}]",
            marker,
            mission.day_index,
            mission.title,
            mission.status,
            mission.completed_task_count(),
            mission.tasks.len(),
            mission.id
        );
        for task in &mission.tasks {
            println!(
                "    [{}] {:<5} {:<10} {}",
                if task.completed { "x" } else { " " },
                task.id,
                task.kind,
                task.label
            );
        }
    }

    Ok(())
}

async fn cmd_photo(
    journey: &JourneyService<SharedStore>,
    config: &AppConfig,
    user: &str,
    mission: &str,
    task: &str,
    image: PathBuf,
) -> Result<()> {
    let trip = current_trip(journey, user)?;
    let image_base64 = std::fs::read_to_string(&image)
        .with_context(|| format!("reading {}", image.display()))?;

    let client = VisionClient::new(&config.vision)?;
    let policy = RetryPolicy::from_settings(&config.vision);
    let submission = journey
        .submit_photo(
            &client,
            &policy,
            user,
            &trip.id,
            mission,
            task,
            image_base64.trim(),
        )
        .await?;

    match &submission.verdict {
        Some(verdict) if verdict.verified => {
            println!("Photo accepted ({:.0}%): {}", verdict.confidence * 100.0, verdict.feedback)
        }
        Some(verdict) => println!("Photo not accepted: {}", verdict.feedback),
        None => {}
    }
    print_update(&submission.update);
    Ok(())
}

fn cmd_locate(discovery: &DiscoveryService<SharedStore>, user: &str, position: Coordinate) -> Result<()> {
    let events = discovery.process_position(user, &position)?;
    if events.is_empty() {
        println!("Nothing new at {}.", position);
    }
    for event in &events {
        print_discovery(event);
    }

    if let Some((secret, distance)) = discovery.nearest_undiscovered(user, &position)? {
        println!("Nearest undiscovered secret: {:.0} m away", distance);
        if let Some(hint) = &secret.hint {
            println!("Hint: {}", hint);
        }
    }
    Ok(())
}

async fn cmd_watch(
    discovery: Arc<DiscoveryService<SharedStore>>,
    config: &AppConfig,
    user: &str,
) -> Result<()> {
    let (tx, rx) = mpsc::channel(config.tracking.position_buffer.max(1));
    let (handle, events) = LocationWatcher::spawn(discovery, user, rx);

    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            print_discovery(&event);
        }
    });

    let reader = tokio::task::spawn_blocking(move || {
        for line in std::io::stdin().lock().lines().map_while(|l| l.ok()) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_position(line) {
                Some(position) => {
                    if tx.blocking_send(position).is_err() {
                        break;
                    }
                }
                None => tracing::warn!("Skipping malformed position line: {}", line),
            }
        }
    });

    reader.await?;
    handle.finished().await;
    if printer.join().is_err() {
        tracing::error!("Discovery printer thread panicked");
    }
    Ok(())
}

fn parse_position(line: &str) -> Option<Coordinate> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let lat = parts.next()?.parse().ok()?;
    let lng = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Coordinate::new(lat, lng))
}

fn cmd_secrets(discovery: &DiscoveryService<SharedStore>, user: &str, mission: Option<&str>) -> Result<()> {
    let secrets: Vec<_> = match mission {
        Some(id) => discovery.catalog().secrets_for_mission(id),
        None => discovery.catalog().all().iter().collect(),
    };
    if secrets.is_empty() {
        println!("No secrets found.");
        return Ok(());
    }

    let found = discovery.store().discovered_secrets(user)?;
    println!(
        "{:<34}  {:<18}  {:>6}  {:>5}  {}",
        "SECRET", "MISSION", "RADIUS", "XP", "TITLE"
    );
    println!("{}", "-".repeat(90));
    for secret in secrets {
        let title = if found.contains(&secret.id) {
            secret.title.clone()
        } else {
            "???".to_string()
        };
        println!(
            "{:<34}  {:<18}  {:>5.0}m  {:>5}  {}",
            secret.id, secret.mission_id, secret.radius_meters, secret.xp_reward, title
        );
    }
    Ok(())
}

fn cmd_stats(journey: &JourneyService<SharedStore>, config: &AppConfig, user: &str) -> Result<()> {
    let Some(stats) = journey.stats(user)? else {
        println!("'{}' has not earned any rewards yet.", user);
        return Ok(());
    };

    println!("=== {} ===", user);
    println!("Rank:     {} (level {})", rank_title(stats.level), stats.level);
    println!(
        "XP:       {} ({} to next level)",
        stats.xp,
        stats.xp_to_next_level(config.rewards.xp_per_level)
    );
    println!("Gold:     {}", stats.gold);
    println!("Missions: {}", stats.missions_completed);
    println!("Tasks:    {}", stats.tasks_completed);
    println!("Secrets:  {}", stats.secrets_found);
    Ok(())
}

fn print_update(update: &JourneyUpdate) {
    match &update.outcome {
        ProgressOutcome::NotFound(missing) => println!("Unknown {}; nothing changed.", missing),
        ProgressOutcome::Unchanged => println!("Nothing to do."),
        ProgressOutcome::Updated(change) => {
            if let Some(id) = &change.started_mission {
                println!("Started {}.", id);
            }
            if let Some(id) = &change.completed_mission {
                println!("Mission {} completed!", id);
            }
            if let Some(id) = &change.unlocked_mission {
                println!("Unlocked {}.", id);
            }
            println!("Progress: {}% -> {}%", change.progress_before, change.progress_after);
        }
    }
    if let Some(totals) = &update.totals {
        println!("Totals: {} XP, {} gold, level {}", totals.xp, totals.gold, totals.level);
    }
}

fn print_discovery(event: &DiscoveryEvent) {
    println!("Secret discovered: {}", event.title);
    println!("  {}", event.description);
    println!(
        "  +{} XP, +{} gold (now {} XP, {} gold, level {})",
        event.xp, event.gold, event.totals.xp, event.totals.gold, event.totals.level
    );
}
