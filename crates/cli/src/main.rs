//! goalsync CLI - learning goal tracking from activity signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use goalsync_core::{
    CourseRef, GoalDraft, GoalId, GoalKind, GoalStatus, GoalWithProgress, OwnerId, Priority,
    TimeUnit,
};
use goalsync_progress::{ActivitySnapshot, AppConfig, GoalEngine, StaticActivity};
use goalsync_storage::open_store;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "goalsync")]
#[command(about = "Track learning goals against study activity", long_about = None)]
struct Cli {
    /// Owner whose goals to manage
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    /// Directory for the local store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Database URL (falls back to the local store when unreachable)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// JSON file with current activity readings
    #[arg(long, global = true)]
    activity: Option<PathBuf>,

    /// JSON config file (default: <data-dir>/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    StudyTime,
    Course,
    Streak,
    Grade,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Hours,
    Minutes,
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a goal
    Add {
        /// Goal title
        title: String,
        /// What the goal tracks
        #[arg(long = "type", value_enum)]
        kind: KindArg,
        /// Target value
        #[arg(long)]
        target: f64,
        /// Unit for study time goals
        #[arg(long, value_enum, default_value = "hours")]
        unit: UnitArg,
        /// Scope a course or grade goal to one course
        #[arg(long)]
        course: Option<String>,
        /// Title of the scoped course
        #[arg(long)]
        course_title: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Priority
        #[arg(long, value_enum, default_value = "medium")]
        priority: PriorityArg,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Do not announce completion
        #[arg(long)]
        no_notify: bool,
    },
    /// List goals
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Pause a goal
    Pause { id: String },
    /// Resume a paused or expired goal
    Resume { id: String },
    /// Mark a goal expired
    Expire { id: String },
    /// Delete a goal and its history
    Delete { id: String },
    /// Show goal statistics
    Stats,
    /// Show day-by-day progress history
    History {
        /// Days before today to include
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Derive and persist progress once
    Sync,
    /// Run the engine, printing completions
    Watch {
        /// Stop after this many seconds (runs until Ctrl-C if unset)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).await?,
        None => {
            let dir = cli
                .data_dir
                .clone()
                .unwrap_or_else(|| AppConfig::default().store.data_dir);
            AppConfig::load(dir.join("config.json")).await?
        }
    };
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = dir.clone();
    }
    if cli.database_url.is_some() {
        config.store.database_url = cli.database_url.clone();
    }

    let store = open_store(&config.store).await?;
    let activity = Arc::new(load_activity(cli.activity.as_deref()).await?);
    let engine = Arc::new(GoalEngine::new(
        OwnerId::new(cli.owner.clone()),
        store,
        activity.clone(),
        config.engine.clone(),
    ));
    engine.fetch_goals().await?;

    match cli.command {
        Commands::Add {
            title,
            kind,
            target,
            unit,
            course,
            course_title,
            description,
            priority,
            end,
            no_notify,
        } => {
            let course = course.map(|id| CourseRef {
                course_id: id,
                course_title,
            });
            let kind = match kind {
                KindArg::StudyTime => GoalKind::StudyTime {
                    unit: match unit {
                        UnitArg::Hours => TimeUnit::Hours,
                        UnitArg::Minutes => TimeUnit::Minutes,
                    },
                },
                KindArg::Course => GoalKind::CourseCompletion { course },
                KindArg::Streak => GoalKind::Streak,
                KindArg::Grade => GoalKind::Grade { course },
            };

            let mut draft = GoalDraft::new(title, kind, target);
            draft.description = description;
            draft.priority = match priority {
                PriorityArg::Low => Priority::Low,
                PriorityArg::Medium => Priority::Medium,
                PriorityArg::High => Priority::High,
            };
            draft.end_date = end
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(|dt| Utc.from_utc_datetime(&dt));
            draft.notifications_enabled = !no_notify;

            let view = engine.create_goal(draft).await?;
            println!(
                "Added goal: {} - {} (baseline {} {})",
                view.goal.id,
                view.goal.title,
                view.goal.metadata.baseline_value(),
                view.goal.unit(),
            );
        }
        Commands::List { json } => {
            let goals = engine.sync_all_goals_progress().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&goals)?);
            } else {
                println!("Goals ({})", goals.len());
                for view in &goals {
                    print_goal(view);
                }
            }
        }
        Commands::Pause { id } => set_status(&engine, &id, GoalStatus::Paused).await?,
        Commands::Resume { id } => set_status(&engine, &id, GoalStatus::Active).await?,
        Commands::Expire { id } => set_status(&engine, &id, GoalStatus::Expired).await?,
        Commands::Delete { id } => {
            let id = parse_id(&id)?;
            engine.delete_goal(id).await?;
            println!("Deleted goal {}", id);
        }
        Commands::Stats => {
            engine.sync_all_goals_progress().await;
            let stats = engine.stats().await;
            println!("goalsync Status");
            println!("  Total: {}", stats.total);
            println!("  Active: {}", stats.active);
            println!("  Completed: {}", stats.completed);
            println!("  Completion rate: {}%", stats.completion_rate);
        }
        Commands::History { days } => {
            engine.sync_all_goals_progress().await;
            let rows = engine.aggregated_progress_history(days).await?;
            println!("{:<12} {:>6} {:>9} {:>9}", "date", "active", "completed", "progress");
            for row in rows {
                println!(
                    "{:<12} {:>6} {:>9} {:>8.0}%",
                    row.date, row.active, row.completed, row.total_progress
                );
            }
        }
        Commands::Sync => {
            let goals = engine.sync_all_goals_progress().await;
            println!("Synced {} goals", goals.len());
            for view in &goals {
                print_goal(view);
            }
        }
        Commands::Watch { seconds } => {
            watch(engine.clone(), activity, cli.activity, seconds).await?;
        }
    }

    Ok(())
}

async fn watch(
    engine: Arc<GoalEngine>,
    activity: Arc<StaticActivity>,
    activity_path: Option<PathBuf>,
    seconds: Option<u64>,
) -> Result<()> {
    let mut events = engine.subscribe();
    engine.clone().start().await;

    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
            }
        }
    };
    tokio::pin!(deadline);

    let mut reload = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(event) => println!(
                    "Goal completed: {} ({} {})",
                    event.title, event.target_value, event.unit
                ),
                Err(e) => warn!(error = %e, "completion stream interrupted"),
            },
            _ = reload.tick() => {
                if let Some(path) = &activity_path {
                    match read_snapshot(path).await {
                        Ok(snapshot) => activity.replace(snapshot),
                        Err(e) => warn!(error = %e, "failed to reload activity"),
                    }
                }
            }
        }
    }

    info!("stopping");
    // Flush whatever the last slow interval left unwritten.
    let goals = engine.sync_all_goals_progress().await;
    engine.shutdown().await;
    println!("Stopped with {} goals", goals.len());
    Ok(())
}

async fn set_status(engine: &GoalEngine, id: &str, status: GoalStatus) -> Result<()> {
    let view = engine.update_goal_status(parse_id(id)?, status).await?;
    println!("Goal {} is now {}", view.goal.id, view.goal.status);
    Ok(())
}

fn parse_id(s: &str) -> Result<GoalId> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid goal ID: {}", s))
}

async fn read_snapshot(path: &Path) -> Result<ActivitySnapshot> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

async fn load_activity(path: Option<&Path>) -> Result<StaticActivity> {
    match path {
        Some(path) => Ok(StaticActivity::from_snapshot(read_snapshot(path).await?)),
        None => Ok(StaticActivity::new()),
    }
}

fn print_goal(view: &GoalWithProgress) {
    let goal = &view.goal;
    let due = match view.days_remaining {
        Some(_) if view.is_overdue => " OVERDUE".to_string(),
        Some(days) => format!(" {}d left", days),
        None => String::new(),
    };
    println!(
        "  {} | {:<9} | {:>3}% | {} / {} {} - {}{}",
        goal.id,
        goal.status.as_str().to_uppercase(),
        view.progress_percentage,
        goal.current_value,
        goal.target_value,
        goal.unit(),
        goal.title,
        due,
    );
}
