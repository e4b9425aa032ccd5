use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};

use healthpulse::derived::DerivedMetricCalculator;
use healthpulse::foods::{self, Cuisine, MealType, NutritionTotals};
use healthpulse::logging::{self, LogFormat, LogLevel};
use healthpulse::{AppConfig, ChannelSink, MetricUpdate, TracingSink};

/// HealthPulse - Live Health Metrics CLI
///
/// Simulates dashboard health metrics (steps, heart rate, derived calories and
/// goal progress) and provides the activity and nutrition lookup tables.
#[derive(Parser)]
#[command(name = "healthpulse")]
#[command(version)]
#[command(about = "Live health metrics simulation", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log level (error, warn, info, debug, trace); overrides -v
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log format on stderr (pretty, json, compact)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live metric simulation
    Run {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Print updates as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Estimate calories burned by an activity
    Calories {
        /// Activity type (e.g. Running, Walking, "Gym / Weights")
        #[arg(short, long)]
        activity: String,

        /// Duration in minutes
        #[arg(short, long)]
        duration: f64,
    },

    /// Progress toward a goal as a percentage
    Progress {
        #[arg(short, long)]
        current: f64,

        #[arg(short, long)]
        target: f64,
    },

    /// Browse the common foods catalog
    Foods {
        /// Name substring to search for
        #[arg(short, long)]
        query: Option<String>,

        /// Restrict to one meal (breakfast, lunch, dinner, snacks)
        #[arg(short, long)]
        meal: Option<MealType>,

        /// Restrict to one cuisine (international, indonesian)
        #[arg(long)]
        cuisine: Option<Cuisine>,

        /// Show a single entry by id (e.g. nasi_goreng)
        #[arg(long, conflicts_with_all = ["query", "meal", "cuisine"])]
        id: Option<String>,
    },

    /// Show the seeded value of every metric
    Snapshot {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the configuration file
    Config {
        /// Write the default configuration
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, mut config) = AppConfig::resolve(cli.config.as_deref())?;

    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Run { duration, json } => run(&config, duration, json).await?,

        Commands::Calories { activity, duration } => {
            let calculator = config.build_calculator()?;
            let calories = calculator.calories_from_activity(&activity, duration);
            let met = calculator.met_table().met_value(&activity);

            println!("{}", "Activity calorie estimate".blue().bold());
            println!("  Activity: {}", activity);
            println!("  Duration: {} min", duration);
            println!("  MET:      {}", met);
            println!("  Weight:   {} kg", calculator.assumed_weight_kg());
            if !calculator.met_table().values.contains_key(&activity) {
                println!("  {}", "Unknown activity, fallback MET used".yellow());
            }
            println!("{}", format!("✓ {} kcal", calories).green());
        }

        Commands::Progress { current, target } => {
            let percentage = DerivedMetricCalculator::progress_percentage(current, target);
            let line = format!("{} / {} = {}%", current, target, percentage);
            if percentage >= 100 {
                println!("{}", line.green().bold());
            } else {
                println!("{}", line);
            }
        }

        Commands::Foods {
            query,
            meal,
            cuisine,
            id,
        } => {
            let mut results: Vec<_> = match (&id, &query) {
                (Some(id), _) => foods::find_food_by_id(id).into_iter().collect(),
                (None, Some(q)) => foods::search_foods(q),
                (None, None) => foods::all_foods().iter().collect(),
            };
            if let Some(meal) = meal {
                results.retain(|food| food.meal == meal);
            }
            if let Some(cuisine) = cuisine {
                results.retain(|food| food.cuisine == cuisine);
            }

            if results.is_empty() {
                println!("{}", "No foods matched".yellow());
            } else {
                let entries: Vec<_> = results.iter().map(|food| (*food, 1.0)).collect();
                let totals = NutritionTotals::from_entries(&entries);
                let progress = totals.progress(&config.goals);
                println!("{}", Table::new(results.iter().map(|food| **food)));
                println!(
                    "{}",
                    format!(
                        "{} foods combined: {} kcal ({}% of {}), protein {}g ({}% of {}g), \
                         carbs {}g ({}% of {}g), fat {}g ({}% of {}g)",
                        results.len(),
                        totals.calories,
                        progress.calories,
                        config.goals.calories,
                        format_value(totals.protein),
                        progress.protein,
                        config.goals.protein_g,
                        format_value(totals.carbs),
                        progress.carbs,
                        config.goals.carbs_g,
                        format_value(totals.fats),
                        progress.fats,
                        config.goals.fat_g
                    )
                    .dimmed()
                );
            }
        }

        Commands::Snapshot { json } => {
            let scheduler = config.build_scheduler(Arc::new(TracingSink))?;
            let snapshot = scheduler.snapshot()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let rows = snapshot.readings.iter().map(|reading| ReadingRow {
                    metric: reading.name.clone(),
                    value: format_value(reading.value),
                    unit: reading.unit.clone(),
                    kind: if reading.derived { "derived" } else { "base" },
                });
                println!("{}", Table::new(rows));
            }
        }

        Commands::Config { init, show } => {
            if init {
                let mut fresh = AppConfig::default();
                fresh.save_to_file(&config_path)?;
                println!(
                    "{}",
                    format!("✓ Wrote default configuration to {}", config_path.display()).green()
                );
            }
            if show || !init {
                let rendered = toml::to_string_pretty(&config)
                    .context("Failed to render configuration")?;
                println!("{}", rendered);
            }
        }
    }

    Ok(())
}

/// Start every family and print updates until the deadline or Ctrl-C
async fn run(config: &AppConfig, duration: Option<u64>, json: bool) -> Result<()> {
    let (sink, mut updates) = ChannelSink::new();
    let mut scheduler = config
        .build_scheduler(Arc::new(sink))
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Metric registry is invalid")?;

    scheduler.start()?;
    if !json {
        println!(
            "{}",
            format!("Simulating {} families, Ctrl-C to stop", scheduler.families().len())
                .green()
                .bold()
        );
    }

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(update) = updates.recv() => print_update(&update, json)?,
            _ = &mut deadline => break,
            _ = &mut ctrl_c => break,
        }
    }

    scheduler.stop().await?;
    while let Ok(update) = updates.try_recv() {
        print_update(&update, json)?;
    }

    if !json {
        println!("{}", "✓ Simulation stopped".green());
    }
    Ok(())
}

fn print_update(update: &MetricUpdate, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }

    let time = update.timestamp.format("%H:%M:%S").to_string();
    let line = format!("{:<20} {:>10} {}", update.name, format_value(update.value), update.unit);
    if update.derived {
        println!("{} {}", time.dimmed(), line.dimmed());
    } else {
        println!("{} {}", time.dimmed(), line.bold());
    }
    Ok(())
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}
