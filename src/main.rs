use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use expedition_planner::planner::PlannerSettings;
use expedition_planner::runner::{CompletionNotifier, PlannerRunner};
use expedition_planner::scenario::Scenario;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario JSON file; a random scenario is synthesized when omitted.
    #[arg(short, long)]
    scenario: Option<String>,

    /// Planner settings JSON file to use instead of the defaults.
    #[arg(long)]
    settings_file: Option<String>,

    /// Seed for the synthesized scenario and for the search itself.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Override the per-worker wall-clock budget, in seconds.
    #[arg(long)]
    time_budget: Option<f32>,

    /// Override the number of search workers (1-10).
    #[arg(long)]
    threads: Option<usize>,
}

/// Stand-in for the host's sound controller.
struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self, sound: &str) {
        info!("*ding* (would play \"{sound}\")");
    }
}

fn load_settings(cli: &Cli) -> Result<PlannerSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings_file {
        Some(filename) => {
            info!("Loading planner settings from {filename}");
            let data = std::fs::read_to_string(filename)?;
            serde_json::from_str(&data)?
        }
        None => PlannerSettings::default(),
    };
    settings.seed = settings.seed.or(Some(cli.seed));
    if let Some(time_budget) = cli.time_budget {
        settings.maximum_generation_time_seconds = time_budget;
    }
    if let Some(threads) = cli.threads {
        settings.search_threads = threads.clamp(1, 10);
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(&cli)?;
    let scenario = match &cli.scenario {
        Some(filename) => {
            info!("Loading scenario from {filename}");
            Scenario::from_file(Path::new(filename))?
        }
        None => {
            info!("Synthesizing a random scenario with seed {}", cli.seed);
            Scenario::random(cli.seed)
        }
    };

    let environment = scenario.build_environment(&settings);
    let mut runner = PlannerRunner::new();
    runner.start(settings, environment, Some(Arc::new(LogNotifier)))?;

    while runner.is_running() {
        thread::sleep(Duration::from_millis(250));
        info!("current best score: {:.2}", runner.current_best_score());
    }

    match runner.current_best_path() {
        Some(best) => {
            info!("final score: {:.2}", best.total_score);
            for (i, point) in best.per_point.iter().enumerate() {
                info!(
                    "  #{i}: ({:.0}, {:.0})  +{:.2}  ({} new relics, {} new loot)",
                    point.point.x,
                    point.point.y,
                    point.score_diff,
                    point.new_relics,
                    point.new_loot
                );
            }
        }
        None => warn!("no path found"),
    }

    for (worker, value) in runner.best_values().iter().enumerate() {
        if let Some(value) = value {
            info!(
                "worker {worker}: {} generations, last one took {:?}",
                value.generation, value.last_generation
            );
        }
    }

    Ok(())
}

fn main() {
    // Init logger with default value of info
    // This can be overriden with RUST_LOG env var
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("Error while running the planner:");
        error!("  {}", err);
        std::process::exit(1);
    }
}
