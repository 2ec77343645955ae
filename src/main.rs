use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use flappy_rl::config::AppConfig;
use flappy_rl::logging::init_logging;
use flappy_rl::modes::TrainMode;
use flappy_rl::rl::{TrainingBackend, default_device};

#[derive(Parser)]
#[command(name = "flappy_rl")]
#[command(version, about = "Train a DQN agent to play Flappy Bird")]
struct Cli {
    /// Kind of state returned by the environment: "vector" or "image"
    #[arg(long, alias = "env_state")]
    env_state: Option<String>,

    /// Restore old weights? (y/n)
    #[arg(long, value_parser = parse_yes_no)]
    restore: Option<bool>,

    /// TOML configuration file
    #[arg(long, default_value = "flappy_rl.toml")]
    config: PathBuf,

    /// Training steps
    #[arg(long)]
    steps: Option<usize>,

    /// Evaluation episodes after training
    #[arg(long)]
    test_episodes: Option<usize>,

    /// Seed for the game and the agent
    #[arg(long)]
    seed: Option<u64>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_yes_no(value: &str) -> Result<bool, String> {
    match value {
        "y" | "yes" | "true" => Ok(true),
        "n" | "no" | "false" => Ok(false),
        other => Err(format!("expected y or n, got '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", AppConfig::default_toml()?);
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // Command line flags override the file
    if let Some(env_state) = cli.env_state {
        config.train.env_state = env_state;
    }
    if let Some(restore) = cli.restore {
        config.train.restore = restore;
    }
    if let Some(steps) = cli.steps {
        config.train.nb_steps = steps;
    }
    if let Some(episodes) = cli.test_episodes {
        config.train.test_episodes = episodes;
    }
    if let Some(seed) = cli.seed {
        config.game.seed = Some(seed);
        config.dqn.seed = Some(seed);
    }
    config.validate()?;

    let mut train_mode = TrainMode::<TrainingBackend>::new(config, default_device())?;

    // Ctrl+C ends training early; weights are still saved and evaluated
    let stop = train_mode.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl+C received, stopping training");
            stop.store(true, Ordering::Relaxed);
        }
    });

    let report = tokio::task::block_in_place(|| train_mode.run())?;

    let mean_reward = if report.test_rewards.is_empty() {
        0.0
    } else {
        report.test_rewards.iter().sum::<f32>() / report.test_rewards.len() as f32
    };
    log::info!(
        "Done: {} training episodes{}, weights at {}, mean test reward {:.2}",
        report.training_episodes,
        if report.interrupted { " (interrupted)" } else { "" },
        report.weights_path.display(),
        mean_reward
    );

    Ok(())
}
