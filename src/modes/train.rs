//! Training mode for the DQN agent
//!
//! Wires the Flappy Bird environment, the Q-network, replay memory and
//! exploration schedule into a [`DqnAgent`], then:
//! 1. optionally restores earlier weights,
//! 2. trains for a fixed number of steps while recording selected episodes,
//! 3. saves the weights under a name derived from the environment id,
//! 4. evaluates the agent, recording every evaluation episode.
//!
//! # Example
//!
//! ```rust,ignore
//! use flappy_rl::config::AppConfig;
//! use flappy_rl::modes::TrainMode;
//! use flappy_rl::rl::{TrainingBackend, default_device};
//!
//! let mut train_mode = TrainMode::<TrainingBackend>::new(AppConfig::default(), default_device())?;
//! let report = train_mode.run()?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::game::GameConfig;
use crate::metrics::TrainingStats;
use crate::rl::{
    DqnAgent, ENV_ID, Environment, FlappyEnvironment, Monitor, QNetworkConfig, RecordSchedule,
    StateKind, restore_weights, save_weights, weights_path,
};

/// Configuration for training mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Observation kind: `"vector"` or `"image"`
    pub env_state: String,

    /// Load saved weights before training
    pub restore: bool,

    /// Environment steps to train for
    pub nb_steps: usize,

    /// Episodes played after training
    pub test_episodes: usize,

    /// Directory holding the weights file
    pub weights_dir: PathBuf,

    /// Where recorded training episodes go
    pub training_video_dir: PathBuf,

    /// Where recorded evaluation episodes go
    pub testing_video_dir: PathBuf,

    /// Training episode ids to record
    pub recorded_training_episodes: Vec<usize>,

    /// Log training progress every N episodes
    pub log_frequency: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            env_state: StateKind::Vector.to_string(),
            restore: false,
            nb_steps: 25_000,
            test_episodes: 10,
            weights_dir: PathBuf::from("."),
            training_video_dir: PathBuf::from("./training_video"),
            testing_video_dir: PathBuf::from("./testing_video"),
            recorded_training_episodes: vec![10, 100, 1000],
            log_frequency: 10,
        }
    }
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Training episodes completed
    pub training_episodes: usize,

    /// Whether training was stopped before the step budget was spent
    pub interrupted: bool,

    /// Base path of the saved weights
    pub weights_path: PathBuf,

    /// Reward of each evaluation episode
    pub test_rewards: Vec<f32>,
}

/// Training mode for the DQN agent
pub struct TrainMode<B: AutodiffBackend> {
    /// DQN agent being trained
    agent: DqnAgent<B>,

    /// Observation kind shared by environment and network
    state_kind: StateKind,

    /// Training statistics tracker
    stats: TrainingStats,

    /// Raised to end training early
    stop: Arc<AtomicBool>,

    game_config: GameConfig,
    config: TrainConfig,
}

impl<B: AutodiffBackend> TrainMode<B> {
    /// Create a new training mode
    ///
    /// An unrecognised `env_state` is rejected before anything is trained.
    pub fn new(app_config: AppConfig, device: B::Device) -> Result<Self> {
        let AppConfig { game, dqn, train } = app_config;
        let state_kind: StateKind = train.env_state.parse().map_err(|e| {
            log::warn!("{e}, expected 'vector' or 'image'; nothing will be trained");
            anyhow!("{e}")
        })?;

        let num_actions = FlappyEnvironment::with_state_kind(state_kind, game.clone())
            .action_space()
            .n;
        let network_config = QNetworkConfig::for_state_kind(state_kind, num_actions);
        let agent = DqnAgent::new(network_config, dqn, device).context("invalid DQN configuration")?;

        Ok(Self {
            agent,
            state_kind,
            stats: TrainingStats::new(100),
            stop: Arc::new(AtomicBool::new(false)),
            game_config: game,
            config: train,
        })
    }

    /// Run restore, training, saving and evaluation in order
    pub fn run(&mut self) -> Result<RunReport> {
        self.print_header();

        let weights = weights_path(&self.config.weights_dir, ENV_ID);
        if self.config.restore {
            restore_weights(&mut self.agent, &weights, self.state_kind)
                .with_context(|| format!("failed to restore weights from {}", weights.display()))?;
        }

        let env = FlappyEnvironment::with_state_kind(self.state_kind, self.game_config.clone());
        let mut train_env = Monitor::new(
            env,
            &self.config.training_video_dir,
            RecordSchedule::Episodes(self.config.recorded_training_episodes.clone()),
        )
        .with_context(|| {
            format!(
                "failed to prepare {}",
                self.config.training_video_dir.display()
            )
        })?;

        let (training_episodes, interrupted) = self.train(&mut train_env)?;

        save_weights(&self.agent, &weights, ENV_ID, self.state_kind)
            .with_context(|| format!("failed to save weights to {}", weights.display()))?;

        let mut test_env = Monitor::new(
            train_env.into_inner(),
            &self.config.testing_video_dir,
            RecordSchedule::All,
        )
        .with_context(|| {
            format!(
                "failed to prepare {}",
                self.config.testing_video_dir.display()
            )
        })?;
        let test_rewards = self.evaluate(&mut test_env)?;

        Ok(RunReport {
            training_episodes,
            interrupted,
            weights_path: weights,
            test_rewards,
        })
    }

    /// Fit the agent until the step budget is spent or the stop flag is raised.
    fn train<E>(&mut self, env: &mut E) -> Result<(usize, bool)>
    where
        E: Environment<Observation = crate::rl::Observation>,
    {
        log::info!("Training for {} steps ...", self.config.nb_steps);

        let stats = &mut self.stats;
        let log_frequency = self.config.log_frequency.max(1);
        let stop = &*self.stop;
        let summaries = self
            .agent
            .fit(env, self.config.nb_steps, stop, |summary| {
                stats.record(summary);
                if (summary.episode + 1) % log_frequency == 0 {
                    log::info!(
                        "[Step {}] episode {}: reward {:.1}, steps {} | {}",
                        summary.total_steps,
                        summary.episode + 1,
                        summary.reward,
                        summary.steps,
                        stats.format_summary()
                    );
                }
            })
            .context("training failed")?;

        let interrupted = self.stop.load(Ordering::Relaxed);
        if interrupted {
            log::warn!(
                "Training interrupted after {} of {} steps",
                self.agent.step(),
                self.config.nb_steps
            );
        }
        log::info!(
            "Training done: {} episodes | {}",
            summaries.len(),
            self.stats.format_summary()
        );
        Ok((summaries.len(), interrupted))
    }

    /// Play the evaluation episodes
    fn evaluate<E>(&mut self, env: &mut E) -> Result<Vec<f32>>
    where
        E: Environment<Observation = crate::rl::Observation>,
    {
        log::info!("Testing for {} episodes ...", self.config.test_episodes);

        let summaries = self
            .agent
            .test(env, self.config.test_episodes, |summary| {
                log::info!(
                    "Episode {}: reward: {:.3}, steps: {}",
                    summary.episode + 1,
                    summary.reward,
                    summary.steps
                );
            })
            .context("evaluation failed")?;

        Ok(summaries.into_iter().map(|s| s.reward).collect())
    }

    pub fn agent(&self) -> &DqnAgent<B> {
        &self.agent
    }

    /// Flag that stops training at the next step once raised. Weights are
    /// still saved and evaluation still runs.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state_kind(&self) -> StateKind {
        self.state_kind
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Log training header information
    fn print_header(&self) {
        let dqn = self.agent.config();
        log::info!("{}", "=".repeat(70));
        log::info!("DQN Training - {ENV_ID}");
        log::info!("{}", "=".repeat(70));
        log::info!("Observations: {}", self.state_kind);
        log::info!("Network: {}", self.agent.network_config());
        log::info!("Steps: {}", self.config.nb_steps);
        log::info!("DQN Config:");
        log::info!("  Learning rate: {}", dqn.learning_rate);
        log::info!("  Gamma: {}", dqn.gamma);
        log::info!("  Batch size: {}", dqn.batch_size);
        log::info!("  Memory limit: {}", dqn.memory_limit);
        log::info!("  Warmup: {} steps", dqn.warmup_steps);
        log::info!("  Target update: {}", dqn.target_update);
        log::info!(
            "  Epsilon: {} -> {} over {} steps (test {})",
            dqn.epsilon_max,
            dqn.epsilon_min,
            dqn.epsilon_anneal_steps,
            dqn.epsilon_test
        );
        log::info!("Restore: {}", self.config.restore);
        log::info!("{}", "=".repeat(70));
    }
}
