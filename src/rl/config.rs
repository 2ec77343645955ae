//! DQN algorithm hyperparameter configuration

use serde::{Deserialize, Serialize};

/// Configuration for the DQN (Deep Q-Network) agent
///
/// Default values are the ones the Flappy Bird agent is trained with.
///
/// # Example
///
/// ```rust
/// use flappy_rl::rl::DqnConfig;
///
/// // Use default hyperparameters
/// let config = DqnConfig::default();
///
/// // Or customize specific parameters
/// let config = DqnConfig {
///     learning_rate: 5e-4,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Learning rate for the Adam optimizer
    ///
    /// Default: 1e-3
    pub learning_rate: f64,

    /// Discount factor for future rewards (gamma)
    ///
    /// Default: 0.99
    pub gamma: f32,

    /// Minibatch size for every gradient step
    ///
    /// Default: 32
    pub batch_size: usize,

    /// Maximum number of transitions kept in replay memory
    ///
    /// Default: 20000
    pub memory_limit: usize,

    /// Steps collected before the first gradient step
    ///
    /// Default: 200
    pub warmup_steps: usize,

    /// Environment steps between gradient steps
    ///
    /// Default: 1
    pub train_interval: usize,

    /// Target network update rule
    ///
    /// Values below 1 blend the online weights into the target after every
    /// gradient step with this factor. Values of 1 or more copy the online
    /// weights every `target_update` steps.
    ///
    /// Default: 0.1
    pub target_update: f64,

    /// Exploration rate at the first step
    ///
    /// Default: 0.05
    pub epsilon_max: f64,

    /// Exploration rate once annealing is over
    ///
    /// Default: 0.001
    pub epsilon_min: f64,

    /// Exploration rate during evaluation
    ///
    /// Default: 0.0
    pub epsilon_test: f64,

    /// Steps over which exploration is annealed
    ///
    /// Default: 25000
    pub epsilon_anneal_steps: usize,

    /// Seed for exploration and sampling. `None` draws from entropy.
    ///
    /// Default: None
    pub seed: Option<u64>,
}

impl DqnConfig {
    /// Create a new configuration with default hyperparameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the target network is blended rather than copied
    pub fn soft_target_update(&self) -> bool {
        self.target_update < 1.0
    }

    /// Validate configuration parameters
    ///
    /// # Returns
    ///
    /// `Ok(())` if all parameters are valid, `Err(String)` with an error message otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(format!("gamma must be in [0, 1], got {}", self.gamma));
        }

        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }

        if self.memory_limit < 2 {
            return Err(format!(
                "memory_limit must be at least 2, got {}",
                self.memory_limit
            ));
        }

        if self.train_interval == 0 {
            return Err("train_interval must be at least 1".to_string());
        }

        if self.target_update <= 0.0 {
            return Err(format!(
                "target_update must be positive, got {}",
                self.target_update
            ));
        }

        for (name, value) in [
            ("epsilon_max", self.epsilon_max),
            ("epsilon_min", self.epsilon_min),
            ("epsilon_test", self.epsilon_test),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be in [0, 1], got {value}"));
            }
        }

        if self.epsilon_min > self.epsilon_max {
            return Err(format!(
                "epsilon_min ({}) cannot exceed epsilon_max ({})",
                self.epsilon_min, self.epsilon_max
            ));
        }

        Ok(())
    }
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.99,
            batch_size: 32,
            memory_limit: 20_000,
            warmup_steps: 200,
            train_interval: 1,
            target_update: 0.1,
            epsilon_max: 0.05,
            epsilon_min: 0.001,
            epsilon_test: 0.0,
            epsilon_anneal_steps: 25_000,
            seed: None,
        }
    }
}
