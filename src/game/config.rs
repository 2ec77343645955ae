use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Width of the screen in pixels
    pub width: u32,
    /// Height of the screen in pixels
    pub height: u32,
    /// Vertical opening between the top and bottom half of a pipe
    pub pipe_gap: u32,
    /// Seed for pipe placement; `None` seeds from entropy
    pub seed: Option<u64>,

    // Native rewards, before any shaping done by the environment
    /// Reward granted on every tick
    pub tick_reward: f32,
    /// Reward for passing a pipe
    pub pipe_reward: f32,
    /// Reward on the tick the bird dies
    pub loss_reward: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 288,
            height: 512,
            pipe_gap: 100,
            seed: None,
            tick_reward: 0.0,
            pipe_reward: 1.0,
            loss_reward: -5.0,
        }
    }
}

impl GameConfig {
    /// Default game with a fixed pipe seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Height of the ground line measured from the top of the screen
    pub fn ground_y(&self) -> f32 {
        0.79 * self.height as f32
    }

    /// Smallest y coordinate a pipe gap may start at
    pub fn pipe_min(&self) -> u32 {
        self.pipe_gap / 4
    }

    /// Largest y coordinate a pipe gap may start at
    pub fn pipe_max(&self) -> u32 {
        (self.ground_y() * 0.6 - self.pipe_gap as f32 / 2.0) as u32
    }

    /// Check that the screen is non-empty and leaves room to place pipes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Validation(
                "game.width and game.height must be > 0".into(),
            ));
        }
        if self.pipe_gap == 0 {
            return Err(ConfigError::Validation("game.pipe_gap must be > 0".into()));
        }
        if self.pipe_min() > self.pipe_max() {
            return Err(ConfigError::Validation(format!(
                "game.pipe_gap {} leaves no room for pipes on a {}px screen",
                self.pipe_gap, self.height
            )));
        }
        Ok(())
    }
}
