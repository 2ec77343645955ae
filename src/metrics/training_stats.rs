//! Training statistics tracking for DQN
//!
//! This module provides utilities for tracking and monitoring training progress,
//! including episode rewards, lengths and loss values.

use std::collections::VecDeque;

use crate::rl::EpisodeSummary;

/// Training statistics tracker with rolling averages
///
/// Tracks episode-level metrics (rewards, lengths) and the loss of each
/// episode's gradient steps using rolling windows for smoothed statistics.
///
/// # Example
///
/// ```rust
/// use flappy_rl::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(100);
///
/// stats.record_episode(-40.0, 25);
/// stats.record_loss(0.8);
///
/// assert_eq!(stats.total_episodes(), 1);
/// println!("{}", stats.format_summary());
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Episode rewards (rolling window)
    episode_rewards: VecDeque<f32>,

    /// Episode lengths in steps (rolling window)
    episode_lengths: VecDeque<usize>,

    /// Mean episode losses (rolling window)
    losses: VecDeque<f32>,

    /// Highest episode reward seen
    best_reward: Option<f32>,

    /// Exploration rate at the latest episode
    epsilon: f64,

    /// Total number of episodes completed
    total_episodes: usize,

    /// Total number of environment steps taken in completed episodes
    total_steps: usize,

    /// Window size for rolling averages
    window_size: usize,
}

impl TrainingStats {
    /// Create a new training statistics tracker
    ///
    /// # Arguments
    ///
    /// * `window_size` - Number of recent values to keep for rolling averages
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_rewards: VecDeque::with_capacity(window_size),
            episode_lengths: VecDeque::with_capacity(window_size),
            losses: VecDeque::with_capacity(window_size),
            best_reward: None,
            epsilon: 0.0,
            total_episodes: 0,
            total_steps: 0,
            window_size,
        }
    }

    /// Record everything an agent reports about a finished episode
    pub fn record(&mut self, summary: &EpisodeSummary) {
        self.record_episode(summary.reward, summary.steps);
        if let Some(loss) = summary.mean_loss {
            self.record_loss(loss);
        }
        self.epsilon = summary.epsilon;
    }

    /// Record the completion of an episode
    ///
    /// # Arguments
    ///
    /// * `reward` - Total reward accumulated during the episode
    /// * `length` - Number of steps taken in the episode
    pub fn record_episode(&mut self, reward: f32, length: usize) {
        Self::push_deque(&mut self.episode_rewards, reward, self.window_size);
        Self::push_deque(&mut self.episode_lengths, length, self.window_size);
        self.best_reward = Some(self.best_reward.map_or(reward, |best| best.max(reward)));
        self.total_episodes += 1;
        self.total_steps += length;
    }

    /// Record a loss value
    pub fn record_loss(&mut self, loss: f32) {
        Self::push_deque(&mut self.losses, loss, self.window_size);
    }

    /// Get the mean episode reward over the rolling window
    ///
    /// # Returns
    ///
    /// The average reward, or 0.0 if no episodes have been recorded
    pub fn mean_episode_reward(&self) -> f32 {
        self.mean(&self.episode_rewards)
    }

    /// Get the mean episode length over the rolling window
    pub fn mean_episode_length(&self) -> f32 {
        let sum: usize = self.episode_lengths.iter().sum();
        if self.episode_lengths.is_empty() {
            0.0
        } else {
            sum as f32 / self.episode_lengths.len() as f32
        }
    }

    /// Get the mean loss over the rolling window
    ///
    /// # Returns
    ///
    /// The average loss, or 0.0 if no losses have been recorded
    pub fn mean_loss(&self) -> f32 {
        self.mean(&self.losses)
    }

    /// Highest episode reward so far
    pub fn best_reward(&self) -> Option<f32> {
        self.best_reward
    }

    /// Get the total number of episodes completed
    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    /// Get the total number of environment steps taken
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Get the window size for rolling averages
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Format a summary of the current statistics
    ///
    /// ```text
    /// Episodes: 1 | Steps: 25 | Reward: -40.00 | Best: -40.00 | Len: 25.0 | Loss: 0.8000 | Eps: 0.0500
    /// ```
    pub fn format_summary(&self) -> String {
        format!(
            "Episodes: {} | Steps: {} | Reward: {:.2} | Best: {:.2} | Len: {:.1} | Loss: {:.4} | Eps: {:.4}",
            self.total_episodes,
            self.total_steps,
            self.mean_episode_reward(),
            self.best_reward.unwrap_or(0.0),
            self.mean_episode_length(),
            self.mean_loss(),
            self.epsilon,
        )
    }

    /// Helper function to compute mean of a VecDeque<f32>
    fn mean(&self, deque: &VecDeque<f32>) -> f32 {
        if deque.is_empty() {
            0.0
        } else {
            deque.iter().sum::<f32>() / deque.len() as f32
        }
    }

    /// Helper function to push to a deque with size limit
    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}
