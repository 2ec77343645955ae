//! Flappy Bird for reinforcement learning
//!
//! This library provides:
//! - The Flappy Bird game (game module)
//! - A gym-style environment over the game with vector or image observations,
//!   episode recording and a DQN agent (rl module)
//! - Training statistics (metrics module)
//! - The training driver (modes module)

pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod metrics;
pub mod modes;
pub mod rl;
