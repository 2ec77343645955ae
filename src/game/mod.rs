//! Flappy Bird game logic
//!
//! This module contains the game simulation without any learning concerns.
//! It exposes the game the way agents consume it: a native action set, a
//! per-tick reward, a game-over flag, a named game state and a raw frame.

pub mod action;
pub mod config;
pub mod engine;
pub mod screen;
pub mod state;

// Re-export commonly used types
pub use action::{ACTION_SET, KeyCode, NativeAction};
pub use config::GameConfig;
pub use engine::GameEngine;
pub use state::{GameState, Pipe, Player};
