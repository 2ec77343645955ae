//! Reinforcement learning for Flappy Bird
//!
//! Provides:
//! - A gym-style environment interface and the Flappy Bird adapter
//! - Vector and image observations
//! - Episode recording to PNG frames
//! - A DQN agent with sequential replay memory and ε-greedy exploration
//! - Weight persistence

pub mod backend;
pub mod config;
pub mod dqn;
pub mod environment;
pub mod memory;
pub mod monitor;
pub mod network;
pub mod observation;
pub mod persistence;
pub mod policy;
pub mod space;

pub use backend::{InferenceBackend, TrainingBackend, default_device};
pub use config::DqnConfig;
pub use dqn::{DqnAgent, EpisodeSummary};
pub use environment::{
    ENV_ID, Environment, EpisodeStatus, FlappyAction, FlappyEnvironment, REWARD_SCALE, RenderMode,
    Step, StepInfo,
};
pub use memory::{Experience, ObservationWindow, SequentialMemory};
pub use monitor::{Monitor, MonitorStats, RecordSchedule};
pub use network::{ConvSpec, QNetwork, QNetworkConfig};
pub use observation::{Observation, StateKind, create_observation};
pub use persistence::{ModelMetadata, load_network, restore_weights, save_weights, weights_path};
pub use policy::LinearAnnealedPolicy;
pub use space::{BoxSpace, Discrete};
