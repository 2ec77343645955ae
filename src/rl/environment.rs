use std::fmt;
use std::str::FromStr;

use image::{RgbImage, imageops};

use super::observation::{Observation, StateKind, create_observation};
use super::space::{BoxSpace, Discrete};
use crate::error::EnvError;
use crate::game::{GameConfig, GameEngine};

/// Identifier of the Flappy Bird environment, used to name saved weights
pub const ENV_ID: &str = "FlappyB-v0";

/// Factor applied to every native reward
pub const REWARD_SCALE: f32 = 10.0;

/// Auxiliary step information. Carries nothing yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepInfo {}

/// Outcome of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Requested presentation for [`Environment::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Human,
    RgbArray,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(RenderMode::Human),
            "rgb_array" => Ok(RenderMode::RgbArray),
            other => Err(format!("unsupported render mode '{other}'")),
        }
    }
}

/// Lifecycle of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    /// No reset has happened yet
    Uninitialized,
    /// The episode is running and accepts steps
    Ready,
    /// The episode ended; only `reset` is allowed
    Terminal,
}

/// Reinforcement learning environment interface.
///
/// Training loops only talk to environments through this trait, so any
/// implementation can be swapped in without touching the agent.
pub trait Environment {
    type Observation;

    /// The discrete actions accepted by [`Environment::step`]
    fn action_space(&self) -> Discrete;

    /// Declared bounds of the observations
    fn observation_space(&self) -> &BoxSpace;

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Self::Observation;

    /// Apply `action` and advance the episode.
    ///
    /// # Panics
    ///
    /// Implementations panic when `action` is outside the action space.
    fn step(&mut self, action: usize) -> Result<Step<Self::Observation>, EnvError>;

    /// Human-viewable image of the current frame. Never changes the episode.
    fn render(&self, mode: RenderMode) -> RgbImage;
}

/// Abstract Flappy Bird actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlappyAction {
    Flap,
    Wait,
}

impl FlappyAction {
    pub const ALL: [FlappyAction; 2] = [FlappyAction::Flap, FlappyAction::Wait];

    pub fn index(&self) -> usize {
        match self {
            FlappyAction::Flap => 0,
            FlappyAction::Wait => 1,
        }
    }
}

impl TryFrom<usize> for FlappyAction {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FlappyAction::Flap),
            1 => Ok(FlappyAction::Wait),
            _ => Err(format!("invalid action {value}, expected one of 0..2")),
        }
    }
}

impl fmt::Display for FlappyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Flappy Bird environment for reinforcement learning
///
/// Wraps the game engine and provides:
/// - Vector or image observations, fixed at construction
/// - Discrete action space (0: flap, 1: wait)
/// - Rewards scaled by [`REWARD_SCALE`]
/// - A forced wait tick after every flap, so two flaps never land on
///   consecutive ticks
/// - An explicit episode state machine
pub struct FlappyEnvironment {
    engine: GameEngine,
    state_kind: StateKind,
    action_space: Discrete,
    observation_space: BoxSpace,
    status: EpisodeStatus,
}

impl FlappyEnvironment {
    /// Create an environment from a state kind name (`"vector"` or `"image"`).
    ///
    /// Unknown names fall back to `"vector"` with a warning. The returned
    /// environment has already been reset.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`GameConfig::validate`].
    pub fn new(state_kind: &str, config: GameConfig) -> Self {
        Self::with_state_kind(StateKind::parse_or_default(state_kind), config)
    }

    /// Create an environment for an already parsed state kind
    pub fn with_state_kind(state_kind: StateKind, config: GameConfig) -> Self {
        let mut env = Self {
            engine: GameEngine::new(config),
            state_kind,
            action_space: Discrete::new(FlappyAction::ALL.len()),
            observation_space: state_kind.observation_space(),
            status: EpisodeStatus::Uninitialized,
        };
        env.reset();
        env
    }

    pub fn state_kind(&self) -> StateKind {
        self.state_kind
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    /// Get reference to the underlying game (for testing/statistics)
    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Current observation without stepping
    pub fn observation(&self) -> Observation {
        create_observation(self.state_kind, &self.engine)
    }

    fn tick(&mut self, action: FlappyAction) -> f32 {
        let native = self.engine.action_set()[action.index()];
        self.engine.act(native) * REWARD_SCALE
    }
}

impl Environment for FlappyEnvironment {
    type Observation = Observation;

    fn action_space(&self) -> Discrete {
        self.action_space
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn reset(&mut self) -> Observation {
        self.engine.reset_game();
        self.status = EpisodeStatus::Ready;
        self.observation()
    }

    fn step(&mut self, action: usize) -> Result<Step<Observation>, EnvError> {
        let action = match FlappyAction::try_from(action) {
            Ok(action) => action,
            Err(e) => panic!("{e}"),
        };

        match self.status {
            EpisodeStatus::Uninitialized => return Err(EnvError::NotReset),
            EpisodeStatus::Terminal => return Err(EnvError::EpisodeOver),
            EpisodeStatus::Ready => {}
        }

        let mut reward = self.tick(action);

        // Flapping on two consecutive ticks zeroes the bird's velocity in the
        // game; follow every flap with a tick without input.
        if action == FlappyAction::Flap {
            reward += self.tick(FlappyAction::Wait);
        }

        let done = self.engine.game_over();
        if done {
            self.status = EpisodeStatus::Terminal;
        }

        Ok(Step {
            observation: self.observation(),
            reward,
            done,
            info: StepInfo::default(),
        })
    }

    /// The native frame rotated 270° and mirrored, i.e. upright with
    /// `width × height` pixels.
    fn render(&self, _mode: RenderMode) -> RgbImage {
        let frame = self.engine.screen_rgb();
        // A clockwise quarter turn is three counter-clockwise ones
        let rotated = imageops::rotate90(&frame);
        imageops::flip_horizontal(&rotated)
    }
}
