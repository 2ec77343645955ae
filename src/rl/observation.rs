use std::fmt;
use std::str::FromStr;

use burn::tensor::{Tensor, TensorData, backend::Backend};
use image::{GrayImage, RgbImage, imageops, imageops::FilterType};

use super::space::BoxSpace;
use crate::game::{GameEngine, GameState};

/// Width of image observations in pixels
pub const IMAGE_WIDTH: u32 = 64;
/// Height of image observations in pixels
pub const IMAGE_HEIGHT: u32 = 36;

/// Declared lower bounds of vector observations, in [`GameState::FIELD_NAMES`] order
pub const VECTOR_LOW: [f32; GameState::LEN] = [-10.0, -10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
/// Declared upper bounds of vector observations, in [`GameState::FIELD_NAMES`] order
pub const VECTOR_HIGH: [f32; GameState::LEN] =
    [500.0, 10.0, 400.0, 500.0, 500.0, 800.0, 500.0, 500.0];

/// How observations are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateKind {
    /// The game's named state as eight numbers
    #[default]
    Vector,
    /// A downscaled grayscale screenshot
    Image,
}

impl StateKind {
    /// Parse a selector, falling back to [`StateKind::Vector`] with a warning
    /// when the name is not recognised.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::warn!(
                "unrecognised state kind '{name}', using the default '{}' state",
                StateKind::Vector
            );
            StateKind::Vector
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Vector => "vector",
            StateKind::Image => "image",
        }
    }

    /// Shape of a single observation as fed to a network: `[rows, cols]`
    pub fn frame_dims(&self) -> [usize; 2] {
        match self {
            StateKind::Vector => [1, GameState::LEN],
            StateKind::Image => [IMAGE_HEIGHT as usize, IMAGE_WIDTH as usize],
        }
    }

    /// Declared observation space
    pub fn observation_space(&self) -> BoxSpace {
        match self {
            StateKind::Vector => BoxSpace::from_bounds(VECTOR_LOW.to_vec(), VECTOR_HIGH.to_vec()),
            StateKind::Image => BoxSpace::uniform(
                0.0,
                255.0,
                vec![IMAGE_HEIGHT as usize, IMAGE_WIDTH as usize],
            ),
        }
    }
}

impl FromStr for StateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector" => Ok(StateKind::Vector),
            "image" => Ok(StateKind::Image),
            other => Err(format!("unknown state kind '{other}'")),
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation of the game
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Vector([f32; GameState::LEN]),
    Image(GrayImage),
}

impl Observation {
    /// All-zero observation used to pad windows at the start of an episode
    pub fn zeros(kind: StateKind) -> Self {
        match kind {
            StateKind::Vector => Observation::Vector([0.0; GameState::LEN]),
            StateKind::Image => Observation::Image(GrayImage::new(IMAGE_WIDTH, IMAGE_HEIGHT)),
        }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            Observation::Vector(_) => StateKind::Vector,
            Observation::Image(_) => StateKind::Image,
        }
    }

    /// Row-major values as floats
    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Observation::Vector(values) => values.to_vec(),
            Observation::Image(image) => image.as_raw().iter().map(|&p| p as f32).collect(),
        }
    }

    pub fn as_vector(&self) -> Option<&[f32; GameState::LEN]> {
        match self {
            Observation::Vector(values) => Some(values),
            Observation::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&GrayImage> {
        match self {
            Observation::Image(image) => Some(image),
            Observation::Vector(_) => None,
        }
    }
}

/// Derive an observation of the given kind from the live game
pub fn create_observation(kind: StateKind, engine: &GameEngine) -> Observation {
    match kind {
        StateKind::Vector => Observation::Vector(engine.game_state().values()),
        StateKind::Image => Observation::Image(downscale_frame(&engine.screen_rgb())),
    }
}

/// Resize a native frame with a cubic filter and convert it to grayscale
pub fn downscale_frame(frame: &RgbImage) -> GrayImage {
    let resized = imageops::resize(frame, IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::CatmullRom);
    imageops::grayscale(&resized)
}

/// Stack a window of observations into a `[window, rows, cols]` tensor
pub fn encode_window<B: Backend>(window: &[Observation], device: &B::Device) -> Tensor<B, 3> {
    let kind = window
        .first()
        .map(Observation::kind)
        .unwrap_or_default();
    let [rows, cols] = kind.frame_dims();
    let data: Vec<f32> = window.iter().flat_map(Observation::to_vec).collect();

    let tensor_data = TensorData::new(data, [window.len(), rows, cols]);
    Tensor::<B, 3>::from_data(tensor_data, device)
}

/// Stack a batch of equally sized windows into a `[batch, window, rows, cols]` tensor
///
/// # Panics
///
/// Panics if `windows` is empty.
pub fn encode_batch<B: Backend>(windows: &[Vec<Observation>], device: &B::Device) -> Tensor<B, 4> {
    assert!(!windows.is_empty(), "cannot encode an empty batch");
    let window_length = windows[0].len();
    let kind = windows[0]
        .first()
        .map(Observation::kind)
        .unwrap_or_default();
    let [rows, cols] = kind.frame_dims();

    let data: Vec<f32> = windows
        .iter()
        .flat_map(|window| window.iter().flat_map(Observation::to_vec))
        .collect();

    let tensor_data = TensorData::new(data, [windows.len(), window_length, rows, cols]);
    Tensor::<B, 4>::from_data(tensor_data, device)
}
