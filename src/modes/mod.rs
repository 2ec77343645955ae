pub mod train;

pub use train::{RunReport, TrainConfig, TrainMode};
