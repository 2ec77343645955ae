//! Saving and restoring agent weights
//!
//! Weights are stored with Burn's record system next to a JSON metadata file:
//! - `<path>.mpk` - Network weights
//! - `<path>.meta.json` - Metadata (observation kind, network shape, hyperparameters)

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use super::config::DqnConfig;
use super::dqn::DqnAgent;
use super::network::{QNetwork, QNetworkConfig};
use super::observation::StateKind;
use crate::error::CheckpointError;

/// Metadata saved with the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Environment the agent was trained on
    pub env_id: String,

    /// Observation kind the network consumes
    pub state_kind: String,

    /// Observations stacked per input
    pub window_length: usize,

    pub num_actions: usize,

    /// Hyperparameters used during training
    pub dqn_config: DqnConfig,

    /// Total training steps completed
    pub training_steps: usize,

    /// Crate version that wrote the file
    pub version: String,
}

/// Base path of the weights for `env_id` inside `dir`
pub fn weights_path(dir: &Path, env_id: &str) -> PathBuf {
    dir.join(format!("agent_{env_id}_weights"))
}

fn metadata_path(path: &Path) -> PathBuf {
    path.with_extension("meta.json")
}

fn record_path(path: &Path) -> PathBuf {
    path.with_extension("mpk")
}

/// Whether weights have been saved at `path`
pub fn weights_exist(path: &Path) -> bool {
    record_path(path).is_file() && metadata_path(path).is_file()
}

/// Save the agent's online network, overwriting earlier weights
pub fn save_weights<B: AutodiffBackend>(
    agent: &DqnAgent<B>,
    path: &Path,
    env_id: &str,
    state_kind: StateKind,
) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    agent
        .model()
        .clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| CheckpointError::ModelSave(e.to_string()))?;

    let network_config = agent.network_config();
    let metadata = ModelMetadata {
        env_id: env_id.to_string(),
        state_kind: state_kind.as_str().to_string(),
        window_length: network_config.window_length,
        num_actions: network_config.num_actions,
        dqn_config: agent.config().clone(),
        training_steps: agent.step(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let meta_json = serde_json::to_string_pretty(&metadata)?;
    std::fs::write(metadata_path(path), meta_json)?;

    log::info!("saved weights to {}", record_path(path).display());
    Ok(())
}

/// Read the metadata saved next to the weights at `path`
pub fn load_metadata(path: &Path) -> Result<ModelMetadata, CheckpointError> {
    let meta_path = metadata_path(path);
    let meta_json =
        std::fs::read_to_string(&meta_path).map_err(|source| CheckpointError::MetadataRead {
            path: meta_path.clone(),
            source,
        })?;
    serde_json::from_str(&meta_json).map_err(|source| CheckpointError::MetadataParse {
        path: meta_path,
        source,
    })
}

/// Load a network saved at `path` for observations of `state_kind`
pub fn load_network<B: AutodiffBackend>(
    path: &Path,
    state_kind: StateKind,
    device: &B::Device,
) -> Result<(QNetwork<B>, ModelMetadata), CheckpointError> {
    if !record_path(path).is_file() {
        return Err(CheckpointError::NotFound(record_path(path)));
    }

    let metadata = load_metadata(path)?;
    if metadata.state_kind != state_kind.as_str() {
        return Err(CheckpointError::StateKindMismatch {
            expected: state_kind.as_str().to_string(),
            found: metadata.state_kind,
        });
    }

    let network_config = QNetworkConfig {
        window_length: metadata.window_length,
        ..QNetworkConfig::for_state_kind(state_kind, metadata.num_actions)
    };
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
    let network = network_config.init::<B>(device).load_record(record);

    Ok((network, metadata))
}

/// Replace the agent's weights with the ones saved at `path`
pub fn restore_weights<B: AutodiffBackend>(
    agent: &mut DqnAgent<B>,
    path: &Path,
    state_kind: StateKind,
) -> Result<ModelMetadata, CheckpointError> {
    let (network, metadata) = load_network::<B>(path, state_kind, agent.device())?;

    let expected = agent.network_config();
    if metadata.window_length != expected.window_length
        || metadata.num_actions != expected.num_actions
    {
        return Err(CheckpointError::ModelLoad(format!(
            "saved network takes {} frames and outputs {} actions, agent expects {} and {}",
            metadata.window_length,
            metadata.num_actions,
            expected.window_length,
            expected.num_actions
        )));
    }

    agent.load_model(network);
    log::info!(
        "restored weights from {} ({} training steps)",
        record_path(path).display(),
        metadata.training_steps
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::observation::Observation;
    use crate::rl::{TrainingBackend, default_device};
    use tempfile::TempDir;

    fn agent(kind: StateKind) -> DqnAgent<TrainingBackend> {
        let config = DqnConfig {
            seed: Some(1),
            ..Default::default()
        };
        DqnAgent::new(
            QNetworkConfig::for_state_kind(kind, 2),
            config,
            default_device(),
        )
        .unwrap()
    }

    #[test]
    fn test_weights_path() {
        let path = weights_path(Path::new("."), "FlappyB-v0");
        assert_eq!(path, Path::new("./agent_FlappyB-v0_weights"));
        assert_eq!(
            metadata_path(&path),
            Path::new("./agent_FlappyB-v0_weights.meta.json")
        );
        assert_eq!(record_path(&path), Path::new("./agent_FlappyB-v0_weights.mpk"));
    }

    #[test]
    fn test_save_and_restore() {
        let dir = TempDir::new().unwrap();
        let path = weights_path(dir.path(), "FlappyB-v0");

        let saved = agent(StateKind::Vector);
        save_weights(&saved, &path, "FlappyB-v0", StateKind::Vector).unwrap();
        assert!(weights_exist(&path));

        let mut restored = agent(StateKind::Vector);
        let metadata = restore_weights(&mut restored, &path, StateKind::Vector).unwrap();
        assert_eq!(metadata.env_id, "FlappyB-v0");
        assert_eq!(metadata.state_kind, "vector");
        assert_eq!(metadata.window_length, 1);

        let window = vec![Observation::Vector([1.0, -2.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0])];
        let expected = saved.q_values(&window);
        let actual = restored.q_values(&window);
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = weights_path(dir.path(), "FlappyB-v0");

        save_weights(&agent(StateKind::Vector), &path, "FlappyB-v0", StateKind::Vector).unwrap();
        save_weights(&agent(StateKind::Vector), &path, "FlappyB-v0", StateKind::Vector).unwrap();
        assert!(weights_exist(&path));
    }

    #[test]
    fn test_missing_weights() {
        let dir = TempDir::new().unwrap();
        let path = weights_path(dir.path(), "FlappyB-v0");

        assert!(!weights_exist(&path));
        let result = load_network::<TrainingBackend>(&path, StateKind::Vector, &default_device());
        assert!(matches!(result, Err(CheckpointError::NotFound(_))));
    }

    #[test]
    fn test_state_kind_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = weights_path(dir.path(), "FlappyB-v0");
        save_weights(&agent(StateKind::Vector), &path, "FlappyB-v0", StateKind::Vector).unwrap();

        let mut image_agent = agent(StateKind::Image);
        let result = restore_weights(&mut image_agent, &path, StateKind::Image);
        assert!(matches!(
            result,
            Err(CheckpointError::StateKindMismatch { .. })
        ));
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = ModelMetadata {
            env_id: "FlappyB-v0".into(),
            state_kind: "image".into(),
            window_length: 3,
            num_actions: 2,
            dqn_config: DqnConfig::default(),
            training_steps: 25_000,
            version: "0.1.0".into(),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let deserialized: ModelMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, metadata);
    }
}
