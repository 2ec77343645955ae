use std::path::PathBuf;

/// Errors raised by an environment when it is driven out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("step called before the first reset")]
    NotReset,

    #[error("step called after the episode ended; call reset first")]
    EpisodeOver,
}

/// Errors that can occur while saving or restoring agent weights.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no weights found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("weights were trained for {found} observations, expected {expected}")]
    StateKindMismatch { expected: String, found: String },

    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_error_display() {
        assert_eq!(
            EnvError::EpisodeOver.to_string(),
            "step called after the episode ended; call reset first"
        );
        assert_eq!(
            EnvError::NotReset.to_string(),
            "step called before the first reset"
        );
    }

    #[test]
    fn test_checkpoint_error_display() {
        let err = CheckpointError::StateKindMismatch {
            expected: "vector".into(),
            found: "image".into(),
        };
        assert_eq!(
            err.to_string(),
            "weights were trained for image observations, expected vector"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("dqn.learning_rate must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "config validation error: dqn.learning_rate must be > 0"
        );
    }
}
