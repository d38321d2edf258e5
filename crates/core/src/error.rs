use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeaverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid evidence path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),
}

/// Result alias for fallible edges around the deterministic core.
pub type Result<T> = std::result::Result<T, BeaverError>;
