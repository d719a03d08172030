//! Configuration errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A `--set key=value` argument that cannot be applied
    #[error("Invalid override: {message}")]
    InvalidOverride { message: String },

    #[error("Missing required setting: {field}")]
    MissingField { field: String },

    #[error("Cannot read config YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Cannot convert config: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
