use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration, reading series or building a model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("bucket '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: String },
    #[error("bucket '{bucket}' has invalid connections: {reason}")]
    InvalidConnections { bucket: String, reason: String },
    #[error("column '{column}' for {role} not found in {path}")]
    MissingColumn {
        role: String,
        column: String,
        path: PathBuf,
    },
    #[error("column '{column}' row {row}: '{value}' is not a number")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    #[error("no usable rows in {path}")]
    EmptySeries { path: PathBuf },
}

/// Convenience type for `Result<T, ModelError>`.
pub type ModelResult<T> = Result<T, ModelError>;
