use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Malformed input at record construction. Fatal to that submission only.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("failed to write log store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The store exists but could not be opened or decoded.
    #[error("failed to read log store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("model {version} failed to predict: {reason}")]
    Inference { version: String, reason: String },

    #[error("failed to load model {version} from {path}: {reason}")]
    ModelLoad {
        version: String,
        path: PathBuf,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

impl MonitorError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        Self::Read {
            path: path.into(),
            source: source.into(),
        }
    }
}
