#![deny(unsafe_code)]

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("missing configuration: {message}")]
    MissingConfiguration { message: String },

    #[error("unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("match keys did not identify a unique record: {message}")]
    AmbiguousMatch { message: String },

    #[error("column {column} not found in dataset")]
    MissingColumn { column: String },

    #[error("dataset not found: {path}")]
    DatasetNotFound { path: String },

    #[error("dictionary registry error: {message}")]
    Registry { message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Frame(#[from] polars::error::PolarsError),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing_configuration(message: impl Into<String>) -> Self {
        Self::MissingConfiguration {
            message: message.into(),
        }
    }

    pub fn ambiguous_match(message: impl Into<String>) -> Self {
        Self::AmbiguousMatch {
            message: message.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
