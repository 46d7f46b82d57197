use std::path::PathBuf;

use keybridge_core::replay::ReplayError as CaptureError;
use keybridge_core::{ConfigError, ImeError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("capture line {line}: {source}")]
    Capture {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("capture record {record}: {source}")]
    Ime {
        record: usize,
        #[source]
        source: ImeError,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl ReplayError {
    /// Process exit code, following the BSD `sysexits` convention.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => 64,
            Self::Capture { .. } | Self::Ime { .. } => 65,
            Self::MissingPath { .. } => 66,
            Self::Json(_) => 70,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<CaptureError> for ReplayError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::Parse { line, source } => Self::Capture { line, source },
            CaptureError::Protocol { record, source } => Self::Ime { record, source },
        }
    }
}
