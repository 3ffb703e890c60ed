//! Error types for dataset and model loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A dataset or model blob could not be loaded.
///
/// Every variant carries the offending path so the harness can report it
/// before aborting the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is truncated: expected {expected} bytes, found {found}")]
    Truncated {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("malformed model blob {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl LoadError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoadError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Path of the resource that failed to load.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::Open { path, .. }
            | LoadError::Read { path, .. }
            | LoadError::Truncated { path, .. }
            | LoadError::Malformed { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
