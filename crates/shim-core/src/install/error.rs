//! Errors raised while acquiring the native executable.

use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{0}")]
    Download(#[from] DownloadError),

    #[error("Failed to extract archive: {0}")]
    Extract(#[from] ExtractError),

    #[error("Archive does not contain '{entry}'")]
    MissingEntry { entry: &'static str },

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl InstallError {
    /// Wrap an IO error with a description of what was being attempted.
    pub fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
