//! Error taxonomy for compiler invocation.

use std::path::PathBuf;

/// Errors produced while preparing or launching a compiler invocation.
///
/// Only `ToolchainNotFound` and `InvalidConfiguration` describe the compiler
/// setup itself; a compiler that runs and exits non-zero is reported through
/// [`CompilerOutput`](crate::process::CompilerOutput), never through this type.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("'{}' not found. Is your installation corrupted?", path.display())]
    ToolchainNotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("api updater failed: {0}")]
    UpdaterFailed(String),

    #[error("failed to read lock file {}: {reason}", path.display())]
    LockFile { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvokeError {
    /// Whether retrying the same invocation could possibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvokeError::Io(_) | InvokeError::UpdaterFailed(_))
    }
}

/// Result type for invocation operations.
pub type Result<T> = std::result::Result<T, InvokeError>;
