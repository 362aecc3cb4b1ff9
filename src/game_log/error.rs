use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("game log not accessible at '{}': {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to reopen game log '{}' after truncation: {source}", path.display())]
    RotationRecovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read game log '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unparseable line ({reason}): {line}")]
    UnparseableLine { reason: &'static str, line: String },
    #[error("submission key is not available")]
    CredentialUnavailable,
    #[error("player {0} has not been resolved")]
    IdentityUnresolved(&'static str),
    #[error("game log worker stopped abnormally: {0}")]
    Worker(String),
}

impl MonitorError {
    pub(crate) fn unparseable(reason: &'static str, line: &str) -> Self {
        MonitorError::UnparseableLine {
            reason,
            line: line.to_string(),
        }
    }

    /// Only a failed open ends a monitoring session; everything else is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::FileAccess { .. } | MonitorError::Worker(_)
        )
    }
}
