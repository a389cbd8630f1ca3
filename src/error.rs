use thiserror::Error;

/// Errors that end a sync run. Per-item creation failures are not errors at
/// this level; they are collected into `SyncResult::errors`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A collaborator call failed at the network or auth level.
    #[error("{context}: {cause:#}")]
    Transport {
        context: String,
        cause: anyhow::Error,
    },

    /// The extractor produced output that is not a valid candidate batch.
    #[error("extractor output rejected: {0}")]
    Validation(String),
}

impl SyncError {
    pub fn transport(context: impl Into<String>, cause: anyhow::Error) -> Self {
        SyncError::Transport {
            context: context.into(),
            cause,
        }
    }
}

/// Attach a transport context to an `anyhow::Result`, mirroring `anyhow::Context`.
pub trait TransportContext<T> {
    fn transport(self, context: &str) -> Result<T, SyncError>;
}

impl<T> TransportContext<T> for anyhow::Result<T> {
    fn transport(self, context: &str) -> Result<T, SyncError> {
        self.map_err(|e| SyncError::transport(context, e))
    }
}
