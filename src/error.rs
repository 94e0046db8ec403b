use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Queue errors
// =============================================================================

/// Failures reported by [`BoundedBlockingQueue`](crate::BoundedBlockingQueue).
///
/// `ClosedEmpty` is not a failure in the usual sense: it is how a consumer
/// learns that every item has been delivered. Use [`QueueError::is_terminal`]
/// to tell it apart from everything else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueueError {
    #[error("queue capacity must be positive, got {capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("cannot put into a closed queue")]
    Closed,

    #[error("queue is closed and empty")]
    ClosedEmpty,

    #[error("timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("queue lock poisoned by a panicking thread")]
    Poisoned,
}

impl QueueError {
    /// True only for the closed-and-drained signal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueError::ClosedEmpty)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QueueError::Timeout { .. })
    }
}

/// A put that did not happen. The item travels back to the caller so it is
/// never dropped on the floor.
#[derive(PartialEq, Eq)]
pub struct RejectedItem<T> {
    pub item: T,
    pub reason: QueueError,
}

impl<T> RejectedItem<T> {
    pub(crate) fn new(item: T, reason: QueueError) -> Self {
        Self { item, reason }
    }

    pub fn into_inner(self) -> T {
        self.item
    }
}

// Manual impl so `T` does not need to be `Debug` for `unwrap_err()` and friends.
impl<T> fmt::Debug for RejectedItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectedItem")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for RejectedItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.reason, f)
    }
}

impl<T> std::error::Error for RejectedItem<T> {}

impl<T> From<RejectedItem<T>> for QueueError {
    fn from(rejected: RejectedItem<T>) -> Self {
        rejected.reason
    }
}

// =============================================================================
// Worker errors
// =============================================================================

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("worker '{worker}' panicked")]
    Panicked { worker: String },

    #[error("worker '{worker}' did not finish within {waited:?}")]
    JoinTimeout { worker: String, waited: Duration },

    #[error("failed to spawn worker '{worker}': {source}")]
    Spawn {
        worker: String,
        #[source]
        source: io::Error,
    },
}

impl WorkerError {
    pub fn queue_error(&self) -> Option<&QueueError> {
        match self {
            WorkerError::Queue(err) => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// Configuration errors
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {message}")]
    Parse { message: String },

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse {
            message: err.to_string(),
        }
    }
}
