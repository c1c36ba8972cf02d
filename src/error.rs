use std::fmt::Display;
use std::io;

use thiserror::Error;
use tokio::task::JoinError;

/// Failure of a sort invocation.
#[derive(Debug, Error)]
pub enum SortError {
    /// A record is malformed or the input cannot be decoded. The input is corrupt, retrying
    /// will not help.
    #[error("format error: {reason}, record: {record:?}")]
    Format {
        record: String,
        reason: String,
    },

    /// Open, read, write or rename failed on a run file or the output file.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The cancellation signal fired while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl SortError {
    pub(crate) fn format(record: impl Into<String>, reason: impl Into<String>) -> SortError {
        SortError::Format {
            record: record.into(),
            reason: reason.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, SortError::Format { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SortError::Cancelled)
    }
}

/// A task that panicked re-raises its panic here. Any other join failure means the runtime
/// is shutting down.
pub(crate) fn join_error(e: JoinError) -> SortError {
    if e.is_panic() {
        std::panic::resume_unwind(e.into_panic());
    }
    SortError::Cancelled
}

/// Attach context to io errors, similar to `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> Result<T, SortError>
        where
            C: Display,
            F: FnOnce() -> C;
}

impl<T> IoContext<T> for Result<T, io::Error> {
    fn io_context<C, F>(self, f: F) -> Result<T, SortError>
        where
            C: Display,
            F: FnOnce() -> C,
    {
        self.map_err(|source| SortError::Io {
            context: f().to_string(),
            source,
        })
    }
}
