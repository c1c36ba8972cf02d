use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SortError;

/// Cooperative cancellation signal shared by every read, write, open and delete of a sort.
///
/// Clones observe the same signal. Once cancelled, a signal stays cancelled.
#[derive(Clone, Debug)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    pub fn new() -> Cancellation {
        let (sender, _) = watch::channel(false);
        Cancellation {
            sender: Arc::new(sender),
        }
    }

    /// Raise the signal. In-flight operations fail with [SortError::Cancelled].
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal is raised.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // the sender lives as long as self, wait_for only fails when it is dropped
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `operation` unless the signal fires first.
    pub(crate) async fn run<T, F>(&self, operation: F) -> Result<T, SortError>
        where
            F: Future<Output=Result<T, SortError>>,
    {
        if self.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(SortError::Cancelled),
            result = operation => result,
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Cancellation::new()
    }
}
