use std::ops::{Deref, DerefMut};

use tokio::sync::{mpsc, Mutex};

use crate::cancellation::Cancellation;
use crate::error::SortError;

/// Reset a buffer before it goes back into its arena.
pub(crate) trait Recycle {
    fn recycle(&mut self);
}

impl<T> Recycle for Vec<T> {
    fn recycle(&mut self) {
        self.clear();
    }
}

/// Bounded pool of reusable buffers.
///
/// Buffers change hands only through a bounded queue: [Arena::acquire] suspends while the
/// queue is empty and a [Lease] puts its buffer back when dropped. The number of buffers
/// in circulation never exceeds the number the arena was created with.
pub(crate) struct Arena<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    capacity: usize,
}

impl<T: Recycle + Send + 'static> Arena<T> {
    pub(crate) fn new<F>(capacity: usize, factory: F) -> Arena<T>
        where
            F: Fn() -> T,
    {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        for _ in 0..capacity {
            // the queue has room for every slot
            let _ = sender.try_send(factory());
        }
        Arena {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a buffer, waiting for one to be released if none is available.
    pub(crate) async fn acquire(&self, cancellation: &Cancellation) -> Result<Lease<T>, SortError> {
        let item = cancellation
            .run(async {
                let mut receiver = self.receiver.lock().await;
                // the arena keeps a sender, so the queue never closes while it is alive
                receiver.recv().await.ok_or(SortError::Cancelled)
            })
            .await?;
        Ok(
            Lease {
                item: Some(item),
                sender: self.sender.clone(),
            }
        )
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// A buffer borrowed from an [Arena]. Returns the buffer, recycled, when dropped.
pub(crate) struct Lease<T: Recycle> {
    item: Option<T>,
    sender: mpsc::Sender<T>,
}

impl<T: Recycle> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.item.as_ref().expect("lease holds its buffer until dropped")
    }
}

impl<T: Recycle> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.item.as_mut().expect("lease holds its buffer until dropped")
    }
}

impl<T: Recycle> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.recycle();
            // fails only when the arena is gone, then the buffer is simply freed
            let _ = self.sender.try_send(item);
        }
    }
}
