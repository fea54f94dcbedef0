//! One-shot synchronization values shared between the storage and transaction layers.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use crate::StoreError;

/// Release signal of a lock.
///
/// Fires at most once and never carries failure; any number of waiters may await it, including
/// waiters that arrive after it fired.
#[derive(Debug, Clone)]
pub struct LockSignal {
    inner: Arc<watch::Sender<bool>>,
}

impl Default for LockSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl LockSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { inner: Arc::new(tx) }
    }

    /// Release the lock. Firing again is a no-op.
    pub fn fire(&self) {
        self.inner.send_replace(true);
    }

    pub fn is_fired(&self) -> bool {
        *self.inner.borrow()
    }

    /// Resolve once the signal has fired.
    pub async fn fired(&self) {
        let mut rx = self.inner.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Completion of a live resource (stream or iterator) handed to a caller.
///
/// Resolves when the resource finishes, successfully or not.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), StoreError>>,
}

/// The producing half of a [`Completion`].
#[derive(Debug)]
pub struct Completer {
    tx: Option<oneshot::Sender<Result<(), StoreError>>>,
}

/// Create a linked completer/completion pair.
pub fn completion() -> (Completer, Completion) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx: Some(tx) }, Completion { rx })
}

impl Completer {
    /// Record the outcome; only the first call has any effect.
    pub fn complete(&mut self, result: Result<(), StoreError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.tx.is_none()
    }
}

impl Completion {
    /// A completion that has already succeeded.
    pub fn done() -> Self {
        let (mut completer, completion) = completion();
        completer.complete(Ok(()));
        completion
    }

    /// Wait for the outcome. A completer dropped without reporting counts as success.
    pub async fn wait(self) -> Result<(), StoreError> {
        self.rx.await.unwrap_or(Ok(()))
    }
}
