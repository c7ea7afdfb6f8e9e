//! Cooperative cancellation for action handlers.
//!
//! A [`CancellationHandle`] is kept by whoever may cancel (the action
//! registry, a caller); any number of [`CancellationSignal`]s observe it.
//! Cancelling is idempotent and never pre-empts a running handler.

use std::sync::Arc;

use tokio::sync::watch;

/// Fires the cancellation of one action instance.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observes a [`CancellationHandle`].
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle and signal pair.
#[must_use]
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancellationHandle {
            sender: Arc::new(sender),
        },
        CancellationSignal { receiver },
    )
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Another signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancellationSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Never resolves if every handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
