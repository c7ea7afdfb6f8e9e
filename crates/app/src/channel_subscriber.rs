//! In-process [`Subscriber`] backed by a Tokio channel.
//!
//! Useful for embedding the engine without a network transport, and as the
//! subscriber used by tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use webthing_domain::error::DeliveryError;

use crate::ports::Subscriber;

/// Forwards encoded notifications into a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    sender: mpsc::Sender<Arc<[u8]>>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the stream of messages it receives.
    ///
    /// Dropping the stream disconnects the subscriber.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    #[must_use]
    pub fn with_stream(capacity: usize) -> (Self, ReceiverStream<Arc<[u8]>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, ReceiverStream::new(receiver))
    }
}

impl Subscriber for ChannelSubscriber {
    async fn send(&self, message: Arc<[u8]>) -> Result<(), DeliveryError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| DeliveryError::Disconnected)
    }
}
