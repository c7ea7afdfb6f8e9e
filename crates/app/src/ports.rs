//! Port definitions: traits the transport layer implements.
//!
//! The engine never opens sockets. A transport (websocket server, in-process
//! channel, test double) hands the Thing an `Arc` of something implementing
//! [`Subscriber`]; the Thing only keeps a weak reference to it.

use std::future::Future;
use std::sync::Arc;

use webthing_domain::error::DeliveryError;

/// Transport-level connection receiving encoded notifications.
pub trait Subscriber: Send + Sync + 'static {
    /// Send one encoded message (UTF-8 JSON).
    ///
    /// A failure is final: the subscriber is deregistered and never retried.
    fn send(&self, message: Arc<[u8]>) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
