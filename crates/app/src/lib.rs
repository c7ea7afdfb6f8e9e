//! # webthing-app
//!
//! Runtime of the Thing protocol: state, concurrency and fan-out.
//!
//! ## Responsibilities
//! - Define the **port trait** transports implement: [`ports::Subscriber`]
//! - Own a Thing's runtime state:
//!   - `PropertyStore`: validated writes and change notifications
//!   - `ActionRegistry`: invocation, lifecycle tasks, cancellation, history
//!   - `EventRegistry`: validated firing and bounded history
//!   - `SubscriberHub`: per-subscriber queues and delivery workers
//! - Aggregate them behind [`thing::Thing`], the surface a transport drives
//!
//! ## Dependency rule
//! Depends on `webthing-domain` only (plus `tokio` for tasks and channels).
//! Never opens sockets. Transports depend on *this* crate, not the reverse.

pub mod action_registry;
pub mod cancellation;
pub mod channel_subscriber;
pub mod event_registry;
pub mod ports;
pub mod property_store;
mod protocol;
pub mod subscriber_hub;
pub mod thing;
