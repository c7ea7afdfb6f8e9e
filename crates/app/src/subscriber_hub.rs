//! Per-Thing fan-out of change records to subscribers.
//!
//! Each subscriber owns a bounded FIFO queue drained by its own delivery
//! task, so a slow or broken transport never stalls the mutation that
//! produced a record nor the delivery to anyone else. A subscriber is
//! deregistered when its `send` fails, when the transport drops its handle,
//! or when its queue overflows.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use webthing_domain::error::NotFoundError;
use webthing_domain::id::SubscriberId;
use webthing_domain::message::{ChangeRecord, OutboundMessage};

use crate::ports::Subscriber;

type Message = Arc<[u8]>;

/// Registered subscribers of one Thing.
#[derive(Clone)]
pub struct SubscriberHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    thing: String,
    queue_capacity: usize,
    entries: Mutex<HashMap<SubscriberId, Entry>>,
}

struct Entry {
    sender: mpsc::Sender<Message>,
    /// `None` delivers every event; `Some` only the listed ones.
    events: Option<HashSet<String>>,
}

impl SubscriberHub {
    /// Create an empty hub for the Thing `thing`, with per-subscriber queues
    /// of `queue_capacity` messages.
    #[must_use]
    pub fn new(thing: impl Into<String>, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                thing: thing.into(),
                queue_capacity: queue_capacity.max(1),
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a subscriber and start its delivery task.
    ///
    /// Only a weak reference is kept: dropping every `Arc` of the subscriber
    /// deregisters it at the next delivery.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> SubscriberId {
        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);
        self.inner.lock().insert(
            id,
            Entry {
                sender,
                events: None,
            },
        );
        tokio::spawn(deliver(
            Arc::downgrade(subscriber),
            receiver,
            id,
            Arc::downgrade(&self.inner),
        ));
        info!(thing = %self.inner.thing, subscriber = %id, "subscriber registered");
        id
    }

    /// Remove a subscriber. Messages already queued are still delivered.
    ///
    /// Returns `false` when `id` was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.inner.lock().remove(&id).is_some();
        if removed {
            info!(thing = %self.inner.thing, subscriber = %id, "subscriber unregistered");
        }
        removed
    }

    /// Restrict event delivery for `id`, adding `event` to its subscribed
    /// set. Property and action notifications are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `id` is not registered.
    pub fn add_event_subscription(
        &self,
        id: SubscriberId,
        event: &str,
    ) -> Result<(), NotFoundError> {
        let mut entries = self.inner.lock();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new("subscriber", id.to_string()))?;
        entry
            .events
            .get_or_insert_with(HashSet::new)
            .insert(event.to_string());
        debug!(thing = %self.inner.thing, subscriber = %id, event, "event subscription added");
        Ok(())
    }

    /// Fan `record` out to every interested subscriber. Never blocks and
    /// never fails; faulty subscribers are dropped.
    pub fn broadcast(&self, record: &ChangeRecord) {
        let event = record.event_name();
        let message = match record.to_message().encode() {
            Ok(bytes) => Message::from(bytes),
            Err(err) => {
                error!(thing = %self.inner.thing, %err, "failed to encode notification");
                return;
            }
        };

        let targets: Vec<(SubscriberId, mpsc::Sender<Message>)> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, entry)| entry.accepts(event))
            .map(|(id, entry)| (*id, entry.sender.clone()))
            .collect();

        let failed: Vec<SubscriberId> = targets
            .into_iter()
            .filter_map(|(id, sender)| match sender.try_send(Arc::clone(&message)) {
                Ok(()) => None,
                Err(TrySendError::Full(_)) => {
                    warn!(thing = %self.inner.thing, subscriber = %id, "subscriber queue full, dropping subscriber");
                    Some(id)
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(thing = %self.inner.thing, subscriber = %id, "subscriber already closed");
                    Some(id)
                }
            })
            .collect();

        if !failed.is_empty() {
            let mut entries = self.inner.lock();
            for id in failed {
                entries.remove(&id);
            }
        }
    }

    /// Queue a reply for a single subscriber, bypassing event filters.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `id` is not registered.
    pub fn send_to(&self, id: SubscriberId, message: &OutboundMessage) -> Result<(), NotFoundError> {
        let sender = self
            .inner
            .lock()
            .get(&id)
            .map(|entry| entry.sender.clone())
            .ok_or_else(|| NotFoundError::new("subscriber", id.to_string()))?;
        match message.encode() {
            Ok(bytes) => {
                if sender.try_send(Message::from(bytes)).is_err() {
                    warn!(thing = %self.inner.thing, subscriber = %id, "reply dropped, dropping subscriber");
                    self.inner.lock().remove(&id);
                }
            }
            Err(err) => error!(thing = %self.inner.thing, %err, "failed to encode reply"),
        }
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner.lock().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber. Queued messages are still delivered.
    pub fn clear(&self) {
        let dropped = {
            let mut entries = self.inner.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        if dropped > 0 {
            info!(thing = %self.inner.thing, count = dropped, "subscribers dropped");
        }
    }
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Entry {
    fn accepts(&self, event: Option<&str>) -> bool {
        match (event, &self.events) {
            (Some(event), Some(events)) => events.contains(event),
            _ => true,
        }
    }
}

/// Drain one subscriber's queue until it closes or delivery fails.
async fn deliver<S: Subscriber>(
    subscriber: Weak<S>,
    mut receiver: mpsc::Receiver<Message>,
    id: SubscriberId,
    hub: Weak<HubInner>,
) {
    while let Some(message) = receiver.recv().await {
        let Some(subscriber) = subscriber.upgrade() else {
            debug!(subscriber = %id, "subscriber handle dropped");
            break;
        };
        if let Err(err) = subscriber.send(message).await {
            warn!(subscriber = %id, %err, "delivery failed, dropping subscriber");
            break;
        }
    }
    if let Some(hub) = hub.upgrade()
        && hub.lock().remove(&id).is_some()
    {
        info!(thing = %hub.thing, subscriber = %id, "subscriber deregistered");
    }
}
