//! Event registry: validated firing and a bounded history.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;
use webthing_domain::error::{NotFoundError, ValidationError, WebThingError};
use webthing_domain::event::{EventDescriptor, EventInstance};
use webthing_domain::message::ChangeRecord;
use webthing_domain::options::ThingOptions;

use crate::subscriber_hub::SubscriberHub;

/// Failure of [`EventRegistry::fire`].
#[derive(Debug, thiserror::Error)]
pub enum FireError {
    #[error(transparent)]
    UnknownType(#[from] NotFoundError),

    #[error("invalid data for event {name}")]
    InvalidData {
        name: String,
        #[source]
        source: ValidationError,
    },
}

impl From<FireError> for WebThingError {
    fn from(err: FireError) -> Self {
        match err {
            FireError::UnknownType(err) => Self::NotFound(err),
            FireError::InvalidData { source, .. } => Self::Validation(source),
        }
    }
}

/// Event kinds of one Thing plus the ring buffer of fired instances.
pub struct EventRegistry {
    thing: String,
    options: ThingOptions,
    kinds: BTreeMap<String, EventDescriptor>,
    history: Mutex<VecDeque<EventInstance>>,
}

impl EventRegistry {
    pub(crate) fn new(
        thing: impl Into<String>,
        options: ThingOptions,
        descriptors: Vec<EventDescriptor>,
    ) -> Self {
        let kinds = descriptors
            .into_iter()
            .map(|descriptor| (options.key(&descriptor.name), descriptor))
            .collect();
        let capacity = options.max_events;
        Self {
            thing: thing.into(),
            options,
            kinds,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&EventDescriptor> {
        self.kinds.get(&self.options.key(name))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.kinds.values()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<EventInstance>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate `data`, record the instance and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns [`FireError::UnknownType`] for an undeclared event and
    /// [`FireError::InvalidData`] when `data` fails the event's schema.
    pub fn fire(
        &self,
        name: &str,
        data: &Value,
        hub: &SubscriberHub,
    ) -> Result<EventInstance, FireError> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| NotFoundError::new("event", name))?;
        let instance = descriptor
            .instantiate(data)
            .map_err(|source| FireError::InvalidData {
                name: descriptor.name.clone(),
                source,
            })?;

        let mut history = self.lock();
        while history.len() >= self.options.max_events {
            history.pop_front();
        }
        history.push_back(instance.clone());
        debug!(thing = %self.thing, event = %instance.name, "event fired");
        hub.broadcast(&ChangeRecord::EventFired(instance.clone()));
        Ok(instance)
    }

    /// Retained instances, oldest first, optionally restricted to `name`.
    #[must_use]
    pub fn history(&self, name: Option<&str>) -> Vec<EventInstance> {
        let key = name.map(|name| self.options.key(name));
        self.lock()
            .iter()
            .filter(|instance| {
                key.as_ref()
                    .is_none_or(|key| *key == self.options.key(&instance.name))
            })
            .cloned()
            .collect()
    }
}
