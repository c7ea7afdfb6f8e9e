//! Property store: named, validated, change-notifying values.
//!
//! Writes to one property are serialized by that property's slot lock, held
//! across validate, write, read-back, `last_value` update and broadcast. A
//! notification is emitted only when the committed value differs from
//! `last_value`, the value subscribers last observed. Numbers compare
//! numerically, so `20` and `20.0` count as unchanged.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;
use webthing_domain::error::{NotFoundError, ValidationError, WebThingError};
use webthing_domain::message::ChangeRecord;
use webthing_domain::options::ThingOptions;
use webthing_domain::property::{PropertyDescriptor, value_map};
use webthing_domain::value::same_value;

use crate::subscriber_hub::SubscriberHub;

/// Failure of a property write.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("property {name} is read-only")]
    ReadOnly { name: String },

    #[error("invalid value for property {name}")]
    InvalidValue {
        name: String,
        #[source]
        source: ValidationError,
    },
}

impl From<PropertyError> for WebThingError {
    fn from(err: PropertyError) -> Self {
        match err {
            PropertyError::NotFound(err) => Self::NotFound(err),
            PropertyError::ReadOnly { name } => Self::ReadOnly { name },
            PropertyError::InvalidValue { source, .. } => Self::Validation(source),
        }
    }
}

struct Slot {
    descriptor: PropertyDescriptor,
    last_value: Mutex<Value>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Value> {
        self.last_value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// All properties of one Thing, keyed by (optionally case-folded) name.
pub struct PropertyStore {
    thing: String,
    options: ThingOptions,
    slots: BTreeMap<String, Slot>,
}

impl PropertyStore {
    /// Build the store; descriptor names must already be unique.
    pub(crate) fn new(
        thing: impl Into<String>,
        options: ThingOptions,
        descriptors: Vec<PropertyDescriptor>,
    ) -> Self {
        let slots = descriptors
            .into_iter()
            .map(|descriptor| {
                let initial = descriptor.accessor().get();
                let slot = Slot {
                    descriptor,
                    last_value: Mutex::new(initial),
                };
                (options.key(&slot.descriptor.name), slot)
            })
            .collect();
        Self {
            thing: thing.into(),
            options,
            slots,
        }
    }

    fn slot(&self, name: &str) -> Result<&Slot, NotFoundError> {
        self.slots
            .get(&self.options.key(name))
            .ok_or_else(|| NotFoundError::new("property", name))
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.slot(name).ok().map(|slot| &slot.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.slots.values().map(|slot| &slot.descriptor)
    }

    /// Current wire value, `None` for an unknown property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.slot(name).ok().map(|slot| slot.descriptor.accessor().get())
    }

    /// `{name: value}` for every property.
    #[must_use]
    pub fn values(&self) -> Map<String, Value> {
        value_map(
            self.descriptors()
                .map(|descriptor| (descriptor.name.as_str(), descriptor.accessor().get())),
        )
    }

    /// Validate and write `value`, returning the committed value.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::NotFound`] for an unknown name
    /// - [`PropertyError::ReadOnly`] for a read-only property; the validator
    ///   and the host are not touched
    /// - [`PropertyError::InvalidValue`] when validation or host conversion
    ///   fails; host state is unchanged and nothing is broadcast
    pub fn set(
        &self,
        name: &str,
        value: &Value,
        hub: &SubscriberHub,
    ) -> Result<Value, PropertyError> {
        let slot = self.slot(name)?;
        let descriptor = &slot.descriptor;
        if descriptor.read_only {
            return Err(PropertyError::ReadOnly {
                name: descriptor.name.clone(),
            });
        }
        let invalid = |source| PropertyError::InvalidValue {
            name: descriptor.name.clone(),
            source,
        };

        let coerced = descriptor.validator.validate(value).map_err(invalid)?;

        let mut last_value = slot.lock();
        let accessor = descriptor.accessor();
        accessor.set(coerced).map_err(invalid)?;
        let committed = accessor.get();

        if same_value(&committed, &last_value) {
            debug!(thing = %self.thing, property = %descriptor.name, "property unchanged");
        } else {
            debug!(thing = %self.thing, property = %descriptor.name, value = %committed, "property updated");
            last_value.clone_from(&committed);
            hub.broadcast(&ChangeRecord::PropertyChanged {
                name: descriptor.name.clone(),
                value: committed.clone(),
            });
        }
        Ok(committed)
    }

    /// Re-read a property after host code changed it directly, broadcasting
    /// when it differs from the last observed value.
    ///
    /// Returns whether a change was detected.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown name.
    pub fn sync(&self, name: &str, hub: &SubscriberHub) -> Result<bool, NotFoundError> {
        let slot = self.slot(name)?;
        let mut last_value = slot.lock();
        let current = slot.descriptor.accessor().get();
        if same_value(&current, &last_value) {
            return Ok(false);
        }
        debug!(thing = %self.thing, property = %slot.descriptor.name, value = %current, "property changed by host");
        last_value.clone_from(&current);
        hub.broadcast(&ChangeRecord::PropertyChanged {
            name: slot.descriptor.name.clone(),
            value: current,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_stream::StreamExt;
    use tokio_stream::wrappers::ReceiverStream;
    use webthing_domain::property::{PropertyAccessor, StoredValue};
    use webthing_domain::validator::Validator;

    use crate::channel_subscriber::ChannelSubscriber;

    /// Counts writes so tests can assert the host was never touched.
    struct CountingSlot {
        inner: StoredValue,
        writes: AtomicUsize,
    }

    impl PropertyAccessor for CountingSlot {
        fn get(&self) -> Value {
            self.inner.get()
        }

        fn set(&self, value: Value) -> Result<(), ValidationError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(value)
        }

        fn is_writable(&self) -> bool {
            true
        }
    }

    fn temperature(accessor: Arc<CountingSlot>) -> PropertyDescriptor {
        PropertyDescriptor::builder()
            .name("temperature")
            .validator(Validator::number().minimum(0).maximum(100))
            .shared_accessor(accessor)
            .build()
            .unwrap()
    }

    fn counting(initial: Value) -> Arc<CountingSlot> {
        Arc::new(CountingSlot {
            inner: StoredValue::new(initial),
            writes: AtomicUsize::new(0),
        })
    }

    fn store(descriptors: Vec<PropertyDescriptor>) -> PropertyStore {
        PropertyStore::new("lamp", ThingOptions::default(), descriptors)
    }

    #[tokio::test]
    async fn should_round_trip_coerced_value() {
        let hub = SubscriberHub::new("lamp", 8);
        let store = store(vec![temperature(counting(json!(20.0)))]);

        let committed = store.set("temperature", &json!(37.5), &hub).unwrap();
        assert_eq!(committed, json!(37.5));
        assert_eq!(store.get("temperature"), Some(json!(37.5)));

        store.set("temperature", &json!(40), &hub).unwrap();
        assert_eq!(store.get("temperature"), Some(json!(40.0)));
    }

    fn listen(hub: &SubscriberHub) -> (Arc<ChannelSubscriber>, ReceiverStream<Arc<[u8]>>) {
        let (subscriber, inbox) = ChannelSubscriber::with_stream(8);
        let subscriber = Arc::new(subscriber);
        hub.register(&subscriber);
        (subscriber, inbox)
    }

    async fn next_message(inbox: &mut ReceiverStream<Arc<[u8]>>) -> Option<Value> {
        let bytes = tokio::time::timeout(Duration::from_millis(100), inbox.next())
            .await
            .ok()??;
        Some(serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn should_not_notify_when_integer_shaped_value_is_set_again() {
        let hub = SubscriberHub::new("lamp", 8);
        let (_subscriber, mut inbox) = listen(&hub);
        let store = store(vec![temperature(counting(json!(20)))]);

        let committed = store.set("temperature", &json!(20), &hub).unwrap();
        assert_eq!(committed, json!(20.0));
        assert_eq!(next_message(&mut inbox).await, None);

        store.set("temperature", &json!(21), &hub).unwrap();
        assert_eq!(
            next_message(&mut inbox).await,
            Some(json!({"messageType": "propertyStatus", "data": {"temperature": 21.0}}))
        );
    }

    #[tokio::test]
    async fn should_compare_against_last_announced_value_when_host_changed_silently() {
        let hub = SubscriberHub::new("lamp", 8);
        let (_subscriber, mut inbox) = listen(&hub);
        let slot = counting(json!(20.0));
        let store = store(vec![temperature(Arc::clone(&slot))]);

        slot.inner.replace(json!(35.0));
        store.set("temperature", &json!(20.0), &hub).unwrap();

        assert_eq!(next_message(&mut inbox).await, None);
        assert!(!store.sync("temperature", &hub).unwrap());
    }

    #[tokio::test]
    async fn should_leave_value_untouched_when_invalid() {
        let hub = SubscriberHub::new("lamp", 8);
        let slot = counting(json!(37.5));
        let store = store(vec![temperature(Arc::clone(&slot))]);

        let result = store.set("temperature", &json!(150), &hub);

        assert!(matches!(
            result,
            Err(PropertyError::InvalidValue {
                source: ValidationError::AboveMaximum { .. },
                ..
            })
        ));
        assert_eq!(store.get("temperature"), Some(json!(37.5)));
        assert_eq!(slot.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_return_read_only_without_touching_host() {
        let hub = SubscriberHub::new("lamp", 8);
        let slot = counting(json!("LMP-1"));
        let descriptor = PropertyDescriptor::builder()
            .name("model")
            .read_only()
            .validator(Validator::integer())
            .shared_accessor(Arc::clone(&slot) as Arc<dyn PropertyAccessor>)
            .build()
            .unwrap();
        let store = store(vec![descriptor]);

        // A string would fail the integer validator; ReadOnly proves it never ran.
        let result = store.set("model", &json!("LMP-2"), &hub);

        assert!(matches!(result, Err(PropertyError::ReadOnly { name }) if name == "model"));
        assert_eq!(slot.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_property() {
        let hub = SubscriberHub::new("lamp", 8);
        let store = store(vec![]);
        assert!(matches!(
            store.set("missing", &json!(1), &hub),
            Err(PropertyError::NotFound(_))
        ));
        assert_eq!(store.get("missing"), None);
    }

    #[tokio::test]
    async fn should_match_names_case_insensitively_when_configured() {
        let hub = SubscriberHub::new("lamp", 8);
        let options = ThingOptions {
            ignore_case: true,
            ..ThingOptions::default()
        };
        let store = PropertyStore::new("lamp", options, vec![temperature(counting(json!(1.0)))]);

        store.set("TEMPERATURE", &json!(2.0), &hub).unwrap();
        assert_eq!(store.get("Temperature"), Some(json!(2.0)));
        assert_eq!(store.values().keys().next().map(String::as_str), Some("temperature"));
    }

    #[tokio::test]
    async fn should_detect_host_side_change_once() {
        let hub = SubscriberHub::new("lamp", 8);
        let slot = counting(json!(20.0));
        let store = store(vec![temperature(Arc::clone(&slot))]);

        assert!(!store.sync("temperature", &hub).unwrap());
        slot.inner.replace(json!(21.0));
        assert!(store.sync("temperature", &hub).unwrap());
        assert!(!store.sync("temperature", &hub).unwrap());
    }

    #[tokio::test]
    async fn should_list_all_values() {
        let hub = SubscriberHub::new("lamp", 8);
        let on = PropertyDescriptor::builder()
            .name("on")
            .accessor(StoredValue::new(json!(false)))
            .build()
            .unwrap();
        let store = store(vec![on, temperature(counting(json!(20.0)))]);
        store.set("on", &json!(true), &hub).unwrap();

        assert_eq!(
            Value::Object(store.values()),
            json!({"on": true, "temperature": 20.0})
        );
    }
}
