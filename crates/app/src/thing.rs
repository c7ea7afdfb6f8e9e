//! The Thing aggregate: the protocol-level surface consumed by transports.
//!
//! A [`Thing`] owns its property store, action registry, event registry and
//! subscriber hub. It is cheap to clone; clones share the same state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};
use webthing_domain::action::{ActionDescription, ActionDescriptor};
use webthing_domain::description::{CONTEXT, Link, ThingDescription, ThingInfo};
use webthing_domain::error::{DefinitionError, NotFoundError};
use webthing_domain::event::{EventDescriptor, EventInstance};
use webthing_domain::id::{ActionId, SubscriberId};
use webthing_domain::message::{InboundMessage, OutboundMessage};
use webthing_domain::options::ThingOptions;
use webthing_domain::property::PropertyDescriptor;

use crate::action_registry::{ActionHandler, ActionRegistry, CancelError, InvokeError, RemoveError};
use crate::cancellation::CancellationSignal;
use crate::event_registry::{EventRegistry, FireError};
use crate::ports::Subscriber;
use crate::property_store::{PropertyError, PropertyStore};
use crate::protocol;
use crate::subscriber_hub::SubscriberHub;

/// An addressable device exposing properties, actions and events.
#[derive(Clone)]
pub struct Thing {
    inner: Arc<ThingInner>,
}

struct ThingInner {
    info: ThingInfo,
    options: ThingOptions,
    properties: PropertyStore,
    actions: ActionRegistry,
    events: EventRegistry,
    hub: SubscriberHub,
}

impl Thing {
    /// Create a builder for constructing a [`Thing`].
    #[must_use]
    pub fn builder() -> ThingBuilder {
        ThingBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.info.id
    }

    #[must_use]
    pub fn info(&self) -> &ThingInfo {
        &self.inner.info
    }

    #[must_use]
    pub fn options(&self) -> &ThingOptions {
        &self.inner.options
    }

    pub(crate) fn hub(&self) -> &SubscriberHub {
        &self.inner.hub
    }

    pub(crate) fn action_registry(&self) -> &ActionRegistry {
        &self.inner.actions
    }

    /// The full Thing description document.
    #[must_use]
    pub fn describe(&self) -> ThingDescription {
        let options = &self.inner.options;
        let properties = self
            .inner
            .properties
            .descriptors()
            .map(|d| (d.name.clone(), d.describe(&options.href(&format!("properties/{}", d.name)))))
            .collect();
        let actions = self
            .inner
            .actions
            .descriptors()
            .map(|d| (d.name.clone(), d.describe(&options.href(&format!("actions/{}", d.name)))))
            .collect();
        let events = self
            .inner
            .events
            .descriptors()
            .map(|d| (d.name.clone(), d.describe(&options.href(&format!("events/{}", d.name)))))
            .collect();

        ThingDescription {
            context: CONTEXT.to_string(),
            info: self.inner.info.clone(),
            properties,
            actions,
            events,
            links: ["properties", "actions", "events"]
                .into_iter()
                .map(|rel| Link::to(rel, options.href(rel)))
                .collect(),
        }
    }

    /// Every property's description entry plus its current `value`.
    #[must_use]
    pub fn describe_properties(&self) -> BTreeMap<String, Value> {
        let options = &self.inner.options;
        self.inner
            .properties
            .descriptors()
            .map(|descriptor| {
                let mut entry =
                    descriptor.describe(&options.href(&format!("properties/{}", descriptor.name)));
                if let Value::Object(map) = &mut entry {
                    map.insert("value".to_string(), descriptor.accessor().get());
                }
                (descriptor.name.clone(), entry)
            })
            .collect()
    }

    /// `{name: value}` for every property.
    #[must_use]
    pub fn property_values(&self) -> Map<String, Value> {
        self.inner.properties.values()
    }

    /// Current value of a property, `None` when it does not exist.
    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.inner.properties.get(name)
    }

    /// Validate and write a property, returning the committed value.
    ///
    /// # Errors
    ///
    /// See [`PropertyStore::set`].
    pub fn set_property(&self, name: &str, value: &Value) -> Result<Value, PropertyError> {
        self.inner.properties.set(name, value, &self.inner.hub)
    }

    /// Notify subscribers after host code changed a bound field directly.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown property.
    pub fn sync_property(&self, name: &str) -> Result<bool, NotFoundError> {
        self.inner.properties.sync(name, &self.inner.hub)
    }

    /// Start an action instance.
    ///
    /// # Errors
    ///
    /// See [`InvokeError`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn invoke_action(&self, name: &str, input: &Value) -> Result<ActionDescription, InvokeError> {
        self.inner.actions.invoke(self, name, input, None)
    }

    /// Start an action instance that is also cancelled when `caller` fires.
    ///
    /// # Errors
    ///
    /// See [`InvokeError`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn invoke_action_linked(
        &self,
        name: &str,
        input: &Value,
        caller: CancellationSignal,
    ) -> Result<ActionDescription, InvokeError> {
        self.inner.actions.invoke(self, name, input, Some(caller))
    }

    #[must_use]
    pub fn describe_action(&self, id: ActionId) -> Option<ActionDescription> {
        self.inner.actions.describe(id)
    }

    /// Retained action instances, oldest first, optionally of one kind.
    #[must_use]
    pub fn actions(&self, name: Option<&str>) -> Vec<ActionDescription> {
        self.inner.actions.list(name)
    }

    /// Request cancellation of a running action.
    ///
    /// # Errors
    ///
    /// See [`CancelError`].
    pub fn cancel_action(&self, id: ActionId) -> Result<(), CancelError> {
        self.inner.actions.cancel(id)
    }

    /// Delete a finished action from the history.
    ///
    /// # Errors
    ///
    /// See [`RemoveError`].
    pub fn remove_action(&self, id: ActionId) -> Result<ActionDescription, RemoveError> {
        self.inner.actions.remove(id)
    }

    /// Fire an event from host code.
    ///
    /// # Errors
    ///
    /// See [`FireError`].
    pub fn fire_event(&self, name: &str, data: &Value) -> Result<EventInstance, FireError> {
        self.inner.events.fire(name, data, &self.inner.hub)
    }

    /// Retained events, oldest first, optionally of one kind.
    #[must_use]
    pub fn event_history(&self, name: Option<&str>) -> Vec<EventInstance> {
        self.inner.events.history(name)
    }

    /// Register a subscriber; see [`SubscriberHub::register`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<S: Subscriber>(&self, subscriber: &Arc<S>) -> SubscriberId {
        self.inner.hub.register(subscriber)
    }

    /// Returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.hub.unregister(id)
    }

    /// Narrow event delivery for `id` to the named events subscribed so far.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown event or subscriber.
    pub fn add_event_subscription(&self, id: SubscriberId, event: &str) -> Result<(), NotFoundError> {
        let descriptor = self
            .inner
            .events
            .descriptor(event)
            .ok_or_else(|| NotFoundError::new("event", event))?;
        self.inner.hub.add_event_subscription(id, &descriptor.name)
    }

    /// Handle a request received on a subscriber's channel.
    ///
    /// Error replies are queued to that subscriber and also returned.
    ///
    /// # Panics
    ///
    /// Panics when a `requestAction` is handled outside a Tokio runtime.
    pub fn handle_message(&self, subscriber: SubscriberId, bytes: &[u8]) -> Vec<OutboundMessage> {
        let replies = match InboundMessage::decode(bytes) {
            Ok(message) => protocol::dispatch(self, subscriber, message),
            Err(err) => vec![OutboundMessage::bad_request(format!("malformed message: {err}"))],
        };
        for reply in &replies {
            if let Err(err) = self.inner.hub.send_to(subscriber, reply) {
                debug!(thing = %self.id(), %err, "reply not delivered");
            }
        }
        replies
    }

    /// Cancel every running action and drop every subscriber.
    pub fn shutdown(&self) {
        let cancelled = self.inner.actions.cancel_all();
        self.inner.hub.clear();
        info!(thing = %self.id(), cancelled, "thing shut down");
    }
}

/// Step-by-step builder for [`Thing`].
#[derive(Default)]
pub struct ThingBuilder {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    semantic_types: Vec<String>,
    options: ThingOptions,
    properties: Vec<PropertyDescriptor>,
    actions: Vec<(ActionDescriptor, Arc<dyn ActionHandler>)>,
    events: Vec<EventDescriptor>,
}

impl ThingBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.semantic_types.push(semantic_type.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: ThingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionDescriptor, handler: impl ActionHandler) -> Self {
        self.actions.push((action, Arc::new(handler)));
        self
    }

    #[must_use]
    pub fn event(mut self, event: EventDescriptor) -> Self {
        self.events.push(event);
        self
    }

    /// Consume the builder and return a [`Thing`].
    ///
    /// The title defaults to the id.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when:
    /// - `id` is missing or empty ([`DefinitionError::EmptyName`])
    /// - an option bound is zero ([`DefinitionError::ZeroOption`])
    /// - two properties, actions or events share a name, compared
    ///   case-insensitively when `ignore_case` is set
    ///   ([`DefinitionError::DuplicateName`])
    pub fn build(self) -> Result<Thing, DefinitionError> {
        let id = self.id.unwrap_or_default();
        if id.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        self.options.validate()?;
        let options = self.options;
        unique(&options, "property", self.properties.iter().map(|p| p.name.as_str()))?;
        unique(&options, "action", self.actions.iter().map(|(a, _)| a.name.as_str()))?;
        unique(&options, "event", self.events.iter().map(|e| e.name.as_str()))?;

        let info = ThingInfo {
            title: self.title.unwrap_or_else(|| id.clone()),
            id,
            description: self.description,
            semantic_types: self.semantic_types,
        };
        let inner = ThingInner {
            properties: PropertyStore::new(&info.id, options.clone(), self.properties),
            actions: ActionRegistry::new(&info.id, options.clone(), self.actions),
            events: EventRegistry::new(&info.id, options.clone(), self.events),
            hub: SubscriberHub::new(&info.id, options.subscriber_queue),
            info,
            options,
        };
        info!(thing = %inner.info.id, "thing created");
        Ok(Thing {
            inner: Arc::new(inner),
        })
    }
}

fn unique<'a>(
    options: &ThingOptions,
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(options.key(name)) {
            return Err(DefinitionError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webthing_domain::error::HandlerError;
    use webthing_domain::property::StoredValue;
    use webthing_domain::validator::Validator;

    use crate::action_registry::ActionContext;

    fn on() -> PropertyDescriptor {
        PropertyDescriptor::builder()
            .name("on")
            .title("On/Off")
            .semantic_type("OnOffProperty")
            .validator(Validator::boolean())
            .accessor(StoredValue::new(json!(false)))
            .build()
            .unwrap()
    }

    async fn toggle(_context: ActionContext) -> Result<(), HandlerError> {
        Ok(())
    }

    fn lamp() -> Thing {
        Thing::builder()
            .id("urn:dev:ops:lamp-1")
            .title("Lamp")
            .semantic_type("Light")
            .options(ThingOptions {
                href_prefix: "/things/lamp".to_string(),
                ..ThingOptions::default()
            })
            .property(on())
            .action(
                ActionDescriptor::builder().name("toggle").build().unwrap(),
                toggle,
            )
            .event(EventDescriptor::builder().name("overheated").build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn should_return_empty_name_when_id_missing() {
        assert!(matches!(
            Thing::builder().build(),
            Err(DefinitionError::EmptyName)
        ));
    }

    #[test]
    fn should_default_title_to_id() {
        let thing = Thing::builder().id("urn:x").build().unwrap();
        assert_eq!(thing.info().title, "urn:x");
    }

    #[test]
    fn should_reject_duplicate_property_names() {
        let result = Thing::builder().id("x").property(on()).property(on()).build();
        assert!(matches!(
            result,
            Err(DefinitionError::DuplicateName { kind: "property", .. })
        ));
    }

    #[test]
    fn should_reject_names_differing_only_in_case_when_ignoring_case() {
        let upper = PropertyDescriptor::builder()
            .name("ON")
            .accessor(StoredValue::new(json!(true)))
            .build()
            .unwrap();
        let result = Thing::builder()
            .id("x")
            .options(ThingOptions {
                ignore_case: true,
                ..ThingOptions::default()
            })
            .property(on())
            .property(upper)
            .build();
        assert!(matches!(result, Err(DefinitionError::DuplicateName { .. })));
    }

    #[test]
    fn should_reject_zero_option_bounds() {
        let result = Thing::builder()
            .id("x")
            .options(ThingOptions {
                max_actions: 0,
                ..ThingOptions::default()
            })
            .build();
        assert!(matches!(result, Err(DefinitionError::ZeroOption("max_actions"))));
    }

    #[test]
    fn should_describe_thing_with_links_under_prefix() {
        let description = serde_json::to_value(lamp().describe()).unwrap();

        assert_eq!(description["@context"], json!(CONTEXT));
        assert_eq!(description["id"], json!("urn:dev:ops:lamp-1"));
        assert_eq!(description["@type"], json!(["Light"]));
        assert_eq!(
            description["properties"]["on"],
            json!({
                "type": "boolean",
                "title": "On/Off",
                "@type": "OnOffProperty",
                "readOnly": false,
                "links": [{"rel": "property", "href": "/things/lamp/properties/on"}]
            })
        );
        assert_eq!(
            description["actions"]["toggle"]["links"],
            json!([{"rel": "action", "href": "/things/lamp/actions/toggle"}])
        );
        assert_eq!(
            description["events"]["overheated"]["links"],
            json!([{"rel": "event", "href": "/things/lamp/events/overheated"}])
        );
        assert_eq!(
            description["links"],
            json!([
                {"rel": "properties", "href": "/things/lamp/properties"},
                {"rel": "actions", "href": "/things/lamp/actions"},
                {"rel": "events", "href": "/things/lamp/events"}
            ])
        );
    }

    #[test]
    fn should_include_current_value_when_describing_properties() {
        let thing = lamp();
        thing.set_property("on", &json!(true)).unwrap();
        let properties = thing.describe_properties();
        assert_eq!(properties["on"]["value"], json!(true));
        assert_eq!(properties["on"]["readOnly"], json!(false));
    }

    #[test]
    fn should_return_not_found_when_subscribing_to_unknown_event() {
        let thing = lamp();
        let result = thing.add_event_subscription(SubscriberId::new(), "exploded");
        assert!(matches!(result, Err(NotFoundError { kind: "event", .. })));
    }

    #[tokio::test]
    async fn should_link_action_href_to_instance_id() {
        let thing = lamp();
        let description = thing.invoke_action("toggle", &Value::Null).unwrap();
        assert_eq!(
            description.href,
            format!("/things/lamp/actions/toggle/{}", description.id)
        );
    }
}
