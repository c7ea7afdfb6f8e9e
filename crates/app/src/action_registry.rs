//! Action registry: invocation, lifecycle and bounded history.
//!
//! Invocation validates the input before creating any state, then records
//! the instance as `created`, moves it to `pending` and hands it to its own
//! Tokio task, which moves it to `running` and finally to `completed` or
//! `error`. Every transition is broadcast. Registry bookkeeping is serialized
//! by one lock per Thing; handlers run outside it with no concurrency limit.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, error, warn};
use webthing_domain::action::{ActionDescription, ActionDescriptor, ActionRecord, ActionStatus};
use webthing_domain::error::{
    HandlerError, InvariantError, NotFoundError, ValidationError, WebThingError,
};
use webthing_domain::id::ActionId;
use webthing_domain::message::ChangeRecord;
use webthing_domain::options::ThingOptions;

use crate::cancellation::{CancellationHandle, CancellationSignal, cancellation};
use crate::subscriber_hub::SubscriberHub;
use crate::thing::Thing;

/// Boxed future returned by an [`ActionHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// Host code run for each action instance.
///
/// Implemented for any `Fn(ActionContext) -> impl Future<Output =
/// Result<(), HandlerError>>`, so plain async fns can be registered.
pub trait ActionHandler: Send + Sync + 'static {
    fn run(&self, context: ActionContext) -> HandlerFuture;
}

impl<F, Fut> ActionHandler for F
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn run(&self, context: ActionContext) -> HandlerFuture {
        Box::pin(self(context))
    }
}

/// Everything a handler gets for one invocation.
pub struct ActionContext {
    pub id: ActionId,
    pub name: String,
    /// Validated and coerced input.
    pub input: Value,
    /// Fires on explicit cancel, caller cancellation or Thing shutdown.
    pub cancellation: CancellationSignal,
    /// The Thing the action runs on, for property writes and events.
    pub thing: Thing,
}

impl ActionContext {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Failure of [`ActionRegistry::invoke`]. No instance exists afterwards.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    UnknownType(#[from] NotFoundError),

    #[error("invalid input for action {name}")]
    InvalidInput {
        name: String,
        #[source]
        source: ValidationError,
    },
}

/// Failure of [`ActionRegistry::cancel`].
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("action {id} already finished with status {status}")]
    AlreadyFinished { id: ActionId, status: ActionStatus },
}

/// Failure of [`ActionRegistry::remove`].
#[derive(Debug, thiserror::Error)]
pub enum RemoveError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("action {id} is still {status}")]
    StillRunning { id: ActionId, status: ActionStatus },
}

impl From<InvokeError> for WebThingError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::UnknownType(err) => Self::NotFound(err),
            InvokeError::InvalidInput { source, .. } => Self::Validation(source),
        }
    }
}

impl From<CancelError> for WebThingError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::NotFound(err) => Self::NotFound(err),
            CancelError::AlreadyFinished { id, status } => Self::ActionState { id, status },
        }
    }
}

impl From<RemoveError> for WebThingError {
    fn from(err: RemoveError) -> Self {
        match err {
            RemoveError::NotFound(err) => Self::NotFound(err),
            RemoveError::StillRunning { id, status } => Self::ActionState { id, status },
        }
    }
}

struct ActionKind {
    descriptor: ActionDescriptor,
    handler: Arc<dyn ActionHandler>,
}

struct Instance {
    record: ActionRecord,
    cancel: CancellationHandle,
}

#[derive(Default)]
struct State {
    instances: HashMap<ActionId, Instance>,
    /// Instance ids, oldest first.
    order: VecDeque<ActionId>,
}

/// Action kinds of one Thing plus every retained instance.
pub struct ActionRegistry {
    thing: String,
    options: ThingOptions,
    kinds: BTreeMap<String, ActionKind>,
    state: Mutex<State>,
}

impl ActionRegistry {
    pub(crate) fn new(
        thing: impl Into<String>,
        options: ThingOptions,
        kinds: Vec<(ActionDescriptor, Arc<dyn ActionHandler>)>,
    ) -> Self {
        let kinds = kinds
            .into_iter()
            .map(|(descriptor, handler)| {
                (
                    options.key(&descriptor.name),
                    ActionKind {
                        descriptor,
                        handler,
                    },
                )
            })
            .collect();
        Self {
            thing: thing.into(),
            options,
            kinds,
            state: Mutex::new(State::default()),
        }
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ActionDescriptor> {
        self.kinds
            .get(&self.options.key(name))
            .map(|kind| &kind.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.kinds.values().map(|kind| &kind.descriptor)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn describe_record(&self, record: &ActionRecord) -> ActionDescription {
        record.describe(
            self.options
                .href(&format!("actions/{}/{}", record.name, record.id)),
        )
    }

    /// Validate `input`, create an instance and start its handler.
    ///
    /// When `caller` is given, firing it cancels the instance as well.
    /// Returns the instance as it stands once queued (`pending`).
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::UnknownType`] for an undeclared action and
    /// [`InvokeError::InvalidInput`] when `input` fails the input schema.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn invoke(
        &self,
        thing: &Thing,
        name: &str,
        input: &Value,
        caller: Option<CancellationSignal>,
    ) -> Result<ActionDescription, InvokeError> {
        let kind = self
            .kinds
            .get(&self.options.key(name))
            .ok_or_else(|| NotFoundError::new("action", name))?;
        let input =
            kind.descriptor
                .validate_input(input)
                .map_err(|source| InvokeError::InvalidInput {
                    name: kind.descriptor.name.clone(),
                    source,
                })?;

        let record = ActionRecord::new(kind.descriptor.name.clone(), input.clone());
        let id = record.id;
        let (cancel, signal) = cancellation();
        let hub = thing.hub();

        let description = {
            let mut state = self.lock();
            let mut instance = Instance {
                record,
                cancel: cancel.clone(),
            };
            hub.broadcast(&ChangeRecord::ActionStatusChanged(
                self.describe_record(&instance.record),
            ));
            if let Err(err) = instance.record.advance(ActionStatus::Pending) {
                error!(thing = %self.thing, action = %kind.descriptor.name, %id, %err, "action transition rejected");
            }
            let description = self.describe_record(&instance.record);
            hub.broadcast(&ChangeRecord::ActionStatusChanged(description.clone()));
            state.order.push_back(id);
            state.instances.insert(id, instance);
            self.evict(&mut state);
            description
        };
        debug!(thing = %self.thing, action = %kind.descriptor.name, %id, "action queued");

        let context = ActionContext {
            id,
            name: kind.descriptor.name.clone(),
            input,
            cancellation: signal,
            thing: thing.clone(),
        };
        tokio::spawn(execute(
            thing.clone(),
            Arc::clone(&kind.handler),
            context,
            caller.map(|caller| (caller, cancel)),
        ));
        Ok(description)
    }

    /// Apply a transition to instance `id` and broadcast the result.
    fn transition(
        &self,
        hub: &SubscriberHub,
        id: ActionId,
        apply: impl FnOnce(&mut ActionRecord) -> Result<(), InvariantError>,
    ) {
        let mut state = self.lock();
        let Some(instance) = state.instances.get_mut(&id) else {
            warn!(thing = %self.thing, %id, "transition for unknown action instance");
            return;
        };
        if let Err(err) = apply(&mut instance.record) {
            error!(thing = %self.thing, action = %instance.record.name, %id, %err, "action transition rejected");
            return;
        }
        let status = instance.record.status;
        debug!(thing = %self.thing, action = %instance.record.name, %id, %status, "action status changed");
        hub.broadcast(&ChangeRecord::ActionStatusChanged(
            self.describe_record(&instance.record),
        ));
        if status.is_terminal() {
            self.evict(&mut state);
        }
    }

    /// Drop the oldest terminal instances beyond the retention bound.
    fn evict(&self, state: &mut State) {
        while state.order.len() > self.options.max_actions {
            let position = state.order.iter().position(|id| {
                state
                    .instances
                    .get(id)
                    .is_some_and(|instance| instance.record.status.is_terminal())
            });
            let Some(id) = position.and_then(|position| state.order.remove(position)) else {
                break;
            };
            state.instances.remove(&id);
            debug!(thing = %self.thing, %id, "action evicted from history");
        }
    }

    #[must_use]
    pub fn describe(&self, id: ActionId) -> Option<ActionDescription> {
        self.lock()
            .instances
            .get(&id)
            .map(|instance| self.describe_record(&instance.record))
    }

    /// Retained instances, oldest first, optionally restricted to `name`.
    #[must_use]
    pub fn list(&self, name: Option<&str>) -> Vec<ActionDescription> {
        let key = name.map(|name| self.options.key(name));
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.instances.get(id))
            .filter(|instance| {
                key.as_ref()
                    .is_none_or(|key| *key == self.options.key(&instance.record.name))
            })
            .map(|instance| self.describe_record(&instance.record))
            .collect()
    }

    /// Request cooperative cancellation of a non-terminal instance.
    ///
    /// # Errors
    ///
    /// Returns [`CancelError::NotFound`] for an unknown id and
    /// [`CancelError::AlreadyFinished`] for a terminal instance.
    pub fn cancel(&self, id: ActionId) -> Result<(), CancelError> {
        let state = self.lock();
        let instance = state
            .instances
            .get(&id)
            .ok_or_else(|| NotFoundError::new("action", id.to_string()))?;
        let status = instance.record.status;
        if status.is_terminal() {
            return Err(CancelError::AlreadyFinished { id, status });
        }
        instance.cancel.cancel();
        debug!(thing = %self.thing, action = %instance.record.name, %id, "action cancellation requested");
        Ok(())
    }

    /// Delete a terminal instance from the history.
    ///
    /// # Errors
    ///
    /// Returns [`RemoveError::NotFound`] for an unknown id and
    /// [`RemoveError::StillRunning`] for a non-terminal instance.
    pub fn remove(&self, id: ActionId) -> Result<ActionDescription, RemoveError> {
        let mut state = self.lock();
        let instance = state
            .instances
            .get(&id)
            .ok_or_else(|| NotFoundError::new("action", id.to_string()))?;
        let status = instance.record.status;
        if !status.is_terminal() {
            return Err(RemoveError::StillRunning { id, status });
        }
        let description = self.describe_record(&instance.record);
        state.instances.remove(&id);
        state.order.retain(|other| *other != id);
        Ok(description)
    }

    /// Cancel every non-terminal instance; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let state = self.lock();
        let mut count = 0;
        for instance in state
            .instances
            .values()
            .filter(|instance| !instance.record.status.is_terminal())
        {
            instance.cancel.cancel();
            count += 1;
        }
        count
    }
}

/// Drive one instance from `pending` to a terminal status.
async fn execute(
    thing: Thing,
    handler: Arc<dyn ActionHandler>,
    context: ActionContext,
    link: Option<(CancellationSignal, CancellationHandle)>,
) {
    let id = context.id;
    let name = context.name.clone();
    let registry = thing.action_registry();
    let hub = thing.hub();

    let forwarder = link.map(|(caller, handle)| {
        tokio::spawn(async move {
            caller.cancelled().await;
            handle.cancel();
        })
    });

    registry.transition(hub, id, |record| record.advance(ActionStatus::Running));

    // A separate task turns a panicking handler into an `error` instance.
    let outcome = match tokio::spawn(handler.run(context)).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => Err(HandlerError::new("action handler panicked")),
        Err(_) => Err(HandlerError::cancelled()),
    };

    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }

    match outcome {
        Ok(()) => registry.transition(hub, id, |record| record.advance(ActionStatus::Completed)),
        Err(err) => {
            warn!(thing = %thing.id(), action = %name, %id, %err, "action handler failed");
            registry.transition(hub, id, |record| record.fail(&err));
        }
    }
}
