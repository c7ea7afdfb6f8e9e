//! Invocable operations with a tracked lifecycle.
//!
//! An [`ActionDescriptor`] defines an action kind and its input schema. Every
//! invocation produces an [`ActionRecord`] moving strictly forward through
//! `created → pending → running → completed | error`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::description::Link;
use crate::error::{DefinitionError, HandlerError, InvariantError, ValidationError};
use crate::id::ActionId;
use crate::metadata::Metadata;
use crate::time::{Timestamp, now};
use crate::validator::{Validator, ValidatorKind};

/// Lifecycle status of an action instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Created,
    Pending,
    Running,
    Completed,
    Error,
}

impl ActionStatus {
    /// `Completed` and `Error` are final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether `next` is the immediate successor of `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Pending)
                | (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed | Self::Error)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable definition of an action kind.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub metadata: Metadata,
    input: Option<Validator>,
}

impl ActionDescriptor {
    /// Create a builder for constructing an [`ActionDescriptor`].
    #[must_use]
    pub fn builder() -> ActionDescriptorBuilder {
        ActionDescriptorBuilder::default()
    }

    /// Validate and coerce an invocation input.
    ///
    /// Actions declared without an input accept `null` or any object.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the input schema.
    pub fn validate_input(&self, input: &Value) -> Result<Value, ValidationError> {
        match &self.input {
            Some(validator) => validator.validate(input),
            None => Validator::from(Validator::object())
                .nullable()
                .validate(input),
        }
    }

    /// Render the description entry for this action, linked at `href`.
    #[must_use]
    pub fn describe(&self, href: &str) -> Value {
        let mut entry = serde_json::Map::new();
        self.metadata.write_into(&mut entry);
        if let Some(input) = &self.input {
            entry.insert("input".to_string(), Value::Object(input.schema()));
        }
        entry.insert("links".to_string(), Link::to("action", href).into_array());
        Value::Object(entry)
    }
}

/// Step-by-step builder for [`ActionDescriptor`].
#[derive(Debug, Default)]
pub struct ActionDescriptorBuilder {
    name: Option<String>,
    metadata: Metadata,
    input: Option<Validator>,
}

impl ActionDescriptorBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Input schema; must be object-shaped.
    #[must_use]
    pub fn input(mut self, input: impl Into<Validator>) -> Self {
        self.input = Some(input.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.metadata.semantic_type = Some(semantic_type.into());
        self
    }

    /// Consume the builder and return an [`ActionDescriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::EmptyName`] if `name` is missing or empty and
    /// [`DefinitionError::InputNotObject`] if the input schema is not an object.
    pub fn build(self) -> Result<ActionDescriptor, DefinitionError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if let Some(input) = &self.input
            && !matches!(input.kind(), ValidatorKind::Object(_))
        {
            return Err(DefinitionError::InputNotObject);
        }
        Ok(ActionDescriptor {
            name,
            metadata: self.metadata,
            input: self.input,
        })
    }
}

/// State of one action invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub id: ActionId,
    pub name: String,
    pub input: Value,
    pub status: ActionStatus,
    pub time_requested: Timestamp,
    pub time_started: Option<Timestamp>,
    pub time_completed: Option<Timestamp>,
    pub error: Option<String>,
}

impl ActionRecord {
    /// A freshly created instance with an already validated `input`.
    #[must_use]
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            input,
            status: ActionStatus::Created,
            time_requested: now(),
            time_started: None,
            time_completed: None,
            error: None,
        }
    }

    /// Move to `next`, stamping start and completion times.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::InvalidTransition`] and leaves the record
    /// unchanged when `next` is not the successor of the current status.
    pub fn advance(&mut self, next: ActionStatus) -> Result<(), InvariantError> {
        if !self.status.can_transition_to(next) {
            return Err(InvariantError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        match next {
            ActionStatus::Running => self.time_started = Some(now()),
            ActionStatus::Completed | ActionStatus::Error => self.time_completed = Some(now()),
            ActionStatus::Created | ActionStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// Move to `Error`, capturing the handler failure.
    ///
    /// # Errors
    ///
    /// Same as [`ActionRecord::advance`].
    pub fn fail(&mut self, error: &HandlerError) -> Result<(), InvariantError> {
        self.advance(ActionStatus::Error)?;
        self.error = Some(error.message().to_string());
        Ok(())
    }

    /// Public view of this instance, linked at `href`.
    #[must_use]
    pub fn describe(&self, href: String) -> ActionDescription {
        ActionDescription {
            name: self.name.clone(),
            id: self.id,
            input: self.input.clone(),
            href,
            status: self.status,
            time_requested: self.time_requested,
            time_started: self.time_started,
            time_completed: self.time_completed,
            error: self.error.clone(),
        }
    }
}

/// Serializable snapshot of an action instance.
///
/// The action name is not part of the object itself; on the wire it is the
/// key the description is nested under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescription {
    #[serde(skip)]
    pub name: String,
    pub id: ActionId,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
    pub href: String,
    pub status: ActionStatus,
    #[serde(with = "crate::time::rfc3339")]
    pub time_requested: Timestamp,
    #[serde(
        default,
        with = "crate::time::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_started: Option<Timestamp>,
    #[serde(
        default,
        with = "crate::time::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_completed: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionDescription {
    /// `{name: description}`, the form used in listings and notifications.
    #[must_use]
    pub fn keyed(&self) -> Value {
        let mut keyed = serde_json::Map::new();
        keyed.insert(
            self.name.clone(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        Value::Object(keyed)
    }
}
