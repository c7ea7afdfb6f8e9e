//! Common error types used across the workspace.
//!
//! Each concern has its own typed error; [`WebThingError`] is the umbrella
//! the transport layer maps onto status codes. Operation-level errors live
//! next to the operation that returns them and convert into
//! [`WebThingError`] via `From`.

use crate::action::ActionStatus;
use crate::id::ActionId;
use crate::value::ValueType;

/// Umbrella error for everything a Thing operation can report.
#[derive(Debug, thiserror::Error)]
pub enum WebThingError {
    /// A wire value failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A property, action, event or subscriber does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// A write was attempted on a read-only property.
    #[error("property {name} is read-only")]
    ReadOnly { name: String },

    /// The action instance is in a status that does not allow the request.
    #[error("action {id} is {status}")]
    ActionState { id: ActionId, status: ActionStatus },

    /// A Thing, property, action or event definition is malformed.
    #[error("invalid definition")]
    Definition(#[from] DefinitionError),

    /// An internal state machine rule was broken.
    #[error("internal invariant violated")]
    Invariant(#[from] InvariantError),
}

/// Reason a wire value was rejected by a [`Validator`](crate::validator::Validator).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("null is not allowed")]
    NullNotAllowed,

    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("string is shorter than {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("string is longer than {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("string does not match pattern {pattern}")]
    PatternMismatch { pattern: String },

    #[error("{actual} is less than the minimum {minimum}")]
    BelowMinimum { minimum: f64, actual: f64 },

    #[error("{actual} is greater than the maximum {maximum}")]
    AboveMaximum { maximum: f64, actual: f64 },

    #[error("{actual} is not greater than the exclusive minimum {minimum}")]
    NotAboveExclusiveMinimum { minimum: f64, actual: f64 },

    #[error("{actual} is not less than the exclusive maximum {maximum}")]
    NotBelowExclusiveMaximum { maximum: f64, actual: f64 },

    #[error("{actual} is not a multiple of {multiple_of}")]
    NotMultipleOf { multiple_of: f64, actual: f64 },

    #[error("value is not one of the allowed values")]
    NotInEnum,

    #[error("array has fewer than {min} items (got {actual})")]
    TooFewItems { min: usize, actual: usize },

    #[error("array has more than {max} items (got {actual})")]
    TooManyItems { max: usize, actual: usize },

    #[error("array items are not unique")]
    DuplicateItems,

    #[error("item {index}: {source}")]
    Item {
        index: usize,
        source: Box<ValidationError>,
    },

    #[error("missing required field {field}")]
    MissingField { field: String },

    #[error("field {field}: {source}")]
    Field {
        field: String,
        source: Box<ValidationError>,
    },

    /// The value passed the schema but the host type cannot hold it.
    #[error("value cannot be converted to the host type: {message}")]
    Conversion { message: String },
}

/// A named item was looked up and does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {name} not found")]
pub struct NotFoundError {
    /// What was looked up (`"property"`, `"action"`, `"event"`, …).
    pub kind: &'static str,
    /// The name or id that was not found.
    pub name: String,
}

impl NotFoundError {
    #[must_use]
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// A definition handed to a builder is malformed.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("{kind} {name} is defined twice")]
    DuplicateName { kind: &'static str, name: String },

    #[error("invalid pattern {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("action input validator must be object-shaped")]
    InputNotObject,

    #[error("property {name} has no accessor")]
    MissingAccessor { name: String },

    #[error("writable property {name} has no setter")]
    MissingSetter { name: String },

    #[error("option {0} must be greater than zero")]
    ZeroOption(&'static str),
}

/// An internal rule was broken. Should not happen under correct use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("action {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ActionId,
        from: ActionStatus,
        to: ActionStatus,
    },
}

/// Failure reported by an action handler; captured into the instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The handler stopped because its cancellation signal fired.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new("cancelled")
    }

    /// Capture any error's display chain as a handler failure.
    #[must_use]
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self { message }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A notification could not be handed to a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The transport already dropped the connection handle.
    #[error("subscriber disconnected")]
    Disconnected,

    /// The subscriber's queue is full; it is not keeping up.
    #[error("subscriber queue is full")]
    QueueFull,

    /// The transport's send primitive failed.
    #[error("transport send failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_describe_type_mismatch_with_both_types() {
        let err = ValidationError::TypeMismatch {
            expected: ValueType::Integer,
            actual: ValueType::String,
        };
        assert_eq!(err.to_string(), "expected integer, got string");
    }

    #[test]
    fn should_describe_nested_field_error() {
        let err = ValidationError::Field {
            field: "brightness".to_string(),
            source: Box::new(ValidationError::AboveMaximum {
                maximum: 100.0,
                actual: 200.0,
            }),
        };
        assert_eq!(
            err.to_string(),
            "field brightness: 200 is greater than the maximum 100"
        );
    }

    #[test]
    fn should_format_not_found_with_kind_and_name() {
        let err = NotFoundError::new("property", "temperature");
        assert_eq!(err.to_string(), "property temperature not found");
    }

    #[test]
    fn should_convert_validation_error_into_umbrella() {
        let err: WebThingError = ValidationError::NullNotAllowed.into();
        assert!(matches!(
            err,
            WebThingError::Validation(ValidationError::NullNotAllowed)
        ));
    }

    #[test]
    fn should_collect_source_chain_into_handler_error() {
        let io = std::io::Error::other("socket closed");
        let err = HandlerError::from_error(&io);
        assert_eq!(err.message(), "socket closed");
    }

    #[test]
    fn should_display_transport_delivery_error() {
        let err = DeliveryError::Transport(Box::new(std::io::Error::other("broken pipe")));
        assert_eq!(err.to_string(), "transport send failed");
    }
}
