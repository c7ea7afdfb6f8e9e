//! Value validation for property writes, action inputs and event data.
//!
//! A [`Validator`] is immutable once built. [`Validator::validate`] is total
//! and side-effect free: it returns either the coerced value or the reason the
//! value was rejected. Rules are applied in order and stop at the first
//! failure:
//!
//! 1. `null` is accepted iff the validator is nullable;
//! 2. the wire type must match the validator kind;
//! 3. kind-specific bounds (length, range, `multipleOf`, sizes, fields);
//! 4. enum membership, compared in the validator's native kind.
//!
//! Validators are built per kind and converted with `Into<Validator>`:
//!
//! ```
//! use webthing_domain::validator::Validator;
//!
//! let brightness: Validator = Validator::integer().minimum(0).maximum(100).into();
//! assert!(brightness.validate(&serde_json::json!(50)).is_ok());
//! assert!(brightness.validate(&serde_json::json!(200)).is_err());
//! ```

mod array;
mod number;
mod object;
mod string;

pub use array::ArrayRules;
pub use number::NumberRules;
pub use object::ObjectRules;
pub use string::StringRules;

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::value::ValueType;

/// Constraint set applied to a wire value before it is accepted.
#[derive(Debug, Clone)]
pub struct Validator {
    nullable: bool,
    kind: ValidatorKind,
}

/// Kind-specific part of a [`Validator`].
#[derive(Debug, Clone)]
pub enum ValidatorKind {
    /// Any non-null value.
    Any,
    Boolean,
    String(StringRules),
    /// Integer or floating-point number, see [`NumberRules::is_integer`].
    Number(NumberRules),
    Array(ArrayRules),
    Object(ObjectRules),
}

impl Validator {
    /// Accept any non-null value.
    #[must_use]
    pub fn any() -> Self {
        Self::new(ValidatorKind::Any)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::new(ValidatorKind::Boolean)
    }

    #[must_use]
    pub fn string() -> StringRules {
        StringRules::default()
    }

    /// Integral numbers only; float-shaped integral values are coerced.
    #[must_use]
    pub fn integer() -> NumberRules {
        NumberRules::integer()
    }

    /// Any number; integers are coerced to floating point.
    #[must_use]
    pub fn number() -> NumberRules {
        NumberRules::number()
    }

    #[must_use]
    pub fn array() -> ArrayRules {
        ArrayRules::default()
    }

    #[must_use]
    pub fn object() -> ObjectRules {
        ObjectRules::default()
    }

    fn new(kind: ValidatorKind) -> Self {
        Self {
            nullable: false,
            kind,
        }
    }

    /// Also accept `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn kind(&self) -> &ValidatorKind {
        &self.kind
    }

    /// The schema type this validator expects, `None` for [`Validator::any`].
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            ValidatorKind::Any => None,
            ValidatorKind::Boolean => Some(ValueType::Boolean),
            ValidatorKind::String(_) => Some(ValueType::String),
            ValidatorKind::Number(rules) if rules.is_integer() => Some(ValueType::Integer),
            ValidatorKind::Number(_) => Some(ValueType::Number),
            ValidatorKind::Array(_) => Some(ValueType::Array),
            ValidatorKind::Object(_) => Some(ValueType::Object),
        }
    }

    /// Object rules, when this validator is object-shaped.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRules> {
        match &self.kind {
            ValidatorKind::Object(rules) => Some(rules),
            _ => None,
        }
    }

    /// Validate `value`, returning the coerced value on success.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(ValidationError::NullNotAllowed)
            };
        }

        match &self.kind {
            ValidatorKind::Any => Ok(value.clone()),
            ValidatorKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(mismatch(ValueType::Boolean, other)),
            },
            ValidatorKind::String(rules) => rules.validate(value),
            ValidatorKind::Number(rules) => rules.validate(value),
            ValidatorKind::Array(rules) => rules.validate(value),
            ValidatorKind::Object(rules) => rules.validate(value),
        }
    }

    /// Render the JSON-schema fragment describing this validator.
    ///
    /// Nullability is not part of the rendered schema.
    #[must_use]
    pub fn schema(&self) -> Map<String, Value> {
        let mut schema = Map::new();
        if let Some(value_type) = self.value_type() {
            schema.insert("type".to_string(), Value::from(value_type.as_str()));
        }

        match &self.kind {
            ValidatorKind::Any | ValidatorKind::Boolean => {}
            ValidatorKind::String(rules) => rules.write_schema(&mut schema),
            ValidatorKind::Number(rules) => rules.write_schema(&mut schema),
            ValidatorKind::Array(rules) => rules.write_schema(&mut schema),
            ValidatorKind::Object(rules) => rules.write_schema(&mut schema),
        }
        schema
    }
}

fn mismatch(expected: ValueType, actual: &Value) -> ValidationError {
    ValidationError::TypeMismatch {
        expected,
        actual: ValueType::of(actual),
    }
}
