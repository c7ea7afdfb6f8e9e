//! Object constraints: named fields, each with its own validator.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::{Validator, ValidatorKind, mismatch};
use crate::error::ValidationError;
use crate::value::ValueType;

/// Constraints for object values.
///
/// Declared fields are validated and coerced when present. Required fields
/// must be present. Undeclared fields are passed through untouched.
#[derive(Debug, Clone, Default)]
pub struct ObjectRules {
    fields: BTreeMap<String, Validator>,
    required: BTreeSet<String>,
}

impl ObjectRules {
    /// Declare an optional field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, validator: impl Into<Validator>) -> Self {
        self.fields.insert(name.into(), validator.into());
        self
    }

    /// Declare a field that must be present.
    #[must_use]
    pub fn required_field(self, name: impl Into<String>, validator: impl Into<Validator>) -> Self {
        let name = name.into();
        let mut rules = self.field(name.clone(), validator);
        rules.required.insert(name);
        rules
    }

    #[must_use]
    pub fn nullable(self) -> Validator {
        Validator::from(self).nullable()
    }

    /// Declared fields, by name.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Validator> {
        &self.fields
    }

    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub(super) fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let Value::Object(object) = value else {
            return Err(mismatch(ValueType::Object, value));
        };

        if let Some(missing) = self.required.iter().find(|name| !object.contains_key(*name)) {
            return Err(ValidationError::MissingField {
                field: missing.clone(),
            });
        }

        let mut coerced = object.clone();
        for (name, validator) in &self.fields {
            let Some(field) = object.get(name) else {
                continue;
            };
            let value = validator
                .validate(field)
                .map_err(|source| ValidationError::Field {
                    field: name.clone(),
                    source: Box::new(source),
                })?;
            coerced.insert(name.clone(), value);
        }

        Ok(Value::Object(coerced))
    }

    pub(super) fn write_schema(&self, schema: &mut Map<String, Value>) {
        if !self.fields.is_empty() {
            let properties = self
                .fields
                .iter()
                .map(|(name, validator)| (name.clone(), Value::Object(validator.schema())))
                .collect();
            schema.insert("properties".to_string(), Value::Object(properties));
        }
        if !self.required.is_empty() {
            let required = self.required.iter().cloned().map(Value::String).collect();
            schema.insert("required".to_string(), Value::Array(required));
        }
    }
}

impl From<ObjectRules> for Validator {
    fn from(rules: ObjectRules) -> Self {
        Validator::new(ValidatorKind::Object(rules))
    }
}
