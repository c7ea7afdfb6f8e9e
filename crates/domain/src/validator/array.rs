//! Array constraints.

use serde_json::{Map, Value};

use super::{Validator, ValidatorKind, mismatch};
use crate::error::ValidationError;
use crate::value::{ValueType, same_value};

/// Constraints for array values. Items are validated (and coerced) before
/// uniqueness and enum membership are checked.
#[derive(Debug, Clone, Default)]
pub struct ArrayRules {
    min_items: Option<usize>,
    max_items: Option<usize>,
    unique_items: bool,
    items: Option<Box<Validator>>,
    enumeration: Vec<Value>,
}

impl ArrayRules {
    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    #[must_use]
    pub fn unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }

    /// Validate every item with `items`.
    #[must_use]
    pub fn items(mut self, items: impl Into<Validator>) -> Self {
        self.items = Some(Box::new(items.into()));
        self
    }

    #[must_use]
    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enumeration = values.into_iter().collect();
        self
    }

    #[must_use]
    pub fn nullable(self) -> Validator {
        Validator::from(self).nullable()
    }

    pub(super) fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let Value::Array(items) = value else {
            return Err(mismatch(ValueType::Array, value));
        };

        if let Some(min) = self.min_items
            && items.len() < min
        {
            return Err(ValidationError::TooFewItems {
                min,
                actual: items.len(),
            });
        }
        if let Some(max) = self.max_items
            && items.len() > max
        {
            return Err(ValidationError::TooManyItems {
                max,
                actual: items.len(),
            });
        }

        let coerced = match &self.items {
            Some(validator) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    validator
                        .validate(item)
                        .map_err(|source| ValidationError::Item {
                            index,
                            source: Box::new(source),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => items.clone(),
        };

        if self.unique_items && has_duplicates(&coerced) {
            return Err(ValidationError::DuplicateItems);
        }

        let coerced = Value::Array(coerced);
        if !self.enumeration.is_empty()
            && !self
                .enumeration
                .iter()
                .any(|entry| same_value(entry, &coerced))
        {
            return Err(ValidationError::NotInEnum);
        }

        Ok(coerced)
    }

    pub(super) fn write_schema(&self, schema: &mut Map<String, Value>) {
        if let Some(min) = self.min_items {
            schema.insert("minItems".to_string(), Value::from(min));
        }
        if let Some(max) = self.max_items {
            schema.insert("maxItems".to_string(), Value::from(max));
        }
        if self.unique_items {
            schema.insert("uniqueItems".to_string(), Value::Bool(true));
        }
        if let Some(items) = &self.items {
            schema.insert("items".to_string(), Value::Object(items.schema()));
        }
        if !self.enumeration.is_empty() {
            schema.insert("enum".to_string(), Value::Array(self.enumeration.clone()));
        }
    }
}

// `Value` is not `Hash`; arrays on the wire are small.
fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, item)| items[i + 1..].iter().any(|other| same_value(item, other)))
}

impl From<ArrayRules> for Validator {
    fn from(rules: ArrayRules) -> Self {
        Validator::new(ValidatorKind::Array(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(rules: ArrayRules, value: Value) -> Result<Value, ValidationError> {
        Validator::from(rules).validate(&value)
    }

    #[test]
    fn should_reject_array_with_too_few_items() {
        let rules = Validator::array().min_items(2);
        assert_eq!(
            validate(rules, json!([1])),
            Err(ValidationError::TooFewItems { min: 2, actual: 1 })
        );
    }

    #[test]
    fn should_reject_array_with_too_many_items() {
        let rules = Validator::array().max_items(1);
        assert_eq!(
            validate(rules, json!([1, 2])),
            Err(ValidationError::TooManyItems { max: 1, actual: 2 })
        );
    }

    #[test]
    fn should_report_index_of_invalid_item() {
        let rules = Validator::array().items(Validator::integer().maximum(10));
        assert_eq!(
            validate(rules, json!([1, 2, 30])),
            Err(ValidationError::Item {
                index: 2,
                source: Box::new(ValidationError::AboveMaximum {
                    maximum: 10.0,
                    actual: 30.0,
                }),
            })
        );
    }

    #[test]
    fn should_coerce_items_with_item_validator() {
        let rules = Validator::array().items(Validator::integer());
        assert_eq!(validate(rules, json!([1.0, 2])), Ok(json!([1, 2])));
    }

    #[test]
    fn should_detect_duplicates_after_item_coercion() {
        let rules = Validator::array()
            .items(Validator::integer())
            .unique_items();
        assert_eq!(
            validate(rules.clone(), json!([1, 1.0])),
            Err(ValidationError::DuplicateItems)
        );
        assert_eq!(validate(rules, json!([1, 2])), Ok(json!([1, 2])));
    }

    #[test]
    fn should_match_whole_array_against_enum() {
        let rules = Validator::array().one_of([json!([1, 2]), json!([3])]);
        assert_eq!(validate(rules.clone(), json!([3])), Ok(json!([3])));
        assert_eq!(
            validate(rules, json!([2, 1])),
            Err(ValidationError::NotInEnum)
        );
    }

    #[test]
    fn should_match_enum_numerically_after_item_coercion() {
        let rules = Validator::array()
            .items(Validator::number())
            .one_of([json!([1, 2])]);
        assert_eq!(validate(rules, json!([1, 2])), Ok(json!([1.0, 2.0])));
    }

    #[test]
    fn should_detect_numeric_duplicates_without_item_validator() {
        let rules = Validator::array().unique_items();
        assert_eq!(
            validate(rules.clone(), json!([1, 1.0])),
            Err(ValidationError::DuplicateItems)
        );
        assert_eq!(validate(rules, json!([1, 1.5])), Ok(json!([1, 1.5])));
    }

    #[test]
    fn should_render_nested_item_schema() {
        let validator = Validator::from(
            Validator::array()
                .min_items(1)
                .unique_items()
                .items(Validator::string()),
        );
        let schema = validator.schema();
        assert_eq!(schema["type"], json!("array"));
        assert_eq!(schema["minItems"], json!(1));
        assert_eq!(schema["uniqueItems"], json!(true));
        assert_eq!(schema["items"], json!({"type": "string"}));
    }
}
