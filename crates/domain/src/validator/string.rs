//! String constraints: length, pattern and enum.

use regex::Regex;
use serde_json::{Map, Value};

use super::{Validator, ValidatorKind, mismatch};
use crate::error::{DefinitionError, ValidationError};
use crate::value::ValueType;

/// Constraints for string values. Lengths count characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    enumeration: Vec<String>,
}

impl StringRules {
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Require the value to contain a match for `pattern` (unanchored).
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::InvalidPattern`] if `pattern` does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, DefinitionError> {
        let regex = Regex::new(pattern).map_err(|source| DefinitionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Restrict the value to one of `values`.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn nullable(self) -> Validator {
        Validator::from(self).nullable()
    }

    pub(super) fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let Value::String(text) = value else {
            return Err(mismatch(ValueType::String, value));
        };

        let length = text.chars().count();
        if let Some(min) = self.min_length
            && length < min
        {
            return Err(ValidationError::TooShort {
                min,
                actual: length,
            });
        }
        if let Some(max) = self.max_length
            && length > max
        {
            return Err(ValidationError::TooLong {
                max,
                actual: length,
            });
        }
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(text)
        {
            return Err(ValidationError::PatternMismatch {
                pattern: pattern.as_str().to_string(),
            });
        }
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == text) {
            return Err(ValidationError::NotInEnum);
        }

        Ok(value.clone())
    }

    pub(super) fn write_schema(&self, schema: &mut Map<String, Value>) {
        if let Some(min) = self.min_length {
            schema.insert("minLength".to_string(), Value::from(min));
        }
        if let Some(max) = self.max_length {
            schema.insert("maxLength".to_string(), Value::from(max));
        }
        if let Some(pattern) = &self.pattern {
            schema.insert("pattern".to_string(), Value::from(pattern.as_str()));
        }
        if !self.enumeration.is_empty() {
            schema.insert("enum".to_string(), Value::from(self.enumeration.clone()));
        }
    }
}

impl From<StringRules> for Validator {
    fn from(rules: StringRules) -> Self {
        Validator::new(ValidatorKind::String(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(rules: StringRules, value: Value) -> Result<Value, ValidationError> {
        Validator::from(rules).validate(&value)
    }

    #[test]
    fn should_accept_string_within_length_bounds() {
        let rules = Validator::string().min_length(2).max_length(4);
        assert_eq!(validate(rules, json!("abc")), Ok(json!("abc")));
    }

    #[test]
    fn should_reject_string_shorter_than_min_length() {
        let rules = Validator::string().min_length(3);
        assert_eq!(
            validate(rules, json!("ab")),
            Err(ValidationError::TooShort { min: 3, actual: 2 })
        );
    }

    #[test]
    fn should_reject_string_longer_than_max_length() {
        let rules = Validator::string().max_length(3);
        assert_eq!(
            validate(rules, json!("abcd")),
            Err(ValidationError::TooLong { max: 3, actual: 4 })
        );
    }

    #[test]
    fn should_count_characters_not_bytes() {
        let rules = Validator::string().max_length(2);
        assert_eq!(validate(rules, json!("°C")), Ok(json!("°C")));
    }

    #[test]
    fn should_match_pattern_anywhere_in_value() {
        let rules = Validator::string().pattern("[0-9]+").unwrap();
        assert!(validate(rules.clone(), json!("room 12")).is_ok());
        assert_eq!(
            validate(rules, json!("kitchen")),
            Err(ValidationError::PatternMismatch {
                pattern: "[0-9]+".to_string()
            })
        );
    }

    #[test]
    fn should_return_definition_error_when_pattern_is_invalid() {
        let result = Validator::string().pattern("(unclosed");
        assert!(matches!(
            result,
            Err(DefinitionError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn should_check_enum_after_length_bounds() {
        let rules = Validator::string().max_length(3).one_of(["red", "green"]);
        assert_eq!(
            validate(rules.clone(), json!("green")),
            Err(ValidationError::TooLong { max: 3, actual: 5 })
        );
        assert_eq!(validate(rules.clone(), json!("red")), Ok(json!("red")));
        assert_eq!(
            validate(rules, json!("blu")),
            Err(ValidationError::NotInEnum)
        );
    }

    #[test]
    fn should_reject_non_string_values() {
        let rules = Validator::string();
        assert_eq!(
            validate(rules, json!(12)),
            Err(ValidationError::TypeMismatch {
                expected: ValueType::String,
                actual: ValueType::Integer,
            })
        );
    }

    #[test]
    fn should_render_string_constraints_in_schema() {
        let validator = Validator::from(
            Validator::string()
                .min_length(1)
                .max_length(8)
                .one_of(["a", "b"]),
        );
        let schema = validator.schema();
        assert_eq!(schema["type"], json!("string"));
        assert_eq!(schema["minLength"], json!(1));
        assert_eq!(schema["maxLength"], json!(8));
        assert_eq!(schema["enum"], json!(["a", "b"]));
    }
}
