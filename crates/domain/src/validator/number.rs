//! Integer and number constraints.
//!
//! Bounds are held as `f64`. The integer kind coerces float-shaped integral
//! values (`10.0`) to integers and checks `multipleOf` with an integer
//! remainder; the number kind coerces everything to floating point and uses
//! an exact floating-point remainder, so `0.3` is *not* a multiple of `0.1`.

use serde_json::{Map, Value};

use super::{Validator, ValidatorKind, mismatch};
use crate::error::ValidationError;
use crate::value::ValueType;

/// 2^63 as a float; the first value past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Constraints for numeric values.
#[derive(Debug, Clone, Default)]
pub struct NumberRules {
    integer: bool,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    multiple_of: Option<f64>,
    enumeration: Vec<f64>,
}

impl NumberRules {
    pub(super) fn integer() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    pub(super) fn number() -> Self {
        Self::default()
    }

    /// Whether this is the integer kind.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.integer
    }

    #[must_use]
    pub fn minimum(mut self, minimum: impl Into<f64>) -> Self {
        self.minimum = Some(minimum.into());
        self
    }

    #[must_use]
    pub fn maximum(mut self, maximum: impl Into<f64>) -> Self {
        self.maximum = Some(maximum.into());
        self
    }

    #[must_use]
    pub fn exclusive_minimum(mut self, minimum: impl Into<f64>) -> Self {
        self.exclusive_minimum = Some(minimum.into());
        self
    }

    #[must_use]
    pub fn exclusive_maximum(mut self, maximum: impl Into<f64>) -> Self {
        self.exclusive_maximum = Some(maximum.into());
        self
    }

    /// Require `value % multiple_of == 0`. `multiple_of` should be positive;
    /// zero rejects every value.
    #[must_use]
    pub fn multiple_of(mut self, multiple_of: impl Into<f64>) -> Self {
        self.multiple_of = Some(multiple_of.into());
        self
    }

    /// Restrict the value to one of `values`, compared numerically.
    #[must_use]
    pub fn one_of<I, N>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<f64>,
    {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn nullable(self) -> Validator {
        Validator::from(self).nullable()
    }

    fn value_type(&self) -> ValueType {
        if self.integer {
            ValueType::Integer
        } else {
            ValueType::Number
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn coerce(&self, value: &Value) -> Result<Value, ValidationError> {
        let Value::Number(number) = value else {
            return Err(mismatch(self.value_type(), value));
        };

        if !self.integer {
            return Ok(number.as_f64().map_or_else(|| value.clone(), Value::from));
        }
        if number.is_i64() || number.is_u64() {
            return Ok(value.clone());
        }
        match number.as_f64() {
            Some(float) if float.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&float) => {
                Ok(Value::from(float as i64))
            }
            _ => Err(mismatch(ValueType::Integer, value)),
        }
    }

    #[allow(clippy::float_cmp)]
    pub(super) fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let coerced = self.coerce(value)?;
        let actual = coerced.as_f64().unwrap_or_default();

        if let Some(minimum) = self.minimum
            && actual < minimum
        {
            return Err(ValidationError::BelowMinimum { minimum, actual });
        }
        if let Some(maximum) = self.maximum
            && actual > maximum
        {
            return Err(ValidationError::AboveMaximum { maximum, actual });
        }
        if let Some(minimum) = self.exclusive_minimum
            && actual <= minimum
        {
            return Err(ValidationError::NotAboveExclusiveMinimum { minimum, actual });
        }
        if let Some(maximum) = self.exclusive_maximum
            && actual >= maximum
        {
            return Err(ValidationError::NotBelowExclusiveMaximum { maximum, actual });
        }
        if let Some(multiple_of) = self.multiple_of
            && !self.is_multiple(&coerced, actual, multiple_of)
        {
            return Err(ValidationError::NotMultipleOf {
                multiple_of,
                actual,
            });
        }
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| *e == actual) {
            return Err(ValidationError::NotInEnum);
        }

        Ok(coerced)
    }

    fn is_multiple(&self, coerced: &Value, actual: f64, multiple_of: f64) -> bool {
        if self.integer
            && let (Some(value), Some(divisor)) = (coerced.as_i64(), integral(multiple_of))
            && divisor != 0
        {
            return i128::from(value) % i128::from(divisor) == 0;
        }
        actual % multiple_of == 0.0
    }

    pub(super) fn write_schema(&self, schema: &mut Map<String, Value>) {
        let entries = [
            ("minimum", self.minimum),
            ("maximum", self.maximum),
            ("exclusiveMinimum", self.exclusive_minimum),
            ("exclusiveMaximum", self.exclusive_maximum),
            ("multipleOf", self.multiple_of),
        ];
        for (key, bound) in entries {
            if let Some(bound) = bound {
                schema.insert(key.to_string(), self.render(bound));
            }
        }
        if !self.enumeration.is_empty() {
            let values = self.enumeration.iter().map(|e| self.render(*e)).collect();
            schema.insert("enum".to_string(), Value::Array(values));
        }
    }

    fn render(&self, number: f64) -> Value {
        match integral(number) {
            Some(int) if self.integer => Value::from(int),
            _ => Value::from(number),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(number: f64) -> Option<i64> {
    (number.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&number)).then_some(number as i64)
}

impl From<NumberRules> for Validator {
    fn from(rules: NumberRules) -> Self {
        Validator::new(ValidatorKind::Number(rules))
    }
}
