//! Events: named, fire-and-forget occurrences with validated data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::description::Link;
use crate::error::{DefinitionError, ValidationError};
use crate::metadata::Metadata;
use crate::time::{Timestamp, now};
use crate::validator::Validator;

/// Immutable definition of an event kind.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    pub name: String,
    pub data: Validator,
    pub unit: Option<String>,
    pub metadata: Metadata,
}

impl EventDescriptor {
    /// Create a builder for constructing an [`EventDescriptor`].
    #[must_use]
    pub fn builder() -> EventDescriptorBuilder {
        EventDescriptorBuilder::default()
    }

    /// Validate event data and stamp it into an instance.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the data schema.
    pub fn instantiate(&self, data: &Value) -> Result<EventInstance, ValidationError> {
        let data = self.data.validate(data)?;
        Ok(EventInstance {
            name: self.name.clone(),
            data,
            timestamp: now(),
        })
    }

    /// Render the description entry for this event, linked at `href`.
    #[must_use]
    pub fn describe(&self, href: &str) -> Value {
        let mut entry = self.data.schema();
        self.metadata.write_into(&mut entry);
        if let Some(unit) = &self.unit {
            entry.insert("unit".to_string(), Value::from(unit.as_str()));
        }
        entry.insert("links".to_string(), Link::to("event", href).into_array());
        Value::Object(entry)
    }
}

/// Step-by-step builder for [`EventDescriptor`].
#[derive(Debug, Default)]
pub struct EventDescriptorBuilder {
    name: Option<String>,
    data: Option<Validator>,
    unit: Option<String>,
    metadata: Metadata,
}

impl EventDescriptorBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn data(mut self, data: impl Into<Validator>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
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

    /// Consume the builder and return an [`EventDescriptor`].
    ///
    /// Without a data schema the event carries any value, including none.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::EmptyName`] if `name` is missing or empty.
    pub fn build(self) -> Result<EventDescriptor, DefinitionError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        Ok(EventDescriptor {
            name,
            data: self.data.unwrap_or_else(|| Validator::any().nullable()),
            unit: self.unit,
            metadata: self.metadata,
        })
    }
}

/// A fired event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInstance {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(with = "crate::time::rfc3339")]
    pub timestamp: Timestamp,
}

impl EventInstance {
    /// `{name: {data, timestamp}}`, the form used in history and notifications.
    #[must_use]
    pub fn keyed(&self) -> Value {
        let mut body = Map::new();
        if !self.data.is_null() {
            body.insert("data".to_string(), self.data.clone());
        }
        body.insert(
            "timestamp".to_string(),
            serde_json::to_value(self.timestamp).unwrap_or(Value::Null),
        );
        let mut keyed = Map::new();
        keyed.insert(self.name.clone(), Value::Object(body));
        Value::Object(keyed)
    }
}
