//! Property definitions and the binding contract to host state.
//!
//! A property is a named, typed, validated slot. The host object owns the
//! actual value; the engine reaches it only through a [`PropertyAccessor`].
//! Two accessors are provided: [`StoredValue`] keeps the wire value itself,
//! [`FieldBinding`] projects a typed field out of a shared host object and
//! converts with serde.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::description::Link;
use crate::error::{DefinitionError, ValidationError};
use crate::metadata::Metadata;
use crate::validator::Validator;

/// Exclusive binding between a property and the host slot backing it.
pub trait PropertyAccessor: Send + Sync {
    /// Read the current host value as a wire value.
    fn get(&self) -> Value;

    /// Write an already-validated wire value into the host slot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Conversion`] when the host type cannot hold
    /// the value. The host slot must be left untouched in that case.
    fn set(&self, value: Value) -> Result<(), ValidationError>;

    /// Whether [`set`](Self::set) is supported.
    fn is_writable(&self) -> bool;
}

/// Accessor that stores the wire value directly.
#[derive(Debug)]
pub struct StoredValue {
    value: Mutex<Value>,
    writable: bool,
}

impl StoredValue {
    #[must_use]
    pub fn new(initial: Value) -> Self {
        Self {
            value: Mutex::new(initial),
            writable: true,
        }
    }

    /// A slot that only host code (via [`StoredValue::replace`]) can change.
    #[must_use]
    pub fn read_only(initial: Value) -> Self {
        Self {
            value: Mutex::new(initial),
            writable: false,
        }
    }

    /// Overwrite the stored value from host code, bypassing validation.
    pub fn replace(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl PropertyAccessor for StoredValue {
    fn get(&self) -> Value {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: Value) -> Result<(), ValidationError> {
        if !self.writable {
            return Err(ValidationError::Conversion {
                message: "slot is read-only".to_string(),
            });
        }
        self.replace(value);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

type Getter<H, T> = Box<dyn Fn(&H) -> T + Send + Sync>;
type Setter<H, T> = Box<dyn Fn(&mut H, T) + Send + Sync>;

/// Accessor projecting a typed field of a shared host object.
///
/// Reads serialize the field with serde; writes deserialize the wire value
/// into `T` before touching the host, so a conversion failure never leaves a
/// partial write behind.
pub struct FieldBinding<H, T> {
    host: Arc<Mutex<H>>,
    get: Getter<H, T>,
    set: Option<Setter<H, T>>,
}

impl<H, T> FieldBinding<H, T> {
    #[must_use]
    pub fn read_only(host: Arc<Mutex<H>>, get: impl Fn(&H) -> T + Send + Sync + 'static) -> Self {
        Self {
            host,
            get: Box::new(get),
            set: None,
        }
    }

    #[must_use]
    pub fn read_write(
        host: Arc<Mutex<H>>,
        get: impl Fn(&H) -> T + Send + Sync + 'static,
        set: impl Fn(&mut H, T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            host,
            get: Box::new(get),
            set: Some(Box::new(set)),
        }
    }
}

impl<H, T> fmt::Debug for FieldBinding<H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("writable", &self.set.is_some())
            .finish_non_exhaustive()
    }
}

impl<H, T> PropertyAccessor for FieldBinding<H, T>
where
    H: Send,
    T: Serialize + DeserializeOwned,
{
    /// Unserializable field values read as `null`.
    fn get(&self) -> Value {
        let host = self.host.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_value((self.get)(&host)).unwrap_or(Value::Null)
    }

    fn set(&self, value: Value) -> Result<(), ValidationError> {
        let Some(set) = &self.set else {
            return Err(ValidationError::Conversion {
                message: "field has no setter".to_string(),
            });
        };
        let typed: T = serde_json::from_value(value).map_err(|err| ValidationError::Conversion {
            message: err.to_string(),
        })?;
        let mut host = self.host.lock().unwrap_or_else(PoisonError::into_inner);
        set(&mut host, typed);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

/// Immutable definition of a property, built once at Thing registration.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub read_only: bool,
    pub validator: Validator,
    pub unit: Option<String>,
    pub metadata: Metadata,
    accessor: Arc<dyn PropertyAccessor>,
}

impl PropertyDescriptor {
    /// Create a builder for constructing a [`PropertyDescriptor`].
    #[must_use]
    pub fn builder() -> PropertyDescriptorBuilder {
        PropertyDescriptorBuilder::default()
    }

    #[must_use]
    pub fn accessor(&self) -> &dyn PropertyAccessor {
        self.accessor.as_ref()
    }

    /// Render the description entry for this property, linked at `href`.
    #[must_use]
    pub fn describe(&self, href: &str) -> Value {
        let mut entry = self.validator.schema();
        self.metadata.write_into(&mut entry);
        if let Some(unit) = &self.unit {
            entry.insert("unit".to_string(), Value::from(unit.as_str()));
        }
        entry.insert("readOnly".to_string(), Value::Bool(self.read_only));
        entry.insert("links".to_string(), Link::to("property", href).into_array());
        Value::Object(entry)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

/// Step-by-step builder for [`PropertyDescriptor`].
#[derive(Default)]
pub struct PropertyDescriptorBuilder {
    name: Option<String>,
    read_only: bool,
    validator: Option<Validator>,
    unit: Option<String>,
    metadata: Metadata,
    accessor: Option<Arc<dyn PropertyAccessor>>,
}

impl PropertyDescriptorBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Into<Validator>) -> Self {
        self.validator = Some(validator.into());
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

    #[must_use]
    pub fn accessor(self, accessor: impl PropertyAccessor + 'static) -> Self {
        self.shared_accessor(Arc::new(accessor))
    }

    /// Use an accessor the host keeps a handle to.
    #[must_use]
    pub fn shared_accessor(mut self, accessor: Arc<dyn PropertyAccessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Consume the builder and return a [`PropertyDescriptor`].
    ///
    /// Without an explicit validator the property accepts any non-null value.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when:
    /// - `name` is missing or empty ([`DefinitionError::EmptyName`])
    /// - no accessor was given ([`DefinitionError::MissingAccessor`])
    /// - the property is writable but the accessor is not
    ///   ([`DefinitionError::MissingSetter`])
    pub fn build(self) -> Result<PropertyDescriptor, DefinitionError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        let Some(accessor) = self.accessor else {
            return Err(DefinitionError::MissingAccessor { name });
        };
        if !self.read_only && !accessor.is_writable() {
            return Err(DefinitionError::MissingSetter { name });
        }
        Ok(PropertyDescriptor {
            name,
            read_only: self.read_only,
            validator: self.validator.unwrap_or_else(Validator::any),
            unit: self.unit,
            metadata: self.metadata,
            accessor,
        })
    }
}

/// Build the `{name: value}` map of a property set.
#[must_use]
pub fn value_map<'a>(values: impl IntoIterator<Item = (&'a str, Value)>) -> Map<String, Value> {
    values
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
