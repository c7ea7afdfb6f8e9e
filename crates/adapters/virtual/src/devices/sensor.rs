//! Virtual humidity sensor: a read-only level following a slow sine wave.

use std::sync::{Arc, Mutex, PoisonError};

use webthing_app::thing::Thing;
use webthing_domain::error::{DefinitionError, WebThingError};
use webthing_domain::options::ThingOptions;
use webthing_domain::property::{FieldBinding, PropertyDescriptor};
use webthing_domain::validator::Validator;

const BASELINE_PERCENT: f64 = 50.0;
const SWING_PERCENT: f64 = 20.0;
/// Ticks per full oscillation.
const PERIOD: f64 = 48.0;

/// A simulated humidity sensor.
pub struct VirtualSensor {
    level: Arc<Mutex<f64>>,
    thing: Thing,
}

impl VirtualSensor {
    /// Build the sensor and its Thing.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when `id` is empty or `options` is invalid.
    pub fn new(id: impl Into<String>, options: ThingOptions) -> Result<Self, DefinitionError> {
        let level = Arc::new(Mutex::new(BASELINE_PERCENT));
        let property = PropertyDescriptor::builder()
            .name("level")
            .title("Humidity")
            .description("The current humidity in %")
            .semantic_type("LevelProperty")
            .unit("percent")
            .read_only()
            .validator(Validator::number().minimum(0).maximum(100))
            .accessor(FieldBinding::read_only(Arc::clone(&level), |level: &f64| {
                *level
            }))
            .build()?;
        let thing = Thing::builder()
            .id(id)
            .title("Virtual Humidity Sensor")
            .description("A simulated humidity sensor")
            .semantic_type("MultiLevelSensor")
            .options(options)
            .property(property)
            .build()?;
        Ok(Self { level, thing })
    }

    #[must_use]
    pub fn thing(&self) -> &Thing {
        &self.thing
    }

    #[must_use]
    pub fn level(&self) -> f64 {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the level for simulation step `step` and publish it.
    ///
    /// # Errors
    ///
    /// Propagates the Thing's error when the update cannot be published.
    pub fn tick(&self, step: u32) -> Result<f64, WebThingError> {
        let phase = f64::from(step) / PERIOD * std::f64::consts::TAU;
        let level = ((BASELINE_PERCENT + SWING_PERCENT * phase.sin()) * 10.0).round() / 10.0;
        self.report_level(level)?;
        Ok(level)
    }

    /// Record a measured level, clamped to 0-100.
    ///
    /// # Errors
    ///
    /// Propagates the Thing's error when the update cannot be published.
    pub fn report_level(&self, level: f64) -> Result<(), WebThingError> {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner) = level.clamp(0.0, 100.0);
        self.thing.sync_property("level")?;
        Ok(())
    }
}
