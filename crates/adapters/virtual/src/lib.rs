//! # webthing-adapter-virtual
//!
//! Simulated devices exposed as Things, for testing and demonstration.
//!
//! ## Provided devices
//!
//! | Device | Thing id | Behaviour |
//! |--------|----------|-----------|
//! | Virtual Lamp | `urn:dev:ops:virtual-lamp` | `on`, `brightness`, read-only `temperature` and `model`; `fade` / `toggle` actions; `overheated` event |
//! | Virtual Humidity Sensor | `urn:dev:ops:virtual-humidity` | read-only `level` |
//!
//! ## Dependency rule
//!
//! Depends on `webthing-app` and `webthing-domain` only.

mod devices;

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;
use webthing_app::thing::Thing;
use webthing_domain::error::{DefinitionError, WebThingError};
use webthing_domain::options::ThingOptions;

pub use devices::{LampState, OVERHEAT_CELSIUS, VirtualLamp, VirtualSensor};

pub const LAMP_ID: &str = "urn:dev:ops:virtual-lamp";
pub const LAMP_TITLE: &str = "Virtual Lamp";
pub const SENSOR_ID: &str = "urn:dev:ops:virtual-humidity";

/// The set of virtual devices driven by one simulation clock.
pub struct VirtualIntegration {
    lamp: VirtualLamp,
    sensor: VirtualSensor,
    step: AtomicU32,
}

impl VirtualIntegration {
    /// Build every virtual device with the default lamp identity.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when `options` is invalid.
    pub fn new(options: &ThingOptions) -> Result<Self, DefinitionError> {
        Self::with_lamp(LAMP_ID, LAMP_TITLE, options)
    }

    /// Build every virtual device. Each Thing is published under
    /// `things/<slug>` below the configured prefix.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when `lamp_id` is empty or `options` is
    /// invalid.
    pub fn with_lamp(
        lamp_id: &str,
        lamp_title: &str,
        options: &ThingOptions,
    ) -> Result<Self, DefinitionError> {
        let scoped = |slug: &str| ThingOptions {
            href_prefix: options.href(&format!("things/{slug}")),
            ..options.clone()
        };
        let integration = Self {
            lamp: VirtualLamp::new(lamp_id, lamp_title, scoped("lamp"))?,
            sensor: VirtualSensor::new(SENSOR_ID, scoped("humidity"))?,
            step: AtomicU32::new(0),
        };
        info!(things = 2, "virtual devices ready");
        Ok(integration)
    }

    #[must_use]
    pub fn lamp(&self) -> &VirtualLamp {
        &self.lamp
    }

    #[must_use]
    pub fn sensor(&self) -> &VirtualSensor {
        &self.sensor
    }

    #[must_use]
    pub fn things(&self) -> Vec<Thing> {
        vec![self.lamp.thing().clone(), self.sensor.thing().clone()]
    }

    /// Advance the simulation by one step.
    ///
    /// # Errors
    ///
    /// Propagates the first Thing error raised while publishing readings.
    pub fn tick(&self) -> Result<(), WebThingError> {
        let step = self.step.fetch_add(1, Ordering::Relaxed);
        self.lamp.tick()?;
        self.sensor.tick(step)?;
        Ok(())
    }

    /// Cancel running actions and drop subscribers on every Thing.
    pub fn shutdown(&self) {
        for thing in self.things() {
            thing.shutdown();
        }
    }
}
