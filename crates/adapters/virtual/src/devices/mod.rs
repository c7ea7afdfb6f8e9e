//! Virtual device implementations: lamp and humidity sensor.
//!
//! Each device owns its host state and the Thing exposing it; the Thing
//! reaches the state only through field bindings.

mod lamp;
mod sensor;

pub use lamp::{LampState, OVERHEAT_CELSIUS, VirtualLamp};
pub use sensor::VirtualSensor;
