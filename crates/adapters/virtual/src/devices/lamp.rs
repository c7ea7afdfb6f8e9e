//! Virtual lamp: switchable, dimmable, and warming up with its brightness.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;
use webthing_app::action_registry::ActionContext;
use webthing_app::thing::Thing;
use webthing_domain::action::ActionDescriptor;
use webthing_domain::error::{DefinitionError, HandlerError, WebThingError};
use webthing_domain::event::EventDescriptor;
use webthing_domain::options::ThingOptions;
use webthing_domain::property::{FieldBinding, PropertyDescriptor, StoredValue};
use webthing_domain::validator::Validator;

/// Temperature above which the lamp fires `overheated`.
pub const OVERHEAT_CELSIUS: f64 = 60.0;

const AMBIENT_CELSIUS: f64 = 21.5;
/// Degrees gained per brightness percent once warmed up.
const HEAT_PER_PERCENT: f64 = 0.45;
const FADE_STEPS: i64 = 10;
const MODEL: &str = "VL-100";

/// Host-side state of the lamp. The Thing reads and writes it through
/// field bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct LampState {
    pub on: bool,
    pub brightness: u8,
    pub temperature: f64,
}

impl Default for LampState {
    fn default() -> Self {
        Self {
            on: false,
            brightness: 50,
            temperature: AMBIENT_CELSIUS,
        }
    }
}

/// A simulated dimmable lamp.
pub struct VirtualLamp {
    state: Arc<Mutex<LampState>>,
    thing: Thing,
}

impl VirtualLamp {
    /// Build the lamp and its Thing.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when `id` is empty or `options` is invalid.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        options: ThingOptions,
    ) -> Result<Self, DefinitionError> {
        let state = Arc::new(Mutex::new(LampState::default()));

        let on = PropertyDescriptor::builder()
            .name("on")
            .title("On/Off")
            .description("Whether the lamp is turned on")
            .semantic_type("OnOffProperty")
            .validator(Validator::boolean())
            .accessor(FieldBinding::read_write(
                Arc::clone(&state),
                |lamp: &LampState| lamp.on,
                |lamp: &mut LampState, on: bool| lamp.on = on,
            ))
            .build()?;
        let brightness = PropertyDescriptor::builder()
            .name("brightness")
            .title("Brightness")
            .description("The level of light from 0-100")
            .semantic_type("BrightnessProperty")
            .unit("percent")
            .validator(Validator::integer().minimum(0).maximum(100))
            .accessor(FieldBinding::read_write(
                Arc::clone(&state),
                |lamp: &LampState| lamp.brightness,
                |lamp: &mut LampState, brightness: u8| lamp.brightness = brightness,
            ))
            .build()?;
        let temperature = PropertyDescriptor::builder()
            .name("temperature")
            .title("Temperature")
            .description("Housing temperature of the lamp")
            .semantic_type("TemperatureProperty")
            .unit("degree celsius")
            .read_only()
            .validator(Validator::number())
            .accessor(FieldBinding::read_only(
                Arc::clone(&state),
                |lamp: &LampState| lamp.temperature,
            ))
            .build()?;
        let model = PropertyDescriptor::builder()
            .name("model")
            .title("Model")
            .read_only()
            .validator(Validator::string())
            .accessor(StoredValue::read_only(Value::from(MODEL)))
            .build()?;

        let fade_action = ActionDescriptor::builder()
            .name("fade")
            .title("Fade")
            .description("Fade the lamp to a given level")
            .semantic_type("FadeAction")
            .input(
                Validator::object()
                    .required_field("brightness", Validator::integer().minimum(0).maximum(100))
                    .field("duration", Validator::integer().minimum(0)),
            )
            .build()?;
        let toggle_action = ActionDescriptor::builder()
            .name("toggle")
            .title("Toggle")
            .semantic_type("ToggleAction")
            .build()?;
        let overheated = EventDescriptor::builder()
            .name("overheated")
            .description("The lamp has exceeded its safe operating temperature")
            .semantic_type("OverheatedEvent")
            .unit("degree celsius")
            .data(Validator::number())
            .build()?;

        let thing = Thing::builder()
            .id(id)
            .title(title)
            .description("A simulated dimmable lamp")
            .semantic_type("OnOffSwitch")
            .semantic_type("Light")
            .options(options)
            .property(on)
            .property(brightness)
            .property(temperature)
            .property(model)
            .action(fade_action, fade)
            .action(toggle_action, toggle)
            .event(overheated)
            .build()?;

        Ok(Self { state, thing })
    }

    #[must_use]
    pub fn thing(&self) -> &Thing {
        &self.thing
    }

    #[must_use]
    pub fn state(&self) -> LampState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, LampState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the housing temperature halfway to its equilibrium and publish it.
    ///
    /// # Errors
    ///
    /// Propagates the Thing's error when the update cannot be published.
    pub fn tick(&self) -> Result<f64, WebThingError> {
        let temperature = {
            let mut lamp = self.lock();
            let target = if lamp.on {
                AMBIENT_CELSIUS + f64::from(lamp.brightness) * HEAT_PER_PERCENT
            } else {
                AMBIENT_CELSIUS
            };
            let next = lamp.temperature + (target - lamp.temperature) / 2.0;
            lamp.temperature = (next * 10.0).round() / 10.0;
            lamp.temperature
        };
        self.publish_temperature(temperature)?;
        Ok(temperature)
    }

    /// Record a temperature measured outside the simulation.
    ///
    /// # Errors
    ///
    /// Propagates the Thing's error when the update cannot be published.
    pub fn report_temperature(&self, celsius: f64) -> Result<(), WebThingError> {
        self.lock().temperature = celsius;
        self.publish_temperature(celsius)
    }

    fn publish_temperature(&self, celsius: f64) -> Result<(), WebThingError> {
        self.thing.sync_property("temperature")?;
        if celsius > OVERHEAT_CELSIUS {
            self.thing.fire_event("overheated", &json!(celsius))?;
        }
        Ok(())
    }
}

/// Step brightness towards the requested level over `duration` milliseconds.
async fn fade(context: ActionContext) -> Result<(), HandlerError> {
    let target = context.input["brightness"].as_i64().unwrap_or_default();
    let duration = context.input["duration"].as_u64().unwrap_or_default();
    let start = context
        .thing
        .get_property("brightness")
        .as_ref()
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let pause = Duration::from_millis(duration / FADE_STEPS.unsigned_abs());

    for step in 1..=FADE_STEPS {
        tokio::select! {
            () = context.cancellation.cancelled() => return Err(HandlerError::cancelled()),
            () = tokio::time::sleep(pause) => {}
        }
        let level = start + (target - start) * step / FADE_STEPS;
        context
            .thing
            .set_property("brightness", &json!(level))
            .map_err(|err| HandlerError::from_error(&err))?;
    }
    debug!(thing = %context.thing.id(), action = %context.id, brightness = target, "fade finished");
    Ok(())
}

async fn toggle(context: ActionContext) -> Result<(), HandlerError> {
    let on = context
        .thing
        .get_property("on")
        .as_ref()
        .and_then(Value::as_bool)
        .unwrap_or_default();
    context
        .thing
        .set_property("on", &Value::Bool(!on))
        .map_err(|err| HandlerError::from_error(&err))?;
    Ok(())
}
