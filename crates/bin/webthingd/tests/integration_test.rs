//! End-to-end smoke tests for the wired daemon stack.
//!
//! Each test builds the virtual devices the way `webthingd` does and talks
//! to them over an in-process channel subscriber, exactly as a transport
//! would: inbound requests through `handle_message`, outbound notifications
//! from the subscriber stream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use webthing_adapter_virtual::{OVERHEAT_CELSIUS, VirtualIntegration};
use webthing_app::channel_subscriber::ChannelSubscriber;
use webthing_app::thing::Thing;
use webthing_domain::action::ActionStatus;
use webthing_domain::id::SubscriberId;
use webthing_domain::options::ThingOptions;

struct Client {
    _subscriber: Arc<ChannelSubscriber>,
    id: SubscriberId,
    inbox: ReceiverStream<Arc<[u8]>>,
}

impl Client {
    fn connect(thing: &Thing) -> Self {
        let (subscriber, inbox) = ChannelSubscriber::with_stream(64);
        let subscriber = Arc::new(subscriber);
        let id = thing.subscribe(&subscriber);
        Self {
            _subscriber: subscriber,
            id,
            inbox,
        }
    }

    async fn next(&mut self) -> Value {
        let bytes = tokio::time::timeout(Duration::from_secs(2), self.inbox.next())
            .await
            .expect("no message within two seconds")
            .expect("inbox closed");
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Skip messages until one of `message_type` arrives.
    async fn next_of(&mut self, message_type: &str) -> Value {
        loop {
            let message = self.next().await;
            if message["messageType"] == json!(message_type) {
                return message;
            }
        }
    }
}

fn integration() -> VirtualIntegration {
    VirtualIntegration::new(&ThingOptions::default()).expect("virtual devices should build")
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_describe_lamp_with_all_interactions() {
    let integration = integration();
    let description = serde_json::to_value(integration.lamp().thing().describe()).unwrap();

    assert_eq!(description["@context"], json!("https://iot.mozilla.org/schemas"));
    assert_eq!(description["title"], json!("Virtual Lamp"));
    assert_eq!(description["properties"]["brightness"]["minimum"], json!(0));
    assert_eq!(description["properties"]["brightness"]["maximum"], json!(100));
    assert_eq!(description["properties"]["temperature"]["readOnly"], json!(true));
    assert_eq!(
        description["actions"]["fade"]["input"]["required"],
        json!(["brightness"])
    );
    assert_eq!(description["events"]["overheated"]["type"], json!("number"));
}

// ---------------------------------------------------------------------------
// Inbound protocol
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_toggle_lamp_via_request_action() {
    let integration = integration();
    let thing = integration.lamp().thing();
    let mut client = Client::connect(thing);

    let replies = thing.handle_message(
        client.id,
        br#"{"messageType": "requestAction", "data": {"toggle": {}}}"#,
    );
    assert!(replies.is_empty());

    let status = client.next_of("propertyStatus").await;
    assert_eq!(status["data"], json!({"on": true}));
    assert!(integration.lamp().state().on);
}

#[tokio::test]
async fn should_reject_out_of_range_brightness_from_client() {
    let integration = integration();
    let thing = integration.lamp().thing();
    let mut client = Client::connect(thing);

    thing.handle_message(
        client.id,
        br#"{"messageType": "setProperty", "data": {"brightness": 101}}"#,
    );

    let reply = client.next().await;
    assert_eq!(reply["messageType"], json!("error"));
    assert_eq!(integration.lamp().state().brightness, 50);
}

#[tokio::test]
async fn should_stream_fade_progress_to_client() {
    let integration = integration();
    let thing = integration.lamp().thing();
    let mut client = Client::connect(thing);

    thing.handle_message(
        client.id,
        br#"{"messageType": "requestAction", "data": {"fade": {"input": {"brightness": 60, "duration": 10}}}}"#,
    );

    let mut last = Value::Null;
    loop {
        let message = client.next().await;
        if message["messageType"] == json!("propertyStatus") {
            last = message["data"]["brightness"].clone();
        }
        if message["data"]["fade"]["status"] == json!("completed") {
            break;
        }
    }
    assert_eq!(last, json!(60));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_notify_subscribed_client_when_lamp_overheats() {
    let integration = integration();
    let thing = integration.lamp().thing();
    let mut client = Client::connect(thing);
    thing.handle_message(
        client.id,
        br#"{"messageType": "addEventSubscription", "data": {"overheated": {}}}"#,
    );

    integration
        .lamp()
        .report_temperature(OVERHEAT_CELSIUS + 5.0)
        .unwrap();

    let event = client.next_of("event").await;
    assert_eq!(event["data"]["overheated"]["data"], json!(OVERHEAT_CELSIUS + 5.0));
}

#[tokio::test]
async fn should_publish_sensor_level_on_tick() {
    let integration = integration();
    let mut client = Client::connect(integration.sensor().thing());

    integration.tick().unwrap();
    integration.tick().unwrap();

    let status = client.next_of("propertyStatus").await;
    assert!(status["data"]["level"].is_number());
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_stop_running_fade_on_shutdown() {
    let integration = integration();
    let thing = integration.lamp().thing().clone();
    let queued = thing
        .invoke_action("fade", &json!({"brightness": 0, "duration": 60_000}))
        .unwrap();

    integration.shutdown();

    let status = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let status = thing.describe_action(queued.id).map(|a| a.status);
            if status.is_some_and(ActionStatus::is_terminal) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(status, Some(ActionStatus::Error));
}
