//! Dispatch of requests arriving on a subscriber's channel.
//!
//! Each entry of a request is applied independently; every failing entry
//! yields one `error` reply and the remaining entries still run. Successful
//! entries reply through the normal notifications only.

use tracing::debug;
use webthing_domain::id::SubscriberId;
use webthing_domain::message::{InboundMessage, OutboundMessage};

use crate::thing::Thing;

pub(crate) fn dispatch(
    thing: &Thing,
    subscriber: SubscriberId,
    message: InboundMessage,
) -> Vec<OutboundMessage> {
    let mut replies = Vec::new();
    match message {
        InboundMessage::SetProperty(values) => {
            for (name, value) in values {
                if let Err(err) = thing.set_property(&name, &value) {
                    debug!(thing = %thing.id(), %subscriber, property = %name, %err, "setProperty rejected");
                    replies.push(OutboundMessage::bad_request(error_chain(&err)));
                }
            }
        }
        InboundMessage::RequestAction(requests) => {
            for (name, request) in requests {
                if let Err(err) = thing.invoke_action(&name, &request.input) {
                    debug!(thing = %thing.id(), %subscriber, action = %name, %err, "requestAction rejected");
                    replies.push(OutboundMessage::bad_request(error_chain(&err)));
                }
            }
        }
        InboundMessage::AddEventSubscription(events) => {
            for name in events.keys() {
                if let Err(err) = thing.add_event_subscription(subscriber, name) {
                    debug!(thing = %thing.id(), %subscriber, event = %name, %err, "addEventSubscription rejected");
                    replies.push(OutboundMessage::bad_request(&err));
                }
            }
        }
    }
    replies
}

/// `outer: inner: ...` so validation details reach the client.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use webthing_domain::error::ValidationError;

    use crate::property_store::PropertyError;

    #[test]
    fn should_append_sources_to_error_message() {
        let err = PropertyError::InvalidValue {
            name: "brightness".to_string(),
            source: ValidationError::MissingField {
                field: "level".to_string(),
            },
        };
        let message = error_chain(&err);
        assert!(message.starts_with("invalid value for property brightness: "));
        assert!(message.contains("level"));
    }
}
