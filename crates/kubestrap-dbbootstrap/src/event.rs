//! Notification envelope classification
//!
//! The handler is subscribed to database instance notifications delivered
//! through SNS. Only the "instance started" event triggers a bootstrap.

use serde_json::Value as JsonValue;

/// Event id of a database instance that has started
pub const INSTANCE_STARTED_EVENT_ID: &str = "RDS-EVENT-0088";

/// Outcome of classifying an invocation payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// The instance started; bootstrap should run
    Accepted { message: String },
    /// Anything else, including malformed envelopes
    Rejected { message: String, reason: String },
}

impl EventClass {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Classify `Records[0].Sns.Message` by its `MessageAttributes.EventID.Value`
pub fn classify(event: &JsonValue) -> EventClass {
    let Some(message) = event
        .pointer("/Records/0/Sns/Message")
        .and_then(JsonValue::as_str)
    else {
        return EventClass::Rejected {
            message: event.to_string(),
            reason: "envelope has no Records[0].Sns.Message".to_string(),
        };
    };

    let parsed: JsonValue = match serde_json::from_str(message) {
        Ok(parsed) => parsed,
        Err(e) => {
            return EventClass::Rejected {
                message: message.to_string(),
                reason: format!("message is not JSON: {}", e),
            };
        }
    };

    match parsed
        .pointer("/MessageAttributes/EventID/Value")
        .and_then(JsonValue::as_str)
    {
        Some(INSTANCE_STARTED_EVENT_ID) => EventClass::Accepted {
            message: message.to_string(),
        },
        Some(other) => EventClass::Rejected {
            message: message.to_string(),
            reason: format!("event id {}", other),
        },
        None => EventClass::Rejected {
            message: message.to_string(),
            reason: "message has no EventID attribute".to_string(),
        },
    }
}
