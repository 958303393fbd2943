#![forbid(unsafe_code)]

mod events;

use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use events::{
    gateway_event_manifest, manifest_entry, GatewayEventManifestEntry, GatewayEventScope,
    CONNECTION_REQUEST_EVENT, CONNECTION_UPDATE_EVENT, NEW_MESSAGE_EVENT,
};

/// Upper bound for one realtime text frame, in bytes.
pub const MAX_EVENT_BYTES: usize = 64 * 1024;

const MAX_EVENT_NAME_LEN: usize = 64;

/// A realtime push as it travels over the socket: `{ "event": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<T> {
    pub event: EventType,
    pub data: T,
}

/// Snake-case event name, e.g. `new_message`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        validate_event_type(name).map(|()| Self(name.to_owned()))
    }
}

impl TryFrom<String> for EventType {
    type Error = ProtocolError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        validate_event_type(&name)?;
        Ok(Self(name))
    }
}

impl TryFrom<&str> for EventType {
    type Error = ProtocolError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<EventType> for String {
    fn from(event: EventType) -> Self {
        event.0
    }
}

fn within_frame_limit(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_EVENT_BYTES {
        Err(ProtocolError::OversizedPayload {
            max: MAX_EVENT_BYTES,
            actual: len,
        })
    } else {
        Ok(())
    }
}

/// Wrap `data` as `{ event, data }` and render it as one JSON text frame.
/// Only events listed in [`gateway_event_manifest`] are emitted.
///
/// # Errors
/// Fails on a malformed or unlisted event name, a payload serde cannot encode,
/// or a frame larger than [`MAX_EVENT_BYTES`].
pub fn encode_envelope<T: Serialize>(event: &str, data: &T) -> Result<String, ProtocolError> {
    let event = event.parse::<EventType>()?;
    if manifest_entry(event.as_str()).is_none() {
        return Err(ProtocolError::UnlistedEventType);
    }
    let frame = serde_json::to_string(&Envelope { event, data })?;
    within_frame_limit(frame.len())?;
    Ok(frame)
}

/// Decode a frame received from the network.
///
/// # Errors
/// Fails on oversized input before touching the JSON, then on any decode error
/// (unknown keys and bad event names included).
pub fn parse_envelope<T: DeserializeOwned>(input: &[u8]) -> Result<Envelope<T>, ProtocolError> {
    within_frame_limit(input.len())?;
    serde_json::from_slice(input).map_err(ProtocolError::from)
}

pub(crate) fn validate_event_type(name: &str) -> Result<(), ProtocolError> {
    let allowed = |c: char| matches!(c, 'a'..='z' | '0'..='9' | '_' | '.');
    let fits = (1..=MAX_EVENT_NAME_LEN).contains(&name.len());
    if fits && name.chars().all(allowed) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidEventType)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame of {actual} bytes exceeds the {max} byte limit")]
    OversizedPayload { max: usize, actual: usize },
    #[error("event name must be 1-64 chars of a-z, 0-9, '_' or '.'")]
    InvalidEventType,
    #[error("event is not part of the gateway manifest")]
    UnlistedEventType,
    #[error("frame is not valid json for this envelope")]
    InvalidJson,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(_: serde_json::Error) -> Self {
        Self::InvalidJson
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        encode_envelope, gateway_event_manifest, parse_envelope, EventType, ProtocolError,
        MAX_EVENT_BYTES,
    };

    #[test]
    fn snake_case_names_are_event_types() {
        let event: EventType = "connection_request".parse().unwrap();
        assert_eq!(event.as_str(), "connection_request");
        assert_eq!(event.to_string(), "connection_request");
    }

    #[test]
    fn names_outside_the_allowlist_are_refused() {
        let too_long = "a".repeat(65);
        for name in ["new-message", "NewMessage", "", too_long.as_str()] {
            assert_eq!(
                EventType::try_from(name).unwrap_err(),
                ProtocolError::InvalidEventType,
                "{name:?}"
            );
        }
    }

    #[test]
    fn encoded_frame_is_event_plus_data() {
        let frame = encode_envelope("new_message", &json!({"content": "Hello"})).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"event": "new_message", "data": {"content": "Hello"}}));
    }

    #[test]
    fn only_manifest_events_are_encoded() {
        assert_eq!(
            encode_envelope("ready", &json!({})),
            Err(ProtocolError::UnlistedEventType)
        );
        assert_eq!(
            encode_envelope("new-message", &json!({})),
            Err(ProtocolError::InvalidEventType)
        );
        for entry in gateway_event_manifest() {
            assert!(encode_envelope(entry.event_type, &json!({})).is_ok());
        }
    }

    #[test]
    fn encoding_refuses_frames_over_the_limit() {
        let payload = "x".repeat(MAX_EVENT_BYTES);
        assert!(matches!(
            encode_envelope("new_message", &payload),
            Err(ProtocolError::OversizedPayload { .. })
        ));
    }

    #[test]
    fn inbound_frame_decodes_into_envelope() {
        let frame = br#"{"event":"connection_update","data":{"status":"ACCEPTED"}}"#;
        let envelope = parse_envelope::<Value>(frame).unwrap();
        assert_eq!(envelope.event.as_str(), "connection_update");
        assert_eq!(envelope.data["status"], "ACCEPTED");
    }

    #[test]
    fn inbound_frames_with_extra_keys_or_bad_names_fail_as_json() {
        let frames: [&[u8]; 2] = [
            br#"{"event":"new_message","data":{},"v":1}"#,
            br#"{"event":"New Message","data":{}}"#,
        ];
        for frame in frames {
            assert_eq!(
                parse_envelope::<Value>(frame).unwrap_err(),
                ProtocolError::InvalidJson
            );
        }
    }

    #[test]
    fn oversized_input_is_refused_before_decoding() {
        let input = vec![b' '; MAX_EVENT_BYTES + 1];
        assert_eq!(
            parse_envelope::<Value>(&input).unwrap_err(),
            ProtocolError::OversizedPayload {
                max: MAX_EVENT_BYTES,
                actual: MAX_EVENT_BYTES + 1,
            }
        );
    }
}
