//! Inbound message routing
//!
//! A topic containing the query suffix after its first character is a state
//! query; anything else is matched against the control topics.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::bus::BusClient;
use crate::device::{DeviceCommand, DeviceCommander};
use crate::error::{BridgeError, Result};
use crate::state::InputId;
use crate::topics::{Channel, QUERY_SUFFIX};

/// How an inbound topic is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Request for the cached value of `requested`
    Query { requested: &'a str },
    /// Candidate control command
    Control,
}

pub fn classify(topic: &str) -> Route<'_> {
    match topic.find(QUERY_SUFFIX) {
        Some(i) if i > 0 => Route::Query {
            requested: &topic[..i],
        },
        _ => Route::Control,
    }
}

/// Control payload: `{"value": ...}`, other fields ignored
#[derive(Debug, Deserialize)]
struct ControlPayload<T> {
    value: T,
}

/// On/off accepted as a boolean or a number (non-zero is on)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Switch {
    Bool(bool),
    Number(f64),
}

impl From<Switch> for bool {
    fn from(s: Switch) -> bool {
        match s {
            Switch::Bool(b) => b,
            Switch::Number(n) => n != 0.0,
        }
    }
}

/// Input id accepted as a string or an integer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputValue {
    Text(String),
    Number(u64),
}

impl From<InputValue> for InputId {
    fn from(v: InputValue) -> InputId {
        match v {
            InputValue::Text(s) => InputId(s),
            InputValue::Number(n) => InputId(n.to_string()),
        }
    }
}

fn parse_value<'de, T: Deserialize<'de>>(payload: &'de [u8]) -> Result<T> {
    Ok(serde_json::from_slice::<ControlPayload<T>>(payload)?.value)
}

/// Decode a control payload for a channel into a receiver command
pub fn parse_command(channel: Channel, payload: &[u8]) -> Result<DeviceCommand> {
    let command = match channel {
        Channel::Power => DeviceCommand::Power(parse_value::<Switch>(payload)?.into()),
        Channel::Volume => DeviceCommand::Volume(parse_value(payload)?),
        Channel::Mute => DeviceCommand::Mute(parse_value::<Switch>(payload)?.into()),
        Channel::Source => DeviceCommand::SelectInput(parse_value::<InputValue>(payload)?.into()),
        Channel::Sources => {
            return Err(BridgeError::InvalidCommand(
                "the sources channel is read-only".to_string(),
            ))
        },
    };
    Ok(command)
}

impl<D: DeviceCommander, B: BusClient> super::Bridge<D, B> {
    /// Handle one inbound bus message
    pub fn on_bus_message(&self, topic: &str, payload: &[u8]) {
        debug!("📥 {} : {}", topic, String::from_utf8_lossy(payload));

        match classify(topic) {
            Route::Query { requested } => match std::str::from_utf8(payload) {
                Ok(reply_topic) => self.handle_query(requested, reply_topic),
                Err(_) => warn!("Query on {} has a non UTF-8 reply topic, dropped", topic),
            },
            Route::Control => self.handle_control(topic, payload),
        }
    }

    fn handle_control(&self, topic: &str, payload: &[u8]) {
        let Some(channel) = self.topics.channel_for_inbound(topic) else {
            debug!("Ignoring message on unhandled topic {}", topic);
            return;
        };

        let command = match parse_command(channel, payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping {} control message: {}", channel, e);
                return;
            },
        };

        debug!(?command, "Forwarding {} command to receiver", channel);
        if let Err(e) = self.device.send(command) {
            warn!("Receiver rejected {} command: {}", channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("/meem/x/power/out?"),
            Route::Query {
                requested: "/meem/x/power/out"
            }
        );
        assert_eq!(
            classify("a/b?c?"),
            Route::Query { requested: "a/b" }
        );
        assert_eq!(classify("?leading"), Route::Control);
        assert_eq!(classify("/meem/x/power/in"), Route::Control);
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command(Channel::Power, br#"{"value":true}"#).unwrap(),
            DeviceCommand::Power(true)
        );
        assert_eq!(
            parse_command(Channel::Power, br#"{"value":0}"#).unwrap(),
            DeviceCommand::Power(false)
        );
        assert_eq!(
            parse_command(Channel::Volume, br#"{"value":-32.5,"unit":"dB"}"#).unwrap(),
            DeviceCommand::Volume(-32.5)
        );
        assert_eq!(
            parse_command(Channel::Mute, br#"{"value":false}"#).unwrap(),
            DeviceCommand::Mute(false)
        );
        assert_eq!(
            parse_command(Channel::Source, br#"{"value":25}"#).unwrap(),
            DeviceCommand::SelectInput("25".into())
        );
        assert_eq!(
            parse_command(Channel::Source, br#"{"value":"19"}"#).unwrap(),
            DeviceCommand::SelectInput("19".into())
        );
    }

    #[test]
    fn test_parse_command_rejects_malformed() {
        assert!(parse_command(Channel::Power, b"on").is_err());
        assert!(parse_command(Channel::Volume, br#"{"level":-20}"#).is_err());
        assert!(parse_command(Channel::Volume, br#"{"value":"loud"}"#).is_err());
        assert!(parse_command(Channel::Source, br#"{"value":null}"#).is_err());
        assert!(parse_command(Channel::Sources, br#"{"value":"19"}"#).is_err());
    }
}
