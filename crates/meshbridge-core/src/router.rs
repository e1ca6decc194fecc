//! [`CommandRouter`] – parses inbound bus messages into controller commands.
//!
//! Two topic shapes are understood (topics are matched case-insensitively):
//!
//! * `{prefix}/set/{a}` or `{prefix}/set/{a}/{b}` – set a value.  The
//!   segments after `set` are split on `-` and must yield exactly four
//!   integers `address-class-instance-index`, e.g. `zwave/set/3-38-1-0`.  The
//!   payload is a JSON object whose `val` field holds the new scalar.
//! * `{prefix}/cmd/{name}` – controller command.  Only `scan` (network
//!   inclusion) is implemented; other names are accepted and ignored.
//!
//! Routing never blocks and never answers on the bus.  Any error is returned
//! to the caller, which logs it and drops the message.

use meshbridge_types::{BridgeError, ControllerCommand, HomeId, InboundMessage, Scalar, ValueId};
use tracing::debug;

use crate::registry::Registry;
use crate::topics::{CMD_SEGMENT, SET_SEGMENT};

/// Name of the network-inclusion command.
pub const SCAN_COMMAND: &str = "scan";

/// A syntactically valid inbound request, before validation against the
/// registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SetValue { id: ValueId, value: Scalar },
    Scan { secure: bool },
    /// A `cmd/{name}` this bridge does not implement.
    Unsupported { name: String },
}

#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: String,
}

impl CommandRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
        }
    }

    /// Parse `topic` and `payload` into a [`Request`].
    ///
    /// # Errors
    ///
    /// [`BridgeError::CommandParse`] for topics outside the bridge's
    /// namespace, malformed device-command addresses, and payloads without a
    /// scalar `val`.
    pub fn parse(&self, topic: &str, payload: &[u8]) -> Result<Request, BridgeError> {
        let lowered = topic.to_lowercase();
        let rest = lowered
            .strip_prefix(&self.prefix)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| BridgeError::parse(topic, "topic is outside the bridge prefix"))?;

        let mut segments = rest.split('/');
        match segments.next() {
            Some(SET_SEGMENT) => {
                let address: Vec<&str> = segments.collect();
                let id = parse_value_address(topic, &address)?;
                let value = parse_set_payload(topic, payload)?;
                Ok(Request::SetValue { id, value })
            }
            Some(CMD_SEGMENT) => match (segments.next(), segments.next()) {
                (Some(name), None) if !name.is_empty() => {
                    if name == SCAN_COMMAND {
                        Ok(Request::Scan {
                            secure: parse_scan_payload(topic, payload)?,
                        })
                    } else {
                        Ok(Request::Unsupported {
                            name: name.to_string(),
                        })
                    }
                }
                _ => Err(BridgeError::parse(topic, "expected cmd/{name}")),
            },
            _ => Err(BridgeError::parse(topic, "expected set/… or cmd/…")),
        }
    }

    /// Parse and validate `message`, returning the controller command to
    /// dispatch, or `None` when the request needs no controller call.
    ///
    /// # Errors
    ///
    /// Everything [`parse`](Self::parse) returns, plus
    /// [`BridgeError::UnknownDevice`] for set commands addressed to a device
    /// the registry does not hold, [`BridgeError::ReadOnlyValue`] for values
    /// the controller marked read-only, and [`BridgeError::DriverNotReady`]
    /// for `scan` before the controller reported its home network.
    pub fn route(
        &self,
        registry: &Registry,
        home_id: Option<HomeId>,
        message: &InboundMessage,
    ) -> Result<Option<ControllerCommand>, BridgeError> {
        debug!(topic = %message.topic, payload = %String::from_utf8_lossy(&message.payload), "incoming message");

        match self.parse(&message.topic, &message.payload)? {
            Request::SetValue { id, value } => {
                registry.device(id.address)?;
                if registry.value(&id).is_some_and(|v| v.read_only) {
                    return Err(BridgeError::ReadOnlyValue(id));
                }
                Ok(Some(ControllerCommand::SetValue { id, value }))
            }
            Request::Scan { secure } => {
                let home_id = home_id.ok_or(BridgeError::DriverNotReady)?;
                Ok(Some(ControllerCommand::AddNode { home_id, secure }))
            }
            Request::Unsupported { name } => {
                debug!(command = %name, "command not yet supported");
                Ok(None)
            }
        }
    }
}

fn parse_value_address(topic: &str, segments: &[&str]) -> Result<ValueId, BridgeError> {
    if segments.is_empty() || segments.len() > 2 || segments.iter().any(|s| s.is_empty()) {
        return Err(BridgeError::parse(topic, "expected set/{address} or set/{a}/{b}"));
    }
    let fields: Vec<&str> = segments.iter().flat_map(|s| s.split('-')).collect();
    fields
        .join("-")
        .parse::<ValueId>()
        .map_err(|reason| BridgeError::parse(topic, reason))
}

fn parse_set_payload(topic: &str, payload: &[u8]) -> Result<Scalar, BridgeError> {
    let json: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| BridgeError::parse(topic, format!("payload is not JSON: {e}")))?;
    let object = json
        .as_object()
        .ok_or_else(|| BridgeError::parse(topic, "payload must be a JSON object"))?;
    match object.get("val") {
        None | Some(serde_json::Value::Null) => {
            Err(BridgeError::parse(topic, "payload has no 'val'"))
        }
        Some(val) => Scalar::from_json(val)
            .ok_or_else(|| BridgeError::parse(topic, "'val' must be a scalar")),
    }
}

/// `scan` takes an optional `{"secure": bool}`; an empty payload means an
/// insecure inclusion.
fn parse_scan_payload(topic: &str, payload: &[u8]) -> Result<bool, BridgeError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(false);
    }
    let json: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| BridgeError::parse(topic, format!("payload is not JSON: {e}")))?;
    match json.get("secure") {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(serde_json::Value::Bool(secure)) => Ok(*secure),
        Some(_) => Err(BridgeError::parse(topic, "'secure' must be a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbridge_types::{DeviceAddress, ValueDescriptor};

    fn router() -> CommandRouter {
        CommandRouter::new("zwave")
    }

    fn registry_with_device(address: u32) -> Registry {
        let mut registry = Registry::new();
        registry.upsert_device(DeviceAddress(address));
        registry
    }

    fn msg(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage::new(topic, payload.as_bytes().to_vec())
    }

    #[test]
    fn set_command_resolves_to_set_value() {
        let registry = registry_with_device(3);
        let cmd = router()
            .route(&registry, None, &msg("zwave/set/3-38-1-0", r#"{"val": 99}"#))
            .unwrap();
        assert_eq!(
            cmd,
            Some(ControllerCommand::SetValue {
                id: ValueId::new(3, 38, 1, 0),
                value: Scalar::Integer(99),
            })
        );
    }

    #[test]
    fn set_command_accepts_split_address() {
        let request = router()
            .parse("zwave/set/3-38/1-0", br#"{"val": true}"#)
            .unwrap();
        assert_eq!(
            request,
            Request::SetValue {
                id: ValueId::new(3, 38, 1, 0),
                value: Scalar::Bool(true),
            }
        );
    }

    #[test]
    fn topic_is_matched_case_insensitively() {
        let r = CommandRouter::new("ZWave");
        assert!(matches!(
            r.parse("ZWAVE/SET/3-38-1-0", br#"{"val": 1}"#),
            Ok(Request::SetValue { .. })
        ));
    }

    #[test]
    fn short_address_is_a_parse_error() {
        let registry = registry_with_device(3);
        let result = router().route(&registry, None, &msg("zwave/set/3-38", r#"{"val": 99}"#));
        assert!(matches!(result, Err(BridgeError::CommandParse { .. })));
    }

    #[test]
    fn malformed_integers_are_parse_errors() {
        for topic in [
            "zwave/set/3-38-1-x",
            "zwave/set/0-38-1-0",
            "zwave/set/3-38-1-0-7",
            "zwave/set/3-999-1-0",
            "zwave/set/",
        ] {
            assert!(
                matches!(router().parse(topic, br#"{"val": 1}"#), Err(BridgeError::CommandParse { .. })),
                "{topic} should not parse"
            );
        }
    }

    #[test]
    fn missing_or_invalid_val_is_a_parse_error() {
        for payload in ["", "99", r#"{"value": 99}"#, r#"{"val": null}"#, r#"{"val": [1]}"#] {
            assert!(
                matches!(
                    router().parse("zwave/set/3-38-1-0", payload.as_bytes()),
                    Err(BridgeError::CommandParse { .. })
                ),
                "payload {payload:?} should not parse"
            );
        }
    }

    #[test]
    fn set_on_unknown_device_is_rejected() {
        let registry = Registry::new();
        let result = router().route(&registry, None, &msg("zwave/set/3-38-1-0", r#"{"val": 1}"#));
        assert_eq!(result, Err(BridgeError::UnknownDevice(DeviceAddress(3))));
    }

    #[test]
    fn set_on_read_only_value_is_rejected() {
        let mut registry = registry_with_device(3);
        let id = ValueId::new(3, 49, 1, 1);
        let mut descriptor = ValueDescriptor::new(id);
        descriptor.read_only = Some(true);
        registry.upsert_value(descriptor).unwrap();

        let result = router().route(&registry, None, &msg("zwave/set/3-49-1-1", r#"{"val": 1}"#));
        assert_eq!(result, Err(BridgeError::ReadOnlyValue(id)));
    }

    #[test]
    fn scan_uses_recorded_home_network() {
        let registry = Registry::new();
        let cmd = router()
            .route(&registry, Some(HomeId(0xe1f2)), &msg("zwave/cmd/scan", ""))
            .unwrap();
        assert_eq!(
            cmd,
            Some(ControllerCommand::AddNode {
                home_id: HomeId(0xe1f2),
                secure: false
            })
        );

        let cmd = router()
            .route(&registry, Some(HomeId(0xe1f2)), &msg("zwave/cmd/scan", r#"{"secure": true}"#))
            .unwrap();
        assert!(matches!(cmd, Some(ControllerCommand::AddNode { secure: true, .. })));
    }

    #[test]
    fn scan_before_driver_ready_is_rejected() {
        let result = router().route(&Registry::new(), None, &msg("zwave/cmd/scan", ""));
        assert_eq!(result, Err(BridgeError::DriverNotReady));
    }

    #[test]
    fn unknown_command_is_a_no_op() {
        let result = router().route(&Registry::new(), None, &msg("zwave/cmd/heal", ""));
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn foreign_topics_are_rejected() {
        assert!(router().parse("other/set/3-38-1-0", br#"{"val": 1}"#).is_err());
        assert!(router().parse("zwave/status/3/state", b"ready").is_err());
        assert!(router().parse("zwavex/set/3-38-1-0", br#"{"val": 1}"#).is_err());
        assert!(router().parse("zwave/cmd/scan/extra", b"").is_err());
    }
}
