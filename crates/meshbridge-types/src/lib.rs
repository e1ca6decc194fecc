//! `meshbridge-types` – shared data model for the mesh-to-bus bridge.
//!
//! Everything that crosses a crate boundary lives here: device addresses and
//! value identities, the events a mesh controller emits, the commands it
//! accepts, the publications the bridge sends to the bus, and the single
//! [`BridgeError`] type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Identities
// ─────────────────────────────────────────────────────────────────────────────

/// Network address of a device, assigned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(pub u32);

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the home network a controller manages.
///
/// Rendered in lowercase hex, the way controllers print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub u32);

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Composite identity of a single datapoint on a device.
///
/// The string form `"{address}-{class_id}-{instance}-{index}"` is the stable
/// key used in topics and never changes once a value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId {
    pub address: DeviceAddress,
    pub class_id: u8,
    pub instance: u8,
    pub index: u16,
}

impl ValueId {
    pub fn new(address: u32, class_id: u8, instance: u8, index: u16) -> Self {
        Self {
            address: DeviceAddress(address),
            class_id,
            instance,
            index,
        }
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.address, self.class_id, self.instance, self.index
        )
    }
}

impl FromStr for ValueId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let [address, class_id, instance, index] = parts.as_slice() else {
            return Err(format!("expected 4 '-'-separated fields, got {}", parts.len()));
        };
        let address = address
            .parse::<u32>()
            .map_err(|e| format!("address '{address}': {e}"))?;
        if address == 0 {
            return Err("address must be positive".to_string());
        }
        Ok(Self::new(
            address,
            class_id
                .parse()
                .map_err(|e| format!("command class '{class_id}': {e}"))?,
            instance
                .parse()
                .map_err(|e| format!("instance '{instance}': {e}"))?,
            index.parse().map_err(|e| format!("index '{index}': {e}"))?,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device and value attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque scalar carried by a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value into a scalar.  Returns `None` for `null`,
    /// arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Lifecycle state of a device as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Added,
    Naming,
    Available,
    Ready,
    Removed,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Added => "added",
            NodeState::Naming => "naming",
            NodeState::Available => "available",
            NodeState::Ready => "ready",
            NodeState::Removed => "removed",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive node information attached to naming/available/ready events.
///
/// Every field is optional; only fields that are present are merged into the
/// registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "loc", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A (possibly partial) description of a value as reported by the controller.
///
/// `None` fields mean "not part of this update".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDescriptor {
    pub id: ValueId,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub read_only: Option<bool>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

impl ValueDescriptor {
    /// A descriptor that only carries an identity.
    pub fn new(id: ValueId) -> Self {
        Self {
            id,
            value: None,
            label: None,
            units: None,
            genre: None,
            read_only: None,
            help: None,
            min: None,
            max: None,
        }
    }

    pub fn with_value(mut self, value: Scalar) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller surface
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle and value events emitted by a mesh controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    DriverReady { home_id: HomeId },
    DriverFailed,
    ScanComplete,
    NodeAdded { address: DeviceAddress },
    NodeRemoved { address: DeviceAddress },
    NodeNaming { address: DeviceAddress, info: NodeInfo },
    NodeAvailable { address: DeviceAddress, info: NodeInfo },
    NodeReady { address: DeviceAddress, info: NodeInfo },
    /// Unsolicited node event (e.g. a basic-set from a sensor).
    NodeEvent { address: DeviceAddress, data: i64 },
    ValueAdded(ValueDescriptor),
    ValueChanged(ValueDescriptor),
    ValueRemoved { id: ValueId },
    /// Progress report for a long-running controller command (inclusion etc.).
    ControllerProgress {
        address: DeviceAddress,
        state: i64,
        error: i64,
        help: String,
    },
}

impl ControllerEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerEvent::DriverReady { .. } => "driver_ready",
            ControllerEvent::DriverFailed => "driver_failed",
            ControllerEvent::ScanComplete => "scan_complete",
            ControllerEvent::NodeAdded { .. } => "node_added",
            ControllerEvent::NodeRemoved { .. } => "node_removed",
            ControllerEvent::NodeNaming { .. } => "node_naming",
            ControllerEvent::NodeAvailable { .. } => "node_available",
            ControllerEvent::NodeReady { .. } => "node_ready",
            ControllerEvent::NodeEvent { .. } => "node_event",
            ControllerEvent::ValueAdded(_) => "value_added",
            ControllerEvent::ValueChanged(_) => "value_changed",
            ControllerEvent::ValueRemoved { .. } => "value_removed",
            ControllerEvent::ControllerProgress { .. } => "controller_progress",
        }
    }
}

/// Operations the bridge asks a controller to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControllerCommand {
    SetNodeName { address: DeviceAddress, name: String },
    SetNodeLocation { address: DeviceAddress, location: String },
    SetValue { id: ValueId, value: Scalar },
    /// Enter network-inclusion mode on the given home network.
    AddNode { home_id: HomeId, secure: bool },
    Disconnect,
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerCommand::SetNodeName { address, name } => {
                write!(f, "set_node_name({address}, {name:?})")
            }
            ControllerCommand::SetNodeLocation { address, location } => {
                write!(f, "set_node_location({address}, {location:?})")
            }
            ControllerCommand::SetValue { id, value } => write!(
                f,
                "set_value({}, {}, {}, {}, {value})",
                id.address, id.class_id, id.instance, id.index
            ),
            ControllerCommand::AddNode { home_id, secure } => {
                write!(f, "add_node({home_id}, secure={secure})")
            }
            ControllerCommand::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// Status of the controller link, as published on `{prefix}/connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    /// Payload published by the broker when the bridge itself drops off.
    pub const LAST_WILL_PAYLOAD: &'static str = "0";

    pub fn as_payload(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "1",
            ConnectionStatus::Connected => "2",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus surface
// ─────────────────────────────────────────────────────────────────────────────

/// A single message the bridge wants written to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl Publication {
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }
}

/// A message delivered by the bus on one of the bridge's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event lane
// ─────────────────────────────────────────────────────────────────────────────

/// Everything that can arrive on the bridge's single event lane.
#[derive(Debug, Clone, PartialEq)]
pub enum LaneEvent {
    Controller(ControllerEvent),
    Bus(InboundMessage),
    /// The bus client (re)established its broker session.
    BusConnected,
}

/// Envelope wrapping every [`LaneEvent`] with an id for log correlation.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"meshbridge-middleware::mqtt"`
    pub source: String,
    pub payload: LaneEvent,
}

impl Envelope {
    pub fn new(source: impl Into<String>, payload: LaneEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared by every bridge crate.  None of these are fatal to the
/// event lane; callers log and continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Unknown device {0}")]
    UnknownDevice(DeviceAddress),

    #[error("Malformed command on '{topic}': {reason}")]
    CommandParse { topic: String, reason: String },

    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Controller Driver Failure: {0}")]
    DriverFailure(String),

    #[error("Controller driver has not reported a home network yet")]
    DriverNotReady,

    #[error("Value {0} is read-only")]
    ReadOnlyValue(ValueId),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl BridgeError {
    pub fn parse(topic: &str, reason: impl Into<String>) -> Self {
        BridgeError::CommandParse {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_id_renders_stable_key() {
        let id = ValueId::new(3, 38, 1, 0);
        assert_eq!(id.to_string(), "3-38-1-0");
    }

    #[test]
    fn value_id_parses_its_own_key() {
        let id: ValueId = "12-49-2-5".parse().unwrap();
        assert_eq!(id, ValueId::new(12, 49, 2, 5));
    }

    #[test]
    fn value_id_rejects_short_and_zero_addresses() {
        assert!("3-38".parse::<ValueId>().is_err());
        assert!("0-38-1-0".parse::<ValueId>().is_err());
        assert!("3-x-1-0".parse::<ValueId>().is_err());
        assert!("3-300-1-0".parse::<ValueId>().is_err());
    }

    #[test]
    fn home_id_displays_as_hex() {
        assert_eq!(HomeId(0xDEADBEEF).to_string(), "deadbeef");
    }

    #[test]
    fn scalar_from_json_skips_null_and_containers() {
        assert_eq!(Scalar::from_json(&serde_json::json!(99)), Some(Scalar::Integer(99)));
        assert_eq!(Scalar::from_json(&serde_json::json!(1.5)), Some(Scalar::Float(1.5)));
        assert_eq!(Scalar::from_json(&serde_json::json!(true)), Some(Scalar::Bool(true)));
        assert_eq!(Scalar::from_json(&serde_json::Value::Null), None);
        assert_eq!(Scalar::from_json(&serde_json::json!([1])), None);
    }

    #[test]
    fn scalar_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Scalar::Integer(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Scalar::Text("on".into())).unwrap(), "\"on\"");
    }

    #[test]
    fn node_info_accepts_loc_alias() {
        let info: NodeInfo = serde_json::from_str(r#"{"name":"Lamp","loc":"Hall"}"#).unwrap();
        assert_eq!(info.location.as_deref(), Some("Hall"));
    }

    #[test]
    fn connection_status_payloads() {
        assert_eq!(ConnectionStatus::Disconnected.as_payload(), "1");
        assert_eq!(ConnectionStatus::Connected.as_payload(), "2");
        assert_eq!(ConnectionStatus::LAST_WILL_PAYLOAD, "0");
    }

    #[test]
    fn set_value_command_display() {
        let cmd = ControllerCommand::SetValue {
            id: ValueId::new(3, 38, 1, 0),
            value: Scalar::Integer(99),
        };
        assert_eq!(cmd.to_string(), "set_value(3, 38, 1, 0, 99)");
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::UnknownDevice(DeviceAddress(7));
        assert!(err.to_string().contains('7'));
        let err = BridgeError::parse("zwave/set/3-38", "expected 4 fields");
        assert!(err.to_string().contains("zwave/set/3-38"));
    }
}
