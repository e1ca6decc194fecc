//! [`EventProjector`] – turns controller events into registry mutations and
//! the bus-side [`Effect`]s they imply.
//!
//! The projector is pure with respect to I/O: it mutates the [`Registry`] it
//! is handed and returns a list of effects.  Applying them (publishing,
//! dispatching to the controller, recording connection state) is the
//! coordinator's job.
//!
//! # Node lifecycle
//!
//! `added → naming → available → ready`, with `removed` reachable from any
//! state.  The projector records exactly the state each event reports and
//! never infers or skips one.  Every transition publishes the retained
//! `state` topic and, when the device has a non-empty name, the `name` topic.
//!
//! # Unknown addresses
//!
//! Events that carry device or value state for an address the registry has
//! never seen create the device on demand.  Removal events for unknown
//! targets have nothing to remove and are logged no-ops.

use chrono::Utc;
use meshbridge_types::{
    BridgeError, ConnectionStatus, ControllerCommand, ControllerEvent, DeviceAddress, HomeId,
    NodeInfo, NodeState, Publication, Scalar, ValueDescriptor, ValueId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metadata::MetadataOverrides;
use crate::registry::{Device, Registry, Value};
use crate::topics::Topics;

/// Label controllers report when they have nothing better.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Something the coordinator must do as a consequence of a controller event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write to the bus.
    Publish(Publication),
    /// Fire-and-forget controller operation.
    Dispatch(ControllerCommand),
    /// The controller link changed state.
    Connection(ConnectionStatus),
    /// The controller reported the home network it manages.
    HomeNetwork(HomeId),
}

/// Wire shape of a value-state publication.
#[derive(Debug, Serialize)]
struct ValueState<'a> {
    ts: i64,
    val: &'a Scalar,
    #[serde(skip_serializing_if = "Option::is_none")]
    uom: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
}

/// Projects controller events onto the registry and the bus.
#[derive(Debug, Clone)]
pub struct EventProjector {
    topics: Topics,
    overrides: MetadataOverrides,
    clear_removed_values: bool,
}

impl EventProjector {
    pub fn new(topics: Topics, overrides: MetadataOverrides) -> Self {
        Self {
            topics,
            overrides,
            clear_removed_values: false,
        }
    }

    /// When enabled, a removed value publishes an empty retained payload on
    /// its topic so the broker forgets the last state.  Off by default: a
    /// removal is silent.
    pub fn clear_removed_values(mut self, enabled: bool) -> Self {
        self.clear_removed_values = enabled;
        self
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Apply `event` to `registry`, stamping value publications with the
    /// current wall-clock time.
    pub fn project(&self, registry: &mut Registry, event: ControllerEvent) -> Vec<Effect> {
        self.project_at(registry, event, Utc::now().timestamp_millis())
    }

    /// Same as [`project`](Self::project) with an explicit timestamp
    /// (milliseconds since the Unix epoch).
    pub fn project_at(
        &self,
        registry: &mut Registry,
        event: ControllerEvent,
        now_ms: i64,
    ) -> Vec<Effect> {
        match event {
            ControllerEvent::DriverReady { home_id } => {
                info!(home_id = %home_id, "controller driver ready");
                vec![Effect::HomeNetwork(home_id)]
            }
            ControllerEvent::DriverFailed => {
                warn!("controller driver failed");
                vec![
                    Effect::Connection(ConnectionStatus::Disconnected),
                    Effect::Dispatch(ControllerCommand::Disconnect),
                ]
            }
            ControllerEvent::ScanComplete => {
                info!(devices = registry.len(), "controller network scan complete");
                vec![Effect::Connection(ConnectionStatus::Connected)]
            }

            ControllerEvent::NodeAdded { address } => {
                self.transition(registry, address, NodeState::Added, None)
            }
            ControllerEvent::NodeNaming { address, info } => {
                self.transition(registry, address, NodeState::Naming, Some(info))
            }
            ControllerEvent::NodeAvailable { address, info } => {
                self.transition(registry, address, NodeState::Available, Some(info))
            }
            ControllerEvent::NodeReady { address, info } => {
                self.transition(registry, address, NodeState::Ready, Some(info))
            }
            ControllerEvent::NodeRemoved { address } => self.remove_node(registry, address),

            ControllerEvent::ValueAdded(update) | ControllerEvent::ValueChanged(update) => {
                self.update_value(registry, update, now_ms)
            }
            ControllerEvent::ValueRemoved { id } => self.remove_value(registry, id),

            ControllerEvent::NodeEvent { address, data } => {
                debug!(address = %address, data, "node event");
                Vec::new()
            }
            ControllerEvent::ControllerProgress {
                address,
                state,
                error,
                help,
            } => {
                debug!(address = %address, state, error, help = %help, "controller command progress");
                Vec::new()
            }
        }
    }

    // ── Node lifecycle ───────────────────────────────────────────────────────

    fn transition(
        &self,
        registry: &mut Registry,
        address: DeviceAddress,
        state: NodeState,
        info: Option<NodeInfo>,
    ) -> Vec<Effect> {
        let device = registry.upsert_device(address);
        if let Some(info) = info {
            device.merge_info(info);
        }
        debug!(address = %address, from = %device.state, to = %state, "node transition");
        device.state = state;

        let mut effects = Vec::new();
        if state == NodeState::Available {
            effects.extend(
                self.overrides
                    .corrections(device)
                    .into_iter()
                    .map(Effect::Dispatch),
            );
        }
        effects.extend(self.node_publications(device));
        effects
    }

    fn remove_node(&self, registry: &mut Registry, address: DeviceAddress) -> Vec<Effect> {
        match registry.remove_device(address) {
            Ok(mut device) => {
                device.state = NodeState::Removed;
                self.node_publications(&device)
            }
            Err(e) => {
                debug!(error = %e, "removal of unregistered device");
                vec![Effect::Publish(Publication::retained(
                    self.topics.device_state(address),
                    NodeState::Removed.as_str(),
                ))]
            }
        }
    }

    fn node_publications(&self, device: &Device) -> Vec<Effect> {
        let address = device.address();
        let mut effects = vec![Effect::Publish(Publication::retained(
            self.topics.device_state(address),
            device.state.as_str(),
        ))];
        if let Some(name) = device.name.as_deref().filter(|n| !n.is_empty()) {
            effects.push(Effect::Publish(Publication::retained(
                self.topics.device_name(address),
                name,
            )));
        }
        effects
    }

    // ── Values ───────────────────────────────────────────────────────────────

    fn update_value(
        &self,
        registry: &mut Registry,
        update: ValueDescriptor,
        now_ms: i64,
    ) -> Vec<Effect> {
        registry.upsert_device(update.id.address);
        match registry.upsert_value(update) {
            Ok(value) => self
                .value_publication(value, now_ms)
                .map(Effect::Publish)
                .into_iter()
                .collect(),
            Err(e) => {
                warn!(error = %e, "value update skipped");
                Vec::new()
            }
        }
    }

    /// Build the value-state publication, or `None` when the value is null.
    /// Non-finite floats serialize as JSON `null` and count as null.
    fn value_publication(&self, value: &Value, now_ms: i64) -> Option<Publication> {
        let val = value
            .value
            .as_ref()
            .filter(|v| !matches!(v, Scalar::Float(x) if !x.is_finite()))?;
        let state = ValueState {
            ts: now_ms,
            val,
            uom: value.units.as_deref().filter(|u| !u.is_empty()),
            label: value
                .label
                .as_deref()
                .filter(|l| !l.is_empty() && *l != UNKNOWN_LABEL),
        };
        match serde_json::to_string(&state) {
            Ok(payload) => Some(Publication::retained(self.topics.value(&value.id()), payload)),
            Err(e) => {
                let err = BridgeError::Serialization(e.to_string());
                warn!(value = %value.id(), error = %err, "value state not published");
                None
            }
        }
    }

    fn remove_value(&self, registry: &mut Registry, id: ValueId) -> Vec<Effect> {
        match registry.remove_value(&id) {
            Ok(Some(_)) if self.clear_removed_values => {
                vec![Effect::Publish(Publication::retained(self.topics.value(&id), ""))]
            }
            Ok(Some(_)) => Vec::new(),
            Ok(None) => {
                debug!(value = %id, "removal of unregistered value");
                Vec::new()
            }
            Err(e) => {
                debug!(value = %id, error = %e, "removal of value on unregistered device");
                Vec::new()
            }
        }
    }
}
