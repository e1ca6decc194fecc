//! [`SimController`] – in-process controller for development and CI.
//!
//! Replays a [`SimTopology`] as the event sequence a real driver produces
//! when it opens the network, then acknowledges commands the way a driver
//! would.  No radio hardware is involved.
//!
//! # Replay order
//!
//! `driver_ready`, then per node: `node_added`, one `value_added` per value,
//! `node_naming`, `node_available`, `node_ready`; finally `scan_complete`.
//!
//! # Command acknowledgements
//!
//! | Command | Acknowledgement |
//! |---|---|
//! | `SetValue` | `value_changed` carrying the new value |
//! | `SetNodeName` / `SetNodeLocation` | `node_naming` carrying the new field |
//! | `AddNode` | `controller_progress` (inclusion started) |
//! | `Disconnect` | event stream ends |
//!
//! # Example
//!
//! ```toml
//! home_id = 0xe1f2a3b4
//!
//! [[nodes]]
//! address = 3
//! name = "Hall dimmer"
//! location = "Hall"
//!
//! [[nodes.values]]
//! class_id = 38
//! index = 0
//! label = "Level"
//! value = 0
//! ```

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use meshbridge_types::{
    BridgeError, ControllerCommand, ControllerEvent, DeviceAddress, HomeId, NodeInfo, Scalar,
    ValueDescriptor, ValueId,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adapter::Controller;

/// Controller-command state reported when inclusion starts.
const INCLUSION_STARTED: i64 = 1;

/// Network description replayed by [`SimController`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimTopology {
    #[serde(default)]
    pub home_id: u32,
    #[serde(default)]
    pub nodes: Vec<SimNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimNode {
    pub address: u32,
    #[serde(flatten)]
    pub info: NodeInfo,
    #[serde(default)]
    pub values: Vec<SimValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimValue {
    pub class_id: u8,
    #[serde(default = "default_instance")]
    pub instance: u8,
    pub index: u16,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

fn default_instance() -> u8 {
    1
}

impl SimTopology {
    /// Parse a topology from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, BridgeError> {
        toml::from_str(raw).map_err(|e| BridgeError::Config(format!("topology: {e}")))
    }

    /// Read and parse a topology file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read topology {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    fn node(&self, address: DeviceAddress) -> Option<&SimNode> {
        self.nodes.iter().find(|n| n.address == address.0)
    }

    /// The startup event sequence for this topology.
    pub fn replay(&self) -> Vec<ControllerEvent> {
        let mut events = vec![ControllerEvent::DriverReady {
            home_id: HomeId(self.home_id),
        }];
        for node in &self.nodes {
            let address = DeviceAddress(node.address);
            events.push(ControllerEvent::NodeAdded { address });
            for value in &node.values {
                events.push(ControllerEvent::ValueAdded(value.descriptor(address)));
            }
            events.push(ControllerEvent::NodeNaming {
                address,
                info: node.info.clone(),
            });
            events.push(ControllerEvent::NodeAvailable {
                address,
                info: node.info.clone(),
            });
            events.push(ControllerEvent::NodeReady {
                address,
                info: node.info.clone(),
            });
        }
        events.push(ControllerEvent::ScanComplete);
        events
    }
}

impl SimValue {
    fn descriptor(&self, address: DeviceAddress) -> ValueDescriptor {
        ValueDescriptor {
            id: ValueId {
                address,
                class_id: self.class_id,
                instance: self.instance,
                index: self.index,
            },
            value: self.value.clone(),
            label: self.label.clone(),
            units: self.units.clone(),
            genre: self.genre.clone(),
            read_only: Some(self.read_only),
            help: self.help.clone(),
            min: self.min,
            max: self.max,
        }
    }
}

/// Simulated mesh controller.
pub struct SimController {
    topology: SimTopology,
    sender: Mutex<Option<mpsc::UnboundedSender<ControllerEvent>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ControllerEvent>>>,
    executed: Mutex<Vec<ControllerCommand>>,
}

impl SimController {
    pub fn new(topology: SimTopology) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            topology,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every command accepted so far, in order.
    pub fn executed(&self) -> Vec<ControllerCommand> {
        self.executed
            .lock()
            .map(|cmds| cmds.clone())
            .unwrap_or_default()
    }

    fn emit(&self, event: ControllerEvent) -> Result<(), BridgeError> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| BridgeError::DriverFailure("controller state poisoned".to_string()))?;
        let sender = guard
            .as_ref()
            .ok_or_else(|| BridgeError::Connection("controller is disconnected".to_string()))?;
        sender
            .send(event)
            .map_err(|_| BridgeError::Connection("controller event stream dropped".to_string()))
    }

    fn record(&self, command: &ControllerCommand) {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(command.clone());
        }
    }
}

#[async_trait]
impl Controller for SimController {
    async fn connect(&self, device: &str) -> Result<(), BridgeError> {
        info!(
            device,
            nodes = self.topology.nodes.len(),
            home_id = %HomeId(self.topology.home_id),
            "opening simulated controller"
        );
        for event in self.topology.replay() {
            self.emit(event)?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        let mut guard = self
            .sender
            .lock()
            .map_err(|_| BridgeError::DriverFailure("controller state poisoned".to_string()))?;
        if guard.take().is_some() {
            info!("simulated controller disconnected");
        }
        Ok(())
    }

    async fn execute(&self, command: ControllerCommand) -> Result<(), BridgeError> {
        debug!(command = %command, "simulated controller executing");
        let ack = match &command {
            ControllerCommand::SetValue { id, value } => {
                if self.topology.node(id.address).is_none() {
                    return Err(BridgeError::UnknownDevice(id.address));
                }
                Some(ControllerEvent::ValueChanged(
                    ValueDescriptor::new(*id).with_value(value.clone()),
                ))
            }
            ControllerCommand::SetNodeName { address, name } => {
                Some(ControllerEvent::NodeNaming {
                    address: *address,
                    info: NodeInfo {
                        name: Some(name.clone()),
                        ..NodeInfo::default()
                    },
                })
            }
            ControllerCommand::SetNodeLocation { address, location } => {
                Some(ControllerEvent::NodeNaming {
                    address: *address,
                    info: NodeInfo {
                        location: Some(location.clone()),
                        ..NodeInfo::default()
                    },
                })
            }
            ControllerCommand::AddNode { home_id, secure } => {
                if home_id.0 != self.topology.home_id {
                    return Err(BridgeError::DriverFailure(format!(
                        "unknown home network {home_id}"
                    )));
                }
                let controller_node = self.topology.nodes.first().map_or(1, |n| n.address);
                Some(ControllerEvent::ControllerProgress {
                    address: DeviceAddress(controller_node),
                    state: INCLUSION_STARTED,
                    error: 0,
                    help: format!("inclusion started (secure: {secure})"),
                })
            }
            ControllerCommand::Disconnect => None,
        };

        match ack {
            Some(event) => self.emit(event)?,
            None => self.disconnect().await?,
        }
        self.record(&command);
        Ok(())
    }

    async fn event_stream(&self) -> BoxStream<'static, ControllerEvent> {
        let receiver = self.receiver.lock().ok().and_then(|mut guard| guard.take());
        match receiver {
            Some(receiver) => stream::unfold(receiver, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}
