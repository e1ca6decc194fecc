//! Collaborator seams.
//!
//! The bridge never speaks directly to a radio driver or an MQTT socket.  It
//! talks to the two traits below, and adapters translate to the outside
//! world.
//!
//! - [`Controller`] – the mesh-network driver.
//!   [`SimController`][crate::sim_controller::SimController] replays a
//!   topology fixture for development and tests.
//! - [`BusClient`] – the publish side of the message bus.
//!   [`MqttBus`][crate::mqtt::MqttBus] implements it over `rumqttc`.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use meshbridge_types::{BridgeError, ControllerCommand, ControllerEvent, Publication};

/// A mesh-network controller driver.
///
/// # Contract
///
/// * `event_stream` – hands out the driver's lifecycle/value event stream.
///   Completion of a command is reported through this stream (e.g. a
///   `SetValue` surfaces as a later `ValueChanged`), never as a return value.
///   Only the first call is guaranteed to return a live stream.
///
/// * `execute` – starts a controller operation.  Returning `Ok` means the
///   driver accepted it, not that the network applied it.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Open the driver on `device` (e.g. `/dev/ttyACM0`).
    async fn connect(&self, device: &str) -> Result<(), BridgeError>;

    /// Tear the driver down.  The event stream ends afterwards.
    async fn disconnect(&self) -> Result<(), BridgeError>;

    /// Start a controller operation.
    async fn execute(&self, command: ControllerCommand) -> Result<(), BridgeError>;

    /// Take the driver's event stream.
    async fn event_stream(&self) -> BoxStream<'static, ControllerEvent>;
}

/// Publish side of the message bus.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Whether the broker session is currently up.  Must be cheap; the
    /// coordinator checks it before every publication.
    fn is_connected(&self) -> bool;

    /// Queue `publication` for delivery.
    async fn publish(&self, publication: Publication) -> Result<(), BridgeError>;
}
