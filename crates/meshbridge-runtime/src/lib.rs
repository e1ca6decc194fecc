//! `meshbridge-runtime` – the running bridge.
//!
//! # Modules
//!
//! - [`coordinator`] – [`BridgeCoordinator`][coordinator::BridgeCoordinator]:
//!   the single consumer of the event lane.  Owns the device registry and the
//!   controller connection status, applies projector effects to the bus and
//!   dispatches routed commands to the controller.
//! - [`observer`] – [`DispatchObserver`][observer::DispatchObserver]: receives
//!   the outcome of every fire-and-forget controller dispatch.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod coordinator;
pub mod observer;
pub mod telemetry;

pub use coordinator::BridgeCoordinator;
pub use observer::{DispatchObserver, TracingObserver};
pub use telemetry::{TracerProviderGuard, init_tracing};
