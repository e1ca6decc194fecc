//! `meshbridge-middleware` – plumbing between the outside world and the
//! coordinator.
//!
//! Moves controller events and bus messages into one ordered lane without
//! caring what they mean.
//!
//! # Modules
//!
//! - [`adapter`] – the [`Controller`] and [`BusClient`] seams.
//! - [`lane`] – bounded multi-producer, single-consumer event lane plus the
//!   controller-stream forwarder.
//! - [`mqtt`] – [`MqttBus`]: `rumqttc` client, last will, subscriptions and
//!   the reconnecting event loop.
//! - [`sim_controller`] – [`SimController`]: replays a TOML topology as a
//!   driver event stream.

pub mod adapter;
pub mod lane;
pub mod mqtt;
pub mod sim_controller;

pub use adapter::{BusClient, Controller};
pub use lane::{LaneReceiver, LaneSender, forward_controller_events};
pub use mqtt::MqttBus;
pub use sim_controller::{SimController, SimTopology};
