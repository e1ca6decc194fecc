//! `meshbridge-core` – the bidirectional mapping engine.
//!
//! Everything in this crate is synchronous and I/O free; the coordinator in
//! `meshbridge-runtime` owns the state and performs the side effects.
//!
//! # Modules
//!
//! - [`registry`] – [`Registry`][registry::Registry]: in-memory table of
//!   devices and their values with merge-on-update semantics.
//! - [`projector`] – [`EventProjector`][projector::EventProjector]: applies
//!   controller events to the registry and derives the [`Effect`]s
//!   (publications, controller dispatches, connection changes) each implies.
//! - [`router`] – [`CommandRouter`][router::CommandRouter]: parses inbound
//!   `set/…` and `cmd/…` messages and validates them against the registry.
//! - [`topics`] – the bus topic layout for one instance prefix.
//! - [`metadata`] – operator-supplied name/location overrides.

pub mod metadata;
pub mod projector;
pub mod registry;
pub mod router;
pub mod topics;

pub use metadata::{MetadataOverrides, NodeMeta};
pub use projector::{Effect, EventProjector};
pub use registry::{Device, Registry, Value};
pub use router::{CommandRouter, Request};
pub use topics::Topics;
