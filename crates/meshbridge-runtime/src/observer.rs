//! [`DispatchObserver`] – where controller-dispatch outcomes go.
//!
//! Dispatches are fire-and-forget from the lane's point of view; the
//! coordinator spawns each one and hands its result to an observer.  Results
//! are never published back to the bus.

use meshbridge_types::{BridgeError, ControllerCommand};
use tracing::{debug, warn};

/// Receives the outcome of every spawned controller dispatch.
///
/// Called from the dispatch task, never from the event lane.
pub trait DispatchObserver: Send + Sync {
    fn on_success(&self, command: &ControllerCommand);
    fn on_failure(&self, command: &ControllerCommand, error: &BridgeError);
}

/// Default observer: logs outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn on_success(&self, command: &ControllerCommand) {
        debug!(command = %command, "controller accepted command");
    }

    fn on_failure(&self, command: &ControllerCommand, error: &BridgeError) {
        warn!(command = %command, error = %error, "controller rejected command");
    }
}
