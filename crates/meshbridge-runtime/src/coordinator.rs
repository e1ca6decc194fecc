//! [`BridgeCoordinator`] – the single consumer of the event lane.
//!
//! The coordinator owns every piece of mutable bridge state: the device
//! [`Registry`], the controller [`ConnectionStatus`] and the home network id.
//! It takes one [`Envelope`] at a time from the lane and handles it to
//! completion before looking at the next, so a registry mutation and the
//! publications derived from it are never interleaved with another event.
//!
//! # Handling
//!
//! | Lane event | Action |
//! |---|---|
//! | `Controller(event)` | project onto the registry, apply every [`Effect`] |
//! | `Bus(message)` | route to a controller command and dispatch it |
//! | `BusConnected` | republish the connection status |
//!
//! # Effects
//!
//! * **Publish** – skipped (and logged) while the bus is down.
//! * **Dispatch** – spawned; the outcome goes to the [`DispatchObserver`] and
//!   never back onto the bus.  Completion re-enters the lane through the
//!   controller's own event stream.
//! * **Connection** – recorded and published retained on `{prefix}/connected`.
//! * **HomeNetwork** – recorded for `cmd/scan`.

use std::sync::Arc;

use meshbridge_core::{CommandRouter, Effect, EventProjector, Registry};
use meshbridge_middleware::{BusClient, Controller, LaneReceiver};
use meshbridge_types::{
    ConnectionStatus, ControllerCommand, Envelope, HomeId, InboundMessage, LaneEvent, Publication,
};
use tracing::{debug, info, instrument, warn};

use crate::observer::{DispatchObserver, TracingObserver};

/// Serialises all bridge state changes behind the event lane.
pub struct BridgeCoordinator {
    registry: Registry,
    status: ConnectionStatus,
    home_id: Option<HomeId>,
    controller: Arc<dyn Controller>,
    bus: Arc<dyn BusClient>,
    projector: EventProjector,
    router: CommandRouter,
    observer: Arc<dyn DispatchObserver>,
}

impl BridgeCoordinator {
    pub fn new(
        projector: EventProjector,
        controller: Arc<dyn Controller>,
        bus: Arc<dyn BusClient>,
    ) -> Self {
        let router = CommandRouter::new(projector.topics().prefix());
        Self {
            registry: Registry::new(),
            status: ConnectionStatus::default(),
            home_id: None,
            controller,
            bus,
            projector,
            router,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn home_id(&self) -> Option<HomeId> {
        self.home_id
    }

    /// Drain `lane` until every producer has gone away.
    pub async fn run(&mut self, mut lane: LaneReceiver) {
        info!(prefix = self.projector.topics().prefix(), "bridge coordinator started");
        while let Some(envelope) = lane.recv().await {
            self.handle(envelope).await;
        }
        info!(devices = self.registry.len(), "event lane closed; coordinator stopping");
    }

    /// Handle one envelope to completion.
    #[instrument(skip_all, fields(id = %envelope.id, source = %envelope.source))]
    pub async fn handle(&mut self, envelope: Envelope) {
        match envelope.payload {
            LaneEvent::Controller(event) => {
                debug!(event = event.name(), "controller event");
                let effects = self.projector.project(&mut self.registry, event);
                for effect in effects {
                    self.apply(effect).await;
                }
            }
            LaneEvent::Bus(message) => self.route(message),
            LaneEvent::BusConnected => {
                info!(status = self.status.as_payload(), "bus connected; republishing status");
                self.publish_status().await;
            }
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Publish(publication) => self.publish(publication).await,
            Effect::Dispatch(command) => self.dispatch(command),
            Effect::Connection(status) => {
                self.status = status;
                self.publish_status().await;
            }
            Effect::HomeNetwork(home_id) => self.home_id = Some(home_id),
        }
    }

    fn route(&self, message: InboundMessage) {
        match self.router.route(&self.registry, self.home_id, &message) {
            Ok(Some(command)) => self.dispatch(command),
            Ok(None) => {}
            Err(e) => warn!(topic = %message.topic, error = %e, "inbound message dropped"),
        }
    }

    async fn publish_status(&self) {
        let topic = self.projector.topics().connected();
        self.publish(Publication::retained(topic, self.status.as_payload()))
            .await;
    }

    async fn publish(&self, publication: Publication) {
        if !self.bus.is_connected() {
            debug!(topic = %publication.topic, "bus offline; publication skipped");
            return;
        }
        let topic = publication.topic.clone();
        if let Err(e) = self.bus.publish(publication).await {
            warn!(topic = %topic, error = %e, "publication failed");
        }
    }

    fn dispatch(&self, command: ControllerCommand) {
        debug!(command = %command, "dispatching to controller");
        let controller = Arc::clone(&self.controller);
        let observer = Arc::clone(&self.observer);
        tokio::spawn(async move {
            match controller.execute(command.clone()).await {
                Ok(()) => observer.on_success(&command),
                Err(e) => observer.on_failure(&command, &e),
            }
        });
    }
}
