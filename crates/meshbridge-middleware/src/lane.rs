//! The single ordered event lane.
//!
//! Controller events and bus messages are produced concurrently (driver
//! callbacks, the MQTT event loop) but must be consumed one at a time so that
//! a registry mutation and the publications derived from it never interleave
//! with another event.  The lane is a bounded [`tokio::sync::mpsc`] channel
//! with any number of cloned [`LaneSender`]s and exactly one
//! [`LaneReceiver`].
//!
//! When the lane is full, producers wait; nothing is dropped.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use meshbridge_types::{BridgeError, ControllerEvent, Envelope, LaneEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default number of buffered envelopes before producers are back-pressured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Source tag for envelopes forwarded from the controller.
pub const CONTROLLER_SOURCE: &str = "meshbridge-middleware::controller";

/// Create a lane with the given capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero (see [`mpsc::channel`]).
pub fn channel(capacity: usize) -> (LaneSender, LaneReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (LaneSender { sender }, LaneReceiver { receiver })
}

/// Cloneable producer handle.
#[derive(Clone, Debug)]
pub struct LaneSender {
    sender: mpsc::Sender<Envelope>,
}

impl LaneSender {
    /// Wrap `event` in an [`Envelope`] tagged with `source` and enqueue it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Connection`] once the receiver has been dropped.
    pub async fn submit(&self, source: &str, event: LaneEvent) -> Result<(), BridgeError> {
        self.sender
            .send(Envelope::new(source, event))
            .await
            .map_err(|_| BridgeError::Connection("event lane closed".to_string()))
    }
}

/// The lane's single consumer.
#[derive(Debug)]
pub struct LaneReceiver {
    receiver: mpsc::Receiver<Envelope>,
}

impl LaneReceiver {
    /// Wait for the next envelope.  Returns `None` once every sender is gone
    /// and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}

/// Spawn a task that pumps a controller event stream into the lane.
///
/// The task ends when the stream ends or the lane closes.
pub fn forward_controller_events(
    mut events: BoxStream<'static, ControllerEvent>,
    lane: LaneSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if lane
                .submit(CONTROLLER_SOURCE, LaneEvent::Controller(event))
                .await
                .is_err()
            {
                debug!("event lane closed; controller forwarder stopping");
                return;
            }
        }
        debug!("controller event stream ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use meshbridge_types::{DeviceAddress, InboundMessage};

    #[tokio::test]
    async fn envelopes_arrive_in_submission_order() {
        let (tx, mut rx) = channel(8);
        tx.submit("test", LaneEvent::BusConnected).await.unwrap();
        tx.submit("test", LaneEvent::Bus(InboundMessage::new("zwave/cmd/scan", b"".to_vec())))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.payload, LaneEvent::BusConnected);
        assert_eq!(first.source, "test");
        let second = rx.recv().await.unwrap();
        assert!(matches!(second.payload, LaneEvent::Bus(_)));
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn two_producers_share_one_consumer() {
        let (tx, mut rx) = channel(DEFAULT_CAPACITY);
        let tx2 = tx.clone();

        let a = tokio::spawn(async move {
            for _ in 0..50 {
                tx.submit("a", LaneEvent::BusConnected).await.unwrap();
            }
        });
        let b = tokio::spawn(async move {
            for _ in 0..50 {
                tx2.submit("b", LaneEvent::BusConnected).await.unwrap();
            }
        });
        a.await.unwrap();
        b.await.unwrap();

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 100);
    }

    #[tokio::test]
    async fn submit_after_receiver_dropped_fails() {
        let (tx, rx) = channel(1);
        drop(rx);
        assert!(matches!(
            tx.submit("test", LaneEvent::BusConnected).await,
            Err(BridgeError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn forwarder_pumps_controller_stream() {
        let (tx, mut rx) = channel(8);
        let events = stream::iter(vec![
            ControllerEvent::NodeAdded { address: DeviceAddress(2) },
            ControllerEvent::ScanComplete,
        ])
        .boxed();

        forward_controller_events(events, tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, CONTROLLER_SOURCE);
        assert_eq!(
            first.payload,
            LaneEvent::Controller(ControllerEvent::NodeAdded { address: DeviceAddress(2) })
        );
        assert_eq!(
            rx.recv().await.unwrap().payload,
            LaneEvent::Controller(ControllerEvent::ScanComplete)
        );
        // The forwarder owned the only sender, so the lane is now closed.
        assert!(rx.recv().await.is_none());
    }
}
