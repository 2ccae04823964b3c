//! Live job events
//!
//! Log chunks and status changes are published as (job, event-type, payload)
//! triples to a [`NotificationSink`]. Delivery is best-effort: publishing
//! never blocks and never fails the operation that produced the event.

use sluice_core::dto::job::{JobEvent, JobEventKind};
use tokio::sync::broadcast;
use uuid::Uuid;

pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: JobEvent);
}

/// Publish a typed event for one job
pub fn notify(sink: &dyn NotificationSink, job_id: Uuid, kind: JobEventKind, payload: impl Into<String>) {
    sink.publish(JobEvent {
        job_id,
        kind,
        payload: payload.into(),
    });
}

/// In-process hub fanning events out to every live subscriber
///
/// A subscriber that falls more than `capacity` events behind skips ahead and
/// loses the events in between.
pub struct BroadcastSink {
    sender: broadcast::Sender<JobEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, event: JobEvent) {
        // Fails only when nobody is listening
        if self.sender.send(event).is_err() {
            tracing::trace!("No live subscribers for job event");
        }
    }
}
