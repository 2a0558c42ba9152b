//! Typed event fan-out for Taskfleet.
//!
//! The engine publishes [`FleetEvent`]s as it mutates the world; consumers
//! (the WebSocket feed, dashboards, logs) subscribe through [`EventBus`].
//! Delivery is publish-only and lossy: no acknowledgment, no backpressure,
//! and a subscriber that falls behind simply misses events.

use serde::{Deserialize, Serialize};
use taskfleet_core::{AgentRole, SubtaskStatus, TaskStatus};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A notification emitted by the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    /// An agent's position changed during the movement phase.
    AgentMoved {
        /// The moving agent.
        agent_id: Uuid,
        /// New horizontal coordinate.
        x: f64,
        /// New vertical coordinate.
        y: f64,
    },

    /// An agent reached its target hub.
    AgentArrived {
        /// The arriving agent.
        agent_id: Uuid,
        /// Hub id reached.
        hub: String,
    },

    /// An agent's lifecycle status changed.
    AgentStatusChanged {
        /// The agent.
        agent_id: Uuid,
        /// New status, by wire name.
        status: String,
        /// Current action label.
        doing: String,
    },

    /// An agent said something out loud.
    AgentSpoke {
        /// The speaker.
        agent_id: Uuid,
        /// Addressee, when directed at someone.
        to_agent: Option<Uuid>,
        /// What was said.
        text: String,
    },

    /// An agent recorded an internal note.
    AgentThought {
        /// The agent.
        agent_id: Uuid,
        /// The note.
        text: String,
    },

    /// A subtask changed status.
    SubtaskStatusChanged {
        /// Owning task.
        task_id: Uuid,
        /// The subtask.
        subtask_id: Uuid,
        /// Role the subtask belongs to.
        role: AgentRole,
        /// New status.
        status: SubtaskStatus,
    },

    /// A task changed status.
    TaskStatusChanged {
        /// The task.
        task_id: Uuid,
        /// New status.
        status: TaskStatus,
        /// Failure detail, for `Failed`.
        error: Option<String>,
    },
}

/// Lossy broadcast bus for [`FleetEvent`]s.
///
/// Cloning the bus is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FleetEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Never blocks and never fails: with no subscribers the event is
    /// dropped, which is acceptable for this channel.
    pub fn publish(&self, event: FleetEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event published with no subscribers");
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(FleetEvent::AgentArrived {
            agent_id: Uuid::new_v4(),
            hub: "lounge".into(),
        });

        match rx.recv().await.unwrap() {
            FleetEvent::AgentArrived { hub, .. } => assert_eq!(hub, "lounge"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        // Must not panic or error.
        bus.publish(FleetEvent::AgentThought {
            agent_id: Uuid::new_v4(),
            text: "nothing to do".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_see_events() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(FleetEvent::TaskStatusChanged {
            task_id: Uuid::new_v4(),
            status: TaskStatus::Completed,
            error: None,
        });

        assert!(matches!(
            a.recv().await.unwrap(),
            FleetEvent::TaskStatusChanged { .. }
        ));
        assert!(matches!(
            b.recv().await.unwrap(),
            FleetEvent::TaskStatusChanged { .. }
        ));
    }

    #[test]
    fn test_event_wire_format() {
        let event = FleetEvent::AgentSpoke {
            agent_id: Uuid::new_v4(),
            to_agent: None,
            text: "on it".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"agent_spoke\""));
    }
}
