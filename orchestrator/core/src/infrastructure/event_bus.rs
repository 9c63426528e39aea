// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over tokio broadcast channels. Events are not
// persisted; lineage events are durable through the lineage repository and
// are republished here for live observers only.

use crate::domain::events::FeedbackLoopEvent;
use crate::domain::feedback_loop::CorrelationId;
use pattern_lineage::LineageEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    FeedbackLoop(FeedbackLoopEvent),
    Lineage(LineageEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is how many events are buffered before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_feedback_loop_event(&self, event: FeedbackLoopEvent) {
        self.publish(DomainEvent::FeedbackLoop(event));
    }

    pub fn publish_lineage_event(&self, event: LineageEvent) {
        self.publish(DomainEvent::Lineage(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single feedback loop run
    pub fn subscribe_run(&self, correlation_id: CorrelationId) -> RunEventReceiver {
        RunEventReceiver {
            receiver: self.sender.subscribe(),
            correlation_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one run's feedback loop events
pub struct RunEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    correlation_id: CorrelationId,
}

impl RunEventReceiver {
    pub async fn recv(&mut self) -> Result<FeedbackLoopEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::FeedbackLoop(loop_event) = event {
                if loop_event.correlation_id() == self.correlation_id {
                    return Ok(loop_event);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feedback_loop::LoopState;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let correlation_id = CorrelationId::new();

        event_bus.publish_feedback_loop_event(FeedbackLoopEvent::RunStarted {
            correlation_id,
            pattern_id: "writer".to_string(),
            started_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::FeedbackLoop(FeedbackLoopEvent::RunStarted { correlation_id: id, pattern_id, .. }) => {
                assert_eq!(id, correlation_id);
                assert_eq!(pattern_id, "writer");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_run_filtering() {
        let event_bus = EventBus::new(10);
        let ours = CorrelationId::new();
        let mut receiver = event_bus.subscribe_run(ours);

        event_bus.publish_feedback_loop_event(FeedbackLoopEvent::StageEntered {
            correlation_id: CorrelationId::new(),
            stage: LoopState::Analyzing,
            entered_at: Utc::now(),
        });
        event_bus.publish_feedback_loop_event(FeedbackLoopEvent::StageEntered {
            correlation_id: ours,
            stage: LoopState::Validating,
            entered_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            FeedbackLoopEvent::StageEntered { correlation_id, stage, .. } => {
                assert_eq!(correlation_id, ours);
                assert_eq!(stage, LoopState::Validating);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_feedback_loop_event(FeedbackLoopEvent::RunCancelled {
            correlation_id: CorrelationId::new(),
            stage: LoopState::Collecting,
            cancelled_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }
}
