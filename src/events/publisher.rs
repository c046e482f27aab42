//! # Event Publisher
//!
//! Broadcast-channel implementation of [`DomainEventPublisher`] for
//! in-process subscribers such as projections, notifications and tests.
//!
//! ```rust
//! use crm_sales_core::events::{DomainEvent, EventPublisher};
//! use crm_sales_core::ports::DomainEventPublisher;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut receiver = publisher.subscribe();
//!
//! let event = DomainEvent::new(
//!     "lead.converted",
//!     "lead",
//!     Uuid::new_v4(),
//!     Uuid::new_v4(),
//!     1,
//!     serde_json::json!({ "source": "doc" }),
//! );
//! publisher.publish(vec![event]).await.unwrap();
//!
//! assert_eq!(receiver.recv().await.unwrap().event_type, "lead.converted");
//! # });
//! ```

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::DomainEvent;
use crate::config::SagaConfig;
use crate::ports::DomainEventPublisher;

/// In-process domain event publisher backed by a broadcast channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Channel sized by `event_channel_capacity`
    pub fn from_config(config: &SagaConfig) -> Self {
        Self::new(config.event_channel_capacity)
    }

    /// Publish a single event
    pub fn publish_one(&self, event: DomainEvent) {
        // send only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("Domain event published with no active subscribers");
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl DomainEventPublisher for EventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        for event in events {
            self.publish_one(event);
        }
        Ok(())
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Event broker rejected the batch: {0}")]
    Rejected(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
