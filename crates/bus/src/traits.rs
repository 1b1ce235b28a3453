use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;
use crate::message::Message;

/// Sends messages towards a broker frontend.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), BusError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        (**self).publish(message).await
    }
}

/// Receives messages from a broker backend, filtered by topic prefix.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError>;

    /// Receive the next message. Blocks until one is available.
    async fn recv(&self) -> Result<Message, BusError>;
}
