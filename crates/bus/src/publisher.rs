//! Publisher whose broker target can be swapped at runtime.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::BusError;
use crate::message::Message;
use crate::pubsub::ZmqPublisher;
use crate::traits::EventPublisher;
use crate::transport::Transport;

/// Delay after connecting for the broker's subscription to reach the new
/// socket. A PUB socket silently drops messages sent before that.
pub const SUBSCRIPTION_SETTLE: Duration = Duration::from_millis(150);

/// Publishes through whichever broker is currently the target.
///
/// The current socket is an immutable value behind an async `RwLock`. Each
/// publish holds the read lock for its whole send, and [`retarget`] connects
/// the replacement first and then swaps it under the write lock. A publish
/// therefore completes entirely on the old target or entirely on the new
/// one; publishes issued during the swap wait for it.
///
/// [`retarget`]: RetargetablePublisher::retarget
pub struct RetargetablePublisher {
    current: RwLock<ZmqPublisher>,
    settle: Duration,
}

impl RetargetablePublisher {
    pub async fn connect(target: &Transport) -> Result<Self, BusError> {
        Self::connect_with_settle(target, SUBSCRIPTION_SETTLE).await
    }

    pub async fn connect_with_settle(target: &Transport, settle: Duration) -> Result<Self, BusError> {
        let publisher = ZmqPublisher::connect(target).await?;
        tokio::time::sleep(settle).await;
        Ok(Self {
            current: RwLock::new(publisher),
            settle,
        })
    }

    pub async fn target(&self) -> Transport {
        self.current.read().await.transport().clone()
    }

    /// Point future publishes at `target`.
    ///
    /// A no-op when already targeting it. On error the previous target stays
    /// in place.
    pub async fn retarget(&self, target: &Transport) -> Result<(), BusError> {
        if self.current.read().await.transport() == target {
            debug!(target = %target, "publisher already on target");
            return Ok(());
        }

        let next = ZmqPublisher::connect(target).await?;
        tokio::time::sleep(self.settle).await;

        let previous = {
            let mut guard = self.current.write().await;
            std::mem::replace(&mut *guard, next)
        };
        info!(from = %previous.transport(), to = %target, "publisher retargeted");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RetargetablePublisher {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let guard = self.current.read().await;
        guard.publish(message).await
    }
}
