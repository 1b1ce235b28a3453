//! Replica-local message broker with windowed deduplication.
//!
//! Every replica embeds an [`EventBroker`]. Publishers send matched-action
//! envelopes to the current leader's broker, which forwards each dedup key
//! at most once per window to its local consumer.

pub mod broker;
pub mod dedup;
pub mod error;
pub mod leader;
pub mod message;
pub mod publisher;
pub mod pubsub;
pub mod traits;
pub mod transport;

pub use broker::{BrokerConfig, BrokerMetrics, BrokerShutdown, BrokerStats, EventBroker};
pub use dedup::DedupWindow;
pub use error::BusError;
pub use leader::{spawn_retargeter, LeaseWatcher, RoutingState};
pub use message::{Message, ACTIONS_TOPIC};
pub use publisher::RetargetablePublisher;
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use traits::{EventPublisher, EventSubscriber};
pub use transport::Transport;
