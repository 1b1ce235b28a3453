//! Leader routing: which broker this replica publishes to.
//!
//! Leadership arrives as an always-current value on a `watch` channel
//! (`None` until a leader is known). One retargeting task consumes it and
//! moves the [`RetargetablePublisher`] to the leader's broker; the leader
//! itself publishes to its own broker over loopback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use warden_core::ClusterClient;

use crate::publisher::RetargetablePublisher;
use crate::transport::Transport;

/// Wait before retrying a failed retarget when leadership has not changed.
pub const RETARGET_RETRY: Duration = Duration::from_secs(2);

/// Publish routing of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "target", rename_all = "lowercase")]
pub enum RoutingState {
    /// No leader known yet: publish to the local broker.
    Unset,
    /// Another replica leads: publish to its broker.
    Follower(Transport),
    /// This replica leads: publish to the local broker.
    Leader,
}

impl RoutingState {
    /// Routing for leader `identity` as seen by the replica `self_identity`.
    pub fn resolve(identity: Option<&str>, self_identity: &str, port: u16) -> Self {
        match identity {
            None => Self::Unset,
            Some(id) if id == self_identity => Self::Leader,
            Some(id) => Self::Follower(Transport::tcp(id, port)),
        }
    }

    pub fn target(&self, port: u16) -> Transport {
        match self {
            Self::Unset | Self::Leader => Transport::loopback(port),
            Self::Follower(transport) => transport.clone(),
        }
    }

    /// Whether this replica's own broker receives the publishes.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Follower(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Follower(_) => "follower",
            Self::Leader => "leader",
        }
    }
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follower(target) => write!(f, "follower({target})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ── Lease watcher ───────────────────────────────────────────────────

/// Polls a coordination lease and publishes its holder on a `watch` channel.
pub struct LeaseWatcher {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    name: String,
    interval: Duration,
}

impl LeaseWatcher {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
            interval,
        }
    }

    /// Start polling. Only changes of the holder are sent; read errors keep
    /// the last known value.
    pub fn spawn(self) -> (watch::Receiver<Option<String>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let holder = match self.client.lease_holder(&self.namespace, &self.name).await {
                    Ok(holder) => holder,
                    Err(e) if e.is_not_found() => None,
                    Err(e) => {
                        warn!(lease = %self.name, error = %e, "cannot read leader lease");
                        continue;
                    }
                };
                let changed = tx.send_if_modified(|current| {
                    if *current == holder {
                        return false;
                    }
                    *current = holder.clone();
                    true
                });
                if changed {
                    info!(lease = %self.name, leader = holder.as_deref().unwrap_or(""), "new leader");
                }
                if tx.is_closed() {
                    debug!("leader watch closed");
                    break;
                }
            }
        });
        (rx, handle)
    }
}

// ── Retargeter ──────────────────────────────────────────────────────

/// Start the task that keeps `publisher` on the current leader's broker.
///
/// Returns the routing state as a `watch` receiver. A failed retarget is
/// logged and retried; the publisher stays on its previous target meanwhile.
pub fn spawn_retargeter(
    mut leader: watch::Receiver<Option<String>>,
    publisher: Arc<RetargetablePublisher>,
    self_identity: String,
    port: u16,
) -> (watch::Receiver<RoutingState>, JoinHandle<()>) {
    let (state_tx, state_rx) = watch::channel(RoutingState::Unset);

    let handle = tokio::spawn(async move {
        loop {
            let identity = leader.borrow_and_update().clone();
            let next = RoutingState::resolve(identity.as_deref(), &self_identity, port);
            let target = next.target(port);

            let applied = match publisher.retarget(&target).await {
                Ok(()) => {
                    info!(state = %next, "routing updated");
                    state_tx.send_replace(next);
                    true
                }
                Err(e) => {
                    error!(target = %target, error = %e, "cannot retarget publisher");
                    false
                }
            };

            if applied {
                if leader.changed().await.is_err() {
                    break;
                }
            } else {
                tokio::select! {
                    changed = leader.changed() => if changed.is_err() { break },
                    _ = tokio::time::sleep(RETARGET_RETRY) => {}
                }
            }
        }
        debug!("leader stream ended, retargeter stopped");
    });

    (state_rx, handle)
}
