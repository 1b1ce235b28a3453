//! Shared domain types for the warden response engine.
//!
//! - [`Event`]: the normalized security alert
//! - [`LogLine`]: the outcome record of one dispatch attempt
//! - [`Config`]: layered runtime configuration
//! - [`ClusterClient`]: the seam to the cluster API, with a `reqwest` implementation

pub mod cluster;
pub mod config;
pub mod event;
pub mod kube;
pub mod log_line;

pub use cluster::{ClusterClient, ClusterError, ClusterEvent};
pub use config::{Config, ConfigLoadError, LogFormat};
pub use event::{Event, Priority, Subject};
pub use kube::KubeClient;
pub use log_line::{LogLine, Status};
