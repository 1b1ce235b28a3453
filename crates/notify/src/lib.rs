//! Result sinks for dispatch outcomes.
//!
//! This crate provides:
//! - `ResultSink` trait for pluggable outcome destinations
//! - Structured-log, cluster-event and webhook sinks
//! - Minijinja template rendering for outcome messages
//! - `SinkFanout`, a bounded queue delivering each line to every sink

pub mod fanout;
pub mod k8sevents;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use fanout::{build_sinks, SinkDrain, SinkFanout, DEFAULT_CAPACITY, DEFAULT_SINK_TIMEOUT};
pub use k8sevents::K8sEventsSink;
pub use log::LogSink;
pub use traits::{ResultSink, SinkError};
pub use webhook::WebhookSink;
