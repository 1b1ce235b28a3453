//! Structured-log sink. Always enabled.

use warden_core::LogLine;

use crate::traits::{ResultSink, SinkError};

#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl ResultSink for LogSink {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError> {
        if line.is_success() {
            tracing::info!(
                status = %line.status,
                subject = %line.subject,
                rule = %line.rule,
                action = %line.action,
                actionner = %line.actionner,
                output = line.output.as_deref().unwrap_or(""),
                trace_id = %line.trace_id,
                "action result"
            );
        } else {
            tracing::warn!(
                status = %line.status,
                subject = %line.subject,
                rule = %line.rule,
                action = %line.action,
                actionner = %line.actionner,
                error = line.error.as_deref().unwrap_or(""),
                trace_id = %line.trace_id,
                "action result"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
