//! Generic HTTP webhook sink.
//!
//! POSTs `{"text": <rendered message>, "logline": <LogLine>}` to a configured
//! URL, which chat incoming-webhooks accept as-is.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use warden_core::LogLine;

use crate::templating::render_plaintext;
use crate::traits::{ResultSink, SinkError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct Payload<'a> {
    text: String,
    logline: &'a LogLine,
}

/// Delivers outcomes as JSON over HTTP.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time.
#[derive(Debug)]
pub struct WebhookSink {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Missing environment variables produce a [`SinkError::Config`].
    pub fn new(url: &str, headers: &HashMap<String, String>) -> Result<Self, SinkError> {
        let url = resolve_env_vars(url)?;
        if url.trim().is_empty() {
            return Err(SinkError::Config("webhook url must not be empty".into()));
        }

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            url,
            headers: resolved_headers,
            client,
        })
    }
}

#[async_trait::async_trait]
impl ResultSink for WebhookSink {
    async fn send(&self, line: &LogLine) -> Result<(), SinkError> {
        let payload = Payload {
            text: render_plaintext(line)?,
            logline: line,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %self.url, %status, body = %body, "webhook returned non-2xx status");
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(url = %self.url, status = %status, "webhook notification delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, SinkError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(SinkError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| SinkError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
