//! Minijinja rendering of outcome messages.
//!
//! The context is the serialized [`LogLine`].

use warden_core::LogLine;

use crate::traits::SinkError;

/// Plain-text message used by the cluster-event and webhook sinks.
pub const PLAINTEXT_TEMPLATE: &str = "Status: {{ status }}
Rule: {{ rule }}
Action: {{ action }}
Actionner: {{ actionner }}
Event: {{ event }}
{%- for key, value in objects|items %}
{{ key }}: {{ value }}
{%- endfor %}
{%- if error %}
Error: {{ error }}
{%- endif %}
{%- if output %}
Output: {{ output }}
{%- endif %}
TraceID: {{ trace_id }}
";

/// Render [`PLAINTEXT_TEMPLATE`] with `line` as the context.
pub fn render_plaintext(line: &LogLine) -> Result<String, SinkError> {
    minijinja::Environment::new()
        .render_str(PLAINTEXT_TEMPLATE, line)
        .map_err(|e| SinkError::Template(e.to_string()))
}

/// Drop characters that break cluster event messages: braces, brackets,
/// backslashes, double quotes and control characters other than newline.
pub fn strip_special_characters(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '[' | ']' | '\\' | '"'))
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}

/// Cut `input` to at most `max` characters.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Event;

    fn line() -> LogLine {
        let event = Event::from_json(
            br#"{"uuid":"trace-1","priority":"Critical","rule":"shell","output":"shell in pod-a",
                 "output_fields":{"k8s.pod.name":"pod-a","k8s.ns.name":"ns-default"}}"#,
        )
        .unwrap();
        LogLine::success(&event, "R1", "A1", "kubernetes:labelize")
    }

    #[test]
    fn plaintext_success() {
        let text = render_plaintext(&line().with_output(Some("labelized".into()))).unwrap();
        assert!(text.starts_with("Status: success\nRule: R1\n"), "{text}");
        assert!(text.contains("\npod: pod-a"), "{text}");
        assert!(text.contains("\nnamespace: ns-default"), "{text}");
        assert!(text.contains("\nOutput: labelized"), "{text}");
        assert!(text.contains("\nTraceID: trace-1"), "{text}");
        assert!(!text.contains("Error:"), "{text}");
    }

    #[test]
    fn plaintext_failure_has_error() {
        let text = render_plaintext(&line().failed("pods \"pod-a\" not found")).unwrap();
        assert!(text.starts_with("Status: failure"), "{text}");
        assert!(text.contains("Error: pods \"pod-a\" not found"), "{text}");
    }

    #[test]
    fn strips_special_characters() {
        assert_eq!(
            strip_special_characters("labels: {\"a\": [1]}\\\u{7}\nnext"),
            "labels: a: 1\nnext"
        );
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars(&"x".repeat(2000), 1024).len(), 1024);
    }
}
