//! HTTP router construction.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

/// Fixed per-request deadline for the ingress server.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(api::submit_event))
        .route("/healthz", get(api::health))
        .route("/rules", get(api::rules))
        .route("/metrics", get(api::metrics))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PipelineMetrics;
    use crate::testing::{event_json, rule_set, RecordingPublisher, TWO_RULES};

    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use warden_bus::{BrokerMetrics, RoutingState};
    use warden_rules::RuleStore;

    struct TestApp {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
        publisher: Arc<RecordingPublisher>,
        _routing: watch::Sender<RoutingState>,
    }

    fn app() -> TestApp {
        let (dir, rules) = rule_set(TWO_RULES);
        let publisher = Arc::new(RecordingPublisher::default());
        let (routing_tx, routing_rx) = watch::channel(RoutingState::Leader);
        let state = Arc::new(AppState {
            rules: Arc::new(RuleStore::new(rules)),
            publisher: publisher.clone(),
            metrics: Arc::new(PipelineMetrics::default()),
            broker: Arc::new(BrokerMetrics::default()),
            routing: routing_rx,
            started: Instant::now(),
        });
        TestApp {
            _dir: dir,
            state,
            publisher,
            _routing: routing_tx,
        }
    }

    async fn call(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = build_router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz() {
        let app = app();
        let (status, body) = call(&app, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn post_alert_publishes_matches() {
        let app = app();
        let (status, body) = call(&app, post_json(event_json("Terminal shell in container"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "matched": 2, "published": 3 }));
        assert_eq!(app.publisher.messages().len(), 3);
    }

    #[tokio::test]
    async fn malformed_alert_is_rejected() {
        let app = app();
        let (status, body) = call(&app, post_json("{not json".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid alert payload"));

        let (status, _) = call(&app, post_json(r#"{"output":"missing priority and rule"}"#.into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn rules_lists_loaded_rules() {
        let app = app();
        let (status, body) = call(&app, get("/rules")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["rules"][0]["name"], "R1");
        assert_eq!(body["rules"][0]["actions"][1]["name"], "A2");
        assert_eq!(body["rules"][1]["match"]["priority"], ">=Warning");
    }

    #[tokio::test]
    async fn metrics_reflect_ingress() {
        let app = app();
        call(&app, post_json(event_json("Terminal shell in container"))).await;
        call(&app, post_json(event_json("Something else"))).await;

        let (status, body) = call(&app, get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events_received"], 2);
        assert_eq!(body["actions_matched"], 3);
        assert_eq!(body["envelopes_published"], 3);
        assert_eq!(body["publish_errors"], 0);
        assert_eq!(body["broker"]["duplicates_dropped"], 0);
        assert_eq!(body["routing"]["state"], "leader");
        assert_eq!(body["rules"], 2);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = app();
        let (status, _) = call(&app, get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
