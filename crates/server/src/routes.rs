use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tracing::{debug, warn};

use amanah_agent::ConversationService;
use amanah_channel::WebhookEvent;

use crate::health;

/// The provider retries anything but a 200, so every event gets this answer.
pub const ACK: &str = "OK";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
}

pub fn router(service: Arc<ConversationService>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health::health))
        .with_state(AppState { service })
}

/// Handles the event before answering so one phone's messages stay in
/// delivery order.
pub async fn webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => {
            let outcome = state.service.handle_event(event).await;
            debug!(event_name = "webhook.handled", outcome = ?outcome, "webhook processed");
        }
        Err(error) => warn!(
            event_name = "webhook.malformed",
            error = %error,
            bytes = body.len(),
            "webhook body could not be decoded"
        ),
    }
    (StatusCode::OK, ACK)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use amanah_agent::ScriptedProvider;
    use amanah_channel::RecordingGateway;
    use amanah_core::config::AppConfig;
    use amanah_db::InMemoryCommerce;

    use super::{router, ACK};
    use crate::bootstrap::assemble;

    struct TestApp {
        router: Router,
        provider: Arc<ScriptedProvider>,
        gateway: Arc<RecordingGateway>,
    }

    async fn test_app() -> TestApp {
        let (store, _) = InMemoryCommerce::demo().await.expect("demo catalog");
        let provider = Arc::new(ScriptedProvider::new());
        let gateway = Arc::new(RecordingGateway::default());
        let service = assemble(
            &AppConfig::default(),
            store.commerce(),
            provider.clone(),
            gateway.clone(),
            None,
        )
        .expect("pipeline assembles");
        TestApp { router: router(service), provider, gateway }
    }

    async fn post_webhook(router: &Router, body: impl Into<Body>) -> (StatusCode, String) {
        let request = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .expect("request");
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn message(id: &str, from: &str, body: &str) -> String {
        json!({ "event": "message", "payload": { "id": id, "from": from, "body": body } })
            .to_string()
    }

    #[tokio::test]
    async fn direct_message_is_answered_and_acknowledged() {
        let app = test_app().await;
        app.provider.push_reply("Wa'alaikumussalam, ada yang bisa kami bantu?").await;

        let (status, body) =
            post_webhook(&app.router, message("w-1", "6281200000001@c.us", "salam")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK);
        assert_eq!(
            app.gateway.texts_to("6281200000001").await,
            vec!["Wa'alaikumussalam, ada yang bisa kami bantu?".to_string()]
        );
    }

    #[tokio::test]
    async fn ignored_and_malformed_events_get_the_same_acknowledgement() {
        let app = test_app().await;

        let group = post_webhook(&app.router, message("w-2", "120363@g.us", "halo")).await;
        let status_event = post_webhook(&app.router, r#"{"event":"session.status"}"#).await;
        let garbage = post_webhook(&app.router, "not json").await;

        for (status, body) in [group, status_event, garbage] {
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, ACK);
        }
        assert!(app.gateway.sent().await.is_empty());
        assert!(app.provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn health_reports_pipeline_counters() {
        let app = test_app().await;
        app.provider.push_reply("Halo!").await;
        post_webhook(&app.router, message("w-3", "6281200000001@c.us", "halo")).await;

        let request = Request::get("/health").body(Body::empty()).expect("request");
        let response = app.router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["llm_provider"], "scripted");
        assert_eq!(payload["active_sessions"], 1);
        assert_eq!(payload["dedup_entries"], 1);
    }
}
