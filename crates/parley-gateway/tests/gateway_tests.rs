// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the gateway HTTP surface: routing, auth, request
//! validation, timeout mapping, and the response envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use parley_agent::{ChatPipeline, IdentityResolver, NullToolExecutor};
use parley_cascade::{ProviderCascade, ProviderRegistry};
use parley_config::model::ProviderSettings;
use parley_config::ParleyConfig;
use parley_core::types::{
    AdapterType, CascadeResult, CompletionRequest, ConversationRecord, HealthStatus, Session,
};
use parley_core::{ConversationStore, ParleyError, PluginAdapter, ProviderAdapter};
use parley_gateway::{build_router, GatewayState, ServerConfig};

struct NoopStore;

#[async_trait]
impl PluginAdapter for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }
    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }
    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for NoopStore {
    async fn initialize(&self) -> Result<(), ParleyError> {
        Ok(())
    }
    async fn close(&self) -> Result<(), ParleyError> {
        Ok(())
    }
    async fn load(&self, _key: &str) -> Result<Option<ConversationRecord>, ParleyError> {
        Ok(None)
    }
    async fn save(&self, _record: &ConversationRecord) -> Result<(), ParleyError> {
        Ok(())
    }
    async fn find_session(&self, _key: &str) -> Result<Option<Session>, ParleyError> {
        Ok(None)
    }
    async fn create_session(&self, _session: &Session) -> Result<(), ParleyError> {
        Ok(())
    }
    async fn touch_session(&self, _session_id: Uuid) -> Result<(), ParleyError> {
        Ok(())
    }
}

/// Provider that replies instantly or hangs forever.
struct TestProvider {
    hang: bool,
}

#[async_trait]
impl PluginAdapter for TestProvider {
    fn name(&self) -> &str {
        "test"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }
    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }
    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for TestProvider {
    fn supports_tools(&self) -> bool {
        false
    }
    async fn complete(&self, _request: CompletionRequest) -> Result<CascadeResult, ParleyError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(CascadeResult::ok("test", Some("Hello!".into()), Vec::new()))
    }
}

fn test_router(bearer_token: Option<&str>, hang: bool, request_timeout: Duration) -> axum::Router {
    let store: Arc<NoopStore> = Arc::new(NoopStore);
    let mut registry = ProviderRegistry::new();
    registry.register(
        ProviderSettings {
            name: "test".into(),
            priority: 1,
            enabled: true,
            fallback_only: false,
            timeout_ms: 60_000,
            supports_tools: false,
            model: "test-1".into(),
            fallback_model: None,
            api_key: None,
            base_url: None,
            max_tokens: 1024,
        },
        Arc::new(TestProvider { hang }),
    );
    let cascade = Arc::new(ProviderCascade::new(Arc::new(registry)));
    let identity = Arc::new(IdentityResolver::new(
        store.clone(),
        Duration::from_secs(60),
    ));
    let pipeline = Arc::new(ChatPipeline::new(
        ParleyConfig::default(),
        store,
        identity,
        cascade,
        Arc::new(NullToolExecutor),
        None,
    ));

    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        bearer_token: bearer_token.map(String::from),
        request_timeout_ms: request_timeout.as_millis() as u64,
    };
    let state = GatewayState {
        pipeline,
        request_timeout,
        start_time: Instant::now(),
    };
    build_router(&config, state)
}

fn chat_request(body: serde_json::Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let router = test_router(Some("secret"), false, Duration::from_secs(5));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_requires_bearer_when_configured() {
    let router = test_router(Some("secret"), false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(serde_json::json!({"userQuery": "hi"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_accepts_valid_bearer() {
    let router = test_router(Some("secret"), false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(
            serde_json::json!({"userQuery": "hi"}),
            Some("secret"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["content"], "Hello!");
    assert_eq!(body["provider"], "test");
    assert!(body["requestId"].is_string());
    assert!(body["executionTimeMs"].is_number());
    assert!(body["memory"]["identityKey"].is_string());
}

#[tokio::test]
async fn chat_without_auth_configured_is_open() {
    let router = test_router(None, false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(serde_json::json!({"userQuery": "hi"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_query_and_messages_is_bad_request() {
    let router = test_router(None, false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(serde_json::json!({}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn messages_array_is_accepted_without_user_query() {
    let router = test_router(None, false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(
            serde_json::json!({"messages": [{"role": "user", "content": "hello"}]}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn client_session_id_is_ignored_in_favor_of_resolver() {
    let router = test_router(None, false, Duration::from_secs(5));
    let supplied = "11111111-1111-1111-1111-111111111111";
    let response = router
        .oneshot(chat_request(
            serde_json::json!({"userQuery": "hi", "sessionId": supplied}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["sessionId"].is_string());
    assert_ne!(body["sessionId"], supplied);
}

#[tokio::test]
async fn unknown_role_is_bad_request() {
    let router = test_router(None, false, Duration::from_secs(5));
    let response = router
        .oneshot(chat_request(
            serde_json::json!({"messages": [{"role": "wizard", "content": "zap"}]}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hung_pipeline_maps_to_gateway_timeout() {
    let router = test_router(None, true, Duration::from_millis(100));
    let response = router
        .oneshot(chat_request(serde_json::json!({"userQuery": "hi"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["requestId"].is_string());
    assert!(body["executionTimeMs"].is_number());
}
