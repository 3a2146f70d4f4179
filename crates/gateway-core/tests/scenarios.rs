//! End-to-end scenarios over the Retry Controller: identity selection,
//! quota rotation, anonymous provisioning, and server-error exhaustion,
//! each driven against mock HTTP servers standing in for the identity
//! service and the upstream AI endpoint.

use std::sync::Arc;

use gateway_core::{Engine, EngineConfig};
use pool::{IdentityStore, Priority};
use upstream::frame::{encode_hex, encode_url_safe_no_pad};
use upstream::proto::{
    AgentMessage, AgentOutput, AppendToMessageContent, ClientAction, ClientActionKind, ClientActions, Init,
    ResponseEvent, ResponseEventKind,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_event(conversation_id: &str, task_id: &str) -> ResponseEvent {
    ResponseEvent {
        kind: Some(ResponseEventKind::Init(Init {
            conversation_id: conversation_id.to_string(),
            task_id: task_id.to_string(),
        })),
    }
}

fn text_event(text: &str) -> ResponseEvent {
    ResponseEvent {
        kind: Some(ResponseEventKind::ClientActions(ClientActions {
            actions: vec![ClientAction {
                kind: Some(ClientActionKind::AppendToMessageContent(AppendToMessageContent {
                    message: Some(AgentMessage {
                        agent_output: Some(AgentOutput { text: text.to_string() }),
                    }),
                })),
            }],
        })),
    }
}

fn sse_body(events: &[(ResponseEvent, bool)]) -> String {
    let mut body = String::new();
    for (event, use_hex) in events {
        let bytes = prost::Message::encode_to_vec(event);
        let encoded = if *use_hex { encode_hex(&bytes) } else { encode_url_safe_no_pad(&bytes) };
        body.push_str(&format!("data: {encoded}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_refresh(server: &MockServer, refresh_token: &str, access_token: &str) {
    Mock::given(method("POST"))
        .and(body_string_contains(refresh_token))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access_token,
            "expires_in": "3600",
        })))
        .mount(server)
        .await;
}

fn base_config(identity_server: &MockServer, upstream_server: &MockServer) -> EngineConfig {
    EngineConfig::new(format!("{}/stream", upstream_server.uri()), identity_server.uri(), "fake-key")
}

#[tokio::test]
async fn s1_happy_path_prefers_anonymous_and_caches_its_credential() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    mount_refresh(&identity_server, "rt-anon", "at-anon").await;
    mount_refresh(&identity_server, "rt-personal", "at-personal").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer at-anon"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[(init_event("c-1", "t-1"), true)])))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());
    store.add("rt-personal".into(), Priority::Personal, "personal".into());

    let engine = Engine::new(store.clone(), reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let out = engine.drive_request(vec![1, 2, 3]).await.unwrap();

    assert_eq!(out.conversation_id.as_deref(), Some("c-1"));
    assert!(store.get("rt-anon").unwrap().cached_access_credential.is_some());
    assert!(store.get("rt-personal").unwrap().cached_access_credential.is_none());
    assert_eq!(store.get("rt-personal").unwrap().priority, Priority::Personal);
}

#[tokio::test]
async fn s2_quota_rotation_falls_through_to_personal_and_concatenates_text() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    mount_refresh(&identity_server, "rt-anon", "at-anon").await;
    mount_refresh(&identity_server, "rt-personal", "at-personal").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer at-anon"))
        .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":"No remaining quota remaining for this user"}"#))
        .mount(&upstream_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer at-personal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[
            (init_event("c-1", "t-1"), true),
            (text_event("hel"), true),
            (text_event("lo"), false),
        ])))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());
    store.add("rt-personal".into(), Priority::Personal, "personal".into());

    let engine = Engine::new(store.clone(), reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let out = engine.drive_request(vec![9]).await.unwrap();

    assert_eq!(out.text, "hello");
    assert_eq!(out.conversation_id.as_deref(), Some("c-1"));
    assert_eq!(out.events.len(), 3);
    assert_eq!(store.get("rt-anon").unwrap().priority, Priority::Anonymous);
    // P5: the request as a whole succeeded, so the identity rotated away
    // from (rt-anon) must be left exactly as it was — no failure recorded.
    assert_eq!(store.health_report().identities.iter().find(|i| i.display_name == "anon").unwrap().failure_count, 0);
}

#[tokio::test]
async fn s3_quota_exhaustion_with_no_alternate_provisions_a_fresh_anonymous_identity() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    mount_refresh(&identity_server, "rt-anon", "at-anon").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer at-anon"))
        .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":"No remaining quota remaining for this user"}"#))
        .mount(&upstream_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer at-new-anon"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[(init_event("c-2", "t-2"), true)])))
        .mount(&upstream_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "createAnonymousUser": {
                    "__typename": "CreateAnonymousUserOutput",
                    "idToken": "id-token-xyz",
                }
            }
        })))
        .mount(&identity_server)
        .await;

    let exchange_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "refreshToken": "rt-new-anon",
            "idToken": "at-new-anon",
        })))
        .mount(&exchange_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());

    let mut config = base_config(&identity_server, &upstream_server);
    config.graphql_url = identity_server.uri();
    config.custom_token_exchange_url = exchange_server.uri();

    let engine = Engine::new(store.clone(), reqwest::Client::new(), config);
    let out = engine.drive_request(vec![1]).await.unwrap();

    assert_eq!(out.conversation_id.as_deref(), Some("c-2"));
    assert!(store.get("rt-anon").is_some());
    assert!(store.get("rt-new-anon").is_some());
    assert_eq!(store.get("rt-new-anon").unwrap().priority, Priority::Anonymous);
    // P5: the request succeeded on the freshly provisioned identity, so the
    // original quota-exhausted identity must not carry a recorded failure.
    assert_eq!(store.health_report().identities.iter().find(|i| i.display_name == "anon").unwrap().failure_count, 0);
}

#[tokio::test]
async fn s4_provisioning_rate_limit_is_terminal_and_increments_failure_count() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    mount_refresh(&identity_server, "rt-anon", "at-anon").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":"No remaining quota remaining for this user"}"#))
        .mount(&upstream_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&identity_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());

    let mut config = base_config(&identity_server, &upstream_server);
    config.graphql_url = identity_server.uri();

    let engine = Engine::new(store.clone(), reqwest::Client::new(), config);
    let err = engine.drive_request(vec![1]).await.unwrap_err();

    assert_eq!(err.category(), "provisioning_rate_limited");
    assert_eq!(store.health_report().identities[0].failure_count, 1);
}

#[tokio::test]
async fn s5_server_error_with_no_alternate_identity_fails_without_provisioning() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    mount_refresh(&identity_server, "rt-personal", "at-personal").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-personal".into(), Priority::Personal, "personal".into());

    let engine = Engine::new(store.clone(), reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let err = engine.drive_request(vec![1]).await.unwrap_err();

    match err {
        gateway_core::CoreError::UpstreamServerError { status, .. } => assert_eq!(status, 500),
        other => panic!("expected UpstreamServerError, got {other:?}"),
    }
    assert_eq!(store.health_report().identities[0].failure_count, 1);
}

#[tokio::test]
async fn s6_mixed_hex_and_base64_framing_both_decode_in_order() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;
    mount_refresh(&identity_server, "rt-anon", "at-anon").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[
            (init_event("c-6", "t-6"), true),
            (text_event("mixed"), false),
        ])))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());

    let engine = Engine::new(store.clone(), reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let out = engine.drive_request(vec![1]).await.unwrap();

    assert_eq!(out.events.len(), 2);
    assert_eq!(out.text, "mixed");
}

#[tokio::test]
async fn budget_never_exceeds_two_sse_transactions() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;
    mount_refresh(&identity_server, "rt-a", "at-a").await;
    mount_refresh(&identity_server, "rt-b", "at-b").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-a".into(), Priority::Anonymous, "a".into());
    store.add("rt-b".into(), Priority::Shared, "b".into());

    let engine = Engine::new(store.clone(), reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let err = engine.drive_request(vec![1]).await.unwrap_err();

    assert!(matches!(err, gateway_core::CoreError::UpstreamServerError { .. }));
    let requests = upstream_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2, "retry controller must stop after exactly 2 attempts");
}

#[tokio::test]
async fn protocol_error_when_response_decodes_to_no_events() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;
    mount_refresh(&identity_server, "rt-anon", "at-anon").await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: not-hex-or-base64!!\n\ndata: [DONE]\n\n"))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    store.add("rt-anon".into(), Priority::Anonymous, "anon".into());

    let engine = Engine::new(store, reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let err = engine.drive_request(vec![1]).await.unwrap_err();

    assert_eq!(err.category(), "upstream_protocol_error");
}

#[tokio::test]
async fn drive_request_on_empty_pool_fails_fast() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;
    let store = Arc::new(IdentityStore::new());

    let engine = Engine::new(store, reqwest::Client::new(), base_config(&identity_server, &upstream_server));
    let err = engine.drive_request(vec![1]).await.unwrap_err();
    assert_eq!(err.category(), "pool_exhausted");
}

#[tokio::test]
async fn empty_pool_falls_back_to_configured_jwt_when_present() {
    let identity_server = MockServer::start().await;
    let upstream_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stream"))
        .and(header("authorization", "Bearer configured-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[(init_event("c-7", "t-7"), true)])))
        .mount(&upstream_server)
        .await;

    let store = Arc::new(IdentityStore::new());
    let mut config = base_config(&identity_server, &upstream_server);
    config.fallback_jwt = Some("configured-jwt".to_string());

    let engine = Engine::new(store, reqwest::Client::new(), config);
    let out = engine.drive_request(vec![1]).await.unwrap();

    assert_eq!(out.conversation_id.as_deref(), Some("c-7"));
}
