//! # 代理管道集成测试
//!
//! 使用 wiremock 作为上游，验证目标选择、认证注入与错误映射

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use keeper::config::ServerConfig;
use keeper::logging::Logger;
use keeper::proxy::{ProxyServer, RequestPipeline};
use keeper::store::{ActiveCredential, CredentialStore};
use keeper::testing::StaticCredentialStore;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{body_string, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proxy_router(store: Arc<dyn CredentialStore>, debug_upstream: &str) -> axum::Router {
    let config = ServerConfig {
        debug_upstream: debug_upstream.to_string(),
        connect_timeout_seconds: 2,
        ..ServerConfig::default()
    };
    let pipeline = RequestPipeline::standard(store, &config, &Logger::noop()).unwrap();
    ProxyServer::new(Arc::new(pipeline), Duration::from_secs(1), Logger::noop()).router()
}

async fn error_code(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["code"].as_str().unwrap().to_string()
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn test_forwards_method_path_query_and_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(query_param("stream", "false"))
        .and(body_string(r#"{"model":"gpt-4o"}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-upstream", "yes")
                .set_body_string("created"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let store = Arc::new(StaticCredentialStore::with_credential(&upstream.uri(), "sk-live"));
    let router = proxy_router(store, &closed_port_url());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions?stream=false")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"model":"gpt-4o"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-upstream"], "yes");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"created");
}

#[tokio::test]
async fn test_authorization_is_overwritten() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header_eq("authorization", "Bearer sk-live"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;

    let store = Arc::new(StaticCredentialStore::with_credential(&upstream.uri(), "sk-live"));
    let router = proxy_router(store, &closed_port_url());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/v1/models")
                .header(header::AUTHORIZATION, "Bearer caller-supplied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let values: Vec<_> = received[0].headers.get_all("authorization").iter().collect();
    assert_eq!(values.len(), 1);
}

#[tokio::test]
async fn test_debug_flag_routes_to_debug_target() {
    let stored = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&stored)
        .await;

    let debug = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(query_param("debug", "true"))
        .and(header_eq("authorization", "Bearer sk-live"))
        .respond_with(ResponseTemplate::new(200).set_body_string("debug"))
        .expect(1)
        .mount(&debug)
        .await;

    let store = Arc::new(StaticCredentialStore::with_credential(&stored.uri(), "sk-live"));
    let router = proxy_router(store, &debug.uri());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/v1/models?debug=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"debug");
}

#[tokio::test]
async fn test_credential_change_applies_to_next_request() {
    let first = MockServer::start().await;
    Mock::given(header_eq("authorization", "Bearer sk-first"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&first)
        .await;

    let second = MockServer::start().await;
    Mock::given(header_eq("authorization", "Bearer sk-second"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&second)
        .await;

    let store = Arc::new(StaticCredentialStore::with_credential(&first.uri(), "sk-first"));
    let router = proxy_router(store.clone(), &closed_port_url());

    let request = || Request::builder().uri("/v1/models").body(Body::empty()).unwrap();

    let response = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store.set(ActiveCredential::new(second.uri(), "m", "sk-second"));
    let response = router.oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_missing_credential_returns_500_without_upstream_call() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let router = proxy_router(Arc::new(StaticCredentialStore::new(None)), &upstream.uri());

    let response = router
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(response).await, "CREDENTIAL_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_base_url_returns_500() {
    let store = Arc::new(StaticCredentialStore::with_credential("::not-a-url::", "sk-live"));
    let router = proxy_router(store, &closed_port_url());

    let response = router
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(response).await, "INVALID_UPSTREAM_TARGET");
}

#[tokio::test]
async fn test_unreachable_upstream_returns_502() {
    let store = Arc::new(StaticCredentialStore::with_credential(&closed_port_url(), "sk-live"));
    let router = proxy_router(store, &closed_port_url());

    let response = router
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "UPSTREAM_UNREACHABLE");
}

#[tokio::test]
async fn test_silent_upstream_returns_502_after_response_timeout() {
    // 接受连接后一直不回写响应头
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_url = format!("http://{}", listener.local_addr().unwrap());
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let config = ServerConfig {
        debug_upstream: closed_port_url(),
        connect_timeout_seconds: 1,
        response_timeout_seconds: 1,
        ..ServerConfig::default()
    };
    let store = Arc::new(StaticCredentialStore::with_credential(&silent_url, "sk-live"));
    let pipeline = RequestPipeline::standard(store, &config, &Logger::noop()).unwrap();
    let router =
        ProxyServer::new(Arc::new(pipeline), Duration::from_secs(1), Logger::noop()).router();

    let response = tokio::time::timeout(
        Duration::from_secs(10),
        router.oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap()),
    )
    .await
    .expect("request must not hang on a silent upstream")
    .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "UPSTREAM_UNREACHABLE");
    silent.abort();
}

#[tokio::test]
async fn test_serve_with_shutdown_drains_and_returns() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&upstream)
        .await;

    let config = ServerConfig::default();
    let store = Arc::new(StaticCredentialStore::with_credential(&upstream.uri(), "sk-live"));
    let pipeline = RequestPipeline::standard(store, &config, &Logger::noop()).unwrap();
    let server = ProxyServer::new(Arc::new(pipeline), Duration::from_secs(1), Logger::noop());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(listener, async move {
        let _ = rx.await;
    }));

    let body = reqwest::get(format!("http://{address}/ping"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "pong");

    tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
