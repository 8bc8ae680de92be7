//! Delivery over real HTTP: engine -> reqwest -> axum test server

mod common;

use common::{engine, wait_until_drained, TempDb, TestServer};
use outbox_core::application::EnqueueOptions;
use outbox_core::domain::{FlushResult, HttpMethod};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_post_delivered_as_json() {
    let server = TestServer::start([]).await;
    let db = TempDb::new("post");
    let engine = engine(db.open().await, &server.base_url, true);

    engine
        .post("/api/objects", Some(json!({"name": "site A"})), None)
        .await
        .unwrap();
    wait_until_drained(&engine).await;

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "POST");
    assert_eq!(received[0].path, "/api/objects");
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(received[0].json(), json!({"name": "site A"}));
}

#[tokio::test]
async fn test_get_sent_without_body() {
    let server = TestServer::start([]).await;
    let db = TempDb::new("get");
    let engine = engine(db.open().await, &server.base_url, true);

    engine
        .enqueue(EnqueueOptions::new(HttpMethod::Get, "/api/ping").body(json!({"ignored": true})))
        .await
        .unwrap();
    wait_until_drained(&engine).await;

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, "GET");
    assert!(received[0].body.is_empty());
    assert!(received[0].content_type.is_none());
}

#[tokio::test]
async fn test_service_unavailable_retried_until_success() {
    let server = TestServer::start([503, 503]).await;
    let db = TempDb::new("retry");
    let engine = engine(db.open().await, &server.base_url, true);
    let mut results = engine.subscribe_results();

    engine
        .enqueue(
            EnqueueOptions::new(HttpMethod::Put, "/api/works/7")
                .body(json!({"status": "done"}))
                .retry_base_delay_ms(100),
        )
        .await
        .unwrap();

    let mut seen: Vec<FlushResult> = Vec::new();
    while seen.len() < 3 {
        let result = tokio::time::timeout(Duration::from_secs(10), results.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(result);
    }
    assert_eq!(server.received().len(), 3);
    assert_eq!(engine.status().pending, 0);
    assert!(seen[0].will_retry());
    assert!(seen[1].will_retry());
    assert_eq!(seen[2].response().map(|r| r.status), Some(200));
}

#[tokio::test]
async fn test_not_found_dropped_after_one_attempt() {
    let server = TestServer::start([404]).await;
    let db = TempDb::new("notfound");
    let engine = engine(db.open().await, &server.base_url, false);

    engine
        .delete("/api/documents/missing", None, None)
        .await
        .unwrap();
    engine.set_online(true);
    wait_until_drained(&engine).await;

    assert_eq!(server.received().len(), 1);
    assert!(engine.jobs().is_empty());
}

#[tokio::test]
async fn test_bearer_token_added_by_request_transform() {
    let server = TestServer::start([]).await;
    let db = TempDb::new("auth");
    let base_url = server.base_url.clone();
    let engine = outbox_core::application::QueueEngine::builder(
        std::sync::Arc::new(outbox_infra_sqlite::SqliteDurableStore::new(
            db.open().await,
            std::sync::Arc::new(outbox_core::port::time_provider::SystemTimeProvider),
        )),
        std::sync::Arc::new(outbox_infra_http::ReqwestTransport::new()),
    )
    .url_transform(move |url| format!("{}{}", base_url, url))
    .request_transform(|request| request.set_header("Authorization", "Bearer t0ken"))
    .build();

    engine.patch("/api/violations/3", Some(json!({})), None).await.unwrap();
    wait_until_drained(&engine).await;

    assert_eq!(
        server.received()[0].authorization.as_deref(),
        Some("Bearer t0ken")
    );
}
