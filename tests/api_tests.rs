mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use common::MemoryStore;
use linkwatch::api::{create_router, AppState};
use linkwatch::checker::StateHandle;
use linkwatch::models::CheckResult;
use linkwatch::observability::HealthChecker;
use linkwatch::repositories::Store;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Spins up the full router over an in-memory store on an ephemeral port.
async fn serve_api() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let trait_store = store.clone() as Arc<dyn Store>;
    let health = Arc::new(HealthChecker::new(trait_store.clone(), StateHandle::new()));
    let app = create_router(AppState::new(trait_store, health));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), store)
}

#[tokio::test]
async fn create_target_returns_201_then_200() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/v1/targets"))
        .json(&json!({"url": "https://example.com/a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["url"], "https://example.com/a");
    assert_eq!(first["host"], "example.com");

    let second = client
        .post(format!("{base}/v1/targets"))
        .json(&json!({"url": "HTTPS://EXAMPLE.com/a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["id"], first["id"]);
}

#[tokio::test]
async fn idempotency_key_flow_matches_the_protocol() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{base}/v1/targets"))
        .header("Idempotency-Key", "K")
        .json(&json!({"url": "https://x.example/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let created: Value = created.json().await.unwrap();

    let replay = client
        .post(format!("{base}/v1/targets"))
        .header("Idempotency-Key", "K")
        .json(&json!({"url": "https://x.example/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 200);
    let replay: Value = replay.json().await.unwrap();
    assert_eq!(replay["id"], created["id"]);

    let conflict = client
        .post(format!("{base}/v1/targets"))
        .header("Idempotency-Key", "K")
        .json(&json!({"url": "https://y.example/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), 409);
    let conflict: Value = conflict.json().await.unwrap();
    assert_eq!(conflict["code"], "IDEMPOTENCY_CONFLICT");
}

#[tokio::test]
async fn invalid_bodies_are_rejected_with_400() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    let bad_url = client
        .post(format!("{base}/v1/targets"))
        .json(&json!({"url": "ftp://example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_url.status(), 400);
    let bad_url: Value = bad_url.json().await.unwrap();
    assert_eq!(bad_url["code"], "INVALID_URL");

    let empty = client
        .post(format!("{base}/v1/targets"))
        .json(&json!({"url": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);
    let empty: Value = empty.json().await.unwrap();
    assert_eq!(empty["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn target_listing_paginates_over_http() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    for n in 0..3 {
        let resp = client
            .post(format!("{base}/v1/targets"))
            .json(&json!({ "url": format!("https://example.com/{n}") }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let page: Value = client
        .get(format!("{base}/v1/targets?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    let token = page["next_page_token"].as_str().unwrap().to_string();

    let rest: Value = client
        .get(format!("{base}/v1/targets?limit=2&page_token={token}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rest["items"].as_array().unwrap().len(), 1);
    assert!(rest.get("next_page_token").is_none());

    let bad_token = client
        .get(format!("{base}/v1/targets?page_token=!!!"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_token.status(), 400);
}

#[tokio::test]
async fn host_filter_is_case_insensitive_on_input() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    for url in ["https://a.example.com/", "https://b.example.com/"] {
        client
            .post(format!("{base}/v1/targets"))
            .json(&json!({ "url": url }))
            .send()
            .await
            .unwrap();
    }

    let page: Value = client
        .get(format!("{base}/v1/targets?host=A.EXAMPLE.COM"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["host"], "a.example.com");
}

#[tokio::test]
async fn results_endpoint_honors_since_and_limit() {
    let (base, store) = serve_api().await;
    let client = reqwest::Client::new();

    let target = store.seed_target("https://example.com/watched");
    let now = Utc::now();
    for n in 0..5i64 {
        store
            .append_check_result(&CheckResult {
                target_id: target.id.clone(),
                checked_at: now - ChronoDuration::minutes(n),
                status_code: Some(200),
                latency_ms: Some(10 + n),
                error: None,
            })
            .await
            .unwrap();
    }

    let all: Value = client
        .get(format!("{base}/v1/targets/{}/results", target.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["items"].as_array().unwrap().len(), 5);

    let limited: Value = client
        .get(format!("{base}/v1/targets/{}/results?limit=2", target.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = limited["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Newest first.
    assert_eq!(items[0]["latency_ms"], 10);

    let since = (now - ChronoDuration::seconds(90)).to_rfc3339();
    let recent: Value = client
        .get(format!(
            "{base}/v1/targets/{}/results?since={}",
            target.id,
            urlencode(&since)
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent["items"].as_array().unwrap().len(), 2);

    let bad_since = client
        .get(format!(
            "{base}/v1/targets/{}/results?since=yesterday",
            target.id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_since.status(), 400);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    // Without a client-supplied id, one is generated and echoed back.
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    let generated = resp
        .headers()
        .get("x-request-id")
        .expect("x-request-id must be set on responses");
    assert!(!generated.to_str().unwrap().is_empty());

    // A client-supplied id is propagated unchanged.
    let resp = client
        .get(format!("{base}/healthz"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-42");
}

#[tokio::test]
async fn healthz_reports_store_and_checker() {
    let (base, _store) = serve_api().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checker"], "starting");
    assert_eq!(body["dependencies"][0]["name"], "database");
}

/// Minimal query-string escaping for the RFC3339 `+` offset and colons.
fn urlencode(s: &str) -> String {
    s.replace('+', "%2B").replace(':', "%3A")
}
