//! Integration tests for `PriceClient::fetch_file` retry and bot-block
//! fallback behaviour.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricecmp_fetch::{FetchError, PathRewrite, PriceClient, RetryPolicy};

const BROWSER_UA: &str = "pricecmp-test-browser/1.0";

fn client(max_attempts: u32) -> PriceClient {
    let policy = RetryPolicy {
        max_attempts,
        delay_base_ms: 0,
        fallback_user_agent: BROWSER_UA.to_string(),
        ..RetryPolicy::default()
    };
    PriceClient::new(5, "pricecmp-test/0.1", policy).expect("failed to build test client")
}

#[tokio::test]
async fn two_transient_failures_then_success_takes_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/PriceFull.gz"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/PriceFull.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/file/PriceFull.gz", server.uri());
    let fetched = client(3).fetch_file(&url).await.expect("third attempt succeeds");

    assert_eq!(fetched.bytes, b"payload");
    assert_eq!(fetched.attempts, 3);
    assert_eq!(fetched.url, url);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/PriceFull.gz"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let url = format!("{}/file/PriceFull.gz", server.uri());
    let result = client(3).fetch_file(&url).await;
    assert!(
        matches!(result, Err(FetchError::Exhausted { attempts: 3, .. })),
        "expected Exhausted after 3 attempts, got: {result:?}"
    );
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.gz"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let fetched = client(3)
        .fetch_file(&format!("{}/a.gz", server.uri()))
        .await
        .unwrap();
    assert_eq!(fetched.attempts, 2);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.gz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(3)
        .fetch_file(&format!("{}/missing.gz", server.uri()))
        .await;
    assert!(matches!(
        result,
        Err(FetchError::UnexpectedStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn bot_block_walks_every_alternate_once_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/d/Download/PriceFull.gz"))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/Download/PriceFull.gz"))
        .and(header("user-agent", BROWSER_UA))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/d/download/PriceFull.gz"))
        .and(header("user-agent", BROWSER_UA))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/file/d/Download/PriceFull.gz", server.uri());
    let result = client(3).fetch_file(&url).await;
    assert!(
        matches!(result, Err(FetchError::BotBlocked { .. })),
        "expected BotBlocked, got: {result:?}"
    );
}

#[tokio::test]
async fn bot_block_recovers_through_alternate_with_browser_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/d/StoresFull.xml"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/StoresFull.xml"))
        .and(header("user-agent", BROWSER_UA))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<stores/>".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client(3)
        .fetch_file(&format!("{}/file/d/StoresFull.xml", server.uri()))
        .await
        .expect("alternate URL answers");
    assert_eq!(fetched.bytes, b"<stores/>");
    assert_eq!(fetched.attempts, 2);
    assert!(fetched.url.ends_with("/file/StoresFull.xml"));
}

#[tokio::test]
async fn custom_block_status_and_rewrites_are_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/p.gz"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/p.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        delay_base_ms: 0,
        bot_block_status: 403,
        alternate_rewrites: vec![PathRewrite::new("/v1/", "/v2/")],
        ..RetryPolicy::default()
    };
    let client = PriceClient::new(5, "pricecmp-test/0.1", policy).unwrap();
    let fetched = client
        .fetch_file(&format!("{}/v1/p.gz", server.uri()))
        .await
        .unwrap();
    assert_eq!(fetched.bytes, b"x");
}
