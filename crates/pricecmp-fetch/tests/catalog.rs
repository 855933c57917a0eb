//! Integration tests for the three catalog protocols.
//!
//! Each test stands up a `wiremock` server playing the retailer portal, so
//! no real network traffic is made.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricecmp_core::{parse_chains, Category, ChainProfile};
use pricecmp_fetch::{Catalog, CatalogQuery, FetchError, PriceClient, RetryPolicy};

fn test_client() -> PriceClient {
    let policy = RetryPolicy {
        max_attempts: 1,
        delay_base_ms: 0,
        ..RetryPolicy::default()
    };
    PriceClient::new(5, "pricecmp-test/0.1", policy).expect("failed to build test client")
}

fn profile(protocol: &str, base_url: &str) -> ChainProfile {
    let yaml = format!(
        r#"
chains:
  - id: 1
    key: demo
    name: Demo Market
    base_url: "{base_url}"
    protocol: {protocol}
"#
    );
    parse_chains(&yaml)
        .expect("valid chain yaml")
        .chains
        .remove(0)
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

// ---------------------------------------------------------------------------
// Form-post
// ---------------------------------------------------------------------------

#[tokio::test]
async fn form_post_lists_rows_and_sends_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/MainIO_Hok.aspx"))
        .and(body_string_contains("date=01%2F01%2F2025"))
        .and(body_string_contains("fileType=0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"FileNm": "StoresFull7290000000001-000-202501010500.xml", "Company": "", "Store": "0", "TypeFile": "StoresFull", "DateFile": "01/01/2025 05:00"},
            {"FileNm": "PriceFull7290000000001-100-202501011200.gz", "Company": null, "Store": 100, "TypeFile": null, "DateFile": null},
            {"FileNm": "", "Company": "", "Store": "", "TypeFile": "", "DateFile": ""}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let p = profile("form_post", &server.uri());
    let catalog = Catalog::for_profile(&p).unwrap();
    let files = catalog
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await
        .expect("listing succeeds");

    assert_eq!(files.len(), 2, "blank rows are dropped");
    assert_eq!(files[0].category, Category::StoreList);
    assert_eq!(files[0].store_key, None);
    assert_eq!(files[1].category, Category::PriceFull);
    assert_eq!(files[1].store_key.as_deref(), Some("100"));
    assert_eq!(files[1].retailer_key, "demo");
}

#[tokio::test]
async fn form_post_empty_array_is_an_empty_listing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/MainIO_Hok.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let p = profile("form_post", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await;
    assert!(files.expect("empty catalog is not an error").is_empty());
}

#[tokio::test]
async fn form_post_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/MainIO_Hok.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let p = profile("form_post", &server.uri());
    let result = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await;
    assert!(
        matches!(result, Err(FetchError::Malformed { .. })),
        "expected Malformed, got: {result:?}"
    );
}

#[tokio::test]
async fn form_post_resolves_download_link_through_spath() {
    let server = MockServer::start().await;
    let name = "PriceFull7290000000001-100-202501011200.gz";
    Mock::given(method("POST"))
        .and(path("/MainIO_Hok.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"FileNm": name}])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Download.aspx"))
        .and(query_param("FileNm", name))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"SPath": format!("/files/{name}")}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    let p = profile("form_post", &server.uri());
    let catalog = Catalog::for_profile(&p).unwrap();
    let files = catalog
        .list_files(&client, &p, date(), &CatalogQuery::default())
        .await
        .unwrap();
    let url = catalog.resolve_download_url(&client, &files[0]).await.unwrap();
    assert_eq!(url, format!("{}/files/{name}", server.uri()));
}

#[tokio::test]
async fn form_post_download_link_without_spath_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/MainIO_Hok.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"FileNm": "Price7290000000001-100-202501010900.gz"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Download.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .mount(&server)
        .await;

    let client = test_client();
    let p = profile("form_post", &server.uri());
    let catalog = Catalog::for_profile(&p).unwrap();
    let files = catalog
        .list_files(&client, &p, date(), &CatalogQuery::default())
        .await
        .unwrap();
    let result = catalog.resolve_download_url(&client, &files[0]).await;
    assert!(matches!(result, Err(FetchError::Malformed { .. })));
}

// ---------------------------------------------------------------------------
// Directory API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directory_api_maps_records_and_keeps_urls() {
    let server = MockServer::start().await;
    let file_url = format!("{}/blob/PromoFull7290000000002-007-202501010800.gz", server.uri());
    Mock::given(method("GET"))
        .and(path("/GetFiles"))
        .and(query_param("date", "2025-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "PromoFull7290000000002-007-202501010800.gz", "type": "promofull", "date": "2025-01-01 08:00:00", "url": file_url},
            {"name": "Price7290000000002-007-202501010900.gz", "type": "price", "url": "/blob/Price7290000000002-007-202501010900.gz"},
            {"name": "orphan-without-url.gz"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    let p = profile("directory_api", &server.uri());
    let catalog = Catalog::for_profile(&p).unwrap();
    let files = catalog
        .list_files(&client, &p, date(), &CatalogQuery::default())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].category, Category::PromoFull);
    assert_eq!(files[0].download_ref, file_url);
    assert_eq!(
        files[1].download_ref,
        format!("{}/blob/Price7290000000002-007-202501010900.gz", server.uri())
    );
    assert_eq!(
        catalog.resolve_download_url(&client, &files[0]).await.unwrap(),
        file_url,
        "directory URLs need no second lookup"
    );
}

#[tokio::test]
async fn directory_api_applies_category_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/GetFiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "PromoFull7290000000002-007-202501010800.gz", "url": "/a.gz"},
            {"name": "PriceFull7290000000002-007-202501010800.gz", "url": "/b.gz"}
        ])))
        .mount(&server)
        .await;

    let p = profile("directory_api", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(
            &test_client(),
            &p,
            date(),
            &CatalogQuery::categories(&[Category::PriceFull]),
        )
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].category, Category::PriceFull);
}

#[tokio::test]
async fn directory_api_skips_entry_with_unresolvable_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/GetFiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "PriceFull7290000000002-007-202501010800.gz", "url": "/good.gz"},
            {"name": "PriceFull7290000000002-008-202501010800.gz", "url": "http://[::1"}
        ])))
        .mount(&server)
        .await;

    let p = profile("directory_api", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].download_ref, format!("{}/good.gz", server.uri()));
}

// ---------------------------------------------------------------------------
// HTML listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn html_listing_follows_date_page_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="2024-12-31.html">2024-12-31</a> <a href="2025-01-01.html">2025-01-01</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2025-01-01.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="files/Stores7290000000003-000-202501010500.xml">stores</a>
               <a href="files/PriceFull7290000000003-012-202501011100.gz">prices</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let p = profile("html_listing", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].remote_name, "Stores7290000000003-000-202501010500.xml");
    assert_eq!(files[0].category, Category::StoreList);
    assert_eq!(
        files[1].download_ref,
        format!("{}/files/PriceFull7290000000003-012-202501011100.gz", server.uri())
    );
    assert_eq!(files[1].store_key.as_deref(), Some("012"));
}

#[tokio::test]
async fn html_listing_skips_link_with_unresolvable_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="2025-01-01.html">today</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2025-01-01.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="http://[::1/PriceFull7290000000003-011-202501011100.gz">bad</a>
               <a href="PriceFull7290000000003-012-202501011100.gz">good</a>"#,
        ))
        .mount(&server)
        .await;

    let p = profile("html_listing", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].store_key.as_deref(), Some("012"));
}

#[tokio::test]
async fn html_listing_without_requested_date_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<a href="2024-12-31.html">old</a>"#),
        )
        .mount(&server)
        .await;

    let p = profile("html_listing", &server.uri());
    let result = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await;
    assert!(
        matches!(result, Err(FetchError::Empty { .. })),
        "expected Empty, got: {result:?}"
    );
}

#[tokio::test]
async fn html_listing_date_page_without_files_is_empty_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="2025-01-01.html">today</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2025-01-01.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing yet</p>"))
        .mount(&server)
        .await;

    let p = profile("html_listing", &server.uri());
    let files = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await
        .unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn unreachable_catalog_reports_exhaustion() {
    let p = profile("directory_api", "http://127.0.0.1:9");
    let result = Catalog::for_profile(&p)
        .unwrap()
        .list_files(&test_client(), &p, date(), &CatalogQuery::default())
        .await;
    let err = result.expect_err("nothing listens on the discard port");
    assert_eq!(err.kind(), "exhausted");
}
