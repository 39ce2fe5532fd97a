//! Tests for pagination

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig, HttpResponse, RetryPolicy, Transport};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn records(ids: std::ops::Range<u64>) -> serde_json::Value {
    serde_json::Value::Array(ids.map(|id| json!({"id": id})).collect())
}

fn page_response(body: serde_json::Value, next: Option<&str>) -> ResponseTemplate {
    let template = ResponseTemplate::new(200).set_body_json(body);
    match next {
        Some(next) => template.insert_header("X-Next-Page", next),
        None => template.insert_header("X-Next-Page", ""),
    }
}

fn client() -> Arc<dyn Transport> {
    let config = HttpClientConfig::builder().no_rate_limit().build();
    Arc::new(HttpClient::with_config(config).unwrap())
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
}

async fn mount_page(server: &MockServer, page: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/1/issues"))
        .and(query_param("page", page))
        .respond_with(template)
        .mount(server)
        .await;
}

// ============================================================================
// Request descriptor
// ============================================================================

#[test]
fn test_page_request_with_page_is_fresh() {
    let first = PageRequest::new("https://gitlab.com/api/v4/projects/1/issues")
        .query("scope", "all")
        .query("updated_after", "2021-06-01");
    let second = first.with_page("2");

    assert_eq!(first.page_token, None);
    assert_eq!(second.page_token.as_deref(), Some("2"));
    assert_eq!(second.url, first.url);
    assert_eq!(second.query, first.query);
}

// ============================================================================
// Strategies
// ============================================================================

#[test]
fn test_next_page_header_params() {
    let paginator = NextPageHeaderPaginator::new(20);
    assert_eq!(
        paginator.page_params(None),
        vec![
            ("page".to_string(), "1".to_string()),
            ("per_page".to_string(), "20".to_string())
        ]
    );
    assert_eq!(paginator.page_params(Some("3"))[0].1, "3");
}

#[test]
fn test_next_page_header_processing() {
    let paginator = NextPageHeaderPaginator::default();
    let mut state = PaginationState::new();

    let response = HttpResponse::new(200, "[]").with_header("X-Next-Page", "3");
    assert_eq!(
        paginator.process_response(&response, &mut state),
        NextPage::token("3")
    );
    assert!(!state.done);

    let response = HttpResponse::new(200, "[]").with_header("X-Next-Page", " ");
    assert!(paginator
        .process_response(&response, &mut state)
        .is_done());
    assert!(state.done);
    assert_eq!(state.pages, 2);
}

#[test]
fn test_no_paginator() {
    let paginator = NoPaginator;
    let mut state = PaginationState::new();
    assert!(paginator.page_params(None).is_empty());

    let response = HttpResponse::new(200, "{}").with_header("X-Next-Page", "2");
    assert!(paginator
        .process_response(&response, &mut state)
        .is_done());
}

#[test]
fn test_pagination_config_page_size_override() {
    let paginator = PaginationConfig::fixed_page_size(20).build(100);
    assert_eq!(paginator.page_params(None)[1].1, "20");

    let paginator = PaginationConfig::default().build(100);
    assert_eq!(paginator.page_params(None)[1].1, "100");

    assert!(PaginationConfig::None.build(100).page_params(None).is_empty());
}

#[test]
fn test_decode_records_shapes() {
    assert_eq!(
        decode_records(&HttpResponse::new(200, "[{\"id\":1},{\"id\":2}]"))
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        decode_records(&HttpResponse::new(200, "{\"id\":1}")).unwrap(),
        vec![json!({"id": 1})]
    );
    assert!(decode_records(&HttpResponse::new(200, "")).unwrap().is_empty());
    assert!(matches!(
        decode_records(&HttpResponse::new(200, "42")),
        Err(Error::Decode { .. })
    ));
    assert!(decode_records(&HttpResponse::new(200, "<html>")).is_err());
}

#[test]
fn test_key_value_format_rows() {
    let format = ResponseFormat::key_value("language_name", "percent");
    let mut rows = format
        .decode(&HttpResponse::new(200, r#"{"Ruby": 66.69, "JavaScript": 22.98}"#))
        .unwrap();
    rows.sort_by_key(|row| row["language_name"].to_string());

    assert_eq!(
        rows,
        vec![
            json!({"language_name": "JavaScript", "percent": 22.98}),
            json!({"language_name": "Ruby", "percent": 66.69}),
        ]
    );
    assert!(format.decode(&HttpResponse::new(200, "")).unwrap().is_empty());
    assert!(matches!(
        format.decode(&HttpResponse::new(200, "[1, 2]")),
        Err(Error::Decode { .. })
    ));
}

#[test]
fn test_raw_format_keeps_body() {
    let body = "# Project\n\nNot JSON at all";
    let rows = ResponseFormat::raw("content")
        .decode(&HttpResponse::new(200, body))
        .unwrap();
    assert_eq!(rows, vec![json!({"content": body})]);
}

#[tokio::test]
async fn test_reader_uses_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/1/languages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Rust": 100.0})))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/api/v4/projects/1/languages", server.uri());
    let mut reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::None.build(100),
        PageRequest::new(url),
    )
    .with_format(ResponseFormat::key_value("language_name", "percent"));

    let page = reader.next_page().await.unwrap().unwrap();
    assert_eq!(
        page.records,
        vec![json!({"language_name": "Rust", "percent": 100.0})]
    );
    assert!(!page.has_more);
}

// ============================================================================
// Page reader
// ============================================================================

#[tokio::test]
async fn test_empty_page_with_token_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_response(records(0..5), Some("2"))).await;
    mount_page(&server, "2", page_response(json!([]), Some("3"))).await;
    mount_page(&server, "3", page_response(records(5..7), None)).await;

    let url = format!("{}/api/v4/projects/1/issues", server.uri());
    let reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(url),
    );

    let pages: Vec<Page> = reader.into_stream().try_collect().await.unwrap();
    let ids: Vec<u64> = pages
        .iter()
        .flat_map(|p| p.records.iter())
        .map(|r| r["id"].as_u64().unwrap())
        .collect();

    assert_eq!(pages.len(), 3);
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
    assert!(pages[1].records.is_empty());
    assert!(pages[1].has_more);
    assert!(!pages[2].has_more);
}

#[tokio::test]
async fn test_retry_does_not_duplicate_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/1/issues"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "1", page_response(records(0..3), None)).await;

    let url = format!("{}/api/v4/projects/1/issues", server.uri());
    let mut reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(url),
    );

    let page = reader.next_page().await.unwrap().unwrap();
    assert_eq!(page.records.len(), 3);
    assert!(reader.next_page().await.unwrap().is_none());
    assert_eq!(reader.pages_fetched(), 1);
}

#[tokio::test]
async fn test_max_pages_truncates() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_response(records(0..2), Some("2"))).await;
    mount_page(&server, "2", page_response(records(2..4), Some("3"))).await;
    mount_page(&server, "3", page_response(records(4..6), Some("4"))).await;

    let url = format!("{}/api/v4/projects/1/issues", server.uri());
    let reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(url),
    )
    .with_max_pages(2);

    let mut stream = Box::pin(reader.into_stream());
    let mut count = 0;
    while let Some(page) = stream.try_next().await.unwrap() {
        count += page.records.len();
    }
    assert_eq!(count, 4);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_truncation_flag() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_response(records(0..1), Some("2"))).await;

    let url = format!("{}/api/v4/projects/1/issues", server.uri());
    let mut reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(url),
    )
    .with_max_pages(1);

    assert!(reader.next_page().await.unwrap().is_some());
    assert!(reader.is_truncated());
    assert!(reader.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_resource_missing_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(server.uri()),
    );

    let err = reader.next_page().await.unwrap_err();
    assert!(err.is_resource_missing());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancelled_reader_issues_no_request() {
    let server = MockServer::start().await;
    mount_page(&server, "1", page_response(records(0..1), None)).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let url = format!("{}/api/v4/projects/1/issues", server.uri());
    let mut reader = PageReader::new(
        client(),
        fast_retry(),
        PaginationConfig::default().build(100),
        PageRequest::new(url),
    )
    .with_cancellation(cancel);

    assert!(matches!(reader.next_page().await, Err(Error::Cancelled)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
