//! HttpTransport against a real local server: classification and pagination.

use std::sync::Arc;
use std::time::Duration;

use motorcade::paginate::{self, PageCount, PageOutcome, PageWindow, Paginator};
use motorcade::{
    FailureKind, HttpTransport, MotorcadeError, RecordingReporter, RequestDescriptor, Result,
    Transport, TransportConfig,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::open(TransportConfig::new(server.uri())).expect("valid local origin")
}

#[test_log::test(tokio::test)]
async fn test_success_carries_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-upstream", "t1")
                .set_body_json(json!({"resultsCount": 1})),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let result = transport.fetch(&RequestDescriptor::get("/vehicles")).await;

    let success = result.as_success().expect("2xx response");
    assert_eq!(success.status, 200);
    assert_eq!(success.header_value("X-Upstream"), Some("t1"));
    assert_eq!(success.json().unwrap()["resultsCount"], 1);
}

#[test_log::test(tokio::test)]
async fn test_non_2xx_is_success_unless_status_checked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);

    let plain = transport.fetch(&RequestDescriptor::get("/missing")).await;
    assert_eq!(plain.as_success().unwrap().status, 404);

    let checked = transport
        .fetch(&RequestDescriptor::get("/missing").error_for_status())
        .await;
    let failure = checked.as_failure().expect("status checking enabled");
    assert_eq!(failure.kind, FailureKind::UpstreamStatus);
    assert_eq!(failure.http_status, Some(404));
    assert_eq!(failure.kind.suggested_status(), 500);
}

#[test_log::test(tokio::test)]
async fn test_slow_upstream_classifies_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = HttpTransport::open(
        TransportConfig::new(server.uri()).with_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let result = transport.fetch(&RequestDescriptor::get("/slow")).await;

    let failure = result.as_failure().expect("deadline exceeded");
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.kind.suggested_status(), 504);
}

#[test_log::test(tokio::test)]
async fn test_refused_connection_classifies_as_network() {
    // Port 1 is never listening.
    let transport = HttpTransport::open(
        TransportConfig::new("http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    let result = transport.fetch(&RequestDescriptor::get("/any")).await;

    let failure = result.as_failure().expect("nothing listening");
    assert!(
        matches!(failure.kind, FailureKind::Network | FailureKind::Timeout),
        "got {:?}",
        failure.kind
    );
}

#[test_log::test(tokio::test)]
async fn test_redirect_loop_classifies_as_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let result = transport.fetch(&RequestDescriptor::get("/loop")).await;

    let failure = result.as_failure().expect("redirect chain never ends");
    assert_eq!(failure.kind, FailureKind::RedirectLimit);
    assert_eq!(failure.kind.suggested_status(), 429);
}

#[test_log::test(tokio::test)]
async fn test_lying_content_encoding_classifies_as_decoding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gzip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(b"this is not gzip".to_vec()),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let result = transport.fetch(&RequestDescriptor::get("/gzip")).await;

    let failure = result.as_failure().expect("body decoding must fail");
    assert_eq!(failure.kind, FailureKind::Decoding);
}

#[test_log::test(tokio::test)]
async fn test_reporter_hears_about_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let reporter = Arc::new(RecordingReporter::new());
    let transport = transport_for(&server).with_reporter(reporter.clone());

    let result = transport
        .fetch(&RequestDescriptor::get("/broken").error_for_status())
        .await;
    assert!(!result.is_success());

    // Reporting is fire-and-forget; give the detached task a moment.
    for _ in 0..50 {
        if reporter.count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let reported = reporter.reported();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, FailureKind::UpstreamStatus);
    assert_eq!(reported[0].http_status, Some(503));
    assert!(reported[0].url.contains("/broken"));
}

/// Offset-windowed paginator for the end-to-end test: first page at
/// `/inventory/first`, follow-ups at `/inventory/more?offset=N&limit=M`.
struct TestPager;

impl Paginator for TestPager {
    fn first_page(&self) -> RequestDescriptor {
        RequestDescriptor::get("/inventory/first")
    }

    fn page_size(&self) -> u64 {
        100
    }

    fn total_count(&self, first_page: &Value) -> Result<PageCount> {
        if first_page.get("notFound").is_some() {
            return Ok(PageCount::Empty);
        }
        first_page
            .get("total")
            .and_then(Value::as_u64)
            .map(PageCount::Total)
            .ok_or_else(|| MotorcadeError::Malformed("total missing".into()))
    }

    fn plan(&self, _first_page: &Value, total: u64) -> paginate::PagePlan {
        paginate::PagePlan::Batch(paginate::offset_windows(100, total, 100))
    }

    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor {
        match window {
            PageWindow::Offset { offset, limit } => RequestDescriptor::get("/inventory/more")
                .query([("offset", offset.to_string()), ("limit", limit.to_string())]),
            other => panic!("unexpected window {other:?}"),
        }
    }

    fn records_pointer(&self) -> &str {
        "/vehicles"
    }
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_pagination_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory/first"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": 250, "vehicles": ["a"]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inventory/more"))
        .and(query_param("offset", "100"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vehicles": ["b"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inventory/more"))
        .and(query_param("offset", "200"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vehicles": ["c"]})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let outcome = paginate::gather(&transport, &TestPager).await.unwrap();

    let aggregate = outcome.merged().unwrap();
    assert_eq!(aggregate.body["vehicles"], json!(["a", "b", "c"]));
    assert_eq!(aggregate.body["total"], 250);
    assert!(!aggregate.partial_failure);
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_partial_failure_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory/first"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": 250, "vehicles": ["a"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inventory/more"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>burp</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inventory/more"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vehicles": ["c"]})))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let outcome = paginate::gather(&transport, &TestPager).await.unwrap();

    let aggregate = outcome.merged().unwrap();
    assert_eq!(aggregate.body["vehicles"], json!(["a", "c"]));
    assert!(aggregate.partial_failure);
}

#[test_log::test(tokio::test)]
async fn test_end_to_end_empty_sentinel_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inventory/first"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"notFound": true})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let outcome = paginate::gather(&transport, &TestPager).await.unwrap();
    assert!(matches!(outcome, PageOutcome::Empty));
}
