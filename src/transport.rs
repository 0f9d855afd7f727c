//! HTTP transport abstraction.
//!
//! This module defines the `Transport` trait the rest of the engine is built
//! on, the production `HttpTransport` over a pooled reqwest client bound to
//! one upstream origin, and a scriptable `MockTransport` for tests.
//!
//! A transport never returns a raw error from a fetch: every transport-level
//! fault is classified into a [`FetchFailure`] so that batch callers can keep
//! going page by page.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

use crate::descriptor::{Method, Payload, RequestDescriptor};
use crate::error::{MotorcadeError, Result};
use crate::report::FailureReporter;
use crate::response::{FailureKind, FetchFailure, FetchResult, FetchSuccess};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one upstream origin.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Absolute base origin, e.g. `https://cws.gm.com`.
    pub base_url: String,
    /// Total per-request deadline.
    pub timeout: Duration,
    /// Connection establishment deadline.
    pub connect_timeout: Duration,
    /// When false, invalid upstream certificates are accepted. Some
    /// manufacturer endpoints serve broken chains.
    pub verify_tls: bool,
    /// When true (the default), negotiate HTTP/2 via ALPN and fall back to
    /// HTTP/1.1. When false, force HTTP/1.1.
    pub prefer_http2: bool,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            verify_tls: true,
            prefer_http2: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_http2(mut self, prefer: bool) -> Self {
        self.prefer_http2 = prefer;
        self
    }
}

/// Trait for performing upstream calls.
///
/// This abstraction keeps the dispatcher, the pagination driver and every
/// adapter testable without real HTTP calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one upstream call.
    ///
    /// Implementations must not error or panic: any transport fault comes
    /// back as a classified [`FetchResult::Failure`].
    async fn fetch(&self, descriptor: &RequestDescriptor) -> FetchResult;
}

// ============================================================================
// Production implementation using reqwest
// ============================================================================

/// Production transport over a pooled reqwest client.
///
/// Bound to a single base origin; descriptors carry origin-relative URIs.
/// Dropping the transport releases the pooled connections, so "open it for
/// the scope of one caller-facing operation" is plain ownership.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    reporter: Option<Arc<dyn FailureReporter>>,
    opened_at: Instant,
    fetches: AtomicU64,
}

impl HttpTransport {
    /// Validate the configuration and build the connection pool.
    pub fn open(config: TransportConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| MotorcadeError::Config(format!("bad base url {:?}: {e}", config.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(MotorcadeError::Config(format!(
                "unsupported scheme {:?} in base url {:?}",
                base.scheme(),
                config.base_url
            )));
        }
        if !base.has_host() {
            return Err(MotorcadeError::Config(format!(
                "base url {:?} has no host",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout);
        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if !config.prefer_http2 {
            builder = builder.http1_only();
        }
        let client = builder.build()?;

        tracing::debug!(
            origin = %base,
            timeout_ms = config.timeout.as_millis() as u64,
            prefer_http2 = config.prefer_http2,
            verify_tls = config.verify_tls,
            "Transport opened"
        );

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            reporter: None,
            opened_at: Instant::now(),
            fetches: AtomicU64::new(0),
        })
    }

    /// Attach a failure-reporting hook.
    ///
    /// Every classified failure is handed to the hook on a detached task;
    /// delivery is best-effort and never affects the fetch outcome.
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// The origin this transport is bound to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fail(&self, failure: FetchFailure) -> FetchResult {
        tracing::warn!(
            kind = %failure.kind,
            method = %failure.method,
            url = %failure.url,
            status = failure.http_status,
            message = %failure.message,
            "Upstream fetch failed"
        );
        metrics::counter!("motorcade_fetch_failures_total", "kind" => failure.kind.as_str())
            .increment(1);
        if let Some(reporter) = &self.reporter {
            let reporter = Arc::clone(reporter);
            let reported = failure.clone();
            tokio::spawn(async move { reporter.report(reported).await });
        }
        FetchResult::Failure(failure)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(
        skip(self, descriptor),
        fields(method = %descriptor.method(), uri = %descriptor.uri())
    )]
    async fn fetch(&self, descriptor: &RequestDescriptor) -> FetchResult {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", self.base_url, descriptor.uri());
        let method = descriptor.method();

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        for (name, value) in descriptor.header_pairs() {
            request = request.header(name, value);
        }
        match descriptor.payload() {
            Payload::Empty => {}
            Payload::Query(pairs) => request = request.query(pairs),
            Payload::Json(body) => request = request.json(body),
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let failure = FetchFailure::new(classify(&e), method, url, e.to_string());
                let failure = match e.status() {
                    Some(status) => failure.with_status(status.as_u16()),
                    None => failure,
                };
                return self.fail(failure);
            }
        };

        let status = response.status();
        if descriptor.checks_status() && (status.is_client_error() || status.is_server_error()) {
            let failure = FetchFailure::new(
                FailureKind::UpstreamStatus,
                method,
                url,
                format!("upstream answered {status}"),
            )
            .with_status(status.as_u16());
            return self.fail(failure);
        }

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        // Reading the body can still hit the read deadline or a decompression
        // fault, so this path classifies too.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let failure = FetchFailure::new(classify(&e), method, url, e.to_string())
                    .with_status(status.as_u16());
                return self.fail(failure);
            }
        };

        tracing::debug!(
            status = status.as_u16(),
            response_len = body.len(),
            "Upstream fetch completed"
        );
        metrics::counter!("motorcade_fetches_total", "method" => method.as_str()).increment(1);

        FetchResult::Success(FetchSuccess {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        tracing::debug!(
            origin = %self.base_url,
            fetches = self.fetches.load(Ordering::Relaxed),
            elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
            "Transport closed"
        );
    }
}

/// Map a reqwest error onto the failure taxonomy. First match wins, so a
/// connect timeout classifies as `Timeout` rather than `Network`.
pub fn classify(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::Network
    } else if error.is_decode() {
        FailureKind::Decoding
    } else if error.is_redirect() {
        FailureKind::RedirectLimit
    } else if is_protocol_violation(error) {
        FailureKind::Protocol
    } else if error.is_status() {
        FailureKind::UpstreamStatus
    } else {
        FailureKind::Unknown
    }
}

/// Wire-protocol violations only surface through the error source chain.
fn is_protocol_violation(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        if let Some(hyper_error) = inner.downcast_ref::<hyper::Error>() {
            return hyper_error.is_parse() || hyper_error.is_incomplete_message();
        }
        source = inner.source();
    }
    false
}

// ============================================================================
// Test/mock implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use tokio::sync::oneshot;

/// Mock transport for tests.
///
/// Scripted outcomes are keyed by route (`"METHOD uri"`, see
/// [`RequestDescriptor::route`]) and consumed FIFO per route. Every call is
/// recorded as the full descriptor so tests can assert on payloads and
/// headers, and an in-flight gauge supports concurrency assertions.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new();
/// mock.add_json("GET /vehicles", json!({"resultsCount": 0, "vehicles": []}));
/// let result = mock.fetch(&RequestDescriptor::get("/vehicles")).await;
/// assert!(result.is_success());
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    outcomes: Arc<Mutex<HashMap<String, Vec<MockOutcome>>>>,
    calls: Arc<Mutex<Vec<RequestDescriptor>>>,
    in_flight: Arc<AtomicUsize>,
}

/// A scripted outcome that can optionally wait for a trigger before resolving.
enum MockOutcome {
    Immediate(FetchResult),
    Triggered {
        result: FetchResult,
        trigger: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    },
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an outcome for a route. Multiple outcomes for the same route
    /// resolve in FIFO order.
    pub fn add_result(&self, route: &str, result: FetchResult) {
        self.outcomes
            .lock()
            .entry(route.to_string())
            .or_default()
            .push(MockOutcome::Immediate(result));
    }

    /// Script a 200 response with the given JSON body.
    pub fn add_json(&self, route: &str, body: serde_json::Value) {
        self.add_success(route, 200, body.to_string());
    }

    /// Script a response with an arbitrary status and body.
    pub fn add_success(&self, route: &str, status: u16, body: impl Into<String>) {
        self.add_result(
            route,
            FetchResult::Success(FetchSuccess {
                status,
                headers: Vec::new(),
                body: body.into(),
            }),
        );
    }

    /// Script a classified failure for a route.
    pub fn add_failure(&self, route: &str, kind: FailureKind) {
        self.add_result(route, FetchResult::Failure(failure_for_route(route, kind)));
    }

    /// Script an outcome gated on a manual trigger.
    ///
    /// The returned sender releases the call when used (or dropped), which
    /// lets tests control completion order deliberately.
    pub fn add_result_with_trigger(&self, route: &str, result: FetchResult) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.outcomes
            .lock()
            .entry(route.to_string())
            .or_default()
            .push(MockOutcome::Triggered {
                result,
                trigger: Arc::new(Mutex::new(Some(rx))),
            });
        tx
    }

    /// All descriptors fetched through this mock, in call order.
    pub fn get_calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of recorded calls matching a route.
    pub fn calls_for(&self, route: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|d| d.route() == route)
            .count()
    }

    /// Number of fetches currently executing (waiting on a trigger).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Build the failure a mock hands out for a scripted route.
fn failure_for_route(route: &str, kind: FailureKind) -> FetchFailure {
    let (method, uri) = match route.split_once(' ') {
        Some(("POST", uri)) => (Method::Post, uri),
        Some((_, uri)) => (Method::Get, uri),
        None => (Method::Get, route),
    };
    FetchFailure::new(kind, method, uri, format!("scripted {kind} failure"))
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, descriptor: &RequestDescriptor) -> FetchResult {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        // Decrement even if the future is dropped mid-trigger.
        let _guard = scopeguard::guard(Arc::clone(&self.in_flight), |in_flight| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        self.calls.lock().push(descriptor.clone());

        let route = descriptor.route();
        let outcome = {
            let mut outcomes = self.outcomes.lock();
            match outcomes.get_mut(&route) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };

        match outcome {
            Some(MockOutcome::Immediate(result)) => result,
            Some(MockOutcome::Triggered { result, trigger }) => {
                let rx = trigger.lock().take();
                if let Some(rx) = rx {
                    // Proceed whether the trigger fires or drops.
                    let _ = rx.await;
                }
                result
            }
            None => FetchResult::Failure(FetchFailure::new(
                FailureKind::Unknown,
                descriptor.method(),
                descriptor.uri(),
                format!("no mock outcome configured for {route}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_basic() {
        let mock = MockTransport::new();
        mock.add_json("POST /search", json!({"hits": []}));

        let descriptor = RequestDescriptor::post("/search").json(json!({"zip": "10001"}));
        let result = mock.fetch(&descriptor).await;

        let success = result.as_success().expect("scripted success");
        assert_eq!(success.status, 200);
        assert_eq!(success.json().unwrap()["hits"], json!([]));

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].route(), "POST /search");
        match calls[0].payload() {
            Payload::Json(body) => assert_eq!(body["zip"], "10001"),
            other => panic!("expected JSON payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_fifo_outcomes() {
        let mock = MockTransport::new();
        mock.add_success("GET /status", 200, "first");
        mock.add_success("GET /status", 200, "second");

        let descriptor = RequestDescriptor::get("/status");
        let first = mock.fetch(&descriptor).await;
        let second = mock.fetch(&descriptor).await;

        assert_eq!(first.as_success().unwrap().body, "first");
        assert_eq!(second.as_success().unwrap().body, "second");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls_for("GET /status"), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_unscripted_route_fails() {
        let mock = MockTransport::new();
        let result = mock.fetch(&RequestDescriptor::get("/nowhere")).await;
        let failure = result.as_failure().expect("unscripted routes fail");
        assert_eq!(failure.kind, FailureKind::Unknown);
        assert!(failure.message.contains("GET /nowhere"));
    }

    #[tokio::test]
    async fn test_mock_transport_scripted_failure() {
        let mock = MockTransport::new();
        mock.add_failure("GET /inventory", FailureKind::Timeout);

        let result = mock.fetch(&RequestDescriptor::get("/inventory")).await;
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.method, Method::Get);
    }

    #[tokio::test]
    async fn test_mock_transport_trigger_gates_completion() {
        let mock = MockTransport::new();
        let trigger = mock.add_result_with_trigger(
            "GET /slow",
            FetchResult::Success(FetchSuccess {
                status: 200,
                headers: Vec::new(),
                body: "released".into(),
            }),
        );

        let mock_clone = mock.clone();
        let handle =
            tokio::spawn(async move { mock_clone.fetch(&RequestDescriptor::get("/slow")).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        assert_eq!(mock.in_flight_count(), 1);

        trigger.send(()).unwrap();
        let result = handle.await.unwrap();
        assert_eq!(result.as_success().unwrap().body, "released");
        assert_eq!(mock.in_flight_count(), 0);
    }

    #[test]
    fn test_open_rejects_bad_origins() {
        assert!(HttpTransport::open(TransportConfig::new("not a url")).is_err());
        assert!(HttpTransport::open(TransportConfig::new("ftp://example.com")).is_err());
        assert!(HttpTransport::open(TransportConfig::new("https://example.com")).is_ok());
    }

    #[test]
    fn test_open_normalizes_trailing_slash() {
        let transport = HttpTransport::open(TransportConfig::new("https://example.com/")).unwrap();
        assert_eq!(transport.base_url(), "https://example.com");
    }
}
