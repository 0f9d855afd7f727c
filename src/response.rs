//! Fetch outcomes.
//!
//! Every upstream call resolves to a [`FetchResult`]. Transport-level errors
//! never escape as `Err`: they are classified into a [`FetchFailure`] carrying
//! the failure kind plus enough context (method, url, status) for reporting
//! and for the caller-facing status mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::descriptor::Method;

/// Results of a batch dispatch, index-aligned with the input descriptors.
pub type BatchResult = Vec<FetchResult>;

/// Outcome of exactly one upstream call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FetchResult {
    Success(FetchSuccess),
    Failure(FetchFailure),
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    pub fn as_success(&self) -> Option<&FetchSuccess> {
        match self {
            FetchResult::Success(success) => Some(success),
            FetchResult::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FetchFailure> {
        match self {
            FetchResult::Success(_) => None,
            FetchResult::Failure(failure) => Some(failure),
        }
    }
}

/// A response the transport was able to read to completion.
///
/// Non-2xx statuses land here too unless the descriptor opted into
/// status checking; the adapters decide what a status means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSuccess {
    /// HTTP status code of the response.
    pub status: u16,
    /// Response header pairs as received.
    pub headers: Vec<(String, String)>,
    /// Response body, decoded to text.
    pub body: String,
}

impl FetchSuccess {
    /// Decode the body as JSON.
    pub fn json(&self) -> crate::error::Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// First response header whose name matches case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Classified failure of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind} for {method} {url}: {message}")]
pub struct FetchFailure {
    /// What went wrong, first matching kind wins.
    pub kind: FailureKind,
    /// HTTP method of the failed call.
    pub method: Method,
    /// Fully resolved upstream URL.
    pub url: String,
    /// Upstream status code, when one was received.
    pub http_status: Option<u16>,
    /// Human-readable detail from the underlying client.
    pub message: String,
}

impl FetchFailure {
    pub fn new(
        kind: FailureKind,
        method: Method,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            method,
            url: url.into(),
            http_status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

/// Failure classification, ordered by specificity.
///
/// Classification is first-match-wins in this order, so a connect timeout is
/// `Timeout`, not `Network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connect or read deadline exceeded.
    Timeout,
    /// Connection-level failure: DNS, refused, reset, TLS handshake.
    Network,
    /// Response body could not be decoded (e.g. content-encoding lied).
    Decoding,
    /// Redirect chain exceeded the client limit.
    RedirectLimit,
    /// The remote violated the wire protocol.
    Protocol,
    /// Status checking was enabled and the upstream answered 4xx/5xx.
    UpstreamStatus,
    /// Anything else the client surfaced.
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Decoding => "decoding",
            FailureKind::RedirectLimit => "redirect_limit",
            FailureKind::Protocol => "protocol",
            FailureKind::UpstreamStatus => "upstream_status",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Status code a response layer should answer with for this kind.
    ///
    /// The engine never builds responses itself; this is the mapping the
    /// routing layer above it applies.
    pub fn suggested_status(&self) -> u16 {
        match self {
            FailureKind::Timeout => 504,
            FailureKind::Network => 503,
            FailureKind::Decoding => 400,
            FailureKind::RedirectLimit => 429,
            FailureKind::Protocol => 400,
            FailureKind::UpstreamStatus => 500,
            FailureKind::Unknown => 400,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
