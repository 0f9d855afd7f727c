//! Request descriptors.
//!
//! A [`RequestDescriptor`] is the complete, immutable description of one
//! upstream HTTP call: relative URI, method, headers and payload. Descriptors
//! are built once by an adapter and then only read, so the transport layer and
//! the test doubles can share them freely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method for an upstream call.
///
/// The upstreams this engine talks to only ever use these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What travels with the request besides the URI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    /// Nothing beyond the URI itself.
    Empty,
    /// Query-string pairs appended to the URI.
    Query(Vec<(String, String)>),
    /// JSON request body.
    Json(Value),
}

/// Immutable description of one upstream HTTP call.
///
/// The URI is relative; the transport joins it against its base origin.
/// Header names are matched case-insensitively by [`header_value`].
///
/// [`header_value`]: RequestDescriptor::header_value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    uri: String,
    method: Method,
    headers: Vec<(String, String)>,
    payload: Payload,
    check_status: bool,
}

impl RequestDescriptor {
    /// Start a GET descriptor for a URI relative to the transport origin.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    /// Start a POST descriptor for a URI relative to the transport origin.
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::Post, uri)
    }

    fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method,
            headers: Vec::new(),
            payload: Payload::Empty,
            check_status: false,
        }
    }

    /// Append one header pair.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append several header pairs.
    pub fn headers<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach query-string pairs. Replaces any previous payload.
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.payload = Payload::Query(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Attach a JSON body. Replaces any previous payload.
    pub fn json(mut self, body: Value) -> Self {
        self.payload = Payload::Json(body);
        self
    }

    /// Treat 4xx/5xx response statuses as failures for this call.
    ///
    /// Off by default: a 404 is an ordinary `Success` unless the caller opts
    /// in here.
    pub fn error_for_status(mut self) -> Self {
        self.check_status = true;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn checks_status(&self) -> bool {
        self.check_status
    }

    /// First header value whose name matches case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `"METHOD uri"`, used as the routing key for mocks and log lines.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.uri)
    }
}
