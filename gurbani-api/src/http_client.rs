//! HttpClient used by GurbaniClient
//!
//! Responsible for
//!  - building request urls from path segments (percent-encoded)
//!  - logging/tracing
//!  - mapping http status codes into GurbaniErrors
//!  - metrics
//!
//! There are no automatic retries. The content api is read-only, so callers
//! that want to retry a `GurbaniError::Http` may simply repeat the call.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use reqwest::{ClientBuilder, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use snafu::prelude::*;
use tracing::{debug, error, trace};

use crate::{Result, prelude::*};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    /// Total number of HTTP requests sent to the server
    total_requests: AtomicU64,
    /// Total number of successful responses (2xx status codes)
    successful_responses: AtomicU64,
    /// Total number of error responses and transport failures
    errors: AtomicU64,
    /// Total bytes received in response bodies
    bytes_received: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_success(&self) {
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of error responses and transport failures
    pub errors: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
}

impl std::fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            format_bytes(self.bytes_received),
        )
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[derive(Clone, Default)]
pub(crate) struct HttpRequest {
    /// Path segments appended to the base url. Each segment is percent-encoded,
    /// so a search query containing '/' or spaces stays a single segment.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("path", &self.path())
            .field("query", &self.query)
            .finish()
    }
}

impl HttpRequest {
    pub(crate) fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    pub(crate) fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Unencoded path, for logs and error messages
    pub(crate) fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., "https://api.gurbaninow.com/v2")
    pub base_url: Url,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder, base_url: &str) -> Result<Self> {
        let client = builder.build().context(HttpSnafu {
            method: "client-init",
            url: "",
        })?;
        let base_url = Url::parse(base_url).map_err(|e| GurbaniError::Validation {
            message: format!("invalid base url '{base_url}': {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GurbaniError::Validation {
                message: format!("base url '{base_url}' cannot have path segments"),
            });
        }
        Ok(Self {
            client,
            base_url,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn url_for(&self, req: &HttpRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(&req.segments);
        }
        if !req.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&req.query);
        }
        url
    }

    /// Sends a GET request and deserializes the json response body.
    /// - maps 404/410 to `NotFound` (with `obj_type` supplied by the caller)
    /// - maps any other non-success status to `ApiError`
    /// - maps transport failures (connect, timeout, dns) to `Http`
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        req: HttpRequest,
        obj_type: &str,
    ) -> Result<T> {
        let url = self.url_for(&req);
        let path = req.path();
        debug!(%url, "GET");

        self.metrics.increment_requests();
        let response = match self.client.request(Method::GET, url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.increment_errors();
                error!(source=?e, ?req, "http");
                return Err(GurbaniError::Http {
                    method: Method::GET.to_string(),
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        let code = response.status();
        match code {
            ok if ok.is_success() => {
                let body = response.bytes().await.context(HttpSnafu {
                    method: Method::GET.to_string(),
                    url: url.to_string(),
                })?;
                self.metrics.increment_success();
                self.metrics.add_bytes_received(body.len() as u64);
                log_response(&path, &body);
                deserialize_json(&body).inspect_err(|_| self.metrics.increment_errors())
            }
            StatusCode::NOT_FOUND /* 404 */ | StatusCode::GONE /* 410 */ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_default();
                debug!(?code, ?message, ?req, "http not found");
                Err(GurbaniError::NotFound {
                    obj_type: obj_type.to_string(),
                    key: req.segments.last().cloned().unwrap_or_default(),
                })
            }
            _ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_default();
                error!(?code, ?req, message, "http");
                Err(GurbaniError::ApiError {
                    code: code.as_u16(),
                    method: Method::GET.to_string(),
                    url: path,
                    message,
                })
            }
        }
    }
}

// dump json response, for debugging
// requires RUST_LOG=gurbani::http_json=trace
fn log_response(path: &str, body: &Bytes) {
    if tracing::enabled!(target: "gurbani::http_json", tracing::Level::TRACE) {
        trace!(target: "gurbani::http_json", "Response path={path} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
pub(crate) fn deserialize_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            let path = err.path().to_string();
            error!("Deserialization failed at {path}: {err}");
            Err(GurbaniError::Deserialization {
                path,
                source: err.into_inner(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(reqwest::Client::builder(), base).expect("client")
    }

    #[test]
    fn test_url_for_appends_segments_to_base_path() {
        let http = client("https://api.example.org/v2");
        let url = http.url_for(&HttpRequest::get(["shabad", "42"]));
        assert_eq!(url.as_str(), "https://api.example.org/v2/shabad/42");
    }

    #[test]
    fn test_url_for_handles_trailing_slash() {
        let http = client("https://api.example.org/v2/");
        let url = http.url_for(&HttpRequest::get(["hukamnama", "2024", "1", "5"]));
        assert_eq!(url.as_str(), "https://api.example.org/v2/hukamnama/2024/1/5");
    }

    #[test]
    fn test_url_for_encodes_query_segment() {
        let http = client("https://api.example.org/v2");
        let req = HttpRequest::get(["search", "a b/c"]).query("results", 5);
        let url = http.url_for(&req);
        assert_eq!(
            url.as_str(),
            "https://api.example.org/v2/search/a%20b%2Fc?results=5"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpClient::new(reqwest::Client::builder(), "not a url").unwrap_err();
        assert!(matches!(err, GurbaniError::Validation { .. }));
    }

    #[test]
    fn test_deserialize_json_reports_path() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Outer {
            inner: Inner,
        }
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Inner {
            count: u32,
        }
        let err = deserialize_json::<Outer>(br#"{"inner": {"count": "x"}}"#).unwrap_err();
        match err {
            GurbaniError::Deserialization { path, .. } => assert_eq!(path, "inner.count"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_metrics_display() {
        let snapshot = HttpMetricsSnapshot {
            total_requests: 3,
            successful_responses: 2,
            errors: 1,
            bytes_received: 2048,
        };
        assert_eq!(
            snapshot.to_string(),
            "requests=3 success=2 errors=1 recv=2.0KB"
        );
    }
}
