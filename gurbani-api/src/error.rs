//! Errors returned by `GurbaniClient`
//!
use snafu::prelude::*;

/// Errors returned by gurbani crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GurbaniError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Server responded with a non-success status.
    #[snafu(display("Api Server reported error ({code}) {method} {url}: {message}"))]
    ApiError {
        code: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Deserialization error. The server response did not match the expected schema.
    #[snafu(display("Deserialization at {path}: {source}"))]
    Deserialization {
        path: String,
        source: serde_json::Error,
    },

    /// Requested shabad (or hukamnama date) does not exist.
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Validation error: a request parameter failed a local sanity check.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl GurbaniError {
    /// True for transport-level failures (connect, timeout), which a caller may retry.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// True when the server answered with a non-success status.
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, Self::ApiError { .. } | Self::NotFound { .. })
    }

    /// True when a response body could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Deserialization { .. })
    }
}
