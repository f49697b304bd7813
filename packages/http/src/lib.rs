#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP plumbing shared by the geocoders and geodata source clients.
//!
//! Every outbound request goes through [`retry::send_json`] (or
//! [`retry::send_text`]) so that transient failures are retried with
//! exponential backoff. Services with usage policies that limit request
//! rates own a [`throttle::Throttle`].

pub mod retry;
pub mod throttle;

use thiserror::Error;

/// Errors from HTTP requests.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Transport-level error (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
        /// Request URL (without query string).
        url: String,
    },

    /// The body could not be decoded.
    #[error("Invalid response body from {url}: {message}")]
    Decode {
        /// Request URL (without query string).
        url: String,
        /// Parser message.
        message: String,
    },
}

impl HttpError {
    /// Returns `true` if the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}
