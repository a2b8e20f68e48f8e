//! Blocking HTTP client contract (§6).
//!
//! Workers call this synchronously from their own OS thread; there is no
//! async boundary here by design (`curl_download_to_memory`/
//! `curl_fetch_string` in the original are blocking too).

use std::time::Duration;

use bytes::Bytes;

pub trait HttpClient: Send + Sync {
    /// Fetch raw bytes, for segment downloads.
    fn get_bytes(&self, url: &str) -> Result<Bytes, HttpError>;
    /// Fetch a UTF-8 string, for playlist fetches.
    fn get_string(&self, url: &str) -> Result<String, HttpError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("response was not valid utf-8")]
    InvalidUtf8,
}

/// `reqwest::blocking` adapter, matching the spec's "HTTP calls are
/// synchronous from the worker's viewpoint" contract.
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get_bytes(&self, url: &str) -> Result<Bytes, HttpError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(HttpError::Status(resp.status().as_u16()));
        }
        resp.bytes().map_err(|e| HttpError::Request(e.to_string()))
    }

    fn get_string(&self, url: &str) -> Result<String, HttpError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(HttpError::Status(resp.status().as_u16()));
        }
        resp.text().map_err(|_| HttpError::InvalidUtf8)
    }
}

#[cfg(any(test, feature = "test-support"))]
/// In-memory fake used by worker-pool and scenario tests so they never hit
/// the network. Gated behind `test-support` (not just `#[cfg(test)]`) so
/// `tests/` integration binaries, which compile the crate without its own
/// `cfg(test)`, can still see it.
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeHttpClient {
        strings: Mutex<HashMap<String, String>>,
        bytes: Mutex<HashMap<String, Bytes>>,
    }

    impl FakeHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_string(&self, url: impl Into<String>, body: impl Into<String>) {
            self.strings.lock().insert(url.into(), body.into());
        }

        pub fn set_bytes(&self, url: impl Into<String>, body: impl Into<Bytes>) {
            self.bytes.lock().insert(url.into(), body.into());
        }
    }

    impl HttpClient for FakeHttpClient {
        fn get_bytes(&self, url: &str) -> Result<Bytes, HttpError> {
            self.bytes
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| HttpError::Status(404))
        }

        fn get_string(&self, url: &str) -> Result<String, HttpError> {
            self.strings
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| HttpError::Status(404))
        }
    }
}
