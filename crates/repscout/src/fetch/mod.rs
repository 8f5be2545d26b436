//! Page fetching.
//!
//! A [`Transport`] performs exactly one bounded request per call. It never
//! retries and never judges the response: non-2xx statuses come back as an
//! ordinary [`FetchResult`] for [`crate::classify`] to inspect, and only a
//! missing response (timeout, connection failure) is an error.

pub mod http;

#[cfg(feature = "browser")]
pub mod browser;

pub use http::HttpTransport;

#[cfg(feature = "browser")]
pub use browser::BrowserTransport;

use crate::egress::EgressPoint;
use crate::error::FetchError;
use crate::fingerprint::FingerprintProfile;
use async_trait::async_trait;
use std::time::Duration;

/// Raw outcome of one fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
    /// URL after redirects, when the transport knows it.
    pub final_url: Option<String>,
}

/// Something that can load a page through an optional egress point.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Load `url` once. `egress = None` means direct.
    async fn fetch(
        &self,
        url: &str,
        egress: Option<&EgressPoint>,
        fingerprint: &FingerprintProfile,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError>;
}
