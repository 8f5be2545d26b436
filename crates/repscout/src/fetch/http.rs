//! Plain HTTP transport over reqwest.
//!
//! Not a browser: one GET per call, no JavaScript. A client is built lazily
//! per proxy URL and reused for the rest of the run so connection pools stay
//! warm; `None` keys the direct client.

use super::{FetchResult, Transport};
use crate::egress::EgressPoint;
use crate::error::{FetchError, ScoutError, ScoutResult};
use crate::fingerprint::FingerprintProfile;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// HTTP transport used by default.
pub struct HttpTransport {
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, proxy: Option<String>) -> ScoutResult<reqwest::Client> {
        let mut guard = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = guard.get(&proxy) {
            return Ok(client.clone());
        }

        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(5));
        if let Some(url) = &proxy {
            let proxy = reqwest::Proxy::all(url.as_str())
                .map_err(|e| ScoutError::Config(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build()?;
        guard.insert(proxy, client.clone());
        Ok(client)
    }

    /// Number of distinct clients built so far.
    pub fn cached_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(
        &self,
        url: &str,
        egress: Option<&EgressPoint>,
        fingerprint: &FingerprintProfile,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        let client = self
            .client(egress.map(EgressPoint::proxy_url))
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let mut request = client.get(url).timeout(timeout);
        for (name, value) in fingerprint.headers() {
            request = request.header(name, value);
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| map_error(e, timeout))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| map_error(e, timeout))?;

        Ok(FetchResult {
            status,
            body,
            elapsed: start.elapsed(),
            final_url: Some(final_url),
        })
    }
}

fn map_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport(err.to_string())
    }
}
