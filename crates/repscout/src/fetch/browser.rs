//! Headless Chromium transport using chromiumoxide.
//!
//! Chromium takes its proxy as a launch flag, so one browser is launched per
//! egress server and kept for the run. Proxy credentials cannot be passed on
//! the command line; authenticated egress points are used without them and
//! a warning is logged.

use super::{FetchResult, Transport};
use crate::egress::EgressPoint;
use crate::error::{FetchError, ScoutError, ScoutResult};
use crate::fingerprint::FingerprintProfile;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("REPSCOUT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".repscout/chromium/chrome-linux64/chrome"),
            home.join(".repscout/chromium/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Browser-rendered transport.
pub struct BrowserTransport {
    chrome_path: PathBuf,
    browsers: Mutex<HashMap<Option<String>, Arc<Browser>>>,
}

impl BrowserTransport {
    /// Locate Chromium. Browsers are launched lazily on first use.
    pub fn new() -> ScoutResult<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            ScoutError::Config("Chromium not found; set REPSCOUT_CHROMIUM_PATH".into())
        })?;
        Ok(Self {
            chrome_path,
            browsers: Mutex::new(HashMap::new()),
        })
    }

    async fn browser(&self, egress: Option<&EgressPoint>) -> Result<Arc<Browser>, FetchError> {
        let key = egress.map(EgressPoint::server);
        let mut guard = self.browsers.lock().await;
        if let Some(browser) = guard.get(&key) {
            return Ok(Arc::clone(browser));
        }

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if let Some(point) = egress {
            if point.username.is_some() {
                tracing::warn!(
                    "egress {} needs credentials; browser transport connects without them",
                    point.server()
                );
            }
            builder = builder.arg(format!("--proxy-server=http://{}", point.server()));
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Transport(format!("failed to launch Chromium: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let browser = Arc::new(browser);
        guard.insert(key, Arc::clone(&browser));
        Ok(browser)
    }

    /// Number of launched browsers.
    pub async fn active_browsers(&self) -> usize {
        self.browsers.lock().await.len()
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn name(&self) -> &str {
        "browser"
    }

    async fn fetch(
        &self,
        url: &str,
        egress: Option<&EgressPoint>,
        fingerprint: &FingerprintProfile,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;

        let browser = tokio::time::timeout_at(deadline, self.browser(egress))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;
        let page = tokio::time::timeout_at(deadline, browser.new_page("about:blank"))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
            .map_err(|e| FetchError::Transport(format!("failed to create page: {e}")))?;

        let result = match tokio::time::timeout_at(deadline, load(&page, url, fingerprint)).await {
            Ok(loaded) => loaded.map(|(status, body, final_url)| FetchResult {
                status,
                body,
                elapsed: start.elapsed(),
                final_url: Some(final_url),
            }),
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        if tokio::time::timeout(CLOSE_GRACE, page.close()).await.is_err() {
            tracing::debug!("page close timed out");
        }
        result
    }
}

const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Navigate `page` to `url` and return `(status, html, final url)`.
async fn load(
    page: &Page,
    url: &str,
    fingerprint: &FingerprintProfile,
) -> Result<(u16, String, String), FetchError> {
    let ua = SetUserAgentOverrideParams::builder()
        .user_agent(fingerprint.user_agent)
        .accept_language(fingerprint.accept_language)
        .build()
        .map_err(FetchError::Transport)?;
    if let Err(e) = page.execute(ua).await {
        tracing::debug!("user agent override failed: {e}");
    }

    page.goto(url)
        .await
        .map_err(|e| FetchError::Transport(format!("navigation failed: {e}")))?;

    let status = match page.wait_for_navigation_response().await {
        Ok(request) => document_status(
            request
                .as_ref()
                .and_then(|r| r.response.as_ref())
                .map(|r| r.status),
        ),
        Err(e) => {
            tracing::debug!("no navigation response: {e}");
            document_status(None)
        }
    };

    let (body, final_url) = read_page(page, url).await?;
    Ok((status, body, final_url))
}

/// Main-document status, 200 when the browser reported none.
fn document_status(status: Option<i64>) -> u16 {
    status
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| *s > 0)
        .unwrap_or(200)
}

async fn read_page(page: &Page, url: &str) -> Result<(String, String), FetchError> {
    let html: String = page
        .evaluate("document.documentElement.outerHTML")
        .await
        .map_err(|e| FetchError::Transport(format!("failed to get HTML: {e}")))?
        .into_value()
        .map_err(|e| FetchError::Transport(format!("failed to convert HTML result: {e:?}")))?;

    let final_url = page
        .url()
        .await
        .unwrap_or_default()
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string());

    Ok((html, final_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintGenerator;

    #[test]
    fn test_document_status() {
        assert_eq!(document_status(Some(429)), 429);
        assert_eq!(document_status(Some(503)), 503);
        assert_eq!(document_status(Some(0)), 200);
        assert_eq!(document_status(None), 200);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_browser_fetch_data_url() {
        let transport = BrowserTransport::new().expect("chromium not found");
        let fp = FingerprintGenerator::new().generate();
        let result = transport
            .fetch(
                "data:text/html,<h1>Hello</h1><p>World</p>",
                None,
                &fp,
                Duration::from_secs(10),
            )
            .await
            .expect("fetch failed");

        assert_eq!(result.status, 200);
        assert!(result.body.contains("<h1>Hello</h1>"));
        assert_eq!(transport.active_browsers().await, 1);
    }
}
