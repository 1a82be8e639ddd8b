//! HTTP client for the draw provider.
//!
//! Implements [`DrawSource`] against the provider's two endpoints:
//!
//! | Purpose | Request |
//! |---------|---------|
//! | Per-round data | `GET {base_url}/common.do?method=getLottoNumber&drwNo={id}` (JSON) |
//! | Latest-round probe | `GET {base_url}/common.do?method=main` (HTML) |
//!
//! The provider turns away requests that do not look like they come from
//! its own pages, so every request carries a browser User-Agent and the
//! matching Referer. The data endpoint additionally expects the XHR header
//! set (`Accept`, `Accept-Language`, `X-Requested-With`).
//!
//! Each call is a single attempt. Retries live in [`crate::fetcher`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::time::Duration;

use draw_ledger_core::models::SourceDraw;
use draw_ledger_core::source::DrawSource;

use crate::config::SourceConfig;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Element id carrying the current round on the provider's main page.
const LATEST_ROUND_ELEMENT_ID: &str = "lottoDrwNo";

/// Status marker of a successful data payload.
const SUCCESS_MARKER: &str = "success";

/// reqwest-backed [`DrawSource`].
pub struct HttpDrawSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDrawSource {
    /// Builds the HTTP client for the provider.
    ///
    /// # Arguments
    ///
    /// - `config`: provider base URL and per-request timeout.
    ///
    /// # Returns
    ///
    /// A source that makes exactly one request per call. Retries belong to
    /// [`Fetcher`](crate::fetcher::Fetcher). Fails only if the TLS backend
    /// cannot be initialised.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn data_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        if let Ok(referer) =
            HeaderValue::from_str(&format!("{}/gameResult.do?method=byWin", self.base_url))
        {
            headers.insert(REFERER, referer);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers
    }

    fn probe_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        if let Ok(referer) = HeaderValue::from_str(&self.base_url) {
            headers.insert(REFERER, referer);
        }
        headers
    }
}

#[async_trait]
impl DrawSource for HttpDrawSource {
    async fn fetch_draw(&self, id: u32) -> Result<SourceDraw> {
        let url = format!("{}/common.do", self.base_url);
        let round = id.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("method", "getLottoNumber"), ("drwNo", round.as_str())])
            .headers(self.data_headers())
            .send()
            .await
            .with_context(|| format!("round {}: request failed", id))?;

        let status = response.status();
        if !status.is_success() {
            bail!("round {}: provider returned HTTP {}", id, status);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("round {}: response was not JSON", id))?;

        parse_draw_payload(id, body)
    }

    async fn probe_latest(&self) -> Result<u32> {
        let url = format!("{}/common.do", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("method", "main")])
            .headers(self.probe_headers())
            .send()
            .await
            .context("latest round probe request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("latest round probe returned HTTP {}", status);
        }

        let page = response.text().await?;
        extract_latest_round(&page).ok_or_else(|| {
            anyhow!(
                "element #{} missing or not a round number",
                LATEST_ROUND_ELEMENT_ID
            )
        })
    }
}

/// Checks the payload's status marker, then decodes it.
fn parse_draw_payload(id: u32, body: serde_json::Value) -> Result<SourceDraw> {
    let marker = body
        .get("returnValue")
        .and_then(|v| v.as_str())
        .unwrap_or("<missing>");
    if marker != SUCCESS_MARKER {
        bail!("round {}: provider reported '{}'", id, marker);
    }
    let draw: SourceDraw = serde_json::from_value(body)
        .with_context(|| format!("round {}: malformed payload", id))?;
    if draw.id != id {
        bail!("round {}: provider answered for round {}", id, draw.id);
    }
    Ok(draw)
}

/// Pulls the integer text of `<... id="lottoDrwNo">1168</...>` out of a page.
///
/// Returns `None` when the element is absent, empty, non-numeric, or zero.
pub fn extract_latest_round(page: &str) -> Option<u32> {
    let marker = [
        format!("id=\"{}\"", LATEST_ROUND_ELEMENT_ID),
        format!("id='{}'", LATEST_ROUND_ELEMENT_ID),
    ]
    .into_iter()
    .find_map(|m| page.find(&m).map(|pos| pos + m.len()))?;

    let rest = &page[marker..];
    let open_end = rest.find('>')? + 1;
    let text = &rest[open_end..];
    let close = text.find('<').unwrap_or(text.len());
    let value: u32 = text[..close].trim().parse().ok()?;
    (value > 0).then_some(value)
}
