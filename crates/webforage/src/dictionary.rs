//! Dictionary-style pre-check against Wikipedia's REST `page/summary`
//! endpoints. A hit answers a topic with one structured request so the
//! crawler never has to start.

use std::time::Duration;
use webforage_core::{Error, Result};
use webforage_local::default_user_agent;

use crate::config::env_trimmed;

pub const DEFAULT_PT_ENDPOINT: &str = "https://pt.wikipedia.org/api/rest_v1/page/summary";
pub const DEFAULT_EN_ENDPOINT: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

const LOOKUP_TIMEOUT_MS: u64 = 5_000;
const EXTRACT_HTML_WIDTH: usize = 120;

#[derive(Debug, Clone, serde::Deserialize)]
struct PageSummary {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    extract_html: Option<String>,
}

/// One successful summary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryHit {
    pub title: String,
    pub extract: String,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct DictionaryClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl DictionaryClient {
    /// Default endpoint chain (pt then en), honoring
    /// `WEBFORAGE_DICT_PT_ENDPOINT` / `WEBFORAGE_DICT_EN_ENDPOINT`.
    pub fn new() -> Result<Self> {
        let pt = env_trimmed("WEBFORAGE_DICT_PT_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_PT_ENDPOINT.to_string());
        let en = env_trimmed("WEBFORAGE_DICT_EN_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_EN_ENDPOINT.to_string());
        Self::with_endpoints(vec![pt, en])
    }

    /// Explicit endpoint chain, probed in order. An empty chain makes every
    /// lookup a miss.
    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(default_user_agent())
            .timeout(Duration::from_millis(LOOKUP_TIMEOUT_MS))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client, endpoints })
    }

    /// Best-effort summary for `topic` (spaces become underscores, per the
    /// REST title convention). Endpoint failures fall through to the next
    /// endpoint; a miss is `None`, never an error.
    pub async fn lookup(&self, topic: &str) -> Option<DictionaryHit> {
        let title = topic.trim().replace(' ', "_");
        if title.is_empty() {
            return None;
        }
        for base in &self.endpoints {
            let url = format!("{}/{}", base.trim_end_matches('/'), title);
            match self.fetch_summary(&url, &title).await {
                Ok(Some(hit)) => return Some(hit),
                Ok(None) => tracing::debug!(url, "summary response had no extract"),
                Err(err) => tracing::debug!(url, error = %err, "summary lookup failed"),
            }
        }
        None
    }

    async fn fetch_summary(&self, url: &str, fallback_title: &str) -> Result<Option<DictionaryHit>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            // Unknown page titles come back 404; that is the normal miss.
            tracing::debug!(url, status = status.as_u16(), "summary endpoint non-success");
            return Ok(None);
        }
        let page: PageSummary = resp.json().await.map_err(|e| Error::Fetch(e.to_string()))?;

        let extract = match page.extract.filter(|s| !s.trim().is_empty()) {
            Some(text) => text,
            None => match page.extract_html.filter(|s| !s.trim().is_empty()) {
                Some(html) => webforage_local::extract::html_to_text(&html, EXTRACT_HTML_WIDTH)
                    .trim()
                    .to_string(),
                None => return Ok(None),
            },
        };
        if extract.is_empty() {
            return Ok(None);
        }

        Ok(Some(DictionaryHit {
            title: page
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
            extract,
            source_url: url.to_string(),
        }))
    }
}
