use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid topic: empty or whitespace-only")]
    InvalidTopic,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cache key and identity for a research run.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub elapsed_ms: u128,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeSample {
    pub code: String,
    /// Best-effort tag from a class attribute or content heuristics; never authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    #[serde(default)]
    pub code: Vec<CodeSample>,
}

/// Output of one research run. `sources[i]` is the provenance of
/// `fragments[i]`; the two stay index-aligned through any filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub fragments: Vec<Fragment>,
    /// True iff the run produced zero fragments. Not an error.
    pub not_found: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchOptions {
    pub max_pages: Option<usize>,
    pub max_time_seconds: Option<u64>,
}

/// Per-run limits, checked before every fetch. Either limit exhausting
/// terminates the run; neither is ever exceeded.
#[derive(Debug, Clone)]
pub struct CrawlBudget {
    pub max_pages: usize,
    pub max_wall_clock: Duration,
    pub started_at: Instant,
}

impl CrawlBudget {
    pub fn new(max_pages: usize, max_wall_clock: Duration) -> Result<Self> {
        if max_pages == 0 {
            return Err(Error::Internal("crawl budget: max_pages is zero".into()));
        }
        if max_wall_clock.is_zero() {
            return Err(Error::Internal("crawl budget: wall clock is zero".into()));
        }
        Ok(Self {
            max_pages,
            max_wall_clock,
            started_at: Instant::now(),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn time_exhausted(&self) -> bool {
        self.elapsed() >= self.max_wall_clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_topic_trims_and_lowercases() {
        assert_eq!(normalize_topic("  React Hooks  "), "react hooks");
        assert_eq!(normalize_topic("RUST"), "rust");
    }

    #[test]
    fn budget_rejects_zero_limits() {
        assert!(CrawlBudget::new(0, Duration::from_secs(10)).is_err());
        assert!(CrawlBudget::new(5, Duration::ZERO).is_err());
        assert!(CrawlBudget::new(5, Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn research_result_serializes_camel_case() {
        let r = ResearchResult {
            topic: "t".into(),
            summary: String::new(),
            sources: vec![],
            fragments: vec![],
            not_found: true,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["notFound"], serde_json::Value::Bool(true));
        assert!(v.get("not_found").is_none());
    }

    #[test]
    fn code_sample_omits_missing_lang() {
        let s = CodeSample {
            code: "x".into(),
            lang: None,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("lang").is_none());
    }

    #[test]
    fn fetch_response_text_lossy_tolerates_bad_utf8() {
        let r = FetchResponse {
            url: "http://x".into(),
            final_url: "http://x".into(),
            status: 200,
            content_type: None,
            bytes: vec![0x68, 0x69, 0xff],
            truncated: false,
            elapsed_ms: 1,
        };
        assert!(r.text_lossy().starts_with("hi"));
        assert!(r.is_success());
    }
}
