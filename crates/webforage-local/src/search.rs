use std::collections::BTreeSet;
use std::time::Duration;
use webforage_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};

use crate::textprep::norm_ws;

const SEARCH_MAX_BYTES: usize = 512 * 1024;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Search pages can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(10_000).clamp(1_000, 60_000)
}

/// Result pages past the cap are parsed from their truncated prefix.
async fn read_body_capped(resp: reqwest::Response, cap: usize) -> Result<String> {
    use futures_util::StreamExt;
    let mut bytes: Vec<u8> = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Search(e.to_string()))?;
        if bytes.len().saturating_add(chunk.len()) > cap {
            let can_take = cap.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..can_take]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn ddg_endpoint_from_env() -> Option<String> {
    crate::env("WEBFORAGE_DDG_ENDPOINT").map(|s| s.trim().to_string())
}

fn bing_endpoint_from_env() -> Option<String> {
    crate::env("WEBFORAGE_BING_ENDPOINT").map(|s| s.trim().to_string())
}

fn host_matches(host: &str, domain: &str) -> bool {
    host.strip_suffix(domain)
        .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('.'))
}

/// Turn one result-page href into an outbound absolute URL, or None.
///
/// Handles protocol-relative hrefs, unwraps `uddg=` redirect indirection, and
/// never emits a URL pointing back at the search surface itself.
fn resolve_result_href(href: &str, search_host: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let abs = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };
    let u = url::Url::parse(&abs).ok()?;
    if !matches!(u.scheme(), "http" | "https") {
        return None;
    }
    let host = u.host_str()?.to_ascii_lowercase();
    if host_matches(&host, search_host) {
        // Redirect wrapper: the real target rides in the uddg query parameter.
        let target = u
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        let tu = url::Url::parse(&target).ok()?;
        if !matches!(tu.scheme(), "http" | "https") {
            return None;
        }
        let th = tu.host_str()?.to_ascii_lowercase();
        if host_matches(&th, search_host) {
            return None;
        }
        return Some(tu.to_string());
    }
    Some(u.to_string())
}

fn element_text(el: &html_scraper::ElementRef) -> Option<String> {
    let text = norm_ws(&el.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

fn push_generic_anchors(
    doc: &html_scraper::Html,
    search_host: &str,
    source: &str,
    max_results: usize,
    seen: &mut BTreeSet<String>,
    out: &mut Vec<SearchResult>,
) {
    let Ok(sel) = html_scraper::Selector::parse(r#"a[href^="http"]"#) else {
        return;
    };
    for el in doc.select(&sel) {
        if out.len() >= max_results {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_result_href(href, search_host) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        out.push(SearchResult {
            url,
            title: element_text(&el),
            snippet: None,
            source: source.to_string(),
        });
    }
}

pub(crate) fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let mut seen = BTreeSet::<String>::new();
    let mut out: Vec<SearchResult> = Vec::new();

    // Primary markup: one .result container per hit.
    if let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        html_scraper::Selector::parse(".result"),
        html_scraper::Selector::parse("a.result__a"),
        html_scraper::Selector::parse("a.result__snippet, .result__snippet"),
    ) {
        for result in doc.select(&result_sel) {
            if out.len() >= max_results {
                break;
            }
            let Some(link) = result.select(&link_sel).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_result_href(href, "duckduckgo.com") else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            let snippet = result
                .select(&snippet_sel)
                .next()
                .and_then(|el| element_text(&el));
            out.push(SearchResult {
                url,
                title: element_text(&link),
                snippet,
                source: "duckduckgo".to_string(),
            });
        }
    }

    // Markup drift fallback: any outbound absolute anchor.
    if out.is_empty() {
        push_generic_anchors(
            &doc,
            "duckduckgo.com",
            "duckduckgo",
            max_results,
            &mut seen,
            &mut out,
        );
    }

    out
}

pub(crate) fn parse_bing_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let mut seen = BTreeSet::<String>::new();
    let mut out: Vec<SearchResult> = Vec::new();

    if let Ok(sel) = html_scraper::Selector::parse("li.b_algo h2 a") {
        for el in doc.select(&sel) {
            if out.len() >= max_results {
                break;
            }
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_result_href(href, "bing.com") else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            out.push(SearchResult {
                url,
                title: element_text(&el),
                snippet: None,
                source: "bing".to_string(),
            });
        }
    }

    if out.is_empty() {
        push_generic_anchors(&doc, "bing.com", "bing", max_results, &mut seen, &mut out);
    }

    out
}

/// Primary provider: the key-less DuckDuckGo HTML results surface.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: Self::endpoint(),
        }
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn endpoint() -> String {
        ddg_endpoint_from_env().unwrap_or_else(|| "https://html.duckduckgo.com/html/".to_string())
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let max_results = q.max_results.unwrap_or(10).min(30);
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str())])
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("duckduckgo search HTTP {status}")));
        }
        let body = read_body_capped(resp, SEARCH_MAX_BYTES).await?;

        Ok(SearchResponse {
            results: parse_duckduckgo_results(&body, max_results),
            provider: "duckduckgo".to_string(),
        })
    }
}

/// Secondary provider: the Bing HTML results surface. Same shape as the
/// primary so the two are interchangeable behind the trait.
#[derive(Debug, Clone)]
pub struct BingProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl BingProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: Self::endpoint(),
        }
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn endpoint() -> String {
        bing_endpoint_from_env().unwrap_or_else(|| "https://www.bing.com/search".to_string())
    }
}

#[async_trait::async_trait]
impl SearchProvider for BingProvider {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let max_results = q.max_results.unwrap_or(10).min(30);
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str())])
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("bing search HTTP {status}")));
        }
        let body = read_body_capped(resp, SEARCH_MAX_BYTES).await?;

        Ok(SearchResponse {
            results: parse_bing_results(&body, max_results),
            provider: "bing".to_string(),
        })
    }
}
