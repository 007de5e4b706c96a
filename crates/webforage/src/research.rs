//! The research engine: seed discovery through public search HTML, then a
//! budgeted, robots-gated, politely sequential crawl.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use webforage_core::{
    normalize_topic, CrawlBudget, Error, FetchBackend, FetchRequest, Fragment, ResearchOptions,
    ResearchResult, Result, SearchProvider, SearchQuery,
};
use webforage_local::robots::{RobotsGate, DEFAULT_AGENT_TOKEN};
use webforage_local::search::{BingProvider, DuckDuckGoProvider};
use webforage_local::{expand, extract, links, LocalFetcher};

use crate::cache::ResultCache;
use crate::compose::compose_summary;
use crate::config::EngineConfig;
use crate::dictionary::DictionaryClient;

/// Engine-enforced ceilings; caller-supplied budgets are clamped to these.
pub const PAGE_CEILING: usize = 200;
pub const TIME_CEILING_SECONDS: u64 = 300;

/// Budget defaults when the caller leaves options unset.
pub const DEFAULT_MAX_PAGES: usize = 8;
pub const DEFAULT_MAX_TIME_SECONDS: u64 = 60;

const SEED_BATCH_WIDTH: usize = 6;
const SEED_BATCH_PAUSE: Duration = Duration::from_millis(200);
const SEED_CAP_ABSOLUTE: usize = 240;
const PER_QUERY_SLICE: usize = 8;

const CRAWL_DELAY: Duration = Duration::from_millis(200);
const LINKS_PER_PAGE: usize = 25;
const PAGE_TIMEOUT_MS: u64 = 12_000;
const PAGE_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// One research run at a time: `research` takes `&mut self`, so frontier,
/// visited set, robots cache, and result cache are only ever touched from a
/// single sequential flow.
pub struct ResearchEngine {
    fetcher: Arc<dyn FetchBackend>,
    primary: Arc<dyn SearchProvider>,
    secondary: Arc<dyn SearchProvider>,
    robots: RobotsGate,
    dictionary: DictionaryClient,
    cache: ResultCache,
}

impl ResearchEngine {
    /// Default wiring: reqwest fetcher, DuckDuckGo primary, Bing secondary,
    /// Wikipedia dictionary, config from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::from_env())
    }

    pub fn with_config(cfg: EngineConfig) -> Result<Self> {
        let fetcher: Arc<dyn FetchBackend> =
            Arc::new(LocalFetcher::with_user_agent(cfg.user_agent.clone())?);
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let primary: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoProvider::new(client.clone()));
        let secondary: Arc<dyn SearchProvider> = Arc::new(BingProvider::new(client));
        let dictionary = DictionaryClient::new()?;
        Ok(Self::with_parts(fetcher, primary, secondary, dictionary, cfg))
    }

    /// Explicit wiring; fixture tests inject fake backends here.
    pub fn with_parts(
        fetcher: Arc<dyn FetchBackend>,
        primary: Arc<dyn SearchProvider>,
        secondary: Arc<dyn SearchProvider>,
        dictionary: DictionaryClient,
        cfg: EngineConfig,
    ) -> Self {
        let robots = RobotsGate::new(fetcher.clone(), DEFAULT_AGENT_TOKEN, cfg.robots_fail_open);
        let cache = ResultCache::new(cfg.cache_ttl, cfg.cache_capacity);
        Self {
            fetcher,
            primary,
            secondary,
            robots,
            dictionary,
            cache,
        }
    }

    /// Research `topic` under the given budget.
    ///
    /// Validation first (no network on an empty topic), then cache, then the
    /// dictionary pre-check, and only on a miss the full seed-and-crawl run.
    /// Zero fragments is a normal outcome (`not_found`), never an error.
    pub async fn research(
        &mut self,
        topic: &str,
        opts: &ResearchOptions,
    ) -> Result<ResearchResult> {
        let key = normalize_topic(topic);
        if key.is_empty() {
            return Err(Error::InvalidTopic);
        }

        if let Some(hit) = self.cache.get(&key) {
            tracing::info!(topic = %key, "cache hit");
            let mut out = hit.clone();
            out.topic = topic.to_string();
            return Ok(out);
        }

        // Cheap structured source first, expensive crawl second.
        if let Some(hit) = self.dictionary.lookup(&key).await {
            tracing::info!(topic = %key, title = %hit.title, "dictionary summary hit, crawl skipped");
            let result = ResearchResult {
                topic: topic.to_string(),
                summary: hit.extract.clone(),
                sources: vec![hit.source_url],
                fragments: vec![Fragment {
                    text: hit.extract,
                    code: Vec::new(),
                }],
                not_found: false,
            };
            self.store(&key, &result);
            return Ok(result);
        }

        let max_pages = opts
            .max_pages
            .unwrap_or(DEFAULT_MAX_PAGES)
            .clamp(1, PAGE_CEILING);
        let max_time = opts
            .max_time_seconds
            .unwrap_or(DEFAULT_MAX_TIME_SECONDS)
            .clamp(1, TIME_CEILING_SECONDS);
        let budget = CrawlBudget::new(max_pages, Duration::from_secs(max_time))?;
        tracing::info!(topic = %key, max_pages, max_time_seconds = max_time, "research run starting");

        let seeds = self.gather_seeds(&key, &budget).await;
        let (sources, fragments) = self.crawl(seeds, &budget).await;
        let summary = compose_summary(&fragments);
        let not_found = fragments.is_empty();
        tracing::info!(
            topic = %key,
            pages = fragments.len(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            not_found,
            "research run finished"
        );

        let result = ResearchResult {
            topic: topic.to_string(),
            summary,
            sources,
            fragments,
            not_found,
        };
        self.store(&key, &result);
        Ok(result)
    }

    fn store(&mut self, key: &str, result: &ResearchResult) {
        let mut cached = result.clone();
        cached.topic = key.to_string();
        self.cache.put(key, cached);
    }

    /// Seeding: expanded queries against the primary provider in concurrent
    /// batches, merged into one deduplicated, bounded seed list. Individual
    /// query failures degrade to empty. An empty seed set after all batches
    /// triggers one bare-topic fallback, primary then secondary.
    async fn gather_seeds(&self, key: &str, budget: &CrawlBudget) -> Vec<String> {
        let queries = expand::expand(key);
        let seed_cap = SEED_CAP_ABSOLUTE.min(budget.max_pages.saturating_mul(SEED_BATCH_WIDTH));
        let mut seen: HashSet<String> = HashSet::new();
        let mut seeds: Vec<String> = Vec::new();

        for (i, batch) in queries.chunks(SEED_BATCH_WIDTH).enumerate() {
            if seeds.len() >= seed_cap || budget.time_exhausted() {
                break;
            }
            if i > 0 {
                // Politeness toward the search surface between batches.
                tokio::time::sleep(SEED_BATCH_PAUSE).await;
                if budget.time_exhausted() {
                    break;
                }
            }

            let outcomes = join_all(batch.iter().map(|q| {
                let query = SearchQuery {
                    query: q.clone(),
                    max_results: Some(PER_QUERY_SLICE),
                    timeout_ms: None,
                };
                async move { self.primary.search(&query).await }
            }))
            .await;

            for outcome in outcomes {
                let results = match outcome {
                    Ok(resp) => resp.results,
                    Err(err) => {
                        tracing::debug!(error = %err, "seed query failed");
                        Vec::new()
                    }
                };
                for r in results {
                    if seeds.len() >= seed_cap {
                        break;
                    }
                    if seen.insert(r.url.clone()) {
                        seeds.push(r.url);
                    }
                }
            }
        }

        if seeds.is_empty() {
            let query = SearchQuery {
                query: key.to_string(),
                max_results: Some(PER_QUERY_SLICE),
                timeout_ms: None,
            };
            for provider in [&self.primary, &self.secondary] {
                match provider.search(&query).await {
                    Ok(resp) if !resp.results.is_empty() => {
                        for r in resp.results {
                            if seen.insert(r.url.clone()) {
                                seeds.push(r.url);
                            }
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(provider = provider.name(), error = %err, "bare-topic fallback failed");
                    }
                }
            }
        }

        tracing::info!(topic = %key, seeds = seeds.len(), queries = queries.len(), "seeding finished");
        seeds
    }

    /// Crawling: priority-domain seeds first, then a sequential frontier
    /// walk. Budgets are re-checked every iteration; per-URL failures are
    /// swallowed so one bad page never aborts the run.
    async fn crawl(
        &mut self,
        mut seeds: Vec<String>,
        budget: &CrawlBudget,
    ) -> (Vec<String>, Vec<Fragment>) {
        // Stable sort: priority-domain seeds keep their relative order but
        // move ahead of everything else.
        seeds.sort_by_key(|u| !expand::is_priority_url(u));
        let initial = 40usize.max(seeds.len().min(200));
        let mut frontier: VecDeque<String> = seeds.into_iter().take(initial).collect();
        let frontier_cap = budget.max_pages.saturating_mul(3);

        let mut visited: HashSet<String> = HashSet::new();
        let mut sources: Vec<String> = Vec::new();
        let mut fragments: Vec<Fragment> = Vec::new();

        while fragments.len() < budget.max_pages && !budget.time_exhausted() {
            let Some(next) = frontier.pop_front() else { break };
            let Some(url) = links::canonical_url(&next) else {
                tracing::debug!(url = %next, "dropping unparsable frontier entry");
                continue;
            };
            // Visited covers attempts, not successes: a failing URL is
            // never retried within a run.
            if !visited.insert(url.clone()) {
                continue;
            }

            if self.robots.is_allowed(&url).await {
                match self.fetch_and_extract(&url).await {
                    Some((fragment, discovered)) => {
                        tracing::debug!(url = %url, code_samples = fragment.code.len(), "page yielded a fragment");
                        sources.push(url.clone());
                        fragments.push(fragment);

                        let room = frontier_cap.saturating_sub(frontier.len());
                        for link in discovered.into_iter().take(room) {
                            if visited.contains(&link) {
                                continue;
                            }
                            // Locality first: same-host and priority-domain
                            // links jump the queue.
                            if links::same_host(&url, &link) || expand::is_priority_url(&link) {
                                frontier.push_front(link);
                            } else {
                                frontier.push_back(link);
                            }
                        }
                    }
                    None => tracing::debug!(url = %url, "page yielded no fragment"),
                }
            } else {
                tracing::debug!(url = %url, "robots disallowed");
            }

            tokio::time::sleep(CRAWL_DELAY).await;
        }

        (sources, fragments)
    }

    async fn fetch_and_extract(&self, url: &str) -> Option<(Fragment, Vec<String>)> {
        let req = FetchRequest {
            url: url.to_string(),
            timeout_ms: Some(PAGE_TIMEOUT_MS),
            max_bytes: Some(PAGE_MAX_BYTES),
        };
        let resp = match self.fetcher.fetch(&req).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(url, error = %err, "page fetch failed");
                return None;
            }
        };
        if !resp.is_success() {
            tracing::debug!(url, status = resp.status, "page fetch non-success");
            return None;
        }

        let fragment = extract::extract_fragment(&resp.bytes, resp.content_type.as_deref())?;
        // Discovered links resolve against the post-redirect URL; the
        // recorded source stays the URL that was requested.
        let html = resp.text_lossy();
        let discovered = links::discover_links(&html, Some(&resp.final_url), LINKS_PER_PAGE);
        Some((fragment, discovered))
    }
}
