use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use webforage_core::{FetchBackend, FetchRequest};

const ROBOTS_TIMEOUT_MS: u64 = 5_000;
const ROBOTS_MAX_BYTES: u64 = 64 * 1024;

/// Agent token sites use in robots groups; distinct from the full header
/// user agent the fetcher sends.
pub const DEFAULT_AGENT_TOKEN: &str = "webforage";

#[derive(Debug, Clone)]
enum HostPolicy {
    AllowAll,
    DenyAll,
    Rules(String),
}

impl HostPolicy {
    fn is_allowed(&self, url: &str, agent: &str) -> bool {
        match self {
            HostPolicy::AllowAll => true,
            HostPolicy::DenyAll => false,
            HostPolicy::Rules(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent, url)
            }
        }
    }
}

/// `scheme://host[:port]`, the key one robots.txt file governs.
fn robots_origin(url: &str) -> Option<String> {
    let u = url::Url::parse(url).ok()?;
    if !matches!(u.scheme(), "http" | "https") {
        return None;
    }
    let host = u.host_str()?;
    Some(match u.port() {
        Some(p) => format!("{}://{host}:{p}", u.scheme()),
        None => format!("{}://{host}", u.scheme()),
    })
}

/// Robots-compliance gate with a per-origin policy cache: one robots.txt
/// fetch per origin per gate lifetime.
///
/// Verdicts when the policy cannot be fetched:
/// - 4xx (no robots file published): allowed.
/// - 5xx or network failure: decided by `fail_open` (default open, i.e.
///   availability over strictness; flip it to fail closed).
pub struct RobotsGate {
    fetcher: Arc<dyn FetchBackend>,
    agent: String,
    fail_open: bool,
    policies: HashMap<String, HostPolicy>,
}

impl RobotsGate {
    pub fn new(fetcher: Arc<dyn FetchBackend>, agent: impl Into<String>, fail_open: bool) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            fail_open,
            policies: HashMap::new(),
        }
    }

    /// Robots verdict for `url`. Unparsable or non-http URLs are never allowed.
    pub async fn is_allowed(&mut self, url: &str) -> bool {
        let Some(origin) = robots_origin(url) else {
            return false;
        };
        if !self.policies.contains_key(&origin) {
            let policy = self.fetch_policy(&origin).await;
            self.policies.insert(origin.clone(), policy);
        }
        self.policies
            .get(&origin)
            .map(|p| p.is_allowed(url, &self.agent))
            .unwrap_or(self.fail_open)
    }

    async fn fetch_policy(&self, origin: &str) -> HostPolicy {
        let req = FetchRequest {
            url: format!("{origin}/robots.txt"),
            timeout_ms: Some(ROBOTS_TIMEOUT_MS),
            max_bytes: Some(ROBOTS_MAX_BYTES),
        };
        match self.fetcher.fetch(&req).await {
            Ok(resp) if resp.is_success() => HostPolicy::Rules(resp.text_lossy()),
            Ok(resp) if (400..500).contains(&resp.status) => {
                tracing::debug!(origin, status = resp.status, "no robots.txt published");
                HostPolicy::AllowAll
            }
            Ok(resp) => {
                tracing::debug!(origin, status = resp.status, "robots fetch server error");
                self.failure_policy()
            }
            Err(e) => {
                tracing::debug!(origin, error = %e, "robots fetch failed");
                self.failure_policy()
            }
        }
    }

    fn failure_policy(&self) -> HostPolicy {
        if self.fail_open {
            HostPolicy::AllowAll
        } else {
            HostPolicy::DenyAll
        }
    }
}
