//! Topic-to-query expansion. Deterministic: same topic, same plan.

/// Domains whose pages are preferred during seeding and crawling. Order
/// matters: it is the order `site:` variants appear in the query plan.
pub const PRIORITY_DOMAINS: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "developer.mozilla.org",
    "docs.python.org",
    "dev.to",
    "medium.com",
    "npmjs.com",
    "docs.microsoft.com",
    "readthedocs.io",
    "gist.github.com",
    "towardsdatascience.com",
    "wikipedia.org",
];

const SUFFIXES: &[&str] = &[
    "example",
    "tutorial",
    "how to",
    "error",
    "stack trace",
    "installation",
    "guide",
];

/// Full query plan for one topic: the bare topic, a quoted exact-phrase
/// variant, suffixed variants, then three `site:` variants per priority
/// domain.
pub fn expand(topic: &str) -> Vec<String> {
    let topic = topic.trim();
    let mut out = Vec::with_capacity(2 + SUFFIXES.len() + PRIORITY_DOMAINS.len() * 3);
    out.push(topic.to_string());
    out.push(format!("\"{topic}\""));
    for suffix in SUFFIXES {
        out.push(format!("{topic} {suffix}"));
    }
    for domain in PRIORITY_DOMAINS {
        out.push(format!("site:{domain} {topic}"));
        out.push(format!("site:{domain} {topic} example"));
        out.push(format!("site:{domain} {topic} error"));
    }
    out
}

/// True when `url`'s host is a priority domain or a subdomain of one.
pub fn is_priority_url(url: &str) -> bool {
    let Ok(u) = url::Url::parse(url) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    PRIORITY_DOMAINS.iter().any(|d| {
        host.strip_suffix(d)
            .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('.'))
    })
}
