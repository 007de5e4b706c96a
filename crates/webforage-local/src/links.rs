use std::collections::BTreeSet;

/// Absolute http(s) links from HTML, in document order, deduped, fragments
/// dropped, at most `max_links`. Relative hrefs resolve against `base_url`.
pub fn discover_links(html: &str, base_url: Option<&str>, max_links: usize) -> Vec<String> {
    let max_links = max_links.min(500);
    if max_links == 0 {
        return Vec::new();
    }

    let base = base_url.and_then(|u| url::Url::parse(u).ok());
    let doc = html_scraper::Html::parse_document(html);
    let sel = match html_scraper::Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = BTreeSet::<String>::new();
    let mut out: Vec<String> = Vec::new();
    for el in doc.select(&sel) {
        if out.len() >= max_links {
            break;
        }
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() {
            continue;
        }
        let href_lc = href.to_ascii_lowercase();
        if href_lc.starts_with("javascript:") || href_lc.starts_with("mailto:") {
            continue;
        }

        let abs = if let Ok(u) = url::Url::parse(href) {
            u
        } else if let Some(b) = &base {
            match b.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            }
        } else {
            continue;
        };

        // Only http(s) targets can go on a crawl frontier.
        if !matches!(abs.scheme(), "http" | "https") {
            continue;
        }

        let mut u = abs;
        u.set_fragment(None);
        let url = u.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        out.push(url);
    }

    out
}

/// Fragment-stripped form of `url`; the visited-set key. None when unparsable.
pub fn canonical_url(url: &str) -> Option<String> {
    let mut u = url::Url::parse(url).ok()?;
    u.set_fragment(None);
    Some(u.to_string())
}

/// True when both URLs parse and share a host.
pub fn same_host(a: &str, b: &str) -> bool {
    let (Ok(ua), Ok(ub)) = (url::Url::parse(a), url::Url::parse(b)) else {
        return false;
    };
    match (ua.host_str(), ub.host_str()) {
        (Some(ha), Some(hb)) => ha.eq_ignore_ascii_case(hb),
        _ => false,
    }
}
