use std::collections::BTreeSet;
use std::io::Cursor;
use webforage_core::{CodeSample, Fragment};

use crate::textprep::{excerpt_lines, norm_ws, truncate_chars};

const TEXT_RENDER_WIDTH: usize = 120;
const MAIN_PREFERENCE_MARGIN: i64 = 300;
const HINT_MAX_CHARS: usize = 2_000;

/// Excerpt bounds: paragraph lines kept, then a character budget.
pub const EXCERPT_MAX_LINES: usize = 40;
pub const EXCERPT_MAX_CHARS: usize = 3_000;

/// Code sample bounds per page.
pub const CODE_MIN_CHARS: usize = 10;
pub const CODE_MAX_BLOCKS: usize = 6;
pub const CODE_MAX_CHARS: usize = 2_000;

/// Convert HTML to readable plain text.
///
/// Intentionally "good enough" and deterministic, not a full readability
/// engine. Callers apply their own output bounds.
pub fn html_to_text(html: &str, width: usize) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return false;
    }
    let rest = &bytes[i..];
    rest.starts_with(b"<!doctype")
        || rest.starts_with(b"<!DOCTYPE")
        || rest.starts_with(b"<html")
        || rest.starts_with(b"<HTML")
        || rest.starts_with(b"<head")
        || rest.starts_with(b"<body")
}

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn body_is_html(bytes: &[u8], content_type: Option<&str>) -> bool {
    let ct = content_type_lc_prefix(content_type);
    if ct == "text/html" || ct == "application/xhtml+xml" {
        return true;
    }
    if ct.is_empty() {
        return bytes_look_like_html(bytes);
    }
    false
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    // Minimal stripper for <tag ...> ... </tag> blocks. Removes only when a
    // close tag exists; ASCII-case-insensitive on tag names.
    let tag_lc = tag.to_ascii_lowercase();
    let open_pat = format!("<{}", tag_lc);
    let close_pat = format!("</{}>", tag_lc);

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            let end = after_open + rel_end + close_pat.len();
            out.push_str(&html[i..start]);
            i = end;
        } else {
            // No close tag; stop stripping.
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_generic_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    // Keep this generic: no site-specific heuristics, only structural UI words.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    for bad in [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ] {
        if s.contains(bad) {
            return true;
        }
    }
    false
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let sel = html_scraper::Selector::parse("a").ok();
    let Some(sel) = sel else { return 0 };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

/// Outer HTML of the best-scoring content container, if any block wins.
fn pick_main_html(html: &str, max_elems: usize) -> Option<String> {
    let max_elems = max_elems.clamp(50, 50_000);
    let doc = html_scraper::Html::parse_document(html);

    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;
    let mut seen = 0usize;
    let mut best_score: i64 = 0;
    let mut best_html: Option<String> = None;

    for el in doc.select(&sel) {
        seen += 1;
        if seen > max_elems {
            break;
        }
        if is_generic_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        // Low enough to work for small single-article pages; tag bonuses and
        // link-density penalties keep pure nav widgets from winning.
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        // Prefer dense non-link text. Link text is usually navigation / TOCs.
        let mut score = txt as i64 - 2 * (link_txt as i64);
        let tag = el.value().name();
        if tag == "article" {
            score += 500;
        } else if tag == "main" {
            score += 300;
        }
        // Penalize suspiciously link-heavy blocks.
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best_html = Some(el.html());
        }
    }

    best_html
}

fn html_main_to_text(html: &str, width: usize) -> Option<String> {
    let block = pick_main_html(html, 20_000)?;
    let out = html_to_text(&block, width);
    has_any_text(&out).then_some(out)
}

fn quality_score(s: &str) -> i64 {
    let non_ws = s.chars().filter(|c| !c.is_whitespace()).count() as i64;
    let url_hits = s.matches("http").count() as i64;
    // Penalize link soup.
    let mut score = non_ws - 200 * url_hits;

    // Penalize pages dominated by many short lines (common for nav/menus).
    let short_lines = s
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .filter(|l| l.chars().count() <= 30)
        .count() as i64;
    score -= 20 * short_lines;

    // Penalize common UI boilerplate tokens (kept small + generic).
    let sl = s.to_ascii_lowercase();
    for needle in [
        "sign up", "log in", "login", "cookie", "consent", "privacy", "terms",
    ] {
        let hits = sl.matches(needle).count() as i64;
        score -= 250 * hits;
    }

    score
}

/// Title + meta description + first headings. The only human text on many
/// JS-heavy shells.
fn html_hint_text(html: &str, max_chars: usize) -> String {
    let max_chars = max_chars.clamp(50, 2_000);
    let doc = html_scraper::Html::parse_document(html);

    fn first_text(doc: &html_scraper::Html, selector: &str) -> Option<String> {
        let sel = html_scraper::Selector::parse(selector).ok()?;
        let el = doc.select(&sel).next()?;
        let t = el.text().collect::<Vec<_>>().join(" ");
        let t = t.trim().to_string();
        (!t.is_empty()).then_some(t)
    }

    fn first_attr(doc: &html_scraper::Html, selector: &str, attr: &str) -> Option<String> {
        let sel = html_scraper::Selector::parse(selector).ok()?;
        let el = doc.select(&sel).next()?;
        let v = el.value().attr(attr)?;
        let v = v.trim().to_string();
        (!v.is_empty()).then_some(v)
    }

    let mut parts = Vec::new();
    if let Some(t) = first_text(&doc, "title") {
        parts.push(t);
    }
    if let Some(d) = first_attr(&doc, "meta[name=\"description\"]", "content") {
        parts.push(d);
    }
    if let Some(d) = first_attr(&doc, "meta[property=\"og:description\"]", "content") {
        parts.push(d);
    }
    if let Some(t) = first_text(&doc, "h1") {
        parts.push(t);
    }
    if let Some(t) = first_text(&doc, "h2") {
        parts.push(t);
    }

    let joined = parts.join("\n");
    let (out, _clipped) = truncate_chars(&joined, max_chars);
    out
}

/// Readable text for an HTML body: main-content isolation when it clearly
/// beats whole-page rendering, whole page otherwise, hint text last.
fn readable_text(html: &str) -> Option<String> {
    let full = html_to_text(html, TEXT_RENDER_WIDTH);
    let main = html_main_to_text(html, TEXT_RENDER_WIDTH);

    let full_ok = has_any_text(&full);
    let main_ok = main.as_deref().map(has_any_text).unwrap_or(false);
    if main_ok {
        let m = main.as_deref().unwrap_or_default();
        let s_main = quality_score(m);
        let s_full = if full_ok { quality_score(&full) } else { 0 };
        if !full_ok || s_main >= s_full + MAIN_PREFERENCE_MARGIN {
            tracing::debug!(s_main, s_full, "main content preferred over whole page");
            return main;
        }
    }

    if full_ok {
        return Some(full);
    }

    let hint = html_hint_text(html, HINT_MAX_CHARS);
    has_any_text(&hint).then(|| norm_ws(&hint))
}

/// First `EXCERPT_MAX_LINES` trimmed non-empty lines, blank-line separated,
/// truncated to `EXCERPT_MAX_CHARS`.
pub fn shape_excerpt(text: &str) -> String {
    let lines = excerpt_lines(text, EXCERPT_MAX_LINES);
    let joined = lines.join("\n\n");
    let (out, _clipped) = truncate_chars(&joined, EXCERPT_MAX_CHARS);
    out
}

fn lang_from_class(class: Option<&str>) -> Option<String> {
    let lc = class?.to_ascii_lowercase();
    for prefix in ["language-", "lang-"] {
        if let Some(pos) = lc.find(prefix) {
            let tag: String = lc[pos + prefix.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if !tag.is_empty() {
                return Some(tag);
            }
        }
    }
    None
}

fn class_lang_hint(el: &html_scraper::ElementRef) -> Option<String> {
    if let Some(lang) = lang_from_class(el.value().attr("class")) {
        return Some(lang);
    }
    // Prism-style markup tags the inner <code>, not the <pre> wrapper.
    let sel = html_scraper::Selector::parse("code").ok()?;
    el.select(&sel)
        .next()
        .and_then(|c| lang_from_class(c.value().attr("class")))
}

fn looks_like_python(code: &str) -> bool {
    code.contains("def ") || code.contains("import ") || code.contains("print(")
}

fn looks_like_javascript(code: &str) -> bool {
    code.contains("console.log")
        || code.contains("=>")
        || code.contains("const ")
        || code.contains("let ")
}

fn looks_like_cpp(code: &str) -> bool {
    code.contains("#include") || code.contains("std::")
}

fn looks_like_java(code: &str) -> bool {
    code.contains("class ") && code.contains("public static void")
}

fn looks_like_php(code: &str) -> bool {
    code.contains("<?php")
}

/// Content-signature rules, first match wins. Best-effort by design: short
/// or mixed samples can mistag.
const CONTENT_RULES: &[(&str, fn(&str) -> bool)] = &[
    ("python", looks_like_python),
    ("javascript", looks_like_javascript),
    ("cpp", looks_like_cpp),
    ("java", looks_like_java),
    ("php", looks_like_php),
];

fn guess_lang(code: &str) -> Option<String> {
    CONTENT_RULES
        .iter()
        .find(|(_, rule)| rule(code))
        .map(|(name, _)| (*name).to_string())
}

/// Code blocks from a page: `pre code`, class-tagged `code`, and bare `pre`
/// elements, deduped by exact text, each bounded, at most
/// `CODE_MAX_BLOCKS` per page.
pub fn extract_code_samples(html: &str) -> Vec<CodeSample> {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse(r#"pre code, code[class*="language-"], pre"#)
    else {
        return Vec::new();
    };

    let mut seen = BTreeSet::<String>::new();
    let mut out: Vec<CodeSample> = Vec::new();
    for el in doc.select(&sel) {
        if out.len() >= CODE_MAX_BLOCKS {
            break;
        }
        let raw = el.text().collect::<Vec<_>>().join("");
        let code = raw.trim();
        if code.chars().count() <= CODE_MIN_CHARS {
            continue;
        }
        if !seen.insert(code.to_string()) {
            continue;
        }
        let lang = class_lang_hint(&el).or_else(|| guess_lang(code));
        let (code, _clipped) = truncate_chars(code, CODE_MAX_CHARS);
        out.push(CodeSample { code, lang });
    }
    out
}

/// Readable fragment from a fetched page body. None means skip the page,
/// not an error.
pub fn extract_fragment(bytes: &[u8], content_type: Option<&str>) -> Option<Fragment> {
    if !body_is_html(bytes, content_type) {
        return None;
    }
    let html0 = String::from_utf8_lossy(bytes).to_string();
    // Strip script/style/noscript before rendering so JS/CSS never counts as
    // content and script-only shells stay empty.
    let html1 = strip_tag_blocks(&html0, "script");
    let html2 = strip_tag_blocks(&html1, "style");
    let html = strip_tag_blocks(&html2, "noscript");

    let text = readable_text(&html)?;
    let excerpt = shape_excerpt(&text);
    if !has_any_text(&excerpt) {
        return None;
    }
    let code = extract_code_samples(&html);
    Some(Fragment {
        text: excerpt,
        code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_PAGE: &str = r#"
    <html>
      <head>
        <title>Understanding Borrowing</title>
        <script>window.dataLayer = [];</script>
        <style>.x { color: red }</style>
      </head>
      <body>
        <div class="navbar"><a href="/">Home</a> <a href="/about">About</a> <a href="/login">Log in</a></div>
        <article>
          <h1>Understanding Borrowing</h1>
          <p>Borrowing lets code use a value without taking ownership of it. The compiler
          enforces that references never outlive the data they point to.</p>
          <p>Shared references permit reads from many places at once, while a mutable
          reference guarantees exclusive access for the duration of its use.</p>
          <pre><code>fn longest&lt;'a&gt;(a: &amp;'a str, b: &amp;'a str) -&gt; &amp;'a str { a }</code></pre>
        </article>
        <div class="footer cookie-banner">We use cookies. Privacy. Terms. Sign up.</div>
      </body>
    </html>
    "#;

    #[test]
    fn fragment_keeps_article_text_and_drops_boilerplate() {
        let frag = extract_fragment(ARTICLE_PAGE.as_bytes(), Some("text/html; charset=utf-8"))
            .expect("article page should yield a fragment");
        assert!(frag.text.contains("Borrowing lets code use a value"));
        assert!(!frag.text.contains("We use cookies"));
        assert!(!frag.text.contains("dataLayer"));
        assert_eq!(frag.code.len(), 1);
        assert!(frag.code[0].code.contains("longest"));
    }

    #[test]
    fn non_html_bodies_are_skipped() {
        assert!(extract_fragment(b"%PDF-1.7 ...", Some("application/pdf")).is_none());
        assert!(extract_fragment(b"just words", Some("text/plain")).is_none());
        assert!(extract_fragment(b"{\"a\":1}", Some("application/json")).is_none());
        // No content type: sniff the body.
        assert!(extract_fragment(b"<html><body><p>hello there world</p></body></html>", None).is_some());
        assert!(extract_fragment(b"\x89PNG\r\n\x1a\nbinary", None).is_none());
    }

    #[test]
    fn script_only_shell_falls_back_to_hint_text() {
        let html = r#"
        <html>
          <head>
            <title>Widget Reference</title>
            <meta name="description" content="API reference for the widget toolkit.">
          </head>
          <body><script>boot();</script></body>
        </html>
        "#;
        let frag = extract_fragment(html.as_bytes(), Some("text/html")).expect("hint fallback");
        assert!(frag.text.contains("Widget Reference"));
        assert!(frag.text.contains("API reference"));
    }

    #[test]
    fn strip_tag_blocks_is_conservative_about_unclosed_tags() {
        assert_eq!(
            strip_tag_blocks("a<script>x</script>b<script>y</script>c", "script"),
            "abc"
        );
        // Unclosed block: leave the remainder untouched.
        assert_eq!(
            strip_tag_blocks("a<script>never closed", "script"),
            "a<script>never closed"
        );
        assert_eq!(strip_tag_blocks("a<SCRIPT>x</SCRIPT>b", "script"), "ab");
    }

    #[test]
    fn code_samples_dedupe_nested_pre_code_and_respect_bounds() {
        let mut html = String::from("<html><body>");
        // pre + nested code: one sample, not two.
        html.push_str("<pre><code>def foo():\n    print(1)</code></pre>");
        // Too short to keep.
        html.push_str("<pre>x = 1</pre>");
        // Class hint wins over content heuristics.
        html.push_str(r#"<pre><code class="language-Rust">let value = do_import_stuff();</code></pre>"#);
        // Filler blocks to exercise the per-page cap.
        for i in 0..10 {
            html.push_str(&format!("<pre>filler block number {i} with enough text</pre>"));
        }
        html.push_str("</body></html>");

        let samples = extract_code_samples(&html);
        assert_eq!(samples.len(), CODE_MAX_BLOCKS);
        assert_eq!(samples[0].code, "def foo():\n    print(1)");
        assert_eq!(samples[0].lang.as_deref(), Some("python"));
        assert_eq!(samples[1].lang.as_deref(), Some("rust"));
        assert!(!samples.iter().any(|s| s.code == "x = 1"));
    }

    #[test]
    fn code_samples_are_truncated_to_char_budget() {
        let big = "a".repeat(5_000);
        let html = format!("<html><body><pre>{big}</pre></body></html>");
        let samples = extract_code_samples(&html);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].code.chars().count(), CODE_MAX_CHARS);
    }

    #[test]
    fn content_rules_apply_in_priority_order() {
        assert_eq!(guess_lang("def foo():\n    print(1)").as_deref(), Some("python"));
        // `import` is shared syntax; the python rule fires first by design.
        assert_eq!(guess_lang("import { x } from 'y';").as_deref(), Some("python"));
        assert_eq!(guess_lang("const answer = () => 42;").as_deref(), Some("javascript"));
        assert_eq!(guess_lang("#include <vector>\nstd::vector<int> v;").as_deref(), Some("cpp"));
        assert_eq!(
            guess_lang("class Main { public static void main(String[] a) {} }").as_deref(),
            Some("java")
        );
        assert_eq!(guess_lang("<?php echo 'hi'; ?>").as_deref(), Some("php"));
        assert_eq!(guess_lang("SELECT * FROM users;"), None);
    }

    #[test]
    fn class_hints_beat_content_heuristics() {
        assert_eq!(lang_from_class(Some("language-PYTHON")).as_deref(), Some("python"));
        assert_eq!(lang_from_class(Some("hljs lang-js theme-dark")).as_deref(), Some("js"));
        assert_eq!(lang_from_class(Some("plain")), None);
        assert_eq!(lang_from_class(None), None);
    }

    #[test]
    fn excerpt_respects_line_and_char_budgets() {
        let many_lines: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let shaped = shape_excerpt(&many_lines);
        assert_eq!(shaped.split("\n\n").count(), EXCERPT_MAX_LINES);

        let huge = "word ".repeat(2_000);
        let shaped = shape_excerpt(&huge);
        assert!(shaped.chars().count() <= EXCERPT_MAX_CHARS);
    }

    #[test]
    fn quality_score_prefers_prose_over_link_soup() {
        let prose = "A long explanation of the borrow checker and how lifetimes interact \
                     with generic functions across module boundaries in larger programs.";
        let soup = "http://a http://b http://c sign up log in cookie consent";
        assert!(quality_score(prose) > quality_score(soup));
    }
}
