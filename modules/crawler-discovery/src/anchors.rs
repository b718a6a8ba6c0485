//! Anchor extraction shared by the Template and Homepage Classifier
//! discovery methods (spec §4.C). Both fetch a page and then decide which
//! anchors look like article links; the real HTML parsing/content
//! extraction engine downstream is out of scope — this is just link
//! discovery.

use regex::Regex;
use std::sync::OnceLock;

use crawler_common::{domain_of, url_shape_score, ARTICLE_SHAPE_THRESHOLD};

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<a\s+[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid anchor regex"))
}

fn non_article_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/(tag|tags|category|categories|author|authors|page|search|login|subscribe|about|contact)(/|$)")
            .expect("valid non-article path regex")
    })
}

fn path_segment_count(url: &str) -> usize {
    url::Url::parse(url)
        .map(|u| u.path_segments().map(|s| s.filter(|seg| !seg.is_empty()).count()).unwrap_or(0))
        .unwrap_or(0)
}

/// Extract all `href` values from raw HTML and resolve them against `base_url`.
pub fn extract_anchors(html: &str, base_url: &url::Url) -> Vec<String> {
    anchor_regex()
        .captures_iter(html)
        .filter_map(|cap| {
            let href = cap.get(1)?.as_str();
            base_url.join(href).ok().map(|u| u.to_string())
        })
        .collect()
}

/// Template method (spec §4.C item 2): known index-page anchor patterns.
/// Keeps anchors on the same host whose path has at least two segments and
/// doesn't match an obvious non-article path.
pub fn template_candidates(anchors: &[String], source_host: &str) -> Vec<String> {
    anchors
        .iter()
        .filter(|href| domain_of(href).as_deref() == Some(source_host))
        .filter(|href| !non_article_path_regex().is_match(href))
        .filter(|href| path_segment_count(href) >= 2)
        .cloned()
        .collect()
}

/// Homepage classifier (spec §4.C item 3): the shared URL-shape heuristic
/// standing in for the ML article-ness model (out of scope). Scores each
/// anchor and keeps the ones that look article-shaped.
pub fn homepage_classifier_candidates(anchors: &[String], source_host: &str) -> Vec<String> {
    anchors
        .iter()
        .filter(|href| domain_of(href).as_deref() == Some(source_host))
        .filter(|href| url_shape_score(href) >= ARTICLE_SHAPE_THRESHOLD)
        .cloned()
        .collect()
}
