//! URL-shape heuristic shared by the Homepage Classifier discovery method
//! (spec §4.C) and the Verifier's post-fetch classification (spec §4.D).
//! Stands in for the ML article-ness model, which is out of scope here.

use std::sync::OnceLock;

use regex::Regex;

fn article_shape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d{4}/\d{2}/|\d{6,})").expect("valid article shape regex"))
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

/// A score in [0, 1] estimating how "article-like" a URL's shape is: date or
/// numeric-id path segments, hyphenated slugs, and path depth score upward;
/// known navigation paths (`/tag/`, `/author/`, ...) score zero.
pub fn url_shape_score(url: &str) -> f64 {
    if non_article_path_regex().is_match(url) {
        return 0.0;
    }

    let mut score = 0.0;
    if article_shape_regex().is_match(url) {
        score += 0.6;
    }
    if path_segment_count(url) >= 3 {
        score += 0.2;
    }
    if let Some(last) = url.trim_end_matches('/').rsplit('/').next() {
        if last.matches('-').count() >= 2 {
            score += 0.3;
        }
        if last.len() > 25 {
            score += 0.1;
        }
    }
    score.min(1.0)
}

/// Default threshold above which a URL is classified as article-like.
pub const ARTICLE_SHAPE_THRESHOLD: f64 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dated_hyphenated_slug_scores_above_threshold() {
        let score = url_shape_score("https://example.com/2024/03/this-is-a-long-headline");
        assert!(score >= ARTICLE_SHAPE_THRESHOLD, "score was {score}");
    }

    #[test]
    fn navigation_paths_score_zero() {
        assert_eq!(url_shape_score("https://example.com/tag/politics"), 0.0);
        assert_eq!(url_shape_score("https://example.com/author/jane"), 0.0);
    }

    #[test]
    fn shallow_path_scores_low() {
        assert!(url_shape_score("https://example.com/x") < ARTICLE_SHAPE_THRESHOLD);
    }
}
