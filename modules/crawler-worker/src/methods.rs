//! Extraction method chain (spec §4.F): each candidate URL is tried against
//! methods in order until one succeeds. `cached_snapshot` does real HTTP
//! fetch + readability extraction; `trafilatura_style` and `headless_browser`
//! are interface-only stubs — the chain/fallback semantics are in scope, the
//! actual parsing engines behind them are not.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};

use crawler_common::CrawlerError;

use crate::captcha::{is_domain_blocking_status, looks_like_captcha};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: String,
    pub text: String,
    pub authors: Vec<String>,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"))
}

fn extract_title(html: &str) -> String {
    title_regex()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// One attempt in the extraction chain. Returns `Ok(None)` when this method
/// can't handle the URL (so the caller moves to the next one), `Ok(Some(_))`
/// on success, and `Err` only for failures that should abort the whole item
/// (e.g. a transport error worth surfacing to the caller's domain-level logic).
#[async_trait]
pub trait ExtractionMethod: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_extract(&self, client: &reqwest::Client, url: &str) -> Result<Option<ExtractedContent>, CrawlerError>;
}

/// Fetches the live page and runs it through the same readability/markdown
/// transform the archive pipeline uses for cached snapshots.
pub struct CachedSnapshot;

#[async_trait]
impl ExtractionMethod for CachedSnapshot {
    fn name(&self) -> &'static str {
        "cached_snapshot"
    }

    async fn try_extract(&self, client: &reqwest::Client, url: &str) -> Result<Option<ExtractedContent>, CrawlerError> {
        let response = client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .header("User-Agent", "crawler-worker/0.1")
            .send()
            .await
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        let status = response.status();
        if is_domain_blocking_status(status) {
            return Err(CrawlerError::RateLimited(format!("status {status}")));
        }
        if !status.is_success() {
            return Ok(None);
        }

        let html = response.text().await.map_err(|e| CrawlerError::Network(e.to_string()))?;
        if html.trim().is_empty() {
            return Ok(None);
        }
        if looks_like_captcha(&html) {
            return Err(CrawlerError::RateLimited("captcha challenge body".to_string()));
        }

        let title = extract_title(&html);
        let parsed_url = url::Url::parse(url).ok();
        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: parsed_url.as_ref(),
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };
        let text = transform_content_input(input, &config);

        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(ExtractedContent {
            title,
            text,
            authors: Vec::new(),
        }))
    }
}

/// Stub: the heuristic-parse tier of the chain is not implemented here (the
/// content-extraction engine is out of scope). Always defers to the next method.
pub struct TrafilaturaStyle;

#[async_trait]
impl ExtractionMethod for TrafilaturaStyle {
    fn name(&self) -> &'static str {
        "trafilatura_style"
    }

    async fn try_extract(&self, _client: &reqwest::Client, _url: &str) -> Result<Option<ExtractedContent>, CrawlerError> {
        Ok(None)
    }
}

/// Stub: headless-browser rendering is not implemented here (out of scope).
/// Always defers, which means it's always the terminal "give up" method.
pub struct HeadlessBrowser;

#[async_trait]
impl ExtractionMethod for HeadlessBrowser {
    fn name(&self) -> &'static str {
        "headless_browser"
    }

    async fn try_extract(&self, _client: &reqwest::Client, _url: &str) -> Result<Option<ExtractedContent>, CrawlerError> {
        Ok(None)
    }
}

/// Default chain order per spec §4.F: cached snapshot, then the two stubs.
pub fn default_chain() -> Vec<Box<dyn ExtractionMethod>> {
    vec![Box::new(CachedSnapshot), Box::new(TrafilaturaStyle), Box::new(HeadlessBrowser)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_from_html() {
        let html = "<html><head><title> Some Headline </title></head><body></body></html>";
        assert_eq!(extract_title(html), "Some Headline");
    }

    #[test]
    fn missing_title_is_empty() {
        assert_eq!(extract_title("<html><body>no title</body></html>"), "");
    }

    #[tokio::test]
    async fn stub_methods_always_defer() {
        let client = reqwest::Client::new();
        assert!(TrafilaturaStyle.try_extract(&client, "https://example.com").await.unwrap().is_none());
        assert!(HeadlessBrowser.try_extract(&client, "https://example.com").await.unwrap().is_none());
    }
}
