//! Page metadata and a credibility heuristic for the checked URL.

use std::sync::Arc;

use async_trait::async_trait;
use linkguard_transport::HttpFetcher;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

const BASE_CREDIBILITY: i32 = 50;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub word_count: usize,
    pub link_count: usize,
    pub has_password_form: bool,
    pub credibility: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentReport {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, url: &Url) -> ContentReport;
}

/// Stand-in used when page fetching is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkippedContent;

#[async_trait]
impl ContentAnalyzer for SkippedContent {
    async fn analyze(&self, _url: &Url) -> ContentReport {
        ContentReport::unavailable("content analysis disabled")
    }
}

pub struct HtmlContentAnalyzer {
    http: Arc<HttpFetcher>,
    max_bytes: usize,
}

impl HtmlContentAnalyzer {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self {
            http,
            max_bytes: MAX_PAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl ContentAnalyzer for HtmlContentAnalyzer {
    async fn analyze(&self, url: &Url) -> ContentReport {
        let page = match self.http.fetch_page(url.as_str(), self.max_bytes).await {
            Ok(page) => page,
            Err(err) => {
                warn!(%url, error = %err, "page fetch failed");
                return ContentReport::unavailable(err.to_string());
            }
        };
        match analyze_html(url, &page.body) {
            Ok(report) => ContentReport {
                final_url: Some(page.final_url),
                ..report
            },
            Err(err) => ContentReport::unavailable(err.to_string()),
        }
    }
}

fn selector(css: &str) -> Result<Selector, ContentError> {
    Selector::parse(css).map_err(|e| ContentError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn text_or_none(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn select_first_text(document: &Html, css: &str) -> Result<Option<String>, ContentError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| text_or_none(&n.text().collect::<String>())))
}

fn select_first_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>, ContentError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(text_or_none))
}

fn count(document: &Html, css: &str) -> Result<usize, ContentError> {
    Ok(document.select(&selector(css)?).count())
}

/// Words in body text, skipping script and style contents.
fn visible_word_count(document: &Html) -> Result<usize, ContentError> {
    let body = selector("body")?;
    let Some(body) = document.select(&body).next() else {
        return Ok(0);
    };
    Ok(body
        .descendants()
        .filter(|node| {
            node.parent()
                .and_then(|p| p.value().as_element().map(|e| !matches!(e.name(), "script" | "style")))
                .unwrap_or(true)
        })
        .filter_map(|node| node.value().as_text().map(|t| t.split_whitespace().count()))
        .sum())
}

pub fn analyze_html(url: &Url, html: &str) -> Result<ContentReport, ContentError> {
    let document = Html::parse_document(html);
    let mut report = ContentReport {
        title: select_first_text(&document, "title")?,
        description: select_first_attr(&document, r#"meta[name="description"]"#, "content")?
            .or(select_first_attr(&document, r#"meta[property="og:description"]"#, "content")?),
        language: select_first_attr(&document, "html", "lang")?,
        word_count: visible_word_count(&document)?,
        link_count: count(&document, "a[href]")?,
        has_password_form: count(&document, r#"input[type="password"]"#)? > 0,
        ..ContentReport::default()
    };
    report.credibility = Some(credibility(url, &report));
    Ok(report)
}

pub fn credibility(url: &Url, report: &ContentReport) -> u8 {
    let https = url.scheme() == "https";
    let mut score = BASE_CREDIBILITY;
    if https {
        score += 15;
    }
    if report.title.is_some() {
        score += 10;
    }
    if report.description.is_some() {
        score += 10;
    }
    if report.language.is_some() {
        score += 5;
    }
    if report.word_count >= 150 {
        score += 10;
    }
    if report.has_password_form && !https {
        score -= 20;
    }
    if report.word_count < 20 {
        score -= 10;
    }
    score.clamp(0, 100) as u8
}
