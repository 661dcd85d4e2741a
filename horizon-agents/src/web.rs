//! Web search and page scraping backends.
//!
//! Both are opaque text producers to the rest of the crate: a search query
//! or URL goes in, plain text lines come out.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; horizon-agents/0.1)";
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run a search and return the results as text, one fact per line.
    async fn search(&self, query: &str) -> Result<String>;

    /// Fetch a page and return its visible text.
    async fn scrape(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily search plus plain HTTP page fetches.
pub struct WebClient {
    http: reqwest::Client,
    search_api_key: String,
    max_results: usize,
}

impl WebClient {
    pub fn new(search_api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            search_api_key,
            max_results: 10,
        })
    }
}

#[async_trait]
impl WebSearch for WebClient {
    async fn search(&self, query: &str) -> Result<String> {
        let request = TavilyRequest {
            api_key: &self.search_api_key,
            query,
            search_depth: "basic",
            max_results: self.max_results,
        };
        let resp = self
            .http
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await
            .context("Failed to call search API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Search API error {status}: {body}");
        }

        let parsed: TavilyResponse = resp
            .json()
            .await
            .context("Failed to parse search response")?;
        tracing::debug!(query, results = parsed.results.len(), "Search complete");
        Ok(render_results(&parsed.results))
    }

    async fn scrape(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} for {url}");
        }

        let html = resp
            .text()
            .await
            .context("Failed to read response body")?;
        Ok(html_to_text(&html))
    }
}

/// One `title url` line followed by the snippet lines, per result.
fn render_results(results: &[TavilyResult]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(r.title.trim());
        if !r.url.is_empty() {
            out.push(' ');
            out.push_str(&r.url);
        }
        out.push('\n');
        for line in r.content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Visible text of an HTML document, one text run per line with runs of
/// whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|el| el.name()))
            .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name));
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}
