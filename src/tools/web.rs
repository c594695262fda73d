//! Web search: the provider seam, the DuckDuckGo provider, and the tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Tool, WEB_SEARCH};
use crate::error::ProviderError;

/// Returned when the provider finds nothing.
pub const NO_WEB_RESULTS: &str = "No web results found.";

const PROVIDER: &str = "web_search";

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchHit {
    fn render(&self) -> String {
        format!("**{}**\n{}\nURL: {}", self.title, self.snippet, self.url)
    }
}

/// An external web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// DuckDuckGo HTML search (no API key needed).
pub struct DuckDuckGo {
    client: Client,
}

impl DuckDuckGo {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; TravelAssistant/1.0)")
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::network(PROVIDER, e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: status.as_u16(),
                body: "DuckDuckGo request failed".to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::network(PROVIDER, e))?;

        Ok(extract_ddg_results(&html, max_results))
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() >= max_results {
            break;
        }

        let title = tag_text(chunk, "class=\"result__a\"");
        let snippet = tag_text(chunk, "class=\"result__snippet\"").unwrap_or_default();
        let url = tag_text(chunk, "class=\"result__url\"").unwrap_or_default();

        if let Some(title) = title.filter(|t| !t.is_empty()) {
            results.push(SearchHit {
                title: html_decode(&title),
                snippet: html_decode(&snippet),
                url,
            });
        }
    }

    results
}

/// Text content of the `<a>` element carrying `marker`, inner tags removed.
fn tag_text(chunk: &str, marker: &str) -> Option<String> {
    let after_marker = chunk.split(marker).nth(1)?;
    let (_, body) = after_marker.split_once('>')?;
    let inner = body.split("</a>").next().unwrap_or(body);
    Some(strip_tags(inner).trim().to_string())
}

/// Drop markup such as the `<b>` DuckDuckGo puts around matched terms.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

/// Web search tool backed by a [`SearchProvider`].
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl WebSearch {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            max_results: 5,
        }
    }

    /// Rendered results joined by blank lines, or the sentinel.
    pub async fn search(&self, query: &str) -> Result<String, ProviderError> {
        let hits = self.provider.search(query, self.max_results).await?;
        tracing::debug!(
            provider = self.provider.name(),
            "Web search returned {} results",
            hits.len()
        );

        if hits.is_empty() {
            return Ok(NO_WEB_RESULTS.to_string());
        }

        Ok(hits
            .iter()
            .map(SearchHit::render)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Use this if the answer is not found in the travel documents."
    }

    fn source_label(&self) -> &str {
        "Web Search"
    }

    async fn execute(&self, query: &str) -> anyhow::Result<String> {
        Ok(self.search(query).await?)
    }
}
