//! Tools the agent can call, and the registry that dispatches to them.
//!
//! Exactly two tools exist: `pdf_search` over the document index and
//! `web_search` over an external provider. Both take a single `query`.

mod pdf_search;
mod web;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::llm::{Message, ToolCall, ToolSchema, POSITIONAL_ARG_KEY};

pub use pdf_search::{PdfSearch, NO_DOCUMENTS_FOUND};
pub use web::{DuckDuckGo, SearchHit, SearchProvider, WebSearch, NO_WEB_RESULTS};

pub const PDF_SEARCH: &str = "pdf_search";
pub const WEB_SEARCH: &str = "web_search";

/// A query-driven tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Human-readable category reported to callers when this tool is used.
    fn source_label(&self) -> &str;

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, query: &str) -> anyhow::Result<String>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Static name → tool mapping.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Registry holding the document search and web search tools.
    pub fn new(pdf_search: PdfSearch, web_search: WebSearch) -> Self {
        Self::from_tools(vec![Arc::new(pdf_search), Arc::new(web_search)])
    }

    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let order = tools.iter().map(|t| t.name().to_string()).collect();
        let tools = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self { tools, order }
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Category label for a tool name, if the tool exists.
    pub fn source_label(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|t| t.source_label())
    }

    /// Run one call, separating unknown tools from runtime failures.
    pub async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        let query = extract_query(&call.arguments);
        tracing::info!(tool = %call.name, query = %query, "Calling tool");

        tool.execute(&query)
            .await
            .map_err(|e| ToolError::Execution {
                tool: call.name.clone(),
                reason: e.to_string(),
            })
    }

    /// Run one call and wrap the outcome as a tool result message.
    ///
    /// Failures become the message content; they never escape.
    pub async fn dispatch(&self, call: &ToolCall) -> Message {
        let content = match self.execute(call).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.name, "{}", e);
                e.to_string()
            }
        };
        tracing::debug!(tool = %call.name, "Tool result: {}", truncate_for_log(&content, 500));
        Message::tool_result(call.id.clone(), content)
    }
}

/// Pick the query from tool arguments: `query`, then the positional key,
/// then the whole argument map rendered as JSON.
pub fn extract_query(arguments: &BTreeMap<String, String>) -> String {
    arguments
        .get("query")
        .or_else(|| arguments.get(POSITIONAL_ARG_KEY))
        .cloned()
        .unwrap_or_else(|| serde_json::to_string(arguments).unwrap_or_default())
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &s[..cut]),
        None => s.to_string(),
    }
}
