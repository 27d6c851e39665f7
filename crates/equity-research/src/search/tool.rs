//! Web-search tool exposed to the research agent

use super::provider::{SearchKind, SearchProvider};
use crate::config::MAX_RESULTS_PER_QUERY;
use async_trait::async_trait;
use research_core::{Error, Result};
use research_llm::tools::schema;
use research_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Name the model uses to call the tool
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Tool that searches the web and returns ranked snippets with sources
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    default_limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    kind: SearchKind,
    #[serde(default)]
    limit: Option<usize>,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, default_limit: usize) -> Self {
        Self {
            provider,
            default_limit: default_limit.clamp(1, MAX_RESULTS_PER_QUERY),
        }
    }

    fn parse(&self, params: Value) -> Result<(String, SearchKind, usize)> {
        let invalid = |detail: String| Error::InvalidToolInput {
            tool: WEB_SEARCH_TOOL.to_string(),
            detail,
        };

        let params: SearchParams = serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err(invalid("query must not be empty".to_string()));
        }
        let limit = params.limit.unwrap_or(self.default_limit);
        if !(1..=MAX_RESULTS_PER_QUERY).contains(&limit) {
            return Err(invalid(format!(
                "limit must be between 1 and {MAX_RESULTS_PER_QUERY}, got {limit}"
            )));
        }
        Ok((query, params.kind, limit))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let (query, kind, limit) = self.parse(params)?;
        debug!(query = %query, kind = %kind, limit, provider = self.provider.name(), "Searching");

        let hits = self
            .provider
            .search(&query, kind, limit)
            .await
            .map_err(|e| Error::ToolFailed {
                tool: WEB_SEARCH_TOOL.to_string(),
                message: e.to_string(),
            })?;

        Ok(json!({
            "query": query,
            "kind": kind,
            "result_count": hits.len(),
            "results": hits,
        }))
    }

    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web for the given query and return ranked text snippets with their source URLs. \
         Use kind \"news\" for recent news coverage and \"web\" for general information."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "query": schema::string("Free-text search query"),
                "kind": schema::string_enum("Which index to search (default web)", &["web", "news"]),
                "limit": schema::integer_range(
                    "Maximum number of results to return",
                    1,
                    MAX_RESULTS_PER_QUERY as i64,
                ),
            }),
            &["query"],
        )
    }
}
