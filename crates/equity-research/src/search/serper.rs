//! Serper.dev Google search provider

use super::provider::{SearchHit, SearchKind, SearchProvider};
use crate::config::SearchSettings;
use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// [`SearchProvider`] backed by the Serper API
pub struct SerperSearch {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl std::fmt::Debug for SerperSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperSearch")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperItem>,
    #[serde(default)]
    news: Vec<SerperItem>,
}

#[derive(Debug, Deserialize)]
struct SerperItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

impl SerperSearch {
    /// Create a provider; a blank key is rejected
    pub fn new(api_key: impl Into<String>, settings: &SearchSettings) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::Auth("search API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, kind: SearchKind) -> String {
        match kind {
            SearchKind::Web => format!("{}/search", self.endpoint),
            SearchKind::News => format!("{}/news", self.endpoint),
        }
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    #[instrument(skip(self), fields(provider = "serper"))]
    async fn search(&self, query: &str, kind: SearchKind, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(self.url(kind))
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest { q: query, num: limit })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => SearchError::Auth(body),
                429 => SearchError::Quota(body),
                code => SearchError::Status { status: code, body },
            });
        }

        let body = response.text().await?;
        let hits = parse_response(&body, kind, limit)?;
        debug!(hits = hits.len(), "Search completed");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

fn parse_response(body: &str, kind: SearchKind, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: SerperResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
    let items = match kind {
        SearchKind::Web => parsed.organic,
        SearchKind::News => parsed.news,
    };

    Ok(items
        .into_iter()
        .filter(|item| !item.link.is_empty())
        .take(limit)
        .enumerate()
        .map(|(i, item)| SearchHit {
            rank: i + 1,
            title: item.title,
            snippet: item.snippet,
            source: item.link,
            date: item.date,
        })
        .collect())
}
