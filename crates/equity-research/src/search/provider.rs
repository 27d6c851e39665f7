//! Web-search provider boundary

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which index to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Web,
    News,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::News => "news",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the result list
    pub rank: usize,
    pub title: String,
    pub snippet: String,
    /// URL the snippet was taken from
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A web-search capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Up to `limit` ranked hits for `query`
    async fn search(&self, query: &str, kind: SearchKind, limit: usize) -> Result<Vec<SearchHit>, SearchError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
