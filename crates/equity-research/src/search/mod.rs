//! Web search: provider boundary, Serper client and the agent tool

pub mod provider;
pub mod serper;
pub mod tool;

pub use provider::{SearchHit, SearchKind, SearchProvider};
pub use serper::SerperSearch;
pub use tool::{WEB_SEARCH_TOOL, WebSearchTool};
