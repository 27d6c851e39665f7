//! Error types for the equity research pipeline
//!
//! Each boundary has its own enum. [`RunError`] is what a research run
//! reports upward; everything else folds into it with a [`FailureKind`].

use research_utils::EnvError;
use std::fmt;
use thiserror::Error;

/// Market-data retrieval failure
///
/// Recovered by the caller: the snapshot is withheld, the session goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The provider answered with an empty price series
    #[error("No price data available for {ticker}")]
    NoData { ticker: String },

    /// Network, unknown ticker or malformed provider response
    #[error("Unable to retrieve market data for {ticker}: {message}")]
    Retrieval { ticker: String, message: String },
}

impl FetchError {
    pub(crate) fn retrieval(ticker: &str, message: impl Into<String>) -> Self {
        Self::Retrieval {
            ticker: ticker.to_string(),
            message: message.into(),
        }
    }

    /// True for the empty-series condition
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Ticker the failed fetch was for
    pub fn ticker(&self) -> &str {
        match self {
            Self::NoData { ticker } | Self::Retrieval { ticker, .. } => ticker,
        }
    }
}

/// Web-search provider failure
#[derive(Debug, Error)]
pub enum SearchError {
    /// Credential rejected by the provider
    #[error("Search authentication failed: {0}")]
    Auth(String),

    /// Quota or rate limit exhausted
    #[error("Search quota exceeded: {0}")]
    Quota(String),

    /// Transport-level failure
    #[error("Search request failed: {0}")]
    Network(String),

    /// Unexpected HTTP status
    #[error("Search provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Unable to parse search response: {0}")]
    Parse(String),

    /// Caller supplied an unusable query
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Configuration problems detected before a run starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more credentials are absent
    #[error("Missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    /// A setting is outside its accepted range
    #[error("Invalid setting '{field}': {detail}")]
    Invalid { field: &'static str, detail: String },

    /// An environment variable could not be read
    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Category of a failed research run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Missing credentials or invalid settings, detected before the run
    Configuration,
    /// The search tool could not be constructed
    ToolInit,
    /// Task construction or agent execution failed
    Execution,
    /// The caller cancelled the run
    Cancelled,
    /// The wall-clock deadline expired
    TimedOut,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::ToolInit => "ToolInitError",
            Self::Execution => "ExecutionError",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one research run
///
/// The message is always non-empty and meant for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RunError {
    pub kind: FailureKind,
    pub message: String,
}

impl RunError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("{kind} without diagnostic detail")
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Configuration, message)
    }

    pub fn tool_init(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ToolInit, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Execution, message)
    }
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<research_core::Error> for RunError {
    fn from(err: research_core::Error) -> Self {
        Self::execution(err.to_string())
    }
}
