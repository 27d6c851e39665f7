//! Error types for research-core

use thiserror::Error;

/// Result type alias for research-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent and tool operations
#[derive(Error, Debug)]
pub enum Error {
    /// Agent initialization failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// A tool was invoked with parameters it cannot accept
    #[error("Invalid parameters for tool '{tool}': {detail}")]
    InvalidToolInput { tool: String, detail: String },

    /// A tool ran and its backing capability failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// The model asked for a tool that is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The cumulative token budget for a run was spent
    #[error("Token budget exhausted: used {used} of {limit} tokens")]
    BudgetExhausted { used: usize, limit: usize },

    /// The model finished without producing any answer text
    #[error("Model returned an empty final answer")]
    EmptyResponse,
}
