//! Core Agent trait definition

use crate::Result;
use async_trait::async_trait;

/// Core trait that all agents must implement
///
/// Input and output are plain strings. Concrete agents decide how a task
/// description maps onto LLM messages and how the final answer is extracted.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process a task and return the agent's final answer
    async fn process(&self, input: String) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
