//! Chat-completion backend seam

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat-completion backend the agent executor drives
///
/// One call is one model turn. Token usage must be reported on every
/// response since the executor enforces its budget from it.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send one turn of the conversation and return the model's reply
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short backend name used in logs
    fn name(&self) -> &str;
}
