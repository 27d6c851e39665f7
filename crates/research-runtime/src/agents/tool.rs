//! Tool agent implementation (wraps AgentExecutor)

use crate::executor::AgentExecutor;
use async_trait::async_trait;
use research_core::{Agent, Result};

/// An agent that uses the LLM loop with tool execution
///
/// ToolAgent wraps the AgentExecutor to provide the Agent trait interface.
/// The persona lives in the executor's system prompt; `process` receives
/// the task description and returns the model's final answer.
///
/// # Example
///
/// ```no_run
/// use research_core::Agent;
/// use research_llm::LLMProvider;
/// use research_runtime::{AgentExecutorBuilder, ToolAgent};
/// use research_tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example(provider: Arc<dyn LLMProvider>) -> research_core::Result<()> {
/// let executor = AgentExecutorBuilder::new()
///     .provider(provider)
///     .tool_registry(Arc::new(ToolRegistry::new()))
///     .system_prompt("You are a financial research specialist.")
///     .max_iterations(3)
///     .build()?;
///
/// let agent = ToolAgent::from_parts(executor, "researcher");
/// let report = agent.process("Research AAPL".to_string()).await?;
/// # Ok(())
/// # }
/// ```
pub struct ToolAgent {
    executor: AgentExecutor,
    name: String,
}

impl ToolAgent {
    /// Wrap `executor` under the given agent name
    pub fn from_parts(executor: AgentExecutor, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Agent for ToolAgent {
    async fn process(&self, input: String) -> Result<String> {
        self.executor.run(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
