//! Agent executor for running agent loops
//!
//! The AgentExecutor implements the core agent loop pattern:
//! 1. Call LLM with conversation history and available tools
//! 2. Check stop reason
//! 3. If tool use requested, execute tools and loop back
//! 4. If completed, return final response
//!
//! Two ceilings bound every run. `max_iterations` caps the number of LLM
//! calls: on the last permitted call no tools are offered and the model is
//! told to answer. `max_token_limit` caps the cumulative input + output
//! tokens; each request asks for at most the remaining budget.

use research_core::{Error, Result};
use research_llm::{CompletionRequest, ContentBlock, LLMProvider, Message, StopReason, ToolDefinition};
use research_tools::ToolRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Appended to the system prompt on the final permitted iteration
const FINAL_ANSWER_INSTRUCTION: &str = "You have used all of your research steps. \
Do not call any more tools. Write your complete final answer now using the information gathered so far.";

/// Event handler for agent execution events
///
/// Implement this trait to receive callbacks during agent execution,
/// useful for streaming tool call status to clients.
#[async_trait]
pub trait ExecutorEventHandler: Send + Sync {
    /// Called when a tool execution starts
    async fn on_tool_start(&self, _id: &str, _name: &str, _input: &Value) {}

    /// Called when a tool execution completes
    async fn on_tool_done(
        &self,
        _id: &str,
        _name: &str,
        _result: std::result::Result<&Value, &str>,
        _duration_ms: u64,
    ) {
    }

    /// Called when the agent completes
    async fn on_complete(&self, _result: &str) {}

    /// Called when an error occurs
    async fn on_error(&self, _error: &str) {}
}

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of LLM calls in one run (prevents infinite loops)
    pub max_iterations: usize,

    /// Cumulative input + output token budget for one run
    pub max_token_limit: usize,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_token_limit: 100_000,
            model: "gpt-4o-mini".to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: Some(0.7),
        }
    }
}

impl ExecutorConfig {
    /// Check that both ceilings allow at least one call
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InitializationFailed(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_token_limit == 0 {
            return Err(Error::InitializationFailed(
                "max_token_limit must be at least 1".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(Error::InitializationFailed(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
///
/// The AgentExecutor orchestrates the interaction between an LLM provider
/// and a tool registry, implementing the agent loop pattern.
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
            event_handler: None,
        }
    }

    /// Set the event handler for receiving execution events
    pub fn with_event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Execute the agent loop with a user query
    ///
    /// # Returns
    ///
    /// The final response from the agent after all tool calls are complete
    pub async fn run(&self, user_message: String) -> Result<String> {
        self.run_conversation(vec![Message::user(user_message)], self.event_handler.clone())
            .await
    }

    /// Execute the agent loop with a per-request event handler
    pub async fn run_with_handler(
        &self,
        user_message: String,
        handler: Arc<dyn ExecutorEventHandler>,
    ) -> Result<String> {
        self.run_conversation(vec![Message::user(user_message)], Some(handler))
            .await
    }

    async fn run_conversation(
        &self,
        initial_conversation: Vec<Message>,
        event_handler: Option<Arc<dyn ExecutorEventHandler>>,
    ) -> Result<String> {
        let result = self.drive(initial_conversation, event_handler.as_ref()).await;

        if let Some(handler) = &event_handler {
            match &result {
                Ok(text) => handler.on_complete(text).await,
                Err(e) => handler.on_error(&e.to_string()).await,
            }
        }

        result
    }

    async fn drive(
        &self,
        initial_conversation: Vec<Message>,
        event_handler: Option<&Arc<dyn ExecutorEventHandler>>,
    ) -> Result<String> {
        let mut conversation = initial_conversation;
        let mut tokens_used = 0usize;
        let limit = self.config.max_token_limit;
        let base_system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        for iteration in 1..=self.config.max_iterations {
            let remaining = limit.saturating_sub(tokens_used);
            if remaining == 0 {
                warn!(tokens_used, limit, "Token budget exhausted before next call");
                return Err(Error::BudgetExhausted {
                    used: tokens_used,
                    limit,
                });
            }

            let final_turn = iteration == self.config.max_iterations;
            let tools = if final_turn {
                Vec::new()
            } else {
                self.build_tool_definitions()
            };
            let system = if final_turn {
                format!("{base_system}\n\n{FINAL_ANSWER_INSTRUCTION}")
            } else {
                base_system.clone()
            };
            let max_tokens = self.config.max_tokens.min(remaining);

            info!(
                iteration,
                max_iterations = self.config.max_iterations,
                final_turn,
                tool_count = tools.len(),
                max_tokens,
                tokens_used,
                "Agent iteration started"
            );

            let mut request_builder = CompletionRequest::builder(&self.config.model)
                .messages(conversation.clone())
                .system(system)
                .max_tokens(max_tokens)
                .tools(tools);
            if let Some(temperature) = self.config.temperature {
                request_builder = request_builder.temperature(temperature);
            }

            let response = self
                .provider
                .complete(request_builder.build())
                .await
                .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

            tokens_used += response.usage.total();
            info!(
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                tokens_used,
                "LLM response received"
            );

            let text = response.message.text().unwrap_or_default();
            let preview: String = text.chars().take(300).collect();
            debug!(response_preview = %preview, "LLM response content preview");

            match response.stop_reason {
                StopReason::EndTurn => {
                    if text.trim().is_empty() {
                        warn!(iteration, "Model ended its turn without an answer");
                        return Err(Error::EmptyResponse);
                    }
                    info!(iteration, response_length = text.len(), "Agent completed naturally");
                    return Ok(text);
                }

                StopReason::MaxTokens => {
                    if text.trim().is_empty() {
                        return Err(if tokens_used >= limit {
                            Error::BudgetExhausted {
                                used: tokens_used,
                                limit,
                            }
                        } else {
                            Error::EmptyResponse
                        });
                    }
                    warn!(iteration, response_length = text.len(), "Answer truncated at max tokens");
                    return Ok(text);
                }

                StopReason::ToolUse if final_turn => {
                    // No tools were offered, so a tool call here cannot be honoured
                    if text.trim().is_empty() {
                        return Err(Error::ProcessingFailed(format!(
                            "No final answer within {} iterations",
                            self.config.max_iterations
                        )));
                    }
                    warn!(iteration, "Tool call on final iteration ignored");
                    return Ok(text);
                }

                StopReason::ToolUse => {
                    conversation.push(response.message.clone());
                    let results = self.execute_tools(&response.message, event_handler).await;
                    if results.is_empty() {
                        return Err(Error::ProcessingFailed(
                            "Model signalled tool use without any tool calls".to_string(),
                        ));
                    }
                    info!(
                        result_count = results.len(),
                        "Tool execution completed, continuing agent loop"
                    );
                    conversation.push(Message::tool_results(results));
                }
            }
        }

        Err(Error::ProcessingFailed(format!(
            "No final answer within {} iterations",
            self.config.max_iterations
        )))
    }

    /// Build tool definitions from the registry
    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Execute tool calls from an assistant message
    ///
    /// Failures are reported to the handler and returned to the model as
    /// error results; they never abort the loop on their own.
    async fn execute_tools(
        &self,
        message: &Message,
        event_handler: Option<&Arc<dyn ExecutorEventHandler>>,
    ) -> Vec<ContentBlock> {
        let mut results = Vec::new();

        for tool_use in message.tool_uses() {
            let ContentBlock::ToolUse { id, name, input } = tool_use else {
                continue;
            };

            let input_preview: String = input.to_string().chars().take(500).collect();
            info!(tool_name = %name, tool_id = %id, input_preview = %input_preview, "Executing tool");

            if let Some(handler) = event_handler {
                handler.on_tool_start(id, name, input).await;
            }

            let start_time = Instant::now();
            let outcome = match self.tool_registry.get(name) {
                Some(tool) => tool.execute(input.clone()).await,
                None => Err(Error::ToolNotFound(name.clone())),
            };
            let duration_ms = start_time.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    let result_str = result.to_string();
                    info!(
                        tool_name = %name,
                        duration_ms,
                        result_length = result_str.len(),
                        "Tool execution succeeded"
                    );
                    if let Some(handler) = event_handler {
                        handler.on_tool_done(id, name, Ok(&result), duration_ms).await;
                    }
                    results.push(Message::tool_result_block(id.clone(), result_str));
                }
                Err(e) => {
                    let error_str = e.to_string();
                    warn!(tool_name = %name, duration_ms, error = %e, "Tool execution failed");
                    if let Some(handler) = event_handler {
                        handler.on_tool_done(id, name, Err(&error_str), duration_ms).await;
                    }
                    results.push(Message::tool_error_block(id.clone(), format!("Error: {error_str}")));
                }
            }
        }

        results
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
            event_handler: None,
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the cumulative token budget
    pub fn max_token_limit(mut self, limit: usize) -> Self {
        self.config.max_token_limit = limit;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the event handler
    pub fn event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;
        self.config.validate()?;

        let executor = AgentExecutor::new(provider, self.tool_registry, self.config);
        Ok(match self.event_handler {
            Some(handler) => executor.with_event_handler(handler),
            None => executor,
        })
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
