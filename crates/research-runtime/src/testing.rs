//! Scripted fakes shared by the runtime unit tests

use async_trait::async_trait;
use research_core::{Error, Result};
use research_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message,
    MessageContent, Role, StopReason, TokenUsage,
};
use research_tools::Tool;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Provider that replays canned responses and records every request
pub struct ScriptedProvider {
    script: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> research_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::RequestFailed("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn usage_response(text: &str, stop_reason: StopReason, input: usize, output: usize) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(text),
        stop_reason,
        usage: TokenUsage {
            input_tokens: input,
            output_tokens: output,
        },
    }
}

pub fn tool_call(id: &str, name: &str, input: Value, input_tokens: usize, output_tokens: usize) -> CompletionResponse {
    CompletionResponse {
        message: Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }])),
        },
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage {
            input_tokens,
            output_tokens,
        },
    }
}

/// Tool returning a fixed value or a fixed failure
pub struct StaticTool {
    name: &'static str,
    outcome: std::result::Result<Value, &'static str>,
}

impl StaticTool {
    pub fn ok(name: &'static str, value: Value) -> Self {
        Self {
            name,
            outcome: Ok(value),
        }
    }

    pub fn failing(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            outcome: Err(message),
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    async fn execute(&self, _params: Value) -> Result<Value> {
        self.outcome.clone().map_err(|message| Error::ToolFailed {
            tool: self.name.to_string(),
            message: message.to_string(),
        })
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "static test tool"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }
}
