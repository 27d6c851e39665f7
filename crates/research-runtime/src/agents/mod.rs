//! Concrete agent implementations
//!
//! - ToolAgent: Agent with LLM loop and tool execution capabilities

pub mod tool;

pub use tool::ToolAgent;
