//! Agent runtime for executing tool-using agents
//!
//! This crate provides the AgentExecutor, which drives the LLM loop under
//! iteration and token ceilings, and the ToolAgent wrapper that exposes it
//! through the `Agent` trait.

pub mod agents;
pub mod executor;

#[cfg(test)]
mod testing;

// Re-export key types
pub use agents::ToolAgent;
pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutorConfig, ExecutorEventHandler};
