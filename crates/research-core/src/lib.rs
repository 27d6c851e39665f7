//! Core abstractions for the research agents
//!
//! This crate defines the fundamental traits and types shared by the runtime,
//! the tool framework and the equity research pipeline.

pub mod agent;
pub mod error;

pub use agent::Agent;
pub use error::{Error, Result};
