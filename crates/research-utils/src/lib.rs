//! Shared utilities for the equity research workspace
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment lookups for configuration.

pub mod env;
pub mod logging;

pub use env::{EnvError, load_dotenv};
pub use logging::{LogFormat, init_tracing};
