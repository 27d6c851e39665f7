//! Environment lookups used when assembling configuration
//!
//! Only configuration builders call into this module. Components receive
//! their settings as explicit values and never read the environment.

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// A variable was present but could not be parsed
    #[error("Invalid value for {name}: '{value}' ({detail})")]
    Invalid {
        name: String,
        value: String,
        detail: String,
    },

    /// A `.env` file was requested explicitly but could not be loaded
    #[error("Failed to load env file '{path}': {detail}")]
    DotenvFailed { path: String, detail: String },
}

/// Load variables from a `.env` file into the process environment
///
/// With an explicit path the file must exist. Without one, a `.env` in the
/// working directory is loaded if present and silently skipped otherwise.
pub fn load_dotenv(path: Option<&Path>) -> Result<(), EnvError> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map(|_| ())
            .map_err(|e| EnvError::DotenvFailed {
                path: path.display().to_string(),
                detail: e.to_string(),
            }),
        None => {
            if dotenvy::dotenv().is_ok() {
                tracing::debug!("Loaded .env from working directory");
            }
            Ok(())
        }
    }
}

/// Read a non-empty variable, trimming surrounding whitespace
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, `Ok(None)` when it is unset
pub fn parse_var<T>(name: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| EnvError::Invalid {
            name: name.to_string(),
            value: raw,
            detail: e.to_string(),
        }),
    }
}
