//! The capability contract exposed to research agents

use async_trait::async_trait;
use research_core::Result;
use serde_json::Value;

/// A capability the model may invoke by name during a run
///
/// The executor advertises `name`, `description` and `input_schema` to the
/// model and routes matching tool calls to [`Tool::execute`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool with the arguments the model supplied
    ///
    /// Arguments that do not fit the schema are an
    /// [`Error::InvalidToolInput`](research_core::Error::InvalidToolInput);
    /// a failing backend is an error too, never an empty success.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Registry key, also the function name the model calls
    fn name(&self) -> &str;

    /// When the model should reach for this tool
    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments
    fn input_schema(&self) -> Value;
}
