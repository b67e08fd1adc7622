//! Deterministic tools the agents may invoke against the dataset.

use crate::llm::{FunctionSchema, ToolSchema};

pub mod sandbox;
pub mod script;
pub mod viz;

/// Prefix for any tool outcome that represents a caught error. Tools never
/// return `Err`; the invoking agent inspects the string and reacts.
pub const FAILURE_MARKER: &str = "[FAILURE]";

/// Prefix for a successful run that produced nothing usable.
pub const INFO_MARKER: &str = "[INFO]";

/// True when a tool output should abort the visualization task.
pub fn signals_failure(output: &str) -> bool {
    output.contains(FAILURE_MARKER)
        || output.contains(INFO_MARKER)
        || output.contains("No valid numeric columns")
}

/// A named callable with a JSON-schema argument contract. All outcomes are
/// strings so the calling agent can reason over failures and retry.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> serde_json::Value;
    fn invoke(&self, args_json: &str) -> String;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            r#type: "function".into(),
            function: FunctionSchema {
                name: self.name().to_string(),
                description: Some(self.description().to_string()),
                parameters: self.parameters(),
            },
        }
    }
}
