//! Tool definitions advertised to the model.

use serde::{Deserialize, Serialize};

/// A tool definition as sent to an LLM (name, description, JSON schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}
