use partsline_core::{ToolName, ToolResult};
use serde_json::Value;

/// Renders a tool outcome as the text shown to the customer and kept in context.
pub fn describe(tool: ToolName, result: &ToolResult) -> String {
    match result {
        Ok(response) => {
            let text = match response.message() {
                Some(Value::String(message)) => message.clone(),
                _ => response.payload().to_string(),
            };
            format!("{} ({}): {}", tool.as_str(), response.status_code, text)
        }
        Err(error) => format!("{} failed: {} ({})", tool.as_str(), error.label(), error.details()),
    }
}
