//! Tool definitions and invocation shapes.

use serde::{Deserialize, Serialize};

/// A callable tool advertised to the backend.
///
/// `parameters` is a JSON Schema object describing the arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Result of executing one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: String,
    pub name: String,
    /// Handler output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_outcome_success_flag() {
        let ok = ToolOutcome {
            call_id: "c1".into(),
            name: "lookup".into(),
            output: Some(serde_json::json!({"ok": true})),
            error: None,
        };
        assert!(ok.is_success());

        let failed = ToolOutcome {
            call_id: "c2".into(),
            name: "lookup".into(),
            output: None,
            error: Some("boom".into()),
        };
        assert!(!failed.is_success());
        let json = serde_json::to_value(&failed).unwrap();
        assert!(json.get("output").is_none());
    }
}
