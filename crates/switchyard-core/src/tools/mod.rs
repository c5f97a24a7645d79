//! Tool registry.
//!
//! Tools are named handlers with a JSON Schema describing their arguments.
//! `ToolHandler` uses RPITIT like `LlmProvider`; handlers are stored behind
//! the object-safe `ToolHandlerDyn` with a blanket impl.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use switchyard_types::error::ToolError;
use switchyard_types::tool::{ToolCall, ToolDefinition, ToolOutcome};

/// Executes one tool.
pub trait ToolHandler: Send + Sync {
    /// Run the tool. `Err` carries a human-readable failure message.
    fn call(&self, arguments: Value) -> impl Future<Output = Result<Value, String>> + Send;
}

trait ToolHandlerDyn: Send + Sync {
    fn call_boxed<'a>(
        &'a self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>>;
}

impl<T: ToolHandler> ToolHandlerDyn for T {
    fn call_boxed<'a>(
        &'a self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + 'a>> {
        Box::pin(self.call(arguments))
    }
}

/// Handler backed by an async closure.
pub struct FnTool<F>(pub F);

impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, String>> + Send,
{
    fn call(&self, arguments: Value) -> impl Future<Output = Result<Value, String>> + Send {
        (self.0)(arguments)
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandlerDyn>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<H: ToolHandler + 'static>(&self, definition: ToolDefinition, handler: H) {
        tracing::debug!(tool = %definition.name, "Registering tool");
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Definitions to advertise to a backend, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        let mut defs: Vec<ToolDefinition> = tools.values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and run one tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let (definition, handler) = {
            let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
            let tool = tools
                .get(&call.name)
                .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
            (tool.definition.clone(), Arc::clone(&tool.handler))
        };

        validate_arguments(&definition, &call.arguments)?;

        tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        handler
            .call_boxed(call.arguments.clone())
            .await
            .map_err(|message| ToolError::Execution {
                tool: call.name.clone(),
                message,
            })
    }

    /// Run every call in order, collecting outcomes instead of failing fast.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<(ToolOutcome, Option<ToolError>)> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.execute(call).await;
            let (output, error) = match result {
                Ok(value) => (Some(value), None),
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                    (None, Some(e))
                }
            };
            outcomes.push((
                ToolOutcome {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    output,
                    error: error.as_ref().map(ToString::to_string),
                },
                error,
            ));
        }
        outcomes
    }
}

/// Arguments must be an object carrying every `required` property.
fn validate_arguments(definition: &ToolDefinition, arguments: &Value) -> Result<(), ToolError> {
    let Some(args) = arguments.as_object() else {
        return Err(ToolError::Validation {
            tool: definition.name.clone(),
            message: "arguments must be a JSON object".to_string(),
        });
    };

    let required = definition
        .parameters
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);

    for field in required {
        if !args.contains_key(field) {
            return Err(ToolError::Validation {
                tool: definition.name.clone(),
                message: format!("missing required parameter '{field}'"),
            });
        }
    }
    Ok(())
}
