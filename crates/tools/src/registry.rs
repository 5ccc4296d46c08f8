use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::error::Result;
use sa_domain::tool::{ToolDefinition, ToolResultEnvelope};
use sa_domain::trace::TraceEvent;
use sa_sessions::Session;

/// A tool the Agent Runner can call. Every tool is stable by name
/// (snake_case), declares its own JSON-Schema parameters, and runs against
/// a session rather than touching process-wide state directly.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;

    /// Calling this tool twice with the same arguments against the same
    /// session state produces the same observable effect. Most analysis
    /// tools are not idempotent (they mutate `session.datasets`).
    fn is_idempotent(&self) -> bool {
        false
    }

    /// Whether this tool is advertised to the model at all, vs. being an
    /// internal helper only ever invoked by other tools.
    fn expose_to_llm(&self) -> bool {
        true
    }

    async fn execute(&self, session: &Session, arguments: Value) -> Result<ToolResultEnvelope>;
}

/// Name-keyed tool registry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// JSON-Schema function-call descriptors for every tool with
    /// `expose_to_llm() == true`, sorted by name for deterministic prompts.
    pub fn list_exposed_for_model(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| t.expose_to_llm())
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate arguments, dispatch to the named tool, and return its
    /// result envelope. A tool that returns `Err` never reaches the caller
    /// as a bare error — it is converted to a failure envelope here, so
    /// "uncaught exception" and "tool reported failure" look identical to
    /// the Agent Runner.
    pub async fn execute(&self, name: &str, session: &Session, call_id: &str, arguments: Value) -> ToolResultEnvelope {
        let Some(tool) = self.get(name) else {
            return ToolResultEnvelope::error(format!("unknown tool: {name}"), "tool_invocation");
        };

        if let Err(message) = validate_arguments(&tool.parameters(), &arguments) {
            return ToolResultEnvelope::error(message, "tool_invocation");
        }

        TraceEvent::ToolDispatched {
            session_id: session.session_id.clone(),
            tool_call_id: call_id.to_string(),
            tool_name: name.to_string(),
        }
        .emit();
        let started = Instant::now();

        let (envelope, success) = match tool.execute(session, arguments).await {
            Ok(envelope) => {
                let success = envelope.success;
                (envelope, success)
            }
            Err(e) => (ToolResultEnvelope::error(e.to_string(), e.error_kind()), false),
        };

        TraceEvent::ToolCompleted {
            session_id: session.session_id.clone(),
            tool_call_id: call_id.to_string(),
            tool_name: name.to_string(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        envelope
    }
}

/// Checks that `arguments` is an object carrying every field named in the
/// schema's `required` array. Not a full JSON-Schema validator — just
/// enough to reject the common "model forgot a required argument" case
/// before a tool's `execute` ever runs.
fn validate_arguments(schema: &Value, arguments: &Value) -> std::result::Result<(), String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    if required.is_empty() {
        return Ok(());
    }
    if !arguments.is_object() {
        return Err("arguments must be a JSON object".into());
    }
    for field in required {
        let Some(field_name) = field.as_str() else { continue };
        if arguments.get(field_name).is_none() {
            return Err(format!("missing required argument: {field_name}"));
        }
    }
    Ok(())
}
