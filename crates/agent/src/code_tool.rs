//! Sandbox-backed tools: the one place in this crate (and, by the
//! tools crate's own design, the only place in the workspace outside
//! `sa-sandbox` itself) that shells out to an interpreter.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use sa_domain::config::SandboxConfig;
use sa_domain::error::{Error, Result};
use sa_domain::tool::ToolResultEnvelope;
use sa_sandbox::{Language, SandboxExecutor};
use sa_sessions::Session;
use sa_tools::Tool;

/// Runs a Python or R snippet against the session's sandbox. One tool
/// covers both languages rather than splitting into `run_python`/`run_r`
/// so the model only has one calling convention to learn; `language`
/// defaults to Python since R is opt-in via configuration.
pub struct RunCodeTool {
    executor: Arc<SandboxExecutor>,
    sandbox_cfg: SandboxConfig,
}

impl RunCodeTool {
    pub fn new(executor: Arc<SandboxExecutor>, sandbox_cfg: SandboxConfig) -> Self {
        Self { executor, sandbox_cfg }
    }

    fn parse_language(&self, arguments: &Value) -> Result<Language> {
        match arguments.get("language").and_then(Value::as_str).unwrap_or("python") {
            "python" => Ok(Language::Python),
            "r" if self.sandbox_cfg.r_enabled => Ok(Language::R),
            "r" => Err(Error::Policy {
                reason: "R execution is disabled for this deployment".into(),
                line: None,
                token: None,
            }),
            other => Err(Error::Policy {
                reason: format!("unsupported language \"{other}\" (expected \"python\" or \"r\")"),
                line: None,
                token: None,
            }),
        }
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn name(&self) -> &str {
        "run_code"
    }

    fn description(&self) -> &str {
        "Execute a Python (or, if enabled, R) snippet in an isolated sandbox. Use this for any \
         data transformation, statistics, or chart generation. stdout, returned artifacts, and a \
         dataframe preview (if any) are reported back."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "The source code to execute." },
                "language": { "type": "string", "enum": ["python", "r"], "default": "python" }
            },
            "required": ["code"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, session: &Session, arguments: Value) -> Result<ToolResultEnvelope> {
        let language = self.parse_language(&arguments)?;
        let code = arguments
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ToolInvocation("run_code requires a \"code\" string argument".into()))?;

        let datasets: std::collections::HashMap<String, Value> = session
            .dataset_names()
            .into_iter()
            .filter_map(|name| session.get_dataset(&name).map(|v| (name, v)))
            .collect();

        self.executor
            .run(language, code, &session.session_id, &self.sandbox_cfg, session.cancellation_token(), &datasets)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (tempfile::TempDir, RunCodeTool) {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(SandboxExecutor::new(dir.path()));
        (dir, RunCodeTool::new(executor, SandboxConfig::default()))
    }

    #[test]
    fn defaults_to_python_when_language_omitted() {
        let (_dir, tool) = tool();
        let lang = tool.parse_language(&serde_json::json!({})).unwrap();
        assert_eq!(lang, Language::Python);
    }

    #[test]
    fn r_is_rejected_when_disabled() {
        let (_dir, tool) = tool();
        let err = tool.parse_language(&serde_json::json!({"language": "r"})).unwrap_err();
        assert!(matches!(err, Error::Policy { .. }));
    }

    #[test]
    fn unknown_language_is_rejected() {
        let (_dir, tool) = tool();
        let err = tool.parse_language(&serde_json::json!({"language": "cobol"})).unwrap_err();
        assert!(matches!(err, Error::Policy { .. }));
    }

    #[tokio::test]
    async fn missing_code_argument_errors() {
        let (dir, tool) = tool();
        let session = Session::new(dir.path(), "s1").unwrap();
        let err = tool.execute(&session, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolInvocation(_)));
    }
}
