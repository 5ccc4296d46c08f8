//! Built-in tools that need nothing beyond the session itself — no
//! subprocess, no model call. Anything that shells out to Python/R goes
//! through the Sandbox Executor instead and is registered by the crate
//! that wires the sandbox in (it needs `sa-sandbox`, which this crate does
//! not depend on).

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::error::Result;
use sa_domain::tool::ToolResultEnvelope;
use sa_sessions::Session;

use crate::registry::Tool;

/// Lists the datasets currently loaded into the session, with no arguments.
pub struct ListDatasetsTool;

#[async_trait]
impl Tool for ListDatasetsTool {
    fn name(&self) -> &str {
        "list_datasets"
    }

    fn description(&self) -> &str {
        "List the names of datasets currently loaded into this session."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn is_idempotent(&self) -> bool {
        true
    }

    async fn execute(&self, session: &Session, _arguments: Value) -> Result<ToolResultEnvelope> {
        let names = session.dataset_names();
        Ok(ToolResultEnvelope::ok(
            format!("{} dataset(s) loaded", names.len()),
            serde_json::json!({ "datasets": names }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_registered_dataset_names() {
        let dir = tempdir().unwrap();
        let session = Session::new(dir.path(), "s1").unwrap();
        session.set_dataset("measurements", serde_json::json!({"rows": 10}));

        let tool = ListDatasetsTool;
        let env = tool.execute(&session, Value::Null).await.unwrap();
        assert!(env.success);
        assert_eq!(env.data["datasets"][0], "measurements");
    }
}
