use serde::Serialize;

/// Structured trace events emitted across the runtime crates. Each one is
/// logged as a single `tracing::info!` line carrying the event as a JSON
/// blob under the `trace_event` field, so operators can grep/ingest them
/// without parsing prose log messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    ToolDispatched {
        session_id: String,
        tool_call_id: String,
        tool_name: String,
    },
    ToolCompleted {
        session_id: String,
        tool_call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    SandboxPolicyRejected {
        session_id: String,
        reason: String,
        line: Option<u32>,
    },
    SandboxResourceLimitHit {
        session_id: String,
        kind: String,
    },
    TranscriptCompacted {
        session_id: String,
        turns_compacted: usize,
        archived_count: usize,
    },
    ArtifactCollectionWarning {
        session_id: String,
        kind: String,
        detail: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}
