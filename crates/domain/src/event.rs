//! The two event vocabularies in the runtime:
//!
//! - [`StreamEvent`] — the Model Router's normalized chunk type, one per
//!   provider-agnostic streaming fragment (text, reasoning, tool call delta,
//!   finish, usage).
//! - [`Event`] — the Agent Runner's output event, one per user-visible
//!   happening within a turn (text, tool_call, tool_result, done, ...),
//!   carrying the turn/tool correlation ids the gateway needs to route and
//!   order them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A boxed async stream, used for model router streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// A normalized streaming chunk, as produced by a Model Router adapter.
///
/// Adapters translate native provider streams (SSE deltas, cumulative
/// transcripts, `<think>` markers) into this sum type; nothing downstream of
/// the router ever looks at a provider-specific payload again.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A user-visible text delta.
    #[serde(rename = "text_delta")]
    Token { text: String },

    /// A reasoning/thinking delta, kept separate from user-visible text.
    #[serde(rename = "reasoning_delta")]
    Thinking { text: String },

    /// A tool call has started (id + name known, arguments still streaming).
    #[serde(rename = "tool_call_started")]
    ToolCallStarted { call_id: String, tool_name: String },

    /// Incremental tool call argument data — a fragment of a JSON string.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { call_id: String, delta: String },

    /// A tool call is complete with full, parsed arguments.
    #[serde(rename = "tool_call_finished")]
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// Stream is finished.
    #[serde(rename = "finish")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// An error occurred during streaming (only ever emitted after the
    /// stream has been committed — see the Model Router's failover rule).
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Closed set of event types the Agent Runner may emit, carrying the UI
/// semantics of §3/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Session,
    IterationStart,
    Text,
    Reasoning,
    ToolCall,
    ToolResult,
    Chart,
    Data,
    Artifact,
    Image,
    Retrieval,
    AnalysisPlan,
    PlanStepUpdate,
    PlanProgress,
    TaskAttempt,
    AskUserQuestion,
    WorkspaceUpdate,
    CodeExecution,
    ContextCompressed,
    SessionTitle,
    Done,
    Stopped,
    Error,
}

impl EventKind {
    /// The three terminal kinds: exactly one of these ends every turn.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::Done | EventKind::Stopped | EventKind::Error)
    }
}

/// A single runner-emitted event. Every event produced within one `run()`
/// call shares the same `turn_id`; every `tool_call`/`tool_result`/derived
/// child event pair shares the same `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl Event {
    pub fn new(kind: EventKind, session_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            data,
            session_id: session_id.into(),
            tool_call_id: None,
            tool_name: None,
            turn_id: None,
            metadata: Value::Null,
        }
    }

    pub fn with_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn with_tool(mut self, tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        match &mut self.metadata {
            Value::Object(map) => {
                map.insert("seq".into(), Value::from(seq));
            }
            _ => {
                self.metadata = serde_json::json!({ "seq": seq });
            }
        }
        self
    }
}

/// Monotonically increasing `seq` generator, one per turn, shared across the
/// streaming and tool-dispatch halves of the run loop via `Arc` so both can
/// stamp events without racing each other (the loop body is still single
/// threaded per session, but the counter is cheap to make share-safe).
#[derive(Clone, Default)]
pub struct SeqCounter(Arc<AtomicU64>);

impl SeqCounter {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
