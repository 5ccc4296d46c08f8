//! The ReAct loop: prompt assembly, a streamed model call, and serialized
//! tool dispatch, repeated until the model stops asking for tools.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

use sa_domain::config::{CompactionConfig, PromptBudgetConfig, RunnerConfig};
use sa_domain::error::Error;
use sa_domain::event::{Event, EventKind, SeqCounter, StreamEvent};
use sa_domain::tool::{Message, PendingToolCall, ToolCall, ToolResultEnvelope};
use sa_lane::LaneQueue;
use sa_providers::{ChatRequest, ModelRouter};
use sa_sessions::{Session, SessionStore};
use sa_tools::ToolRegistry;

use crate::adapters::{collect_context, ContextAdapter};
use crate::prompt::{build_system_prompt, cap_tool_result, heuristic_summary};

/// Drives every session's turns. One instance is shared (behind an `Arc`)
/// across every inbound message the process handles.
pub struct AgentRunner {
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    router: Arc<ModelRouter>,
    lanes: Arc<LaneQueue>,
    adapters: Vec<Arc<dyn ContextAdapter>>,
    runner_cfg: RunnerConfig,
    compaction_cfg: CompactionConfig,
    prompt_budget: PromptBudgetConfig,
    /// Clarification answers a gateway hands back for a suspended tool
    /// call, keyed by tool_call_id. Resolved once by `answer_question`.
    pending_answers: AsyncMutex<HashMap<String, oneshot::Sender<Value>>>,
}

impl AgentRunner {
    pub fn new(
        sessions: Arc<SessionStore>,
        tools: Arc<ToolRegistry>,
        router: Arc<ModelRouter>,
        lanes: Arc<LaneQueue>,
        adapters: Vec<Arc<dyn ContextAdapter>>,
        runner_cfg: RunnerConfig,
        compaction_cfg: CompactionConfig,
        prompt_budget: PromptBudgetConfig,
    ) -> Self {
        Self {
            sessions,
            tools,
            router,
            lanes,
            adapters,
            runner_cfg,
            compaction_cfg,
            prompt_budget,
            pending_answers: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Start a new turn for `session_id`. Returns immediately with the
    /// turn's id and a channel the caller drains for events; the turn runs
    /// on a spawned task so the caller never blocks on model/tool latency.
    pub fn run(self: &Arc<Self>, session_id: impl Into<String>, user_message: impl Into<String>) -> (String, mpsc::Receiver<Event>) {
        let session_id = session_id.into();
        let user_message = user_message.into();
        let turn_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(128);

        let this = self.clone();
        let turn_id_for_task = turn_id.clone();
        tokio::spawn(async move {
            this.run_turn(session_id, turn_id_for_task, user_message, tx).await;
        });

        (turn_id, rx)
    }

    /// Resolve a clarification a gateway collected for a suspended tool
    /// call. Returns `false` if no call with that id is currently waiting
    /// (already answered, already cancelled, or never asked).
    pub async fn answer_question(&self, tool_call_id: &str, answers: Value) -> bool {
        let sender = self.pending_answers.lock().await.remove(tool_call_id);
        match sender {
            Some(tx) => tx.send(answers).is_ok(),
            None => false,
        }
    }

    async fn run_turn(self: Arc<Self>, session_id: String, turn_id: String, user_message: String, tx: mpsc::Sender<Event>) {
        let is_new = self.sessions.get(&session_id).is_none();
        let session = match self.sessions.get_or_create(&session_id) {
            Ok(s) => s,
            Err(e) => {
                let _ = tx.send(error_event(&session_id, &turn_id, &e.to_string())).await;
                return;
            }
        };

        let turn_lock = session.turn_lock();
        let _guard = turn_lock.lock().await;
        let cancel = session.begin_turn();
        let seq = SeqCounter::new();

        if let Err(e) = session.log.append(&Message::user(user_message.as_str())) {
            let _ = tx.send(error_event(&session_id, &turn_id, &e.to_string())).await;
            return;
        }

        if is_new {
            let _ = tx
                .send(Event::new(EventKind::Session, session_id.as_str(), serde_json::json!({})).with_turn(turn_id.as_str()).with_seq(seq.next()))
                .await;
        }

        let mut iteration: u32 = 0;
        // Pinned one-shot: a context_overflow triggers exactly one
        // compress-and-retry per turn, not an unbounded compress loop.
        let mut context_retry_used = false;
        loop {
            iteration += 1;
            if !self.runner_cfg.allows_iteration(iteration) {
                let _ = tx
                    .send(Event::new(EventKind::Done, session_id.as_str(), serde_json::json!({ "reason": "max_iterations" })).with_turn(turn_id.as_str()).with_seq(seq.next()))
                    .await;
                return;
            }
            if cancel.is_cancelled() {
                self.emit_stopped(&session_id, &turn_id, &seq, &tx).await;
                return;
            }

            let _ = tx
                .send(Event::new(EventKind::IterationStart, session_id.as_str(), serde_json::json!({ "iteration": iteration })).with_turn(turn_id.as_str()).with_seq(seq.next()))
                .await;

            if let Ok(Some(result)) = session.log.compact_if_needed(&self.compaction_cfg, heuristic_summary) {
                let _ = tx
                    .send(
                        Event::new(
                            EventKind::ContextCompressed,
                            session_id.as_str(),
                            serde_json::json!({
                                "archived_count": result.archived_count,
                                "summary_chars": result.summary_chars,
                                "turns_compacted": result.turns_compacted,
                            }),
                        )
                        .with_turn(turn_id.as_str())
                        .with_seq(seq.next()),
                    )
                    .await;
            }

            let messages = match self.assemble_messages(&session, &user_message).await {
                Ok(m) => m,
                Err(e) => {
                    let _ = tx.send(error_event(&session_id, &turn_id, &e.to_string())).await;
                    return;
                }
            };

            let request = ChatRequest {
                messages,
                tools: self.tools.list_exposed_for_model(),
                temperature: Some(self.runner_cfg.llm_temperature),
                max_tokens: Some(self.runner_cfg.llm_max_tokens),
                json_mode: false,
                model: None,
            };

            let outcome = self.stream_one_iteration(&session_id, &turn_id, &seq, request, &cancel, &tx).await;

            let iteration_outcome = match outcome {
                Ok(o) => o,
                Err(e) if matches!(e, Error::ContextOverflow(_)) && !context_retry_used => {
                    context_retry_used = true;
                    if let Ok(Some(result)) = session
                        .log
                        .compact_if_needed(&CompactionConfig { auto: true, ..self.compaction_cfg.clone() }, heuristic_summary)
                    {
                        let _ = tx
                            .send(
                                Event::new(
                                    EventKind::ContextCompressed,
                                    session_id.as_str(),
                                    serde_json::json!({
                                        "archived_count": result.archived_count,
                                        "summary_chars": result.summary_chars,
                                        "turns_compacted": result.turns_compacted,
                                    }),
                                )
                                .with_turn(turn_id.as_str())
                                .with_seq(seq.next()),
                            )
                            .await;
                    }
                    continue;
                }
                Err(e) => {
                    let _ = tx.send(error_event(&session_id, &turn_id, &e.to_string())).await;
                    return;
                }
            };

            let IterationOutcome { text, tool_calls, cancelled } = iteration_outcome;
            if cancelled {
                self.emit_stopped(&session_id, &turn_id, &seq, &tx).await;
                return;
            }

            if tool_calls.is_empty() {
                let _ = session.log.append(&Message::assistant(text.as_str()));
                let _ = tx
                    .send(Event::new(EventKind::Done, session_id.as_str(), Value::Null).with_turn(turn_id.as_str()).with_seq(seq.next()))
                    .await;
                return;
            }

            let pending: Vec<PendingToolCall> = tool_calls
                .iter()
                .map(|c| PendingToolCall { id: c.call_id.clone(), name: c.tool_name.clone(), arguments: c.arguments.to_string() })
                .collect();
            let _ = session.log.append(&Message::assistant_with_tool_calls(text.as_str(), pending));

            for call in &tool_calls {
                if cancel.is_cancelled() {
                    self.emit_stopped(&session_id, &turn_id, &seq, &tx).await;
                    return;
                }

                let _ = tx
                    .send(
                        Event::new(EventKind::ToolCall, session_id.as_str(), serde_json::json!({ "name": call.tool_name, "arguments": call.arguments.to_string() }))
                            .with_turn(turn_id.as_str())
                            .with_tool(call.call_id.as_str(), call.tool_name.as_str())
                            .with_seq(seq.next()),
                    )
                    .await;

                let mut envelope = self.dispatch_tool(&session, call, &cancel).await;

                if envelope.wants_user_clarification() {
                    let _ = tx
                        .send(
                            Event::new(EventKind::AskUserQuestion, session_id.as_str(), envelope.data.clone())
                                .with_turn(turn_id.as_str())
                                .with_tool(call.call_id.as_str(), call.tool_name.as_str())
                                .with_seq(seq.next()),
                        )
                        .await;

                    let (answer_tx, answer_rx) = oneshot::channel();
                    self.pending_answers.lock().await.insert(call.call_id.clone(), answer_tx);
                    envelope = match answer_rx.await {
                        Ok(answers) => ToolResultEnvelope::ok("clarification received", answers),
                        Err(_) => ToolResultEnvelope::cancelled(),
                    };
                }

                let capped = cap_tool_result(&envelope.message, &self.prompt_budget);
                let _ = session.log.append(&Message::tool_result(call.call_id.as_str(), capped.as_str()));

                let _ = tx
                    .send(
                        Event::new(
                            EventKind::ToolResult,
                            session_id.as_str(),
                            serde_json::json!({ "status": if envelope.success { "success" } else { "error" }, "message": envelope.message }),
                        )
                        .with_turn(turn_id.as_str())
                        .with_tool(call.call_id.as_str(), call.tool_name.as_str())
                        .with_seq(seq.next()),
                    )
                    .await;

                self.emit_derived_events(&session_id, &turn_id, &call.call_id, &call.tool_name, &envelope, &seq, &tx).await;
            }
        }
    }

    async fn assemble_messages(&self, session: &Session, latest_user_message: &str) -> sa_domain::error::Result<Vec<Message>> {
        let adapter_ctx = collect_context(&self.adapters, session, latest_user_message).await;
        let system_prompt = build_system_prompt(session, &adapter_ctx, &self.prompt_budget);

        let mut messages = vec![Message::system(system_prompt)];
        messages.extend(session.log.read_all()?);
        Ok(messages)
    }

    async fn stream_one_iteration(
        &self,
        session_id: &str,
        turn_id: &str,
        seq: &SeqCounter,
        request: ChatRequest,
        cancel: &sa_domain::cancel::CancelToken,
        tx: &mpsc::Sender<Event>,
    ) -> sa_domain::error::Result<IterationOutcome> {
        let (_provider_id, mut stream) = self.router.chat_stream(request).await?;

        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        // Tool calls assembled from start/delta, keyed by call_id. Most
        // providers (e.g. the OpenAI-compatible adapter) never send
        // ToolCallFinished at all — arguments only ever arrive as deltas,
        // and the call is only complete once the stream ends.
        let mut tc_bufs: HashMap<String, (String, String)> = HashMap::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(IterationOutcome { text, tool_calls, cancelled: true });
            }

            let Some(item) = stream.next().await else {
                break;
            };

            match item? {
                StreamEvent::Token { text: delta } => {
                    text.push_str(&delta);
                    let _ = tx
                        .send(Event::new(EventKind::Text, session_id, serde_json::json!(delta)).with_turn(turn_id).with_seq(seq.next()))
                        .await;
                }
                StreamEvent::Thinking { text: delta } => {
                    let _ = tx
                        .send(Event::new(EventKind::Reasoning, session_id, serde_json::json!(delta)).with_turn(turn_id).with_seq(seq.next()))
                        .await;
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    tc_bufs.insert(call_id, (tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some((_, args)) = tc_bufs.get_mut(&call_id) {
                        args.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                    tc_bufs.remove(&call_id);
                    tool_calls.push(ToolCall { call_id, tool_name, arguments });
                }
                StreamEvent::Done { .. } => break,
                StreamEvent::Error { message } => {
                    return Err(Error::Provider { provider: "stream".into(), message });
                }
            }
        }

        for (call_id, (tool_name, args_str)) in tc_bufs.drain() {
            let arguments = if args_str.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                match serde_json::from_str(&args_str) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(
                            call_id = %call_id,
                            tool = %tool_name,
                            error = %e,
                            "tool call arguments are not valid JSON; defaulting to empty object"
                        );
                        Value::Object(Default::default())
                    }
                }
            };
            tool_calls.push(ToolCall { call_id, tool_name, arguments });
        }

        Ok(IterationOutcome { text, tool_calls, cancelled: false })
    }

    async fn dispatch_tool(&self, session: &Arc<Session>, call: &ToolCall, cancel: &sa_domain::cancel::CancelToken) -> ToolResultEnvelope {
        let tools = self.tools.clone();
        let session_for_task = session.clone();
        let name = call.tool_name.clone();
        let call_id = call.call_id.clone();
        let arguments = call.arguments.clone();

        session.mark_tool_active(&call_id);
        let envelope = self
            .lanes
            .submit(&session.session_id, call_id.clone(), cancel.clone(), async move {
                tools.execute(&name, session_for_task.as_ref(), &call_id, arguments).await
            })
            .await;
        session.mark_tool_done(&call.call_id);
        envelope
    }

    async fn emit_derived_events(
        &self,
        session_id: &str,
        turn_id: &str,
        call_id: &str,
        tool_name: &str,
        envelope: &ToolResultEnvelope,
        seq: &SeqCounter,
        tx: &mpsc::Sender<Event>,
    ) {
        if let Some(chart) = &envelope.chart_data {
            let _ = tx
                .send(Event::new(EventKind::Chart, session_id, chart.clone()).with_turn(turn_id).with_tool(call_id, tool_name).with_seq(seq.next()))
                .await;
        }
        if let Some(preview) = &envelope.dataframe_preview {
            let _ = tx
                .send(Event::new(EventKind::Data, session_id, preview.clone()).with_turn(turn_id).with_tool(call_id, tool_name).with_seq(seq.next()))
                .await;
        }
        for artifact in &envelope.artifacts {
            let _ = tx
                .send(
                    Event::new(EventKind::Artifact, session_id, serde_json::to_value(artifact).unwrap_or(Value::Null))
                        .with_turn(turn_id)
                        .with_tool(call_id, tool_name)
                        .with_seq(seq.next()),
                )
                .await;
        }
    }

    async fn emit_stopped(&self, session_id: &str, turn_id: &str, seq: &SeqCounter, tx: &mpsc::Sender<Event>) {
        let _ = tx
            .send(Event::new(EventKind::Stopped, session_id, Value::Null).with_turn(turn_id).with_seq(seq.next()))
            .await;
    }
}

struct IterationOutcome {
    text: String,
    tool_calls: Vec<ToolCall>,
    cancelled: bool,
}

fn error_event(session_id: &str, turn_id: &str, message: &str) -> Event {
    Event::new(EventKind::Error, session_id, serde_json::json!({ "message": message })).with_turn(turn_id)
}
