//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure OpenAI, and any local/self-hosted endpoint that
//! follows the OpenAI chat completions wire format (Ollama, vLLM, LM
//! Studio, and the OpenAI Codex OAuth route all speak this dialect too).

use std::sync::Arc;

use serde_json::Value;

use sa_domain::capability::LlmCapabilities;
use sa_domain::config::{AuthConfig, ProviderKind, ProviderRoute};
use sa_domain::error::{Error, Result};
use sa_domain::event::{BoxStream, StreamEvent, Usage};
use sa_domain::tool::{Message, PendingToolCall, ToolCall, ToolDefinition};

use crate::auth::AuthRotator;
use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use crate::util::from_reqwest;

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
///
/// Also handles Azure OpenAI, which uses the same wire format but a
/// different URL pattern (`/openai/deployments/{model}/chat/completions`)
/// and auth header (`api-key` instead of `Authorization: Bearer`), and the
/// Codex OAuth route, which is the plain OpenAI dialect behind a
/// bearer-token auth mode rather than a static API key.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    auth: Arc<AuthRotator>,
    auth_header: String,
    auth_prefix: String,
    model_id: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
    is_azure: bool,
}

impl OpenAiCompatProvider {
    pub fn from_route(route: &ProviderRoute) -> Result<Self> {
        if !matches!(
            route.kind,
            ProviderKind::OpenaiCompat | ProviderKind::AzureOpenai | ProviderKind::OpenaiCodexOauth
        ) {
            return Err(Error::Config(format!(
                "openai_compat adapter does not support provider kind {:?}",
                route.kind
            )));
        }

        let is_azure = route.kind == ProviderKind::AzureOpenai;
        let auth = Arc::new(AuthRotator::from_auth_config(&route.auth)?);
        let (auth_header, auth_prefix) = auth_headers(&route.auth, is_azure);

        let capabilities = if route.capabilities.supports_tools == sa_domain::capability::ToolSupport::None
            && !route.capabilities.supports_streaming
        {
            // Caller left capabilities unset — assume a competent modern
            // OpenAI-compatible endpoint rather than advertising nothing.
            LlmCapabilities {
                supports_tools: sa_domain::capability::ToolSupport::StrictJson,
                supports_streaming: true,
                supports_json_mode: true,
                supports_vision: true,
                context_window_tokens: Some(128_000),
                max_output_tokens: Some(16_384),
            }
        } else {
            route.capabilities.clone()
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: route.id.clone(),
            base_url: route.base_url.trim_end_matches('/').to_string(),
            auth,
            auth_header,
            auth_prefix,
            model_id: route.model_id.clone(),
            capabilities,
            client,
            is_azure,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let entry = self.auth.next_key();
        let header_value = format!("{}{}", self.auth_prefix, entry.key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.model_id.clone())
    }

    fn chat_url(&self, req: &ChatRequest) -> String {
        if self.is_azure {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version=2024-10-21",
                self.base_url,
                self.effective_model(req)
            )
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "messages": messages,
            "stream": stream,
        });

        if !self.is_azure {
            body["model"] = Value::String(self.effective_model(req));
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

fn auth_headers(auth: &AuthConfig, is_azure: bool) -> (String, String) {
    let header = auth.header.clone().unwrap_or_else(|| {
        if is_azure {
            "api-key".into()
        } else {
            "Authorization".into()
        }
    });
    let prefix = auth.prefix.clone().unwrap_or_else(|| {
        if is_azure {
            String::new()
        } else {
            "Bearer ".into()
        }
    });
    (header, prefix)
}

// ── Message serialization ───────────────────────────────────────────

fn msg_to_openai(msg: &Message) -> Value {
    match msg {
        Message::System { content } => serde_json::json!({"role": "system", "content": content}),
        Message::User { content } => serde_json::json!({"role": "user", "content": content}),
        Message::Assistant { content, tool_calls, .. } => assistant_to_openai(content, tool_calls),
        Message::Tool { tool_call_id, content } => serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

fn assistant_to_openai(content: &str, tool_calls: &[PendingToolCall]) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    obj["content"] = if content.is_empty() {
        Value::Null
    } else {
        Value::String(content.to_string())
    };
    if !tool_calls.is_empty() {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments },
                })
            })
            .collect();
        obj["tool_calls"] = Value::Array(calls);
    }
    obj
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ── Response parsing ────────────────────────────────────────────────

/// `<think>...</think>` markers appear in some reasoning-model completions
/// instead of a dedicated `reasoning_content` field. Splitting it out here
/// means downstream code never sees a model's internal monologue mixed into
/// its user-visible answer.
fn split_think_tags(content: &str) -> (String, Option<String>) {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";
    let Some(start) = content.find(OPEN) else {
        return (content.to_string(), None);
    };
    let Some(end) = content[start..].find(CLOSE).map(|i| start + i) else {
        return (content.to_string(), None);
    };
    let reasoning = content[start + OPEN.len()..end].trim().to_string();
    let mut visible = String::new();
    visible.push_str(&content[..start]);
    visible.push_str(&content[end + CLOSE.len()..]);
    (visible.trim().to_string(), Some(reasoning))
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let raw_content = message.get("content").and_then(|v| v.as_str()).unwrap_or("");
    let (content, _reasoning) = split_think_tags(raw_content);

    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from);
    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let tool_calls = parse_openai_tool_calls(message);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            Some(ToolCall { call_id, tool_name, arguments })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ── SSE streaming ───────────────────────────────────────────────────

/// The two marker forms a streamed reasoning model may wrap its internal
/// monologue in; either can be emitted by the same model depending on
/// version, so both are stripped.
const THINK_OPEN_MARKERS: [&str; 2] = ["<think>", "◁think▷"];
const THINK_CLOSE_MARKERS: [&str; 2] = ["</think>", "◁/think▷"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThinkMode {
    Visible,
    Thinking,
}

/// Per-stream state for one `chat_stream` call.
///
/// The OpenAI wire format keys tool-call argument deltas by `index`, not
/// `id` — the `id` only appears on the chunk that opens the call. This
/// remembers index→id so every delta for one call carries the same
/// `call_id` the runner assembles on. It also buffers reasoning-marker
/// text across chunk boundaries, since an SSE delta can split a marker
/// (or its surrounding content) at any byte offset.
struct SseParseState {
    tool_call_ids_by_index: std::collections::HashMap<u64, String>,
    think_mode: ThinkMode,
    think_pending: String,
}

impl SseParseState {
    fn new() -> Self {
        Self {
            tool_call_ids_by_index: std::collections::HashMap::new(),
            think_mode: ThinkMode::Visible,
            think_pending: String::new(),
        }
    }

    fn resolve_tool_call_id(&mut self, index: u64, id: Option<&str>) -> String {
        if let Some(id) = id {
            self.tool_call_ids_by_index.insert(index, id.to_string());
            return id.to_string();
        }
        self.tool_call_ids_by_index.get(&index).cloned().unwrap_or_else(|| index.to_string())
    }

    /// Split one content delta into visible/reasoning fragments, carrying
    /// any unterminated marker forward to the next delta.
    fn push_content(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut buf = std::mem::take(&mut self.think_pending);
        buf.push_str(text);

        loop {
            let markers: &[&str] = match self.think_mode {
                ThinkMode::Visible => &THINK_OPEN_MARKERS,
                ThinkMode::Thinking => &THINK_CLOSE_MARKERS,
            };

            match find_earliest(&buf, markers) {
                Some((pos, marker)) => {
                    let head = buf[..pos].to_string();
                    if !head.is_empty() {
                        events.push(self.wrap(head));
                    }
                    buf = buf[pos + marker.len()..].to_string();
                    self.think_mode = match self.think_mode {
                        ThinkMode::Visible => ThinkMode::Thinking,
                        ThinkMode::Thinking => ThinkMode::Visible,
                    };
                }
                None => {
                    let keep = partial_suffix_len(&buf, markers);
                    let (emit, pending) = split_at_char_boundary(&buf, keep);
                    if !emit.is_empty() {
                        events.push(self.wrap(emit));
                    }
                    self.think_pending = pending;
                    break;
                }
            }
        }

        events
    }

    fn wrap(&self, text: String) -> StreamEvent {
        match self.think_mode {
            ThinkMode::Visible => StreamEvent::Token { text },
            ThinkMode::Thinking => StreamEvent::Thinking { text },
        }
    }

    /// Flush a buffered, never-closed marker fragment as plain text once
    /// the stream ends — an unterminated `<think` at end of stream is
    /// just text, not a dropped event.
    fn flush(&mut self) -> Option<StreamEvent> {
        if self.think_pending.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.think_pending);
        Some(self.wrap(text))
    }

    fn parse_chunk(&mut self, data: &str) -> Vec<Result<StreamEvent>> {
        if data.trim() == "[DONE]" {
            return self
                .flush()
                .map(Ok)
                .into_iter()
                .chain(std::iter::once(Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) })))
                .collect();
        }

        let v: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => return vec![Err(Error::Json(e))],
        };

        let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());
        let Some(choice) = choice else {
            return v
                .get("usage")
                .and_then(parse_openai_usage)
                .map(|usage| self.flush().map(Ok).into_iter().chain(std::iter::once(Ok(StreamEvent::Done { usage: Some(usage), finish_reason: None }))).collect())
                .unwrap_or_default();
        };
        let delta = choice.get("delta").unwrap_or(&Value::Null);

        if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
            let usage = v.get("usage").and_then(parse_openai_usage);
            return self
                .flush()
                .map(Ok)
                .into_iter()
                .chain(std::iter::once(Ok(StreamEvent::Done { usage, finish_reason: Some(fr.to_string()) })))
                .collect();
        }

        let mut events = Vec::new();

        if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
            for tc in tc_arr {
                let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
                if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                    let name = tc.get("function").and_then(|f| f.get("name")).and_then(|v| v.as_str()).unwrap_or("");
                    self.resolve_tool_call_id(index, Some(id));
                    events.push(Ok(StreamEvent::ToolCallStarted { call_id: id.to_string(), tool_name: name.to_string() }));
                }
                if let Some(args) = tc.get("function").and_then(|f| f.get("arguments")).and_then(|v| v.as_str()) {
                    let call_id = self.resolve_tool_call_id(index, None);
                    events.push(Ok(StreamEvent::ToolCallDelta { call_id, delta: args.to_string() }));
                }
            }
            if !events.is_empty() {
                return events;
            }
        }

        if let Some(text) = delta.get("reasoning_content").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                events.push(Ok(StreamEvent::Thinking { text: text.to_string() }));
                return events;
            }
        }

        if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                events.extend(self.push_content(text).into_iter().map(Ok));
            }
        }

        events
    }
}

/// Earliest occurrence (by byte position) of any marker in `haystack`.
fn find_earliest<'a>(haystack: &str, markers: &[&'a str]) -> Option<(usize, &'a str)> {
    markers.iter().filter_map(|m| haystack.find(m).map(|pos| (pos, *m))).min_by_key(|(pos, _)| *pos)
}

/// Length (in chars) of the longest suffix of `text` that is a strict
/// prefix of some marker — text that might turn into a marker once the
/// next chunk arrives, and so can't be emitted yet.
fn partial_suffix_len(text: &str, markers: &[&str]) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let max_len = markers.iter().map(|m| m.chars().count()).max().unwrap_or(0);
    for k in (1..max_len.min(chars.len() + 1)).rev() {
        let suffix: String = chars[chars.len() - k..].iter().collect();
        if markers.iter().any(|m| m.starts_with(&suffix)) {
            return k;
        }
    }
    0
}

fn split_at_char_boundary(text: &str, keep_from_end: usize) -> (String, String) {
    if keep_from_end == 0 {
        return (text.to_string(), String::new());
    }
    let chars: Vec<char> = text.chars().collect();
    let split_at = chars.len().saturating_sub(keep_from_end);
    (chars[..split_at].iter().collect(), chars[split_at..].iter().collect())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url(&req);
        let body = self.build_chat_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.chat_url(&req);
        let body = self.build_chat_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = SseParseState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data: &str| state.parse_chunk(data)))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let model = req.model.unwrap_or_else(|| "text-embedding-3-small".into());
        let url = if self.is_azure {
            format!("{}/openai/deployments/{}/embeddings?api-version=2024-10-21", self.base_url, model)
        } else {
            format!("{}/embeddings", self.base_url)
        };
        let body = if self.is_azure {
            serde_json::json!({ "input": req.input })
        } else {
            serde_json::json!({ "model": model, "input": req.input })
        };

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let data = resp_json.get("data").and_then(|d| d.as_array()).ok_or_else(|| Error::Provider {
            provider: self.id.clone(),
            message: "missing 'data' array in embeddings response".into(),
        })?;

        let embeddings: Vec<Vec<f32>> = data
            .iter()
            .filter_map(|item| {
                let embedding = item.get("embedding")?.as_array()?;
                Some(embedding.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
            })
            .collect();

        Ok(EmbeddingsResponse { embeddings })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> ProviderRoute {
        ProviderRoute {
            id: "p1".into(),
            display_name: "P1".into(),
            priority: 1,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.example.com/v1".into(),
            model_id: "gpt-test".into(),
            auth: AuthConfig { key: Some("sk-test".into()), ..Default::default() },
            capabilities: LlmCapabilities::default(),
        }
    }

    #[test]
    fn azure_route_builds_deployment_url() {
        let mut r = route();
        r.kind = ProviderKind::AzureOpenai;
        r.base_url = "https://my-resource.openai.azure.com".into();
        r.model_id = "gpt4o-deploy".into();
        let provider = OpenAiCompatProvider::from_route(&r).unwrap();
        let url = provider.chat_url(&ChatRequest::default());
        assert!(url.contains("/openai/deployments/gpt4o-deploy/chat/completions"));
    }

    #[test]
    fn non_azure_route_uses_plain_chat_completions_url() {
        let provider = OpenAiCompatProvider::from_route(&route()).unwrap();
        let url = provider.chat_url(&ChatRequest::default());
        assert_eq!(url, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn anthropic_route_is_rejected() {
        let mut r = route();
        r.kind = ProviderKind::Anthropic;
        assert!(OpenAiCompatProvider::from_route(&r).is_err());
    }

    #[test]
    fn assistant_message_with_tool_calls_serializes_function_shape() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![PendingToolCall { id: "c1".into(), name: "compute".into(), arguments: "{}".into() }],
        );
        let v = msg_to_openai(&msg);
        assert_eq!(v["tool_calls"][0]["function"]["name"], "compute");
        assert!(v["content"].is_null());
    }

    #[test]
    fn think_tags_are_split_into_reasoning_and_visible_text() {
        let (visible, reasoning) = split_think_tags("<think>step one</think>the answer is 4");
        assert_eq!(visible, "the answer is 4");
        assert_eq!(reasoning.as_deref(), Some("step one"));
    }

    #[test]
    fn content_without_think_tags_is_unaffected() {
        let (visible, reasoning) = split_think_tags("plain answer");
        assert_eq!(visible, "plain answer");
        assert!(reasoning.is_none());
    }

    #[test]
    fn sse_tool_call_started_then_delta() {
        let mut state = SseParseState::new();
        let started = state.parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"compute"}}]}}]}"#,
        );
        assert!(matches!(started.as_slice(), [Ok(StreamEvent::ToolCallStarted { .. })]));
    }

    #[test]
    fn sse_done_sentinel_is_recognized() {
        let mut state = SseParseState::new();
        let events = state.parse_chunk("[DONE]");
        assert!(matches!(events.as_slice(), [Ok(StreamEvent::Done { .. })]));
    }

    #[test]
    fn tool_call_index_resolves_to_id_across_deltas() {
        let mut state = SseParseState::new();
        let started = state.parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"compute"}}]}}]}"#,
        );
        let Some(Ok(StreamEvent::ToolCallStarted { call_id, .. })) = started.into_iter().next() else {
            panic!("expected ToolCallStarted");
        };
        assert_eq!(call_id, "call_abc");

        let deltas = state.parse_chunk(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"x\":1}"}}]}}]}"#);
        let Some(Ok(StreamEvent::ToolCallDelta { call_id, delta })) = deltas.into_iter().next() else {
            panic!("expected ToolCallDelta");
        };
        assert_eq!(call_id, "call_abc");
        assert_eq!(delta, "{\"x\":1}");
    }

    #[test]
    fn think_tag_split_across_chunks_is_stripped() {
        let mut state = SseParseState::new();
        let mut visible = String::new();
        let mut reasoning = String::new();
        for chunk in ["<thi", "nk>step ", "one</th", "ink>the answer is 4"] {
            for ev in state.push_content(chunk) {
                match ev {
                    StreamEvent::Thinking { text } => reasoning.push_str(&text),
                    StreamEvent::Token { text } => visible.push_str(&text),
                    _ => unreachable!(),
                }
            }
        }
        assert_eq!(reasoning, "step one");
        assert_eq!(visible, "the answer is 4");
    }

    #[test]
    fn glyph_think_marker_split_across_chunks_is_stripped() {
        let mut state = SseParseState::new();
        let mut visible = String::new();
        let mut reasoning = String::new();
        for chunk in ["◁thi", "nk▷reasoning◁/th", "ink▷answer"] {
            for ev in state.push_content(chunk) {
                match ev {
                    StreamEvent::Thinking { text } => reasoning.push_str(&text),
                    StreamEvent::Token { text } => visible.push_str(&text),
                    _ => unreachable!(),
                }
            }
        }
        assert_eq!(reasoning, "reasoning");
        assert_eq!(visible, "answer");
    }
}
