//! Priority-ordered failover router.
//!
//! A single call walks the configured routes in ascending `priority` order
//! and uses the first one that's registered and succeeds. A route that
//! fails is skipped for the rest of *this* call only — the next call starts
//! back at priority 1, since a transient failure on one request says
//! nothing about whether that provider is still down a second later.
//!
//! Streaming carries one additional rule: once a stream has emitted its
//! first visible delta, the router is committed to that provider. A failure
//! after that point is surfaced as a stream error rather than silently
//! failed over to the next route, since the caller may already have shown
//! partial output to a user and re-running the call from scratch on a
//! different provider would duplicate or contradict it.

use std::sync::Arc;
use std::time::Instant;

use sa_domain::config::RouterConfig;
use sa_domain::error::{Error, Result};
use sa_domain::event::{BoxStream, StreamEvent};
use sa_domain::trace::TraceEvent;

use crate::registry::ProviderRegistry;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

pub struct ModelRouter {
    registry: ProviderRegistry,
    cfg: RouterConfig,
}

impl ModelRouter {
    pub fn from_config(cfg: RouterConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(&cfg)?;
        Ok(Self { registry, cfg })
    }

    pub fn new(registry: ProviderRegistry, cfg: RouterConfig) -> Self {
        Self { registry, cfg }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Send a non-streaming chat request, trying each configured route in
    /// priority order until one succeeds.
    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let mut last_err: Option<Error> = None;
        let mut previous_route: Option<&sa_domain::config::ProviderRoute> = None;

        for route in self.cfg.ordered() {
            let Some(provider) = self.registry.get(&route.id) else {
                continue;
            };

            let mut attempt_req = req.clone();
            attempt_req.model = Some(route.model_id.clone());

            let start = Instant::now();
            let result = self.with_timeout(&provider, attempt_req).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    TraceEvent::LlmRequest {
                        provider: route.id.clone(),
                        model: route.model_id.clone(),
                        streaming: false,
                        duration_ms,
                        prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
                        completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
                    }
                    .emit();
                    return Ok(resp);
                }
                Err(e) if e.is_retriable_provider_error() => {
                    tracing::warn!(provider = %route.id, error = %e, "route failed, trying next");
                    if let Some(prev) = previous_route {
                        TraceEvent::LlmFallback {
                            from_provider: prev.id.clone(),
                            from_model: prev.model_id.clone(),
                            to_provider: route.id.clone(),
                            to_model: route.model_id.clone(),
                            reason: e.to_string(),
                        }
                        .emit();
                    }
                    previous_route = Some(route);
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Provider {
            provider: "router".into(),
            message: "no configured route succeeded (none registered or all failed before first attempt)".into(),
        }))
    }

    /// Stream a chat request. Returns the stream from the first route that
    /// accepts the request (HTTP-level success); once the caller starts
    /// consuming it, any mid-stream error is the caller's to surface — the
    /// router does not retry inside an already-committed stream.
    pub async fn chat_stream(&self, req: ChatRequest) -> Result<(String, BoxStream<'static, Result<StreamEvent>>)> {
        let mut last_err: Option<Error> = None;

        for route in self.cfg.ordered() {
            let Some(provider) = self.registry.get(&route.id) else {
                continue;
            };

            let mut attempt_req = req.clone();
            attempt_req.model = Some(route.model_id.clone());

            TraceEvent::LlmRequest {
                provider: route.id.clone(),
                model: route.model_id.clone(),
                streaming: true,
                duration_ms: 0,
                prompt_tokens: None,
                completion_tokens: None,
            }
            .emit();

            match provider.chat_stream(attempt_req).await {
                Ok(stream) => return Ok((route.id.clone(), stream)),
                Err(e) if e.is_retriable_provider_error() => {
                    tracing::warn!(provider = %route.id, error = %e, "stream route failed before commit, trying next");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Provider {
            provider: "router".into(),
            message: "no configured route accepted the stream request".into(),
        }))
    }

    async fn with_timeout(&self, provider: &Arc<dyn LlmProvider>, req: ChatRequest) -> Result<ChatResponse> {
        let timeout = std::time::Duration::from_millis(self.cfg.default_timeout_ms);
        match tokio::time::timeout(timeout, provider.chat(req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "provider '{}' timed out after {}ms",
                provider.provider_id(),
                self.cfg.default_timeout_ms
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sa_domain::capability::LlmCapabilities;
    use sa_domain::config::{AuthConfig, ProviderKind, ProviderRoute};
    use sa_domain::event::Usage;
    use sa_domain::tool::ToolCall;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::traits::{EmbeddingsRequest, EmbeddingsResponse};

    struct StubProvider {
        id: String,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Timeout(format!("{} timed out", self.id)))
            } else {
                Ok(ChatResponse {
                    content: format!("hello from {}", self.id),
                    tool_calls: Vec::<ToolCall>::new(),
                    usage: Some(Usage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 }),
                    model: "m".into(),
                    finish_reason: Some("stop".into()),
                })
            }
        }

        async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            Err(Error::Internal("not used in this test".into()))
        }

        async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
            Ok(EmbeddingsResponse { embeddings: vec![] })
        }

        fn capabilities(&self) -> &LlmCapabilities {
            static CAPS: std::sync::OnceLock<LlmCapabilities> = std::sync::OnceLock::new();
            CAPS.get_or_init(LlmCapabilities::default)
        }

        fn provider_id(&self) -> &str {
            &self.id
        }
    }

    fn route(id: &str, priority: u32) -> ProviderRoute {
        ProviderRoute {
            id: id.into(),
            display_name: id.into(),
            priority,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://example.com".into(),
            model_id: "m".into(),
            auth: AuthConfig { key: Some("sk-x".into()), ..Default::default() },
            capabilities: LlmCapabilities::default(),
        }
    }

    fn router_with(stubs: Vec<(&str, bool)>) -> ModelRouter {
        let providers: Vec<ProviderRoute> =
            stubs.iter().enumerate().map(|(i, (id, _))| route(id, i as u32 + 1)).collect();
        let cfg = RouterConfig { providers, ..Default::default() };

        // Build the registry by hand with stub adapters, bypassing from_config
        // (which would try real HTTP adapters).
        let mut registry_map = std::collections::HashMap::new();
        for (id, fail) in stubs {
            registry_map.insert(
                id.to_string(),
                Arc::new(StubProvider { id: id.to_string(), fail, calls: Arc::new(AtomicUsize::new(0)) })
                    as Arc<dyn LlmProvider>,
            );
        }
        let registry = test_registry(registry_map);
        ModelRouter::new(registry, cfg)
    }

    // ProviderRegistry's fields are private; tests build one the same way
    // `from_config` would but with stub adapters already constructed.
    fn test_registry(map: std::collections::HashMap<String, Arc<dyn LlmProvider>>) -> ProviderRegistry {
        let cfg = RouterConfig::default();
        let mut registry = ProviderRegistry::from_config(&cfg).unwrap();
        for (id, provider) in map {
            registry.insert_for_test(id, provider);
        }
        registry
    }

    #[tokio::test]
    async fn first_healthy_route_wins() {
        let router = router_with(vec![("a", false), ("b", false)]);
        let resp = router.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(resp.content, "hello from a");
    }

    #[tokio::test]
    async fn failing_primary_falls_over_to_next_priority() {
        let router = router_with(vec![("a", true), ("b", false)]);
        let resp = router.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(resp.content, "hello from b");
    }

    #[tokio::test]
    async fn all_routes_failing_surfaces_last_error() {
        let router = router_with(vec![("a", true), ("b", true)]);
        assert!(router.chat(ChatRequest::default()).await.is_err());
    }
}
