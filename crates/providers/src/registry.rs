//! Provider registry: builds one concrete adapter per configured route.
//!
//! A route whose `kind` has no adapter in this crate (`Anthropic`, `Google`,
//! `AwsBedrock` today) fails registry construction with a config error —
//! it is never silently dropped, since a silently-missing provider would
//! just surface later as an inexplicable "all providers failed" from the
//! router instead of a clear startup error.

use std::collections::HashMap;
use std::sync::Arc;

use sa_domain::config::{LlmStartupPolicy, ProviderKind, RouterConfig};
use sa_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Records a provider that failed to initialize, with secrets masked out of
/// the error string before it's kept around for a readiness endpoint.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    pub error: String,
}

fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20 && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

/// Holds one adapter instance per successfully-initialized route.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    pub fn from_config(cfg: &RouterConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        for route in &cfg.providers {
            let result: Result<Arc<dyn LlmProvider>> = if route.kind.has_adapter() {
                OpenAiCompatProvider::from_route(route).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
            } else {
                Err(Error::Config(format!(
                    "provider '{}' uses kind {:?}, which has no adapter in this build",
                    route.id, route.kind
                )))
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %route.id, kind = ?route.kind, "registered LLM provider");
                    providers.insert(route.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %route.id,
                        kind = ?route.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: route.id.clone(),
                        kind: format!("{:?}", route.kind),
                        error: safe_error,
                    });
                }
            }
        }

        if providers.is_empty() && !cfg.providers.is_empty() && cfg.startup_policy == LlmStartupPolicy::RequireOne
        {
            return Err(Error::Config(
                "all configured LLM providers failed to initialize (startup_policy = require_one)".into(),
            ));
        }

        if providers.is_empty() && !cfg.providers.is_empty() {
            tracing::warn!(
                failed_providers = init_errors.len(),
                "no LLM providers initialized; model calls will fail until configuration is fixed"
            );
        }

        Ok(Self { providers, init_errors })
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }

    /// Test-only: inject a stub adapter without going through HTTP-backed
    /// construction, so the router's failover logic can be exercised
    /// against predictable providers.
    #[cfg(test)]
    pub fn insert_for_test(&mut self, id: String, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id, provider);
    }

    /// Test-support constructor for other crates: build a registry directly
    /// from already-constructed adapters, skipping HTTP-backed
    /// construction entirely. Lets the Agent Runner's tests exercise a real
    /// `ModelRouter` against scripted providers instead of a live endpoint.
    pub fn for_testing(providers: HashMap<String, Arc<dyn LlmProvider>>) -> Self {
        Self { providers, init_errors: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::capability::LlmCapabilities;
    use sa_domain::config::{AuthConfig, ProviderRoute};

    fn route(id: &str, kind: ProviderKind) -> ProviderRoute {
        ProviderRoute {
            id: id.into(),
            display_name: id.into(),
            priority: 1,
            kind,
            base_url: "https://api.example.com/v1".into(),
            model_id: "m".into(),
            auth: AuthConfig { key: Some("sk-test".into()), ..Default::default() },
            capabilities: LlmCapabilities::default(),
        }
    }

    #[test]
    fn openai_compat_route_registers_successfully() {
        let cfg = RouterConfig { providers: vec![route("p1", ProviderKind::OpenaiCompat)], ..Default::default() };
        let reg = ProviderRegistry::from_config(&cfg).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("p1").is_some());
    }

    #[test]
    fn unadapted_kind_is_recorded_as_init_error_not_dropped_silently() {
        let cfg = RouterConfig { providers: vec![route("p1", ProviderKind::Anthropic)], ..Default::default() };
        let reg = ProviderRegistry::from_config(&cfg).unwrap();
        assert!(reg.is_empty());
        assert_eq!(reg.init_errors().len(), 1);
        assert_eq!(reg.init_errors()[0].provider_id, "p1");
    }

    #[test]
    fn require_one_policy_fails_startup_when_all_providers_fail() {
        let cfg = RouterConfig {
            providers: vec![route("p1", ProviderKind::Google)],
            startup_policy: LlmStartupPolicy::RequireOne,
            ..Default::default()
        };
        assert!(ProviderRegistry::from_config(&cfg).is_err());
    }

    #[test]
    fn secrets_in_error_messages_are_masked() {
        let masked = mask_secrets("failed with key sk-abcdefghijklmnopqrstuvwxyz1234567890");
        assert!(!masked.contains("sk-abcdefghijklmnopqrstuvwxyz1234567890"));
    }
}
