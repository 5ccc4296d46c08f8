use crate::capability::LlmCapabilities;
use serde::{Deserialize, Serialize};

/// The Model Router's provider list: a priority-ordered set of routes, each
/// naming a concrete endpoint plus the credentials and model id to send a
/// call to. A single model call walks `ordered()` ascending and tries each
/// entry in turn, skipping (not removing) any that fails for the rest of
/// that call only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "d_startup_policy")]
    pub startup_policy: LlmStartupPolicy,
    #[serde(default = "d_default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub providers: Vec<ProviderRoute>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            startup_policy: d_startup_policy(),
            default_timeout_ms: d_default_timeout_ms(),
            max_retries: d_max_retries(),
            providers: Vec::new(),
        }
    }
}

fn d_startup_policy() -> LlmStartupPolicy {
    LlmStartupPolicy::AllowNone
}
fn d_default_timeout_ms() -> u64 {
    60_000
}
fn d_max_retries() -> u32 {
    2
}

impl RouterConfig {
    /// Routes sorted ascending by `priority` — the order a single model call
    /// tries them in.
    pub fn ordered(&self) -> Vec<&ProviderRoute> {
        let mut v: Vec<&ProviderRoute> = self.providers.iter().collect();
        v.sort_by_key(|p| p.priority);
        v
    }
}

/// Whether the runtime may start with zero usable providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    AllowNone,
    RequireOne,
}

/// One entry in the Model Router's provider list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRoute {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub priority: u32,
    pub kind: ProviderKind,
    pub base_url: String,
    pub model_id: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub capabilities: LlmCapabilities,
}

/// Which wire protocol a route speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    AzureOpenai,
    OpenaiCodexOauth,
    Anthropic,
    Google,
    AwsBedrock,
}

impl ProviderKind {
    /// True when `sa-providers` ships a concrete adapter for this kind. The
    /// others are valid configuration but fail registry construction with a
    /// "no adapter" error rather than being silently dropped.
    pub fn has_adapter(self) -> bool {
        matches!(
            self,
            ProviderKind::OpenaiCompat | ProviderKind::AzureOpenai | ProviderKind::OpenaiCodexOauth
        )
    }
}

/// How a provider route authenticates its HTTP requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub header: Option<String>,
    pub prefix: Option<String>,
    pub env: Option<String>,
    pub key: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    pub service: Option<String>,
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    QueryParam,
    AwsSigv4,
    OauthDevice,
    Keychain,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, priority: u32) -> ProviderRoute {
        ProviderRoute {
            id: id.into(),
            display_name: id.into(),
            priority,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.example.com/v1".into(),
            model_id: "gpt-test".into(),
            auth: AuthConfig::default(),
            capabilities: LlmCapabilities::default(),
        }
    }

    #[test]
    fn ordered_sorts_ascending_by_priority() {
        let cfg = RouterConfig {
            providers: vec![route("c", 30), route("a", 10), route("b", 20)],
            ..RouterConfig::default()
        };
        let ids: Vec<&str> = cfg.ordered().into_iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn openai_compat_has_adapter() {
        assert!(ProviderKind::OpenaiCompat.has_adapter());
    }

    #[test]
    fn bedrock_has_no_adapter() {
        assert!(!ProviderKind::AwsBedrock.has_adapter());
    }

    #[test]
    fn router_config_deserializes_from_toml() {
        let toml_str = r#"
            [[providers]]
            id = "local"
            priority = 1
            kind = "openai_compat"
            base_url = "http://localhost:8000/v1"
            model_id = "qwen-coder"
        "#;
        let cfg: RouterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].priority, 1);
        assert_eq!(cfg.default_timeout_ms, 60_000);
    }
}
