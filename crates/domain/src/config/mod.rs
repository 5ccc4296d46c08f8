mod compaction;
mod context;
mod router;
mod runner;
mod sandbox;
mod upload;

pub use compaction::*;
pub use context::*;
pub use router::*;
pub use runner::*;
pub use sandbox::*;
pub use upload::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The full set of configuration the agent runtime loads at startup — one
/// sub-config per concern, each independently defaultable so a deployment
/// can override only the fields it cares about.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub prompt_budget: PromptBudgetConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means the config is fit to start the runtime with.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.router.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "router.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut seen_priorities: HashSet<u32> = HashSet::new();

        for (i, provider) in self.router.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("router.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("router.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("router.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.kind.has_adapter() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("router.providers[{i}].kind"),
                    message: format!("no adapter is available for provider kind {:?}", provider.kind),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("router.providers[{i}].id"),
                    message: format!("duplicate provider id \"{}\"", provider.id),
                });
            }
            if !seen_priorities.insert(provider.priority) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("router.providers[{i}].priority"),
                    message: format!(
                        "priority {} is shared with another provider — tie-break order is undefined",
                        provider.priority
                    ),
                });
            }

            let needs_credentials = matches!(provider.auth.mode, AuthMode::ApiKey | AuthMode::QueryParam);
            if needs_credentials {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                let has_keys = !provider.auth.keys.is_empty();
                if !has_env && !has_key && !has_keys {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("router.providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses {:?} auth mode but has no auth.env, auth.key, or auth.keys configured",
                            provider.id, provider.auth.mode
                        ),
                    });
                }
            }
        }

        if self.sandbox.timeout_seconds == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sandbox.timeout_seconds".into(),
                message: "timeout_seconds must be greater than 0".into(),
            });
        }

        if self.compaction.keep_last_turns > self.compaction.max_turns {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "compaction.keep_last_turns".into(),
                message: "keep_last_turns exceeds max_turns — compaction will never trigger".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            router: RouterConfig {
                providers: vec![ProviderRoute {
                    id: "local".into(),
                    display_name: "Local".into(),
                    priority: 1,
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "http://localhost:8000/v1".into(),
                    model_id: "qwen-coder".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("LOCAL_API_KEY".into()),
                        ..AuthConfig::default()
                    },
                    capabilities: crate::capability::LlmCapabilities::default(),
                }],
                ..RouterConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn no_providers_is_warning() {
        let cfg = Config::default();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "router.providers").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn provider_with_no_adapter_is_error() {
        let mut cfg = valid_config();
        cfg.router.providers[0].kind = ProviderKind::AwsBedrock;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "router.providers[0].kind").expect("expected kind error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn duplicate_priority_is_warning() {
        let mut cfg = valid_config();
        let mut second = cfg.router.providers[0].clone();
        second.id = "local-2".into();
        cfg.router.providers.push(second);
        let issues = cfg.validate();
        let issue = find_issue(&issues, "router.providers[1].priority").expect("expected priority warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn api_key_mode_without_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.router.providers[0].auth = AuthConfig::default();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "router.providers[0].auth").expect("expected auth error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn sandbox_zero_timeout_is_error() {
        let mut cfg = valid_config();
        cfg.sandbox.timeout_seconds = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "sandbox.timeout_seconds").expect("expected timeout error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn keep_last_turns_above_max_turns_is_warning() {
        let mut cfg = valid_config();
        cfg.compaction.keep_last_turns = 100;
        cfg.compaction.max_turns = 80;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "compaction.keep_last_turns").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "sandbox.timeout_seconds".into(),
            message: "timeout_seconds must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] sandbox.timeout_seconds: timeout_seconds must be greater than 0"
        );
    }
}
