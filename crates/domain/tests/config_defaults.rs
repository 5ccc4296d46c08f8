use sa_domain::config::Config;

#[test]
fn default_config_has_no_providers() {
    let config = Config::default();
    assert!(config.router.providers.is_empty());
}

#[test]
fn explicit_provider_route_parses() {
    let toml_str = r#"
[[router.providers]]
id = "local"
priority = 1
kind = "openai_compat"
base_url = "http://localhost:8000/v1"
model_id = "qwen-coder"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.router.providers.len(), 1);
    assert_eq!(config.router.providers[0].priority, 1);
    assert_eq!(config.sandbox.timeout_seconds, 120);
}
