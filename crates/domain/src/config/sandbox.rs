use serde::{Deserialize, Serialize};

/// Configuration for the Sandbox Executor — the subprocess that runs
/// AST-policy-checked Python/R snippets with resource limits applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock budget for a single execution.
    #[serde(default = "d_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Address-space ceiling in bytes. Any positive value is enforced —
    /// there is no minimum threshold below which the limit is skipped.
    #[serde(default = "d_max_memory_bytes")]
    pub max_memory_bytes: u64,
    /// Separate, usually longer, budget for exporting a Plotly figure to a
    /// static image (a synchronous, CPU-heavy step inside the same process).
    #[serde(default = "d_image_export_timeout_seconds")]
    pub image_export_timeout_seconds: u64,
    /// Whether the R execution path is available at all.
    #[serde(default)]
    pub r_enabled: bool,
    /// Budget for the one-time R package install step, separate from the
    /// per-execution timeout since installs are far slower than analysis.
    #[serde(default = "d_r_package_install_timeout_seconds")]
    pub r_package_install_timeout_seconds: u64,
    /// Max bytes of stdout/stderr retained per execution before truncation.
    #[serde(default = "d_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: d_timeout_seconds(),
            max_memory_bytes: d_max_memory_bytes(),
            image_export_timeout_seconds: d_image_export_timeout_seconds(),
            r_enabled: false,
            r_package_install_timeout_seconds: d_r_package_install_timeout_seconds(),
            max_output_bytes: d_max_output_bytes(),
        }
    }
}

fn d_timeout_seconds() -> u64 {
    120
}
fn d_max_memory_bytes() -> u64 {
    1_073_741_824 // 1 GiB
}
fn d_image_export_timeout_seconds() -> u64 {
    30
}
fn d_r_package_install_timeout_seconds() -> u64 {
    300
}
fn d_max_output_bytes() -> usize {
    1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_memory_limit_is_positive() {
        assert!(SandboxConfig::default().max_memory_bytes > 0);
    }

    #[test]
    fn r_disabled_by_default() {
        assert!(!SandboxConfig::default().r_enabled);
    }

    #[test]
    fn deserializes_partial_toml_with_defaults() {
        let cfg: SandboxConfig = toml::from_str("timeout_seconds = 60\n").unwrap();
        assert_eq!(cfg.timeout_seconds, 60);
        assert_eq!(cfg.max_memory_bytes, d_max_memory_bytes());
    }
}
