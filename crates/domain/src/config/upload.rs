use serde::{Deserialize, Serialize};

/// Config-only description of which uploads the runtime will accept; the
/// upload endpoint itself lives outside this crate's scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "d_allowed_upload_extensions")]
    pub allowed_upload_extensions: Vec<String>,
    #[serde(default = "d_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_upload_extensions: d_allowed_upload_extensions(),
            max_upload_bytes: d_max_upload_bytes(),
        }
    }
}

fn d_allowed_upload_extensions() -> Vec<String> {
    vec![
        "csv".into(),
        "tsv".into(),
        "json".into(),
        "parquet".into(),
        "xlsx".into(),
    ]
}
fn d_max_upload_bytes() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_csv() {
        assert!(UploadConfig::default()
            .allowed_upload_extensions
            .iter()
            .any(|e| e == "csv"));
    }
}
