//! Post-run artifact collection: walk the scratch directory a sandbox run
//! wrote into and turn whatever it left behind into [`ArtifactRef`]s.
//!
//! A run is free to write a `result.json`, a `dataframe.csv`, and any
//! number of files under `plots/`. None of that is guaranteed — a run that
//! only prints to stdout produces no artifacts at all, and that's fine.
//! What's not fine is swallowing a collection failure silently: every
//! skipped file is recorded as a warning on the envelope's metadata, never
//! just dropped.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use sa_domain::tool::ArtifactRef;

pub struct CollectedArtifacts {
    pub result: Option<Value>,
    pub dataframe_preview: Option<Value>,
    pub refs: Vec<ArtifactRef>,
    pub warnings: Vec<String>,
}

/// Collect artifacts from `scratch_dir`, building download URLs rooted at
/// `download_prefix` (e.g. `/sessions/{id}/artifacts/{run_id}`).
pub fn collect(scratch_dir: &Path, download_prefix: &str) -> CollectedArtifacts {
    let mut out = CollectedArtifacts {
        result: None,
        dataframe_preview: None,
        refs: Vec::new(),
        warnings: Vec::new(),
    };

    collect_result_json(scratch_dir, &mut out);
    collect_dataframe_csv(scratch_dir, download_prefix, &mut out);
    collect_plots(scratch_dir, download_prefix, &mut out);

    out
}

fn collect_result_json(scratch_dir: &Path, out: &mut CollectedArtifacts) {
    let path = scratch_dir.join("result.json");
    if !path.exists() {
        return;
    }
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(value) => out.result = Some(value),
            Err(e) => warn(out, format!("result.json did not parse as JSON: {e}")),
        },
        Err(e) => warn(out, format!("failed to read result.json: {e}")),
    }
}

fn collect_dataframe_csv(scratch_dir: &Path, download_prefix: &str, out: &mut CollectedArtifacts) {
    let path = scratch_dir.join("dataframe.csv");
    if !path.exists() {
        return;
    }
    match std::fs::read_to_string(&path) {
        Ok(raw) => {
            out.dataframe_preview = Some(csv_preview(&raw, 20));
            out.refs.push(ArtifactRef {
                name: "dataframe.csv".to_string(),
                kind: "dataframe".to_string(),
                format: Some("csv".to_string()),
                download_url: format!("{download_prefix}/dataframe.csv"),
            });
        }
        Err(e) => warn(out, format!("failed to read dataframe.csv: {e}")),
    }
}

fn collect_plots(scratch_dir: &Path, download_prefix: &str, out: &mut CollectedArtifacts) {
    let plots_dir = scratch_dir.join("plots");
    if !plots_dir.is_dir() {
        return;
    }
    let entries = match std::fs::read_dir(&plots_dir) {
        Ok(e) => e,
        Err(e) => {
            warn(out, format!("failed to read plots directory: {e}"));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn(out, format!("failed to read a plots directory entry: {e}"));
                continue;
            }
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn(out, format!("skipped non-utf8 plot filename: {path:?}"));
            continue;
        };
        let Some(format) = classify_plot(name) else {
            debug!(file = name, "ignoring unrecognized file in plots/");
            continue;
        };
        out.refs.push(ArtifactRef {
            name: name.to_string(),
            kind: "image".to_string(),
            format: Some(format.to_string()),
            download_url: format!("{download_prefix}/plots/{name}"),
        });
    }
}

fn classify_plot(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        Some("png")
    } else if lower.ends_with(".svg") {
        Some("svg")
    } else if lower.ends_with(".pdf") {
        Some("pdf")
    } else if lower.ends_with(".json") {
        Some("plotly_json")
    } else {
        None
    }
}

fn warn(out: &mut CollectedArtifacts, message: String) {
    debug!(%message, "artifact collection warning");
    out.warnings.push(message);
}

/// First `max_rows` data rows of a CSV (header excluded from the count) as
/// a `{"columns": [...], "rows": [[...], ...]}` preview value.
fn csv_preview(raw: &str, max_rows: usize) -> Value {
    let mut lines = raw.lines();
    let columns: Vec<&str> = lines.next().map(|h| h.split(',').collect()).unwrap_or_default();
    let rows: Vec<Vec<&str>> = lines.take(max_rows).map(|l| l.split(',').collect()).collect();
    serde_json::json!({ "columns": columns, "rows": rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn no_files_produces_empty_collection() {
        let dir = tempdir().unwrap();
        let out = collect(dir.path(), "/x");
        assert!(out.result.is_none());
        assert!(out.refs.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn result_json_is_parsed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("result.json"), r#"{"mean": 4.5}"#).unwrap();
        let out = collect(dir.path(), "/x");
        assert_eq!(out.result.unwrap()["mean"], 4.5);
    }

    #[test]
    fn malformed_result_json_is_warned_not_swallowed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("result.json"), "{not json").unwrap();
        let out = collect(dir.path(), "/x");
        assert!(out.result.is_none());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn dataframe_csv_becomes_artifact_and_preview() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("dataframe.csv"), "a,b\n1,2\n3,4\n").unwrap();
        let out = collect(dir.path(), "/sessions/s1/artifacts/r1");
        assert_eq!(out.refs.len(), 1);
        assert_eq!(out.refs[0].download_url, "/sessions/s1/artifacts/r1/dataframe.csv");
        let preview = out.dataframe_preview.unwrap();
        assert_eq!(preview["columns"][1], "b");
        assert_eq!(preview["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn plots_directory_is_collected_and_filtered() {
        let dir = tempdir().unwrap();
        let plots = dir.path().join("plots");
        std::fs::create_dir(&plots).unwrap();
        std::fs::write(plots.join("chart.png"), b"fake-png").unwrap();
        std::fs::write(plots.join("notes.txt"), b"ignored").unwrap();

        let out = collect(dir.path(), "/x");
        assert_eq!(out.refs.len(), 1);
        assert_eq!(out.refs[0].name, "chart.png");
        assert_eq!(out.refs[0].format.as_deref(), Some("png"));
    }

    #[test]
    fn pdf_plots_are_collected() {
        let dir = tempdir().unwrap();
        let plots = dir.path().join("plots");
        std::fs::create_dir(&plots).unwrap();
        std::fs::write(plots.join("fig.pdf"), b"fake-pdf").unwrap();

        let out = collect(dir.path(), "/x");
        assert_eq!(out.refs.len(), 1);
        assert_eq!(out.refs[0].format.as_deref(), Some("pdf"));
    }
}
