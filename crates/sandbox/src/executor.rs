//! Ties the static policy check, resource limits, subprocess execution, and
//! artifact collection together into the sandbox's one entry point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;
use uuid::Uuid;

use sa_domain::cancel::CancelToken;
use sa_domain::config::SandboxConfig;
use sa_domain::error::{Error, Result};
use sa_domain::tool::ToolResultEnvelope;
use sa_domain::trace::TraceEvent;

use crate::artifacts;
use crate::limits;
use crate::policy;

/// Which interpreter a snippet runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    R,
}

pub struct SandboxExecutor {
    /// Root directory each run gets a `{run_id}` scratch subdirectory under.
    artifact_root: PathBuf,
}

impl SandboxExecutor {
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            artifact_root: artifact_root.into(),
        }
    }

    /// Run a code snippet to completion (or timeout/cancellation) and return
    /// a fully-populated tool envelope. Never propagates an `Err` for a
    /// sandbox-side failure — failures are reported as a failed envelope so
    /// the ReAct loop can keep going.
    pub async fn run(
        &self,
        language: Language,
        code: &str,
        session_id: &str,
        cfg: &SandboxConfig,
        cancel: CancelToken,
        datasets: &HashMap<String, Value>,
    ) -> Result<ToolResultEnvelope> {
        if language == Language::Python {
            if let Err(e) = policy::check_python(code) {
                if let Error::Policy { reason, line, .. } = &e {
                    TraceEvent::SandboxPolicyRejected {
                        session_id: session_id.to_string(),
                        reason: reason.clone(),
                        line: *line,
                    }
                    .emit();
                }
                return Ok(ToolResultEnvelope::error(e.to_string(), e.error_kind()));
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let scratch_dir = self.artifact_root.join("runs").join(&run_id);
        tokio::fs::create_dir_all(&scratch_dir).await?;
        tokio::fs::create_dir_all(scratch_dir.join("plots")).await?;
        tokio::fs::create_dir_all(scratch_dir.join("inputs")).await?;

        let dataset_paths = write_datasets(&scratch_dir, datasets).await?;
        let script_path = write_script(&scratch_dir, language, code, &dataset_paths).await?;
        let mut command = build_command(language, &script_path, &scratch_dir);
        limits::apply_memory_limit(&mut command, cfg.max_memory_bytes);

        let timeout = Duration::from_secs(cfg.timeout_seconds);
        let started = Instant::now();
        let outcome = spawn_and_wait(command, timeout, cancel, cfg.max_output_bytes).await;

        match outcome {
            Outcome::TimedOut => {
                TraceEvent::SandboxResourceLimitHit {
                    session_id: session_id.to_string(),
                    kind: "timeout".to_string(),
                }
                .emit();
                Ok(ToolResultEnvelope::error(
                    format!("execution exceeded {}s", cfg.timeout_seconds),
                    Error::SandboxTimeout(session_id.to_string()).error_kind(),
                ))
            }
            Outcome::Cancelled => Ok(ToolResultEnvelope::cancelled()),
            Outcome::Failed { exit_code, stderr } => {
                Ok(ToolResultEnvelope::error(
                    format!("exit {exit_code:?}: {stderr}"),
                    Error::RuntimeFailure { exit_code, stderr }.error_kind(),
                ))
            }
            Outcome::Completed { stdout, .. } => {
                let download_prefix = format!("/sessions/{session_id}/artifacts/{run_id}");
                let collected = artifacts::collect(&scratch_dir, &download_prefix);

                for warning in &collected.warnings {
                    TraceEvent::ArtifactCollectionWarning {
                        session_id: session_id.to_string(),
                        kind: "collection_failure".to_string(),
                        detail: warning.clone(),
                    }
                    .emit();
                }

                let mut envelope = ToolResultEnvelope::ok(
                    "execution completed",
                    collected.result.unwrap_or(Value::Null),
                );
                envelope.dataframe_preview = collected.dataframe_preview;
                envelope.artifacts = collected.refs;
                if !collected.warnings.is_empty() || !stdout.is_empty() {
                    envelope.metadata = serde_json::json!({
                        "stdout_tail": tail(&stdout, 2000),
                        "warnings": collected.warnings,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    });
                }
                Ok(envelope)
            }
        }
    }
}

enum Outcome {
    Completed { stdout: String },
    Failed { exit_code: Option<i32>, stderr: String },
    TimedOut,
    Cancelled,
}

/// Serialize each named dataset to a CSV under `scratch_dir/inputs/` and
/// return name -> path-relative-to-scratch-dir for the wrapper preamble.
/// A dataset whose shape isn't row-like (not an array of objects) is
/// written as a single-column dump rather than dropped, so the snippet
/// always has a file to open even if its contents are unexpected.
async fn write_datasets(scratch_dir: &Path, datasets: &HashMap<String, Value>) -> Result<HashMap<String, String>> {
    let mut paths = HashMap::new();
    for (name, value) in datasets {
        let csv = dataset_to_csv(value);
        let rel = format!("inputs/{name}.csv");
        tokio::fs::write(scratch_dir.join(&rel), csv).await?;
        paths.insert(name.clone(), rel);
    }
    Ok(paths)
}

fn dataset_to_csv(value: &Value) -> String {
    let Some(rows) = value.as_array() else {
        return format!("value\n{}\n", csv_escape(&value.to_string()));
    };
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return rows.iter().map(|v| format!("{}\n", csv_escape(&v.to_string()))).collect();
    };

    let columns: Vec<String> = first.keys().cloned().collect();
    let mut out = columns.iter().map(|c| csv_escape(c)).collect::<Vec<_>>().join(",");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(c) {
                Some(Value::String(s)) => csv_escape(s),
                Some(v) => csv_escape(&v.to_string()),
                None => String::new(),
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// A preamble binding each dataset name to its CSV path, prepended to the
/// snippet so `datasets["name"]` (Python) or `datasets[["name"]]` (R)
/// resolves without the snippet knowing anything about the scratch layout.
fn dataset_preamble(language: Language, dataset_paths: &HashMap<String, String>) -> String {
    if dataset_paths.is_empty() {
        return String::new();
    }
    match language {
        Language::Python => {
            let entries: Vec<String> = dataset_paths.iter().map(|(name, path)| format!("    {:?}: {:?},", name, path)).collect();
            format!("datasets = {{\n{}\n}}\n", entries.join("\n"))
        }
        Language::R => {
            let entries: Vec<String> = dataset_paths
                .iter()
                .map(|(name, path)| format!("  {:?} = {:?}", name, path))
                .collect();
            format!("datasets <- list(\n{}\n)\n", entries.join(",\n"))
        }
    }
}

async fn write_script(scratch_dir: &Path, language: Language, code: &str, dataset_paths: &HashMap<String, String>) -> Result<PathBuf> {
    let filename = match language {
        Language::Python => "script.py",
        Language::R => "script.R",
    };
    let path = scratch_dir.join(filename);
    let mut file = tokio::fs::File::create(&path).await?;
    file.write_all(dataset_preamble(language, dataset_paths).as_bytes()).await?;
    file.write_all(code.as_bytes()).await?;
    Ok(path)
}

fn build_command(language: Language, script_path: &Path, scratch_dir: &Path) -> Command {
    let mut command = match language {
        Language::Python => Command::new("python3"),
        Language::R => Command::new("Rscript"),
    };
    command
        .arg(script_path)
        .current_dir(scratch_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

async fn spawn_and_wait(
    mut command: Command,
    timeout: Duration,
    cancel: CancelToken,
    max_output_bytes: usize,
) -> Outcome {
    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            return Outcome::Failed {
                exit_code: None,
                stderr: format!("failed to spawn interpreter: {e}"),
            }
        }
    };

    // Drain both pipes concurrently with the wait, not after — the child
    // can fill the OS pipe buffer and block on write long before it exits,
    // which would otherwise deadlock the wait.
    let stdout_task = child
        .stdout
        .take()
        .map(|mut pipe| tokio::spawn(async move {
            let mut buf = String::new();
            read_capped(&mut pipe, &mut buf, max_output_bytes).await;
            buf
        }));
    let stderr_task = child
        .stderr
        .take()
        .map(|mut pipe| tokio::spawn(async move {
            let mut buf = String::new();
            read_capped(&mut pipe, &mut buf, max_output_bytes).await;
            buf
        }));

    let status = {
        let wait_fut = child.wait();
        tokio::pin!(wait_fut);

        tokio::select! {
            status = &mut wait_fut => Some(status),
            _ = tokio::time::sleep(timeout) => None,
            _ = poll_cancel(&cancel) => None,
        }
    };

    let Some(status_result) = status else {
        let _ = child.start_kill();
        let _ = child.wait().await;
        if let Some(t) = stdout_task {
            let _ = t.await;
        }
        if let Some(t) = stderr_task {
            let _ = t.await;
        }
        return if cancel.is_cancelled() {
            Outcome::Cancelled
        } else {
            Outcome::TimedOut
        };
    };

    let stdout = match stdout_task {
        Some(t) => t.await.unwrap_or_default(),
        None => String::new(),
    };
    let stderr = match stderr_task {
        Some(t) => t.await.unwrap_or_default(),
        None => String::new(),
    };

    match status_result {
        Ok(status) if status.success() => Outcome::Completed { stdout },
        Ok(status) => Outcome::Failed {
            exit_code: status.code(),
            stderr,
        },
        Err(e) => Outcome::Failed {
            exit_code: None,
            stderr: format!("wait() failed: {e}"),
        },
    }
}

async fn poll_cancel(cancel: &CancelToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn read_capped(pipe: &mut (impl tokio::io::AsyncRead + Unpin), out: &mut String, max_bytes: usize) {
    let mut buf = vec![0u8; max_bytes.min(64 * 1024).max(1)];
    let mut total = 0usize;
    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "error reading sandbox pipe");
                break;
            }
        };
        if total >= max_bytes {
            continue;
        }
        let take = n.min(max_bytes - total);
        out.push_str(&String::from_utf8_lossy(&buf[..take]));
        total += take;
    }
}

fn tail(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let skip = s.chars().count() - max_chars;
    s.chars().skip(skip).collect()
}
