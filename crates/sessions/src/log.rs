//! Append-only conversation log.
//!
//! Every session gets a `memory.jsonl` file under its session directory,
//! one [`Message`] per line. Compaction never discards history: the
//! archived prefix is relocated to `archive/{timestamp}.jsonl` and replaced
//! in the live log with a single summary message.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sa_domain::config::CompactionConfig;
use sa_domain::error::{Error, Result};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;

pub struct ConversationLog {
    dir: PathBuf,
    path: PathBuf,
    session_id: String,
}

/// Outcome of a compaction pass that actually ran.
#[derive(Debug, Clone)]
pub struct CompactionResult {
    pub archived_count: usize,
    pub turns_compacted: usize,
    pub summary_chars: usize,
    pub archive_path: PathBuf,
}

impl ConversationLog {
    /// Open (creating if absent) the log for `session_id` under
    /// `base_dir/sessions/{session_id}/`.
    pub fn new(base_dir: &Path, session_id: &str) -> Result<Self> {
        let dir = base_dir.join("sessions").join(session_id);
        fs::create_dir_all(&dir).map_err(Error::Io)?;
        let path = dir.join("memory.jsonl");
        Ok(Self {
            dir,
            path,
            session_id: session_id.to_owned(),
        })
    }

    pub fn append(&self, message: &Message) -> Result<()> {
        let json = serde_json::to_string(message).map_err(Error::Json)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(Error::Io)?;
        writeln!(file, "{json}").map_err(Error::Io)?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<Message>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(Error::Io)?;
        let mut out = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(m) => out.push(m),
                Err(e) => tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "skipping malformed log line"
                ),
            }
        }
        Ok(out)
    }

    /// Count of `user` messages in the live log — the turn count compaction
    /// triggers against.
    pub fn turn_count(&self) -> Result<usize> {
        Ok(self
            .read_all()?
            .iter()
            .filter(|m| matches!(m, Message::User { .. }))
            .count())
    }

    /// Compact the log if `cfg.auto` is set and the turn count exceeds
    /// `cfg.max_turns`. `summarize` receives the archived slice and must
    /// return the text stored in the replacement summary message.
    pub fn compact_if_needed(
        &self,
        cfg: &CompactionConfig,
        summarize: impl FnOnce(&[Message]) -> String,
    ) -> Result<Option<CompactionResult>> {
        if !cfg.auto {
            return Ok(None);
        }
        let messages = self.read_all()?;
        let turn_count = messages.iter().filter(|m| matches!(m, Message::User { .. })).count();
        if turn_count <= cfg.max_turns {
            return Ok(None);
        }

        let cut = find_cut_index(&messages, cfg.keep_last_turns);
        if cut == 0 {
            return Ok(None);
        }
        let (archived, kept) = messages.split_at(cut);

        let archive_dir = self.dir.join("archive");
        fs::create_dir_all(&archive_dir).map_err(Error::Io)?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let archive_path = archive_dir.join(format!("{stamp}.jsonl"));

        let mut archive_buf = String::new();
        for m in archived {
            archive_buf.push_str(&serde_json::to_string(m).map_err(Error::Json)?);
            archive_buf.push('\n');
        }
        fs::write(&archive_path, archive_buf).map_err(Error::Io)?;

        let summary_text = summarize(archived);
        let summary_message = Message::system(format!(
            "[earlier conversation compacted — {} messages archived]\n{summary_text}",
            archived.len()
        ));

        let mut rewritten = String::new();
        rewritten.push_str(&serde_json::to_string(&summary_message).map_err(Error::Json)?);
        rewritten.push('\n');
        for m in kept {
            rewritten.push_str(&serde_json::to_string(m).map_err(Error::Json)?);
            rewritten.push('\n');
        }
        fs::write(&self.path, rewritten).map_err(Error::Io)?;

        let result = CompactionResult {
            archived_count: archived.len(),
            turns_compacted: turn_count.saturating_sub(cfg.keep_last_turns),
            summary_chars: summary_text.len(),
            archive_path,
        };

        TraceEvent::TranscriptCompacted {
            session_id: self.session_id.clone(),
            turns_compacted: result.turns_compacted,
            archived_count: result.archived_count,
        }
        .emit();

        Ok(Some(result))
    }
}

/// Index of the first message to keep: the user message `keep_last_turns`
/// turns back from the end, nudged forward past any leading `tool` messages
/// so a tool_call/tool_result pair is never split across the boundary (the
/// call always precedes its result in log order, so if the cut would land
/// on an orphaned `tool` message, both the call and the result belong in
/// the archived prefix).
fn find_cut_index(messages: &[Message], keep_last_turns: usize) -> usize {
    let user_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| matches!(m, Message::User { .. }))
        .map(|(i, _)| i)
        .collect();

    if user_indices.len() <= keep_last_turns {
        return 0;
    }

    let mut cut = user_indices[user_indices.len() - keep_last_turns];
    while cut < messages.len() && matches!(messages[cut], Message::Tool { .. }) {
        cut += 1;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::PendingToolCall;
    use tempfile::tempdir;

    fn user(n: usize) -> Message {
        Message::user(format!("turn {n}"))
    }

    #[test]
    fn append_and_read_roundtrip() {
        let dir = tempdir().unwrap();
        let log = ConversationLog::new(dir.path(), "s1").unwrap();
        log.append(&Message::user("hello")).unwrap();
        log.append(&Message::assistant("hi")).unwrap();
        let messages = log.read_all().unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn compaction_noop_below_threshold() {
        let dir = tempdir().unwrap();
        let log = ConversationLog::new(dir.path(), "s1").unwrap();
        for i in 0..5 {
            log.append(&user(i)).unwrap();
        }
        let cfg = CompactionConfig {
            max_turns: 80,
            ..CompactionConfig::default()
        };
        let result = log.compact_if_needed(&cfg, |_| "summary".into()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn compaction_archives_and_keeps_tail() {
        let dir = tempdir().unwrap();
        let log = ConversationLog::new(dir.path(), "s1").unwrap();
        for i in 0..10 {
            log.append(&user(i)).unwrap();
            log.append(&Message::assistant(format!("ack {i}"))).unwrap();
        }
        let cfg = CompactionConfig {
            auto: true,
            max_turns: 8,
            keep_last_turns: 3,
        };
        let result = log
            .compact_if_needed(&cfg, |archived| format!("{} messages summarized", archived.len()))
            .unwrap()
            .expect("compaction should trigger");

        assert!(result.archive_path.exists());
        let kept = log.read_all().unwrap();
        // summary message + 3 kept turns * 2 messages each
        assert_eq!(kept.len(), 1 + 3 * 2);
        assert!(matches!(kept[0], Message::System { .. }));
    }

    #[test]
    fn compaction_never_splits_tool_call_pair() {
        let dir = tempdir().unwrap();
        let log = ConversationLog::new(dir.path(), "s1").unwrap();
        for i in 0..6 {
            log.append(&user(i)).unwrap();
            log.append(&Message::assistant_with_tool_calls(
                "",
                vec![PendingToolCall {
                    id: format!("c{i}"),
                    name: "compute".into(),
                    arguments: "{}".into(),
                }],
            ))
            .unwrap();
            log.append(&Message::tool_result(format!("c{i}"), "42")).unwrap();
        }
        let cfg = CompactionConfig {
            auto: true,
            max_turns: 4,
            keep_last_turns: 2,
        };
        log.compact_if_needed(&cfg, |_| "summary".into()).unwrap().unwrap();

        let kept = log.read_all().unwrap();
        // No Tool message in the kept log may reference a call_id whose
        // Assistant tool_calls entry isn't also present.
        let known_ids: std::collections::HashSet<String> = kept
            .iter()
            .filter_map(|m| match m {
                Message::Assistant { tool_calls, .. } => Some(tool_calls.iter().map(|t| t.id.clone())),
                _ => None,
            })
            .flatten()
            .collect();
        for m in &kept {
            if let Message::Tool { tool_call_id, .. } = m {
                assert!(known_ids.contains(tool_call_id), "orphaned tool result for {tool_call_id}");
            }
        }
    }

    #[test]
    fn turn_count_counts_user_messages_only() {
        let dir = tempdir().unwrap();
        let log = ConversationLog::new(dir.path(), "s1").unwrap();
        log.append(&Message::user("a")).unwrap();
        log.append(&Message::assistant("b")).unwrap();
        log.append(&Message::user("c")).unwrap();
        assert_eq!(log.turn_count().unwrap(), 2);
    }
}
