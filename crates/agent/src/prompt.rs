//! Prompt assembly: static policy + tool guidance + dataset index + context
//! adapter fragments, trimmed to the configured character budget.

use sa_domain::config::apply_char_cap;
use sa_domain::config::PromptBudgetConfig;
use sa_domain::tool::Message;
use sa_sessions::Session;

use crate::adapters::AdapterContext;

const BASE_PERSONA: &str = "You are a local-first analysis assistant. Use the available tools to \
inspect and transform the user's datasets; explain your findings plainly and show your work.";

/// Build the system prompt for one iteration: persona, dataset index, and
/// any adapter-contributed fragments, capped to `budget.system_prompt_max_chars`.
pub fn build_system_prompt(session: &Session, adapter_ctx: &AdapterContext, budget: &PromptBudgetConfig) -> String {
    let mut parts = vec![BASE_PERSONA.to_string()];

    let datasets = session.dataset_names();
    if datasets.is_empty() {
        parts.push("No datasets are currently loaded into this session.".to_string());
    } else {
        parts.push(format!("Datasets loaded in this session: {}.", datasets.join(", ")));
    }

    for fragment in &adapter_ctx.system_fragments {
        parts.push(fragment.clone());
    }

    let joined = parts.join("\n\n");
    apply_char_cap(&joined, budget.system_prompt_max_chars)
}

/// Truncate a tool result's text before it's folded back into the prompt as
/// a `tool` message, so one runaway stdout blob can't blow the budget for
/// every later iteration in the turn.
pub fn cap_tool_result(content: &str, budget: &PromptBudgetConfig) -> String {
    apply_char_cap(content, budget.tool_result_max_chars)
}

/// Produce a mechanical, non-LLM summary of an archived message slice for
/// compaction. `ConversationLog::compact_if_needed` takes a synchronous
/// closure, so a model-backed summary would need a second blocking call
/// mid-compaction; this extractive summary trades summary quality for
/// staying on the synchronous path the log already exposes.
pub fn heuristic_summary(archived: &[Message]) -> String {
    let user_count = archived.iter().filter(|m| matches!(m, Message::User { .. })).count();
    let first_user = archived.iter().find_map(|m| match m {
        Message::User { content } => Some(truncate(content, 160)),
        _ => None,
    });
    let last_assistant = archived.iter().rev().find_map(|m| match m {
        Message::Assistant { content, .. } if !content.is_empty() => Some(truncate(content, 160)),
        _ => None,
    });

    let mut out = format!("{user_count} user turn(s) covering this span.");
    if let Some(first) = first_user {
        out.push_str(&format!(" Started with: \"{first}\"."));
    }
    if let Some(last) = last_assistant {
        out.push_str(&format!(" Most recent assistant reply before this point: \"{last}\"."));
    }
    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let t: String = s.chars().take(max_chars).collect();
    format!("{t}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_loaded_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path(), "s1").unwrap();
        session.set_dataset("measurements", serde_json::json!({}));
        let prompt = build_system_prompt(&session, &AdapterContext::default(), &PromptBudgetConfig::default());
        assert!(prompt.contains("measurements"));
    }

    #[test]
    fn system_prompt_notes_empty_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path(), "s1").unwrap();
        let prompt = build_system_prompt(&session, &AdapterContext::default(), &PromptBudgetConfig::default());
        assert!(prompt.contains("No datasets"));
    }

    #[test]
    fn system_prompt_respects_char_budget() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(dir.path(), "s1").unwrap();
        let ctx = AdapterContext { system_fragments: vec!["x".repeat(500)], retrievals: vec![] };
        let budget = PromptBudgetConfig { system_prompt_max_chars: 50, ..PromptBudgetConfig::default() };
        let prompt = build_system_prompt(&session, &ctx, &budget);
        assert!(prompt.contains("truncated"));
    }

    #[test]
    fn heuristic_summary_mentions_turn_count() {
        let archived = vec![Message::user("hello"), Message::assistant("hi there")];
        let summary = heuristic_summary(&archived);
        assert!(summary.contains("1 user turn"));
        assert!(summary.contains("hello"));
        assert!(summary.contains("hi there"));
    }
}
