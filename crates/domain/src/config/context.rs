use serde::{Deserialize, Serialize};

/// Character-budget caps applied when the Agent Runner assembles a prompt —
/// the same cap-then-truncate pattern used for context-pack sections,
/// generalized here to the tool-result/system-prompt material the runner
/// feeds the model on every iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBudgetConfig {
    /// Max chars of a single tool result folded back into the prompt before
    /// it is truncated with a marker noting how much was cut.
    #[serde(default = "d_tool_result_max_chars")]
    pub tool_result_max_chars: usize,
    /// Max chars of the system prompt (persona + tool catalog + workspace
    /// summary) before trimming the least-recent additions.
    #[serde(default = "d_system_prompt_max_chars")]
    pub system_prompt_max_chars: usize,
}

impl Default for PromptBudgetConfig {
    fn default() -> Self {
        Self {
            tool_result_max_chars: d_tool_result_max_chars(),
            system_prompt_max_chars: d_system_prompt_max_chars(),
        }
    }
}

fn d_tool_result_max_chars() -> usize {
    20_000
}
fn d_system_prompt_max_chars() -> usize {
    24_000
}

/// Truncate `text` to at most `max_chars`, appending a marker noting how
/// many characters were cut. No-op when already within budget.
pub fn apply_char_cap(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    let cut = text.chars().count() - max_chars;
    format!("{truncated}\n…[truncated, {cut} more characters omitted]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(apply_char_cap("hello", 100), "hello");
    }

    #[test]
    fn long_text_is_truncated_with_marker() {
        let text = "a".repeat(50);
        let out = apply_char_cap(&text, 10);
        assert!(out.starts_with(&"a".repeat(10)));
        assert!(out.contains("40 more characters omitted"));
    }

    #[test]
    fn default_budget_values_are_positive() {
        let cfg = PromptBudgetConfig::default();
        assert!(cfg.tool_result_max_chars > 0);
        assert!(cfg.system_prompt_max_chars > 0);
    }
}
