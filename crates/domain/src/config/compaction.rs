use serde::{Deserialize, Serialize};

/// Compaction collapses the oldest turns of a conversation log into a
/// summary message once the tail grows past a budget, so the prompt sent to
/// the model stays within its context window. The cut point is chosen by
/// turn count rather than a token estimate — grounded on the observation
/// that turn count is cheap to track incrementally while a token estimate
/// would need re-tokenizing the tail on every append; `keep_last_turns`
/// gives the same practical effect as a token budget for any reasonably
/// uniform conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Enable automatic compaction once `max_turns` is exceeded.
    #[serde(default = "d_true")]
    pub auto: bool,
    /// Turn count above which auto-compaction triggers.
    #[serde(default = "d_80")]
    pub max_turns: usize,
    /// Turns kept verbatim after compaction; everything older is summarized
    /// and archived, never discarded.
    #[serde(default = "d_12")]
    pub keep_last_turns: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto: true,
            max_turns: 80,
            keep_last_turns: 12,
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_80() -> usize {
    80
}
fn d_12() -> usize {
    12
}
