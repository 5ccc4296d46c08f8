use serde::{Deserialize, Serialize};

/// Configuration for the Agent Runner's ReAct loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Iteration cap for a single `run()` call. 0 means unbounded — the loop
    /// still ends on a terminal event or cancellation.
    #[serde(default)]
    pub max_iterations: u32,
    #[serde(default = "d_llm_temperature")]
    pub llm_temperature: f32,
    #[serde(default = "d_llm_max_tokens")]
    pub llm_max_tokens: u32,
    #[serde(default = "d_llm_max_retries")]
    pub llm_max_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            llm_temperature: d_llm_temperature(),
            llm_max_tokens: d_llm_max_tokens(),
            llm_max_retries: d_llm_max_retries(),
        }
    }
}

fn d_llm_temperature() -> f32 {
    0.2
}
fn d_llm_max_tokens() -> u32 {
    4096
}
fn d_llm_max_retries() -> u32 {
    2
}

impl RunnerConfig {
    /// `false` once `max_iterations` is set and `iteration` has reached it.
    /// `iteration` is 1-based (the count of iterations already completed).
    pub fn allows_iteration(&self, iteration: u32) -> bool {
        self.max_iterations == 0 || iteration <= self.max_iterations
    }
}
