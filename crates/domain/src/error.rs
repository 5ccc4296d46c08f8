/// Shared error type used across the agent runtime crates.
///
/// Each variant maps 1:1 onto an `error_kind` string surfaced in a tool
/// envelope's `metadata.error_kind` or an `error` event's classification
/// field — see [`Error::error_kind`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    /// Sandbox static policy check rejected a snippet before it was spawned.
    #[error("policy violation: {reason}")]
    Policy {
        reason: String,
        line: Option<u32>,
        token: Option<String>,
    },

    /// Sandbox subprocess exceeded its wall-clock budget.
    #[error("sandbox timeout: {0}")]
    SandboxTimeout(String),

    /// Sandbox subprocess exceeded its address-space ceiling.
    #[error("memory limit exceeded ({limit_bytes} bytes)")]
    MemoryExceeded { limit_bytes: u64 },

    /// Sandbox subprocess exited non-zero.
    #[error("runtime failure (exit {exit_code:?}): {stderr}")]
    RuntimeFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Sandbox produced a result file that did not parse.
    #[error("output parse error: {0}")]
    OutputParseError(String),

    /// Tool argument validation or dispatch failed before `execute` ran.
    #[error("tool invocation error: {0}")]
    ToolInvocation(String),

    /// Provider reported a quota/billing failure.
    #[error("quota exhausted for {provider}: {message}")]
    Quota { provider: String, message: String },

    /// Provider reported a rate-limit failure.
    #[error("rate limited by {provider}: {message}")]
    RateLimit { provider: String, message: String },

    /// Provider reported the prompt exceeded its context window.
    #[error("context overflow: {0}")]
    ContextOverflow(String),

    /// The session's cancellation token was observed.
    #[error("cancelled")]
    Cancelled,

    /// Anything else unexpected — logged with detail, surfaced sanitized.
    #[error("internal: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short classification string used in `metadata.error_kind` and in the
    /// `error` event's classification field.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Provider { .. } => "provider",
            Error::Config(_) => "config",
            Error::Auth(_) => "auth",
            Error::Policy { .. } => "policy",
            Error::SandboxTimeout(_) => "timeout",
            Error::MemoryExceeded { .. } => "memory_exceeded",
            Error::RuntimeFailure { .. } => "runtime_failure",
            Error::OutputParseError(_) => "output_parse_error",
            Error::ToolInvocation(_) => "tool_invocation",
            Error::Quota { .. } => "quota",
            Error::RateLimit { .. } => "rate_limit",
            Error::ContextOverflow(_) => "context_overflow",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal",
            Error::Other(_) => "internal",
        }
    }

    /// Whether a failed provider call should trigger failover to the next
    /// route entry rather than being surfaced immediately.
    pub fn is_retriable_provider_error(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Http(_) => true,
            Error::Quota { .. } => true,
            Error::RateLimit { .. } => true,
            Error::Provider { message, .. } => {
                message.contains("HTTP 500")
                    || message.contains("HTTP 502")
                    || message.contains("HTTP 503")
                    || message.contains("HTTP 504")
                    || message.contains("HTTP 529")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_matches_policy() {
        let e = Error::Policy {
            reason: "banned import".into(),
            line: Some(1),
            token: Some("os".into()),
        };
        assert_eq!(e.error_kind(), "policy");
    }

    #[test]
    fn retriable_provider_5xx() {
        let e = Error::Provider {
            provider: "p1".into(),
            message: "HTTP 503 - service unavailable".into(),
        };
        assert!(e.is_retriable_provider_error());
    }

    #[test]
    fn non_retriable_provider_4xx() {
        let e = Error::Provider {
            provider: "p1".into(),
            message: "HTTP 400 - bad request".into(),
        };
        assert!(!e.is_retriable_provider_error());
    }

    #[test]
    fn cancelled_is_not_retriable() {
        assert!(!Error::Cancelled.is_retriable_provider_error());
    }
}
