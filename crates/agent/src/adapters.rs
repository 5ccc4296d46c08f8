//! External Adapter Contracts: the narrow interface knowledge, intent,
//! profile, and title-generator modules are consumed through. None of
//! those modules live in this crate — only the contract and its
//! graceful-degradation behavior do.

use async_trait::async_trait;
use sa_sessions::Session;

/// One piece of retrieved context surfaced to the user alongside the
/// assistant's answer (a citation, a matched memory, a profile fact).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Retrieval {
    pub source: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// What an adapter contributes to one turn's prompt.
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub system_fragments: Vec<String>,
    pub retrievals: Vec<Retrieval>,
}

/// A source of turn-scoped context external to the core runtime — a
/// knowledge base, an intent classifier, a user profile store, whatever a
/// deployment wires in. Adapters are consulted on every iteration's prompt
/// assembly; a failing adapter never aborts the turn.
#[async_trait]
pub trait ContextAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn get_context(&self, session: &Session, query: &str) -> sa_domain::error::Result<AdapterContext>;
}

/// Run every adapter, logging and dropping any that fail rather than
/// letting one bad adapter take down the turn.
pub async fn collect_context(adapters: &[std::sync::Arc<dyn ContextAdapter>], session: &Session, query: &str) -> AdapterContext {
    let mut out = AdapterContext::default();
    for adapter in adapters {
        match adapter.get_context(session, query).await {
            Ok(mut ctx) => {
                out.system_fragments.append(&mut ctx.system_fragments);
                out.retrievals.append(&mut ctx.retrievals);
            }
            Err(e) => {
                tracing::warn!(adapter = adapter.name(), error = %e, "context adapter failed, continuing without it");
            }
        }
    }
    out
}
