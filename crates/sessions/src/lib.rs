//! Session State & Conversation Log.
//!
//! A process-wide registry of [`Session`] records, each owning its dataset
//! table, append-only conversation log, and per-turn cancellation token.

pub mod log;
pub mod session;
pub mod store;

pub use log::{CompactionResult, ConversationLog};
pub use session::Session;
pub use store::SessionStore;
