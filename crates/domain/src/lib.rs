//! Shared types for the agent runtime: the conversation/event data model,
//! the error taxonomy, provider capability descriptors, and configuration.
//!
//! Every other crate in the workspace depends on this one and none of its
//! types depend back out, so it stays free of tokio/reqwest/etc.

pub mod cancel;
pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod tool;
pub mod trace;

pub use error::{Error, Result};
