//! Agent Runtime: wires the Model Router, Lane Queue, Tool Registry, and
//! Sandbox Executor into the ReAct loop that drives one turn at a time per
//! session.

pub mod adapters;
pub mod code_tool;
pub mod prompt;
pub mod runner;

pub use adapters::{AdapterContext, ContextAdapter, Retrieval};
pub use code_tool::RunCodeTool;
pub use runner::AgentRunner;
