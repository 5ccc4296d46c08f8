//! Tool Contract & Registry: the uniform async tool interface, a
//! name-keyed registry, and the handful of built-in tools that operate on
//! session state alone.

pub mod builtin;
pub mod registry;

pub use builtin::ListDatasetsTool;
pub use registry::{Tool, ToolRegistry};
