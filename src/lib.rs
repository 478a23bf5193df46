//! Trackforge - Declarative, phase-based track policies for media files
//!
//! This library crate exposes the application config and snapshot loading used
//! by the `trackforge` binary, and re-exports the workspace crates.

pub mod config;
pub mod snapshot;

pub use trackforge_common as common;
pub use trackforge_rules as rules;
pub use trackforge_workflow as workflow;
