//! Command-backed operations driven by a skill's tools.json (allowlist + execution mapping).

mod command;

pub use command::{build_argv, command_operations, CommandOperation};
