//! Skillful core library: skill registry, retention stores, per-turn visibility
//! filtering, and the agent loop that ties them to a tool-calling model.

pub mod agent;
pub mod config;
pub mod exec;
pub mod filter;
pub mod init;
pub mod llm;
pub mod prompt;
pub mod retention;
pub mod session;
pub mod skills;
pub mod tools;
