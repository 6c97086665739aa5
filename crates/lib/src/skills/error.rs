//! Registry and discovery errors.

use std::fmt;

/// A single unit of a skill source that could not be loaded. Non-fatal: discovery records it and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// Identifies the unit (directory path, or `builtin:<key>`).
    pub unit: String,
    pub reason: String,
}

impl LoadError {
    pub fn new(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.unit, self.reason)
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("skill source unreachable: {source_label}: {reason}")]
    SourceUnreachable { source_label: String, reason: String },
    #[error("skill already registered: {0}")]
    DuplicateName(String),
    #[error("operation {operation} already provided by skill {owner}")]
    DuplicateOperation { operation: String, owner: String },
    #[error("skill not found: {0}")]
    NotFound(String),
}
