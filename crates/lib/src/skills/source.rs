//! Skill sources: anything the registry can scan for skill units.

use super::descriptor::SkillDescriptor;
use super::error::{LoadError, RegistryError};

/// Result of scanning one unit: a descriptor, or the reason it was skipped.
pub type UnitResult = Result<SkillDescriptor, LoadError>;

/// A discoverable collection of skill units.
///
/// `scan` fails only when the source as a whole cannot be read. Per-unit problems are
/// returned as `Err` entries so the registry can record them and keep going. Units
/// must come back in a stable order; on name conflicts the first unit wins.
pub trait SkillSource: Send + Sync {
    /// Human-readable label used in logs and errors.
    fn label(&self) -> String;

    fn scan(&self) -> Result<Vec<UnitResult>, RegistryError>;
}

/// A fixed list of descriptors, e.g. built programmatically by an embedding application.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    label: String,
    units: Vec<SkillDescriptor>,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, units: Vec<SkillDescriptor>) -> Self {
        Self {
            label: label.into(),
            units,
        }
    }
}

impl SkillSource for StaticSource {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn scan(&self) -> Result<Vec<UnitResult>, RegistryError> {
        Ok(self.units.iter().cloned().map(Ok).collect())
    }
}
