//! Skill registry: discovers skills from sources, indexes them, and answers queries.
//!
//! Reads go through an immutable [`SkillIndex`] snapshot. Every mutation (discover,
//! register, reload) builds a new index off to the side and swaps it in, so a reader
//! holding a snapshot sees either the old index or the new one, never a mix. The
//! lock around the current snapshot is only held long enough to clone or replace
//! the `Arc`.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{InvocationError, OperationHandler, SkillDescriptor, Visibility};
use super::error::{LoadError, RegistryError};
use super::source::{SkillSource, UnitResult};
use crate::llm::ToolDefinition;

/// An operation ready to be offered to the model and called.
#[derive(Clone)]
pub struct BoundTool {
    /// Owning skill name.
    pub skill: String,
    pub definition: ToolDefinition,
    pub handler: Arc<dyn OperationHandler>,
}

impl BoundTool {
    pub fn name(&self) -> &str {
        &self.definition.function.name
    }

    pub fn invoke(&self, args: &serde_json::Value) -> Result<String, InvocationError> {
        self.handler.invoke(args)
    }
}

impl std::fmt::Debug for BoundTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTool")
            .field("skill", &self.skill)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Outcome of scanning one source.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Names of skills registered by this scan, in registration order.
    pub loaded: Vec<String>,
    /// Units that were skipped, with the reason.
    pub errors: Vec<LoadError>,
}

impl DiscoveryReport {
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Append another scan's results, keeping scan order.
    pub fn merge(&mut self, other: DiscoveryReport) {
        self.loaded.extend(other.loaded);
        self.errors.extend(other.errors);
    }
}

/// Immutable view of the registered skills.
#[derive(Debug, Clone, Default)]
pub struct SkillIndex {
    /// Registration order.
    skills: Vec<Arc<SkillDescriptor>>,
    by_name: HashMap<String, usize>,
    /// Operation name -> index of the owning skill.
    by_operation: HashMap<String, usize>,
}

impl SkillIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor. Skill names and operation names must both be unused.
    fn insert(&mut self, descriptor: SkillDescriptor) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(descriptor.operations.len());
        for op in descriptor.operation_names() {
            if let Some(&owner) = self.by_operation.get(op) {
                return Err(RegistryError::DuplicateOperation {
                    operation: op.to_string(),
                    owner: self.skills[owner].name.clone(),
                });
            }
            if seen.contains(&op) {
                return Err(RegistryError::DuplicateOperation {
                    operation: op.to_string(),
                    owner: descriptor.name.clone(),
                });
            }
            seen.push(op);
        }

        let idx = self.skills.len();
        self.by_name.insert(descriptor.name.clone(), idx);
        for op in descriptor.operation_names() {
            self.by_operation.insert(op.to_string(), idx);
        }
        self.skills.push(Arc::new(descriptor));
        Ok(())
    }

    /// Insert scanned units; conflicts and bad units become load errors, first registration wins.
    fn absorb(&mut self, units: Vec<UnitResult>) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for unit in units {
            match unit {
                Ok(descriptor) => {
                    let name = descriptor.name.clone();
                    let origin = if descriptor.origin.is_empty() {
                        name.clone()
                    } else {
                        descriptor.origin.clone()
                    };
                    match self.insert(descriptor) {
                        Ok(()) => {
                            log::debug!("registered skill {} from {}", name, origin);
                            report.loaded.push(name);
                        }
                        Err(e) => {
                            log::warn!("skipping skill {} from {}: {}", name, origin, e);
                            report.errors.push(LoadError::new(origin, e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    log::warn!("failed to load skill: {}", e);
                    report.errors.push(e);
                }
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Skill names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SkillDescriptor>> {
        self.skills.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<SkillDescriptor>> {
        self.by_name.get(name).map(|&i| &self.skills[i])
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<SkillDescriptor>, RegistryError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// The skill that owns an operation name.
    pub fn owner_of(&self, operation: &str) -> Option<&Arc<SkillDescriptor>> {
        self.by_operation.get(operation).map(|&i| &self.skills[i])
    }

    /// Search by case-insensitive substring of name/description and by tag intersection.
    ///
    /// With a query, a skill must match it (name scores 2, description 1). With tags, it
    /// must share at least one (1 point each). Results are ordered by score descending,
    /// then name ascending. No query and no tags returns everything in registration order.
    pub fn search<S: AsRef<str>>(&self, query: &str, tags: &[S]) -> Vec<Arc<SkillDescriptor>> {
        let query = query.trim().to_lowercase();
        let tags: Vec<String> = tags
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if query.is_empty() && tags.is_empty() {
            return self.skills.clone();
        }

        let mut scored: Vec<(usize, &Arc<SkillDescriptor>)> = Vec::new();
        for skill in &self.skills {
            let mut score = 0;
            if !query.is_empty() {
                let in_name = skill.name.to_lowercase().contains(&query);
                let in_desc = skill.description.to_lowercase().contains(&query);
                if !in_name && !in_desc {
                    continue;
                }
                score += if in_name { 2 } else { 0 } + if in_desc { 1 } else { 0 };
            }
            if !tags.is_empty() {
                let shared = tags.iter().filter(|t| skill.has_tag(t)).count();
                if shared == 0 {
                    continue;
                }
                score += shared;
            }
            scored.push((score, skill));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        scored.into_iter().map(|(_, s)| s.clone()).collect()
    }

    /// Skills whose visibility is in `allowed`, in registration order.
    pub fn list_visible(&self, allowed: &[Visibility]) -> Vec<Arc<SkillDescriptor>> {
        self.skills
            .iter()
            .filter(|s| allowed.contains(&s.visibility))
            .cloned()
            .collect()
    }

    /// Every operation of every skill, in registration then declaration order.
    pub fn all_tools(&self) -> Vec<BoundTool> {
        self.skills
            .iter()
            .flat_map(|s| {
                s.operations.iter().map(|op| BoundTool {
                    skill: s.name.clone(),
                    definition: op.to_tool_definition(),
                    handler: op.handler.clone(),
                })
            })
            .collect()
    }

    /// Tool definitions for the named skills, in the given order. Unknown names are skipped.
    pub fn tools_for<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.get(n.as_ref()))
            .flat_map(|s| s.to_tool_definitions())
            .collect()
    }

    /// Call an operation by name.
    pub fn invoke(&self, operation: &str, args: &serde_json::Value) -> Result<String, InvocationError> {
        let skill = self
            .owner_of(operation)
            .ok_or_else(|| InvocationError::UnknownTool(operation.to_string()))?;
        let op = skill
            .operation(operation)
            .ok_or_else(|| InvocationError::UnknownTool(operation.to_string()))?;
        op.handler.invoke(args)
    }
}

impl crate::agent::ToolExecutor for SkillIndex {
    fn execute(&self, name: &str, args: &serde_json::Value) -> Result<String, InvocationError> {
        self.invoke(name, args)
    }
}

/// Shared registry handle. Construct once at startup and pass around as `Arc<SkillRegistry>`.
#[derive(Default)]
pub struct SkillRegistry {
    current: RwLock<Arc<SkillIndex>>,
    /// Serializes writers so copy-on-write updates never drop each other's entries.
    writer: Mutex<()>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent read view of the current index.
    pub fn snapshot(&self) -> Arc<SkillIndex> {
        self.current.read().clone()
    }

    fn swap(&self, next: SkillIndex) {
        *self.current.write() = Arc::new(next);
    }

    /// Scan a source and add its skills to the registry.
    ///
    /// Per-unit failures and name conflicts are recorded in the report; only an
    /// unreachable source is an error, in which case the registry is unchanged.
    pub fn discover(&self, source: &dyn SkillSource) -> Result<DiscoveryReport, RegistryError> {
        let _guard = self.writer.lock();
        let units = source.scan()?;
        let mut next = (*self.snapshot()).clone();
        let report = next.absorb(units);
        self.swap(next);
        log::info!(
            "discovered {} skills from {} ({} skipped)",
            report.loaded_count(),
            source.label(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Replace the whole index with a fresh scan of `sources` (in order; first wins on conflicts).
    ///
    /// If any source is unreachable the current index is kept.
    pub fn reload(&self, sources: &[&dyn SkillSource]) -> Result<DiscoveryReport, RegistryError> {
        let _guard = self.writer.lock();
        let mut scans = Vec::with_capacity(sources.len());
        for source in sources {
            scans.push(source.scan()?);
        }
        let mut next = SkillIndex::new();
        let mut report = DiscoveryReport::default();
        for units in scans {
            report.merge(next.absorb(units));
        }
        self.swap(next);
        log::info!(
            "reloaded registry: {} skills ({} skipped)",
            report.loaded_count(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Register one descriptor. Fails rather than overwrite an existing name or operation.
    pub fn register(&self, descriptor: SkillDescriptor) -> Result<(), RegistryError> {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        let name = descriptor.name.clone();
        next.insert(descriptor)?;
        self.swap(next);
        log::debug!("registered skill {}", name);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<SkillDescriptor>, RegistryError> {
        self.snapshot().lookup(name)
    }

    pub fn search<S: AsRef<str>>(&self, query: &str, tags: &[S]) -> Vec<Arc<SkillDescriptor>> {
        self.snapshot().search(query, tags)
    }

    pub fn list_visible(&self, allowed: &[Visibility]) -> Vec<Arc<SkillDescriptor>> {
        self.snapshot().list_visible(allowed)
    }

    pub fn all_tools(&self) -> Vec<BoundTool> {
        self.snapshot().all_tools()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().names()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SkillRegistry({} skills)", self.len())
    }
}
