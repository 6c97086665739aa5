//! Skills: named capability units exposing operations a model can call.
//!
//! Skills are discovered from sources (skill directories with SKILL.md, the compiled-in
//! builtin catalog, or descriptors built in code) and held by a [`SkillRegistry`].
//! Directory skills bind operations either to a builtin handler set or to allowlisted
//! commands declared in the skill's `tools.json`.

pub mod builtin;
mod descriptor;
mod error;
mod loader;
mod manifest;
mod registry;
mod source;

pub use builtin::BuiltinSource;
pub use descriptor::{
    InvocationError, Operation, OperationHandler, SkillDescriptor, Visibility,
};
pub use error::{LoadError, RegistryError};
pub use loader::{load_unit, DirectorySource};
pub use manifest::{
    parse_frontmatter, ArgKind, ArgMapping, ExecutionSpec, SkillFrontmatter, ToolSpec,
    ToolsManifest,
};
pub use registry::{BoundTool, DiscoveryReport, SkillIndex, SkillRegistry};
pub use source::{SkillSource, StaticSource, UnitResult};
