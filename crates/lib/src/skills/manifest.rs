//! On-disk skill manifests: SKILL.md frontmatter and the optional tools.json.
//!
//! SKILL.md carries the descriptor metadata (name, description, tags, visibility, ...)
//! and may bind the skill to a compiled-in handler set via `builtin`. tools.json
//! declares command-backed operations: tool definitions, an allowlist, and how each
//! tool's JSON arguments become argv.

use serde::Deserialize;
use std::collections::HashMap;

use super::descriptor::Visibility;

/// Frontmatter parsed from SKILL.md.
#[derive(Debug, Default, Deserialize)]
pub struct SkillFrontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Key into the builtin handler catalog (e.g. "calculator").
    #[serde(default)]
    pub builtin: Option<String>,
    #[serde(default)]
    pub metadata: Option<SkillMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkillMetadata {
    #[serde(default)]
    pub requires: Option<Requires>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Requires {
    #[serde(default)]
    pub bins: Option<Vec<String>>,
}

impl SkillFrontmatter {
    pub fn required_bins(&self) -> &[String] {
        self.metadata
            .as_ref()
            .and_then(|m| m.requires.as_ref())
            .and_then(|r| r.bins.as_deref())
            .unwrap_or(&[])
    }
}

/// Split SKILL.md into its YAML frontmatter and parse it.
///
/// Returns `Ok(None)` when the file has no frontmatter block, and an error string when
/// the block is present but is not valid YAML for [`SkillFrontmatter`].
pub fn parse_frontmatter(content: &str) -> Result<Option<SkillFrontmatter>, String> {
    let Some(rest) = content.strip_prefix("---") else {
        return Ok(None);
    };
    let Some(end) = rest.find("\n---") else {
        return Err("unterminated frontmatter block".to_string());
    };
    let yaml = rest[..end].trim();
    if yaml.is_empty() {
        return Ok(Some(SkillFrontmatter::default()));
    }
    serde_yaml::from_str::<SkillFrontmatter>(yaml)
        .map(Some)
        .map_err(|e| format!("invalid frontmatter: {}", e))
}

/// Root structure of a skill's tools.json file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolsManifest {
    /// Tool definitions for the LLM (name, description, parameters schema).
    #[serde(default)]
    pub tools: Vec<ToolSpec>,

    /// Allowlist: binary name -> allowed subcommands. Only these (binary, subcommand) pairs may be run.
    #[serde(default)]
    pub allowlist: HashMap<String, Vec<String>>,

    /// Per-tool execution: how to run each tool (binary, subcommand, arg mapping).
    #[serde(default)]
    pub execution: Vec<ExecutionSpec>,
}

/// One tool as exposed to the LLM.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON schema for parameters (type, properties, required, etc.).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// How to execute one tool: which binary/subcommand and how to map JSON params to argv.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionSpec {
    /// Tool name (must match a name in `tools`).
    pub tool: String,
    pub binary: String,
    /// Must be in the allowlist for this binary.
    pub subcommand: String,
    #[serde(default)]
    pub args: Vec<ArgMapping>,
}

/// How one JSON parameter is passed to the CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArgMapping {
    pub param: String,
    #[serde(default)]
    pub kind: ArgKind,
    /// For kind "flag", the flag name (e.g. "content" -> --content). If absent, uses param.
    #[serde(default)]
    pub flag: Option<String>,
    /// For kind "flagIfBoolean", the flag to emit when the param value is true.
    #[serde(default)]
    pub flag_if_true: Option<String>,
    /// For kind "flagIfBoolean", the flag to emit when the param value is false.
    #[serde(default)]
    pub flag_if_false: Option<String>,
    /// When true, string values have literal `\n` and `\t` converted to newlines and tabs.
    #[serde(default)]
    pub normalize_newlines: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgKind {
    /// Pass the value as a single positional argument.
    #[default]
    Positional,
    /// Pass as --flag value. Uses `flag` if set, else `param`.
    Flag,
    /// Param is boolean: emit `flag_if_true` when true, `flag_if_false` when false.
    FlagIfBoolean,
}

impl ToolsManifest {
    /// Build an exec::Allowlist from the manifest's allowlist map.
    pub fn to_allowlist(&self) -> crate::exec::Allowlist {
        let mut a = crate::exec::Allowlist::new();
        for (binary, subcommands) in &self.allowlist {
            a.allow_subcommands(binary.clone(), subcommands.clone());
        }
        a
    }

    /// Check that every execution entry names a declared tool and an allowlisted subcommand.
    pub fn validate(&self) -> Result<(), String> {
        for spec in &self.execution {
            if !self.tools.iter().any(|t| t.name == spec.tool) {
                return Err(format!("execution entry for undeclared tool {}", spec.tool));
            }
            let allowed = self
                .allowlist
                .get(&spec.binary)
                .is_some_and(|subs| subs.iter().any(|s| s == &spec.subcommand));
            if !allowed {
                return Err(format!(
                    "tool {} runs {} {} which is not allowlisted",
                    spec.tool, spec.binary, spec.subcommand
                ));
            }
        }
        for tool in &self.tools {
            if !self.execution.iter().any(|e| e.tool == tool.name) {
                return Err(format!("tool {} has no execution entry", tool.name));
            }
        }
        Ok(())
    }
}
