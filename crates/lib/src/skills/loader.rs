//! Load skills from a directory: each skill is a subdirectory with SKILL.md (YAML frontmatter + markdown).
//! Skills with `metadata.requires.bins` are only loaded when all listed binaries are on PATH.
//! Operations come from the builtin catalog (`builtin: <key>` in the frontmatter) and/or
//! from `tools.json` in the skill directory.

use std::path::{Path, PathBuf};

use super::builtin;
use super::descriptor::{Operation, SkillDescriptor};
use super::error::{LoadError, RegistryError};
use super::manifest::{parse_frontmatter, SkillFrontmatter, ToolsManifest};
use super::source::{SkillSource, UnitResult};

/// A directory of skill units.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    /// Skill names to leave out even when present on disk.
    disabled: Vec<String>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            disabled: Vec::new(),
        }
    }

    pub fn with_disabled(mut self, disabled: Vec<String>) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SkillSource for DirectorySource {
    fn label(&self) -> String {
        self.dir.display().to_string()
    }

    fn scan(&self) -> Result<Vec<UnitResult>, RegistryError> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|e| RegistryError::SourceUnreachable {
            source_label: self.label(),
            reason: e.to_string(),
        })?;
        let mut dirs: Vec<PathBuf> = read_dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut out = Vec::new();
        for path in dirs {
            if !path.join("SKILL.md").exists() {
                log::debug!("no SKILL.md in {}, not a skill", path.display());
                continue;
            }
            let unit = load_unit(&path);
            if let Ok(d) = &unit {
                if self.disabled.iter().any(|n| n == &d.name) {
                    log::debug!("skipping disabled skill {}", d.name);
                    continue;
                }
            }
            out.push(unit);
        }
        Ok(out)
    }
}

/// Load one skill directory into a descriptor.
pub fn load_unit(path: &Path) -> UnitResult {
    let unit = path.display().to_string();
    let skill_md = path.join("SKILL.md");
    let content = std::fs::read_to_string(&skill_md)
        .map_err(|e| LoadError::new(&unit, format!("reading SKILL.md: {}", e)))?;
    let fm = parse_frontmatter(&content)
        .map_err(|e| LoadError::new(&unit, e))?
        .unwrap_or_default();

    let bins = fm.required_bins();
    if !bins.is_empty() {
        let missing: Vec<&String> = bins.iter().filter(|b| !bin_on_path(b)).collect();
        if !missing.is_empty() {
            return Err(LoadError::new(
                &unit,
                format!("required bins not on PATH: {:?}", missing),
            ));
        }
    }

    let mut base = match fm.builtin.as_deref() {
        Some(key) => builtin::descriptor(key)
            .ok_or_else(|| LoadError::new(&unit, format!("unknown builtin: {}", key)))?,
        None => SkillDescriptor::new(dir_name(path), ""),
    };

    let command_ops = load_command_operations(path).map_err(|e| LoadError::new(&unit, e))?;
    base.operations.extend(command_ops);
    if base.operations.is_empty() {
        return Err(LoadError::new(&unit, "no operations (set `builtin` or add tools.json)"));
    }

    let descriptor = apply_frontmatter(base, fm).with_origin(unit.clone());
    if descriptor.name.trim().is_empty() {
        return Err(LoadError::new(&unit, "empty skill name"));
    }
    Ok(descriptor)
}

/// Frontmatter fields override the base descriptor; absent fields keep the base values.
fn apply_frontmatter(base: SkillDescriptor, fm: SkillFrontmatter) -> SkillDescriptor {
    let mut d = base;
    if let Some(name) = fm.name {
        d.name = name.trim().to_string();
    }
    if let Some(desc) = fm.description {
        d.description = desc.trim().to_string();
    }
    if !fm.tags.is_empty() {
        d.tags.clear();
        d = d.with_tags(fm.tags);
    }
    if let Some(v) = fm.visibility {
        d.visibility = v;
    }
    if let Some(v) = fm.version {
        d.version = v;
    }
    if let Some(a) = fm.author {
        d.author = a;
    }
    if !fm.dependencies.is_empty() {
        d.dependencies = fm.dependencies;
    }
    d
}

/// If the skill directory contains tools.json, parse it into operations. Missing file yields none.
fn load_command_operations(skill_dir: &Path) -> Result<Vec<Operation>, String> {
    let path = skill_dir.join("tools.json");
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(format!("reading tools.json: {}", e)),
    };
    let manifest: ToolsManifest =
        serde_json::from_str(&content).map_err(|e| format!("parsing tools.json: {}", e))?;
    crate::tools::command_operations(&manifest)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Returns true if the given binary name is found on PATH (or has path separators and exists).
fn bin_on_path(bin: &str) -> bool {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(bin).is_file();
    }
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| {
        if dir.as_os_str().is_empty() {
            return false;
        }
        if dir.join(bin).is_file() {
            return true;
        }
        cfg!(windows) && dir.join(format!("{}.exe", bin)).is_file()
    })
}
