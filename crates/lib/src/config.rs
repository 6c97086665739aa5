//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.skillful/config.json`) and environment.
//! Every section is optional; a missing file means all defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::agent::DEFAULT_MAX_TURNS;
use crate::filter::{FilterConfig, KeywordPredicate, VisibilityFilter};
use crate::retention::RetentionMode;
use crate::skills::{
    builtin, BuiltinSource, DirectorySource, DiscoveryReport, SkillRegistry, SkillSource,
    Visibility,
};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Skill directories and the builtin catalog.
    #[serde(default)]
    pub skills: SkillsConfig,

    /// Retention policy for new sessions.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Per-turn skill filtering.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Agent defaults (model, round budget, workspace).
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Model server.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Skills load config (dirs, disabled list, builtins).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsConfig {
    /// Override the default skill root. Relative paths are resolved against the config file's parent. Omit to use the `skills` directory next to the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Extra skill directories, scanned after the primary one. On a name conflict the first skill found wins.
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
    /// Skill names to skip even when present in a directory or the builtin catalog.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Register the builtin catalog for any builtin not already provided by a skill directory. Default: true.
    #[serde(default = "default_true")]
    pub builtins: bool,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            extra_dirs: Vec::new(),
            disabled: Vec::new(),
            builtins: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionKind {
    #[default]
    Replace,
    Accumulate,
    Fifo,
}

impl FromStr for RetentionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(RetentionKind::Replace),
            "accumulate" => Ok(RetentionKind::Accumulate),
            "fifo" => Ok(RetentionKind::Fifo),
            other => Err(format!(
                "unknown retention mode {:?} (expected replace, accumulate or fifo)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    #[serde(default)]
    pub mode: RetentionKind,
    /// Entry bound for `fifo` (default 100). Ignored by the other modes.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            mode: RetentionKind::default(),
            capacity: default_capacity(),
        }
    }
}

impl RetentionConfig {
    pub fn to_mode(&self) -> RetentionMode {
        match self.mode {
            RetentionKind::Replace => RetentionMode::Replace,
            RetentionKind::Accumulate => RetentionMode::Accumulate,
            RetentionKind::Fifo => RetentionMode::Fifo {
                capacity: self.capacity,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateKind {
    /// Offer every allowed skill.
    #[default]
    None,
    /// Offer skills mentioned by the recent user messages.
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_allowed_visibilities")]
    pub allowed_visibilities: Vec<Visibility>,
    /// When false, skills of every visibility are allowed.
    #[serde(default = "default_true")]
    pub filter_by_visibility: bool,
    /// When the predicate matches nothing, offer the full allowed set instead of no tools.
    #[serde(default = "default_true")]
    pub fallback_to_allowed: bool,
    #[serde(default)]
    pub predicate: PredicateKind,
    /// Log the offered skills every round.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_visibilities: default_allowed_visibilities(),
            filter_by_visibility: true,
            fallback_to_allowed: true,
            predicate: PredicateKind::default(),
            verbose: false,
        }
    }
}

impl MiddlewareConfig {
    pub fn to_filter_config(&self) -> FilterConfig {
        FilterConfig {
            enabled: self.enabled,
            allowed_visibilities: if self.filter_by_visibility {
                self.allowed_visibilities.clone()
            } else {
                Visibility::ALL.to_vec()
            },
            fallback_to_allowed: self.fallback_to_allowed,
        }
    }

    pub fn build_filter(&self) -> VisibilityFilter {
        let filter = VisibilityFilter::new(self.to_filter_config());
        match self.predicate {
            PredicateKind::None => filter,
            PredicateKind::Keyword => filter.with_predicate(Arc::new(KeywordPredicate::default())),
        }
    }
}

/// Agent defaults (model, workspace, round budget).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsConfig {
    /// Default Ollama model: use the exact name from `ollama list` (e.g. "llama3.2:latest", "qwen3:8b"). Overridden by SKILLFUL_MODEL.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Model rounds per user turn (default 5).
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Workspace root holding AGENTS.md (default ~/.skillful/workspace).
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    /// Extra instructions appended to the generated system prompt. Takes precedence over AGENTS.md.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            max_turns: default_max_turns(),
            workspace: None,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Ollama base URL (default http://127.0.0.1:11434). Overridden by OLLAMA_HOST.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    100
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_allowed_visibilities() -> Vec<Visibility> {
    vec![Visibility::Public]
}

impl Config {
    /// Reject settings that cannot produce a working agent.
    pub fn validate(&self) -> Result<()> {
        if self.retention.mode == RetentionKind::Fifo && self.retention.capacity == 0 {
            bail!("retention.capacity must be at least 1 for fifo retention");
        }
        if self.agents.max_turns == 0 {
            bail!("agents.maxTurns must be at least 1");
        }
        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SKILLFUL_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".skillful").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Resolve workspace directory for agent context (AGENTS.md).
pub fn resolve_workspace_dir(config: &Config) -> Option<PathBuf> {
    config
        .agents
        .workspace
        .clone()
        .or_else(|| dirs::home_dir().map(|h| h.join(".skillful").join("workspace")))
}

/// Model name: env SKILLFUL_MODEL overrides config. Empty when neither is set.
pub fn resolve_model(config: &Config) -> String {
    env_non_empty("SKILLFUL_MODEL")
        .or_else(|| {
            config
                .agents
                .default_model
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Ollama base URL: env OLLAMA_HOST overrides config.
pub fn resolve_llm_base_url(config: &Config) -> Option<String> {
    env_non_empty("OLLAMA_HOST").or_else(|| {
        config
            .llm
            .base_url
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Load config from the given path, or the default path (or SKILLFUL_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Default skill root when no override is set: `skills` subdirectory of the config file's parent.
pub fn skills_dir(config_path: &Path) -> PathBuf {
    config_parent(config_path).join("skills")
}

/// Resolve the primary skill root: uses `config.skills.directory` if set (relative paths resolved against the config file's parent), otherwise the default `skills` subdirectory.
pub fn resolve_skills_dir(config: &Config, config_path: &Path) -> PathBuf {
    match &config.skills.directory {
        Some(d) if !d.as_os_str().is_empty() => resolve_relative(d, config_path),
        _ => skills_dir(config_path),
    }
}

fn resolve_relative(dir: &Path, config_path: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        config_parent(config_path).join(dir)
    }
}

/// All skill directories in scan order: the primary root, then `extraDirs`.
pub fn skill_dirs(config: &Config, config_path: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![resolve_skills_dir(config, config_path)];
    dirs.extend(
        config
            .skills
            .extra_dirs
            .iter()
            .map(|d| resolve_relative(d, config_path)),
    );
    dirs
}

/// Build the registry from the configured skill directories and the builtin catalog.
///
/// A missing skill directory is logged and skipped so the agent can still start on
/// builtins alone. Builtins are added only for catalog entries whose name and
/// operations are not already taken by a directory skill.
pub fn discover_skills(config: &Config, config_path: &Path) -> (SkillRegistry, DiscoveryReport) {
    let registry = SkillRegistry::new();
    let mut report = DiscoveryReport::default();
    for dir in skill_dirs(config, config_path) {
        let source = DirectorySource::new(&dir).with_disabled(config.skills.disabled.clone());
        match registry.discover(&source) {
            Ok(r) => report.merge(r),
            Err(e) => log::warn!("skipping skill directory: {}", e),
        }
    }

    if config.skills.builtins {
        let index = registry.snapshot();
        let taken: Vec<&str> = builtin::CATALOG
            .iter()
            .copied()
            .filter(|key| {
                index.contains(key)
                    || config.skills.disabled.iter().any(|d| d == key)
                    || builtin::operations(key)
                        .unwrap_or_default()
                        .iter()
                        .any(|op| index.owner_of(&op.name).is_some())
            })
            .collect();
        let source = BuiltinSource::new().without(taken);
        match registry.discover(&source) {
            Ok(r) => report.merge(r),
            Err(e) => log::warn!("skipping {}: {}", source.label(), e),
        }
    }
    (registry, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("skillful-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn defaults() {
        let c: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(c.retention.to_mode(), RetentionMode::Replace);
        assert_eq!(c.retention.capacity, 100);
        assert_eq!(c.agents.max_turns, 5);
        assert!(c.skills.builtins);
        assert!(c.middleware.enabled);
        assert!(c.middleware.fallback_to_allowed);
        assert_eq!(c.middleware.allowed_visibilities, vec![Visibility::Public]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parses_camel_case_sections() {
        let raw = r#"{
            "retention": {"mode": "fifo", "capacity": 3},
            "middleware": {"filterByVisibility": false, "predicate": "keyword", "fallbackToAllowed": false},
            "agents": {"maxTurns": 2, "systemPrompt": "Be brief."},
            "skills": {"extraDirs": ["more"], "disabled": ["example"], "builtins": false}
        }"#;
        let c: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(c.retention.to_mode(), RetentionMode::Fifo { capacity: 3 });
        let fc = c.middleware.to_filter_config();
        assert_eq!(fc.allowed_visibilities, Visibility::ALL.to_vec());
        assert!(!fc.fallback_to_allowed);
        assert_eq!(c.middleware.predicate, PredicateKind::Keyword);
        assert_eq!(c.agents.max_turns, 2);
        assert_eq!(c.agents.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(c.skills.disabled, vec!["example"]);
        assert!(!c.skills.builtins);
    }

    #[test]
    fn validate_rejects_zero_capacity_and_budget() {
        let mut c = Config::default();
        c.retention.mode = RetentionKind::Fifo;
        c.retention.capacity = 0;
        assert!(c.validate().is_err());
        c.retention.mode = RetentionKind::Accumulate;
        assert!(c.validate().is_ok());
        c.agents.max_turns = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn retention_kind_from_str() {
        assert_eq!("FIFO".parse::<RetentionKind>().unwrap(), RetentionKind::Fifo);
        assert!("lru".parse::<RetentionKind>().is_err());
    }

    #[test]
    fn resolve_skills_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.skillful/config.json");
        assert_eq!(
            resolve_skills_dir(&config, path),
            PathBuf::from("/home/user/.skillful/skills")
        );
    }

    #[test]
    fn resolve_skills_dir_override_relative() {
        let mut config = Config::default();
        config.skills.directory = Some(PathBuf::from("custom/skills"));
        config.skills.extra_dirs = vec![PathBuf::from("/opt/skills")];
        let path = Path::new("/home/user/.skillful/config.json");
        assert_eq!(
            skill_dirs(&config, path),
            vec![
                PathBuf::from("/home/user/.skillful/custom/skills"),
                PathBuf::from("/opt/skills")
            ]
        );
    }

    #[test]
    fn load_config_missing_file_is_default() {
        let path = temp_dir().join("config.json");
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(c.agents.max_turns, 5);

        std::fs::write(&path, "{ nope").unwrap();
        let err = load_config(Some(path)).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }

    #[test]
    fn discover_skills_fills_in_builtins() {
        let root = temp_dir();
        let calc = root.join("skills").join("calc");
        std::fs::create_dir_all(&calc).unwrap();
        std::fs::write(
            calc.join("SKILL.md"),
            "---\nname: calc\nbuiltin: calculator\ntags: [math]\n---\n",
        )
        .unwrap();
        let mut config = Config::default();
        config.skills.disabled = vec!["example".to_string()];
        config.skills.extra_dirs = vec![PathBuf::from("missing")];

        let (registry, report) = discover_skills(&config, &root.join("config.json"));
        // The calculator operation is owned by "calc", so the builtin is not added again.
        assert_eq!(registry.names(), vec!["calc", "text_processor", "time"]);
        assert!(report.errors.is_empty());
        assert_eq!(report.loaded_count(), 3);
        // Directory results come first, then the builtins.
        assert_eq!(report.loaded, vec!["calc", "text_processor", "time"]);
    }
}
