//! Initialize the configuration directory: config file, workspace with AGENTS.md, and bundled skills.
//!
//! Layout mirrors `crates/lib/config/`: `config/skills/` → `~/.skillful/skills/`,
//! `config/workspace/AGENTS.md` → `~/.skillful/workspace/AGENTS.md`.

use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use std::path::{Path, PathBuf};

use crate::config;

static BUNDLED_SKILLS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/config/skills");
static DEFAULT_AGENT_CTX: &str = include_str!("../config/workspace/AGENTS.md");

/// What `init_config_dir` did.
#[derive(Debug, Clone, Default)]
pub struct InitSummary {
    pub config_dir: PathBuf,
    /// Files and directories created by this run (existing ones are left alone).
    pub created: Vec<PathBuf>,
}

/// Names of the skills bundled with the binary.
pub fn bundled_skill_names() -> Vec<String> {
    BUNDLED_SKILLS
        .dirs()
        .filter_map(|d| d.path().file_name())
        .filter_map(|n| n.to_str())
        .map(str::to_string)
        .collect()
}

/// Ensure the configuration directory has been initialized (config file and skills directory exist).
pub fn require_initialized(config_path: &Path, config: &config::Config) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `skillful init` first (config file not found: {})",
            config_path.display()
        );
    }
    let skills_dir = config::resolve_skills_dir(config, config_path);
    if !skills_dir.exists() {
        anyhow::bail!(
            "configuration not initialized; run `skillful init` first (skills directory not found: {})",
            skills_dir.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Writes `config.json` with `{}` if missing (every section falls back to defaults).
/// - Creates `workspace/` and seeds `AGENTS.md` if missing.
/// - Extracts the bundled skills into `skills/` if that directory does not exist.
pub fn init_config_dir(config_path: &Path) -> Result<InitSummary> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;
    let mut summary = InitSummary {
        config_dir: config_dir.to_path_buf(),
        created: Vec::new(),
    };

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
        summary.created.push(config_path.to_path_buf());
    }

    let workspace = config_dir.join("workspace");
    if !workspace.exists() {
        std::fs::create_dir_all(&workspace)
            .with_context(|| format!("creating workspace directory {}", workspace.display()))?;
        summary.created.push(workspace.clone());
    }
    let workspace_agents = workspace.join("AGENTS.md");
    if !workspace_agents.exists() {
        std::fs::write(&workspace_agents, DEFAULT_AGENT_CTX)
            .with_context(|| format!("writing default AGENTS.md to {}", workspace_agents.display()))?;
        log::info!("wrote default AGENTS.md to {}", workspace_agents.display());
        summary.created.push(workspace_agents);
    }

    let skills_dir = config_dir.join("skills");
    if !skills_dir.exists() {
        std::fs::create_dir_all(&skills_dir)
            .with_context(|| format!("creating skills directory {}", skills_dir.display()))?;
        BUNDLED_SKILLS
            .extract(&skills_dir)
            .with_context(|| format!("extracting bundled skills to {}", skills_dir.display()))?;
        log::info!("extracted bundled skills to {}", skills_dir.display());
        summary.created.push(skills_dir);
    } else {
        log::debug!("skills directory already exists at {}, skipping", skills_dir.display());
    }

    Ok(summary)
}
