//! Configuration for the reconciliation engine.
//!
//! Loaded from `$ORC_CONFIG` or `~/.orc/config.toml`. A missing file is not an
//! error: every field has a default.

use crate::core::db;
use crate::core::error::OrcError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ORC_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrcConfig {
    pub paths: PathsConfig,
    pub git: GitConfig,
    pub tmux: TmuxConfig,
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for catalog, locks and (by default) gatehouses. Defaults to `~/.orc`.
    pub state_dir: Option<PathBuf>,
    /// Defaults to `~/src/worktrees`.
    pub workbenches_root: Option<PathBuf>,
    /// Defaults to `<state_dir>/gatehouses`.
    pub gatehouses_root: Option<PathBuf>,
    /// Defaults to `<state_dir>/orc.db`.
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Prefix for derived branch names: `<prefix>/<workbench-name>`.
    pub branch_prefix: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            branch_prefix: "orc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TmuxConfig {
    pub enabled: bool,
    pub base_index: u32,
    pub editor_command: String,
    pub agent_command: String,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_index: 1,
            editor_command: "vim".to_string(),
            agent_command: "orc connect".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SafetyConfig {
    pub unknown_dirty_blocks_delete: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            unknown_dirty_blocks_delete: true,
        }
    }
}

/// Resolved filesystem locations, with `~/` expanded and defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub state_dir: PathBuf,
    pub workbenches_root: PathBuf,
    pub gatehouses_root: PathBuf,
    pub catalog: PathBuf,
}

impl OrcConfig {
    pub fn resolve_paths(&self) -> Result<ResolvedPaths, OrcError> {
        let state_dir = match &self.paths.state_dir {
            Some(p) => expand_home(p)?,
            None => home_dir()?.join(".orc"),
        };
        let workbenches_root = match &self.paths.workbenches_root {
            Some(p) => expand_home(p)?,
            None => home_dir()?.join("src").join("worktrees"),
        };
        let gatehouses_root = match &self.paths.gatehouses_root {
            Some(p) => expand_home(p)?,
            None => state_dir.join("gatehouses"),
        };
        let catalog = match &self.paths.catalog {
            Some(p) => expand_home(p)?,
            None => db::catalog_db_path(&state_dir),
        };
        Ok(ResolvedPaths {
            state_dir,
            workbenches_root,
            gatehouses_root,
            catalog,
        })
    }
}

/// Load configuration from an explicit path, `$ORC_CONFIG`, or `~/.orc/config.toml`.
pub fn load_config(explicit: Option<&Path>) -> Result<OrcConfig, OrcError> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => match std::env::var_os(CONFIG_ENV) {
            Some(p) => Some(PathBuf::from(p)),
            None => home::home_dir().map(|h| h.join(".orc").join("config.toml")),
        },
    };

    let Some(path) = path else {
        return Ok(OrcConfig::default());
    };
    if !path.exists() {
        if explicit.is_some() {
            return Err(OrcError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(OrcConfig::default());
    }
    parse_config(&fs::read_to_string(&path)?)
}

pub fn parse_config(content: &str) -> Result<OrcConfig, OrcError> {
    let config: OrcConfig = toml::from_str(content)?;
    if config.git.branch_prefix.trim().is_empty() {
        return Err(OrcError::Config(
            "git.branch_prefix must not be empty".to_string(),
        ));
    }
    Ok(config)
}

fn home_dir() -> Result<PathBuf, OrcError> {
    home::home_dir().ok_or_else(|| OrcError::Config("cannot determine home directory".to_string()))
}

fn expand_home(p: &Path) -> Result<PathBuf, OrcError> {
    match p.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(p.to_path_buf()),
    }
}
