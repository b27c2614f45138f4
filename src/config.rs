use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User settings, read from `config.toml`. Every field has a default, so a
/// missing file is the same as an empty one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub owner: Option<String>,
    pub database_path: Option<PathBuf>,
    pub follow_up_days: i64,
    pub trend_weeks: usize,
    pub upcoming_limit: usize,
    pub follow_up_limit: usize,
    pub ai_model: String,
    pub ai_cache_ttl_secs: u64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: None,
            database_path: None,
            follow_up_days: 7,
            trend_weeks: 8,
            upcoming_limit: 5,
            follow_up_limit: 10,
            ai_model: "claude-sonnet".to_string(),
            ai_cache_ttl_secs: 600,
            log_filter: "applytrack=info".to_string(),
        }
    }
}

impl Config {
    /// `$APPLYTRACK_CONFIG` if set, else the platform config directory.
    pub fn path() -> Option<PathBuf> {
        match std::env::var_os("APPLYTRACK_CONFIG") {
            Some(path) => Some(PathBuf::from(path)),
            None => project_dirs().map(|dirs| dirs.config_dir().join("config.toml")),
        }
    }

    /// Runs before logging is set up, so it does not log.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return expand_home(path);
        }
        // Use XDG data directory or fallback
        match project_dirs() {
            Some(dirs) => dirs.data_dir().join("applytrack.db"),
            None => PathBuf::from("applytrack.db"),
        }
    }

    /// The owner every query is scoped to: `--owner`, then `APPLYTRACK_OWNER`,
    /// then the config file, then the login name.
    pub fn resolve_owner(&self, cli_override: Option<&str>) -> String {
        let env_owner = std::env::var("APPLYTRACK_OWNER").ok();
        let login = std::env::var("USER").ok();
        pick_owner([
            cli_override.map(str::to_string),
            env_owner,
            self.owner.clone(),
            login,
        ])
    }
}

fn pick_owner(candidates: [Option<String>; 4]) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(|owner| owner.trim().to_string())
        .find(|owner| !owner.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "applytrack")
}

/// Replaces a leading `~` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match directories::BaseDirs::new() {
            Some(base) => base.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
