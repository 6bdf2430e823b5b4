use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::git::GitCli;
use crate::squash::DEFAULT_BACKUP_PREFIX;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub locks: LocksConfig,
    #[serde(default)]
    pub squash: SquashConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding lock records and logs. A relative path is taken
    /// from the repository's common git directory, so every worktree of the
    /// repository shares it and it never shows up as untracked content.
    #[serde(default = "default_state_dir")]
    pub state: String,
}

fn default_state_dir() -> String {
    "lanekeeper".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
    /// Remote inspected when reporting who else is working on an issue
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquashConfig {
    #[serde(default = "default_backup_prefix")]
    pub backup_prefix: String,
}

fn default_backup_prefix() -> String {
    DEFAULT_BACKUP_PREFIX.to_string()
}

impl Default for SquashConfig {
    fn default() -> Self {
        Self {
            backup_prefix: default_backup_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Remove the task worktree and branch after a successful merge
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

fn default_cleanup() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            cleanup: default_cleanup(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs under `<state>/logs/` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Project config, relative to the working directory
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".lanekeeper/config.toml")
    }

    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults_json = serde_json::to_string(&Config::default())
            .context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lanekeeper").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit --config must exist
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LANEKEEPER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Resolve the state directory.
    ///
    /// `git` is only consulted when `paths.state` is relative; an absolute
    /// path works without a repository or a git binary.
    pub fn state_paths(&self, git: &GitCli<'_>) -> Result<StatePaths> {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            return Ok(StatePaths { root: path });
        }

        let common = git.common_dir().with_context(|| {
            format!(
                "Cannot locate the shared git directory from {}; \
                 run inside a repository or set paths.state to an absolute path",
                git.dir().display()
            )
        })?;
        Ok(StatePaths {
            root: common.join(path),
        })
    }
}

/// Resolved state directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn locks(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("logs")
    }
}
