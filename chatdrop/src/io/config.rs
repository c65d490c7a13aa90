//! Configuration stored in `chatdrop.toml`.
//!
//! The core never parses configuration itself: the binary loads a
//! [`DropConfig`] here and turns it into engine/watch options.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file name, looked up in the target root.
pub const CONFIG_FILE_NAME: &str = "chatdrop.toml";

/// Default backup directory, relative to the target root.
pub const DEFAULT_BACKUP_DIR: &str = ".chatdrop-backup";

/// Default commit message for `--git-commit`.
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore(scaffold): import AI files";

/// Top-level configuration (TOML). Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DropConfig {
    /// Maximum number of files processed in parallel.
    pub concurrency: usize,
    pub backup: BackupConfig,
    pub validation: ValidationConfig,
    pub watch: WatchConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Backup root, relative to the target root unless absolute.
    pub dir: PathBuf,
    /// Age after which `backups prune` deletes a backup (e.g. `7d`, `12h`).
    pub retention: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    /// Wall-clock bound for a single validator invocation.
    pub timeout_secs: u64,
    pub validators: Vec<ValidatorConfig>,
}

/// One extension → external checker mapping.
///
/// An argument equal to `{path}` is replaced with the destination path; the
/// code is always piped on stdin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// File extension without the leading dot (case-sensitive).
    pub extension: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    pub auto_commit: bool,
    pub message: String,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            backup: BackupConfig::default(),
            validation: ValidationConfig::default(),
            watch: WatchConfig::default(),
            git: GitConfig::default(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            retention: "7d".to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            validators: Vec::new(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_commit: false,
            message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

impl DropConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be > 0"));
        }
        if self.validation.timeout_secs == 0 {
            return Err(anyhow!("validation.timeout_secs must be > 0"));
        }
        if self.watch.interval_secs == 0 {
            return Err(anyhow!("watch.interval_secs must be > 0"));
        }
        if self.git.message.trim().is_empty() {
            return Err(anyhow!("git.message must not be empty"));
        }
        crate::io::backup::parse_retention(&self.backup.retention)
            .context("backup.retention")?;
        for (idx, validator) in self.validation.validators.iter().enumerate() {
            if validator.extension.trim().is_empty() || validator.extension.starts_with('.') {
                return Err(anyhow!(
                    "validation.validators[{idx}].extension must be non-empty without a leading dot"
                ));
            }
            if validator.command.trim().is_empty() {
                return Err(anyhow!(
                    "validation.validators[{idx}].command must be non-empty"
                ));
            }
        }
        Ok(())
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation.timeout_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs)
    }

    /// Backup root resolved against `root`.
    pub fn backup_dir(&self, root: &Path) -> PathBuf {
        if self.backup.dir.is_absolute() {
            self.backup.dir.clone()
        } else {
            root.join(&self.backup.dir)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DropConfig::default()`.
pub fn load_config(path: &Path) -> Result<DropConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = DropConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DropConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), validators = cfg.validation.validators.len(), "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DropConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
