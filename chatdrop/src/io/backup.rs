//! Pre-write safety copies.
//!
//! An existing destination is renamed (never copied) into the backup root as
//! `<backup_root>/<relative path>.<UTC stamp>.backup`. The rename either fully
//! happens or leaves the original untouched. Backups are never deleted by a
//! pipeline run; only [`BackupManager::prune`] removes them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::types::BackupRecord;
use crate::error::{DropError, DropResult};

const BACKUP_SUFFIX: &str = ".backup";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Moves files aside before they are overwritten.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    backup_root: PathBuf,
}

/// A backup found on disk by [`BackupManager::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// Original path relative to the target root.
    pub original: String,
    pub backup_path: PathBuf,
    pub created: DateTime<Utc>,
    pub bytes: u64,
}

impl BackupManager {
    /// `root` is the target root destination paths are relative to.
    pub fn new(root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_root: backup_root.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Move `relative` (below the target root) into the backup root.
    ///
    /// Returns `Ok(None)` when there is nothing to back up.
    #[instrument(skip(self))]
    pub fn backup(&self, relative: &str) -> DropResult<Option<BackupRecord>> {
        let original = self.root.join(relative);
        match fs::symlink_metadata(&original) {
            Ok(meta) if meta.is_dir() => {
                return Err(DropError::backup_failed(&original, "destination is a directory"));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DropError::backup_failed(&original, e)),
        }

        let now = Utc::now();
        let stamp = now.format(STAMP_FORMAT).to_string();
        let backup_path = self.unique_backup_path(relative, &stamp);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DropError::backup_failed(&original, e))?;
        }
        fs::rename(&original, &backup_path).map_err(|e| DropError::backup_failed(&original, e))?;

        debug!(backup = %backup_path.display(), "moved existing file aside");
        Ok(Some(BackupRecord {
            original_path: original,
            backup_path,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
    }

    fn unique_backup_path(&self, relative: &str, stamp: &str) -> PathBuf {
        let mut candidate = self
            .backup_root
            .join(format!("{relative}.{stamp}{BACKUP_SUFFIX}"));
        let mut n = 1u32;
        while candidate.exists() {
            candidate = self
                .backup_root
                .join(format!("{relative}.{stamp}-{n}{BACKUP_SUFFIX}"));
            n += 1;
        }
        candidate
    }

    /// All backups under the backup root, newest first.
    ///
    /// Files whose names do not follow the backup naming scheme are ignored.
    pub fn list(&self) -> DropResult<Vec<BackupEntry>> {
        if !self.backup_root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.backup_root) {
            let entry = entry.map_err(|e| DropError::backup_failed(&self.backup_root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.backup_root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            let Some((original, created)) = parse_backup_name(&rel) else {
                continue;
            };
            let bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            entries.push(BackupEntry {
                original,
                backup_path: entry.path().to_path_buf(),
                created,
                bytes,
            });
        }
        entries.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| a.original.cmp(&b.original))
        });
        Ok(entries)
    }

    /// Delete backups created more than `retention` before `now`.
    ///
    /// Returns the removed entries. A file that cannot be removed is logged
    /// and left in place.
    #[instrument(skip(self, now))]
    pub fn prune(&self, retention: Duration, now: DateTime<Utc>) -> DropResult<Vec<BackupEntry>> {
        let retention = chrono::Duration::from_std(retention).map_err(|e| DropError::Config {
            reason: format!("retention out of range: {e}"),
        })?;
        let cutoff = now - retention;
        let mut removed = Vec::new();
        for entry in self.list()? {
            if entry.created >= cutoff {
                continue;
            }
            match fs::remove_file(&entry.backup_path) {
                Ok(()) => removed.push(entry),
                Err(e) => {
                    warn!(path = %entry.backup_path.display(), err = %e, "failed to remove backup")
                }
            }
        }
        info!(removed = removed.len(), "pruned backups");
        Ok(removed)
    }
}

/// Split `<original>.<stamp>[-n].backup` into the original path and its stamp.
fn parse_backup_name(rel: &str) -> Option<(String, DateTime<Utc>)> {
    let stem = rel.strip_suffix(BACKUP_SUFFIX)?;
    let (original, stamp) = stem.rsplit_once('.')?;
    let stamp = stamp.split_once('-').map_or(stamp, |(s, _)| s);
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    if original.is_empty() {
        return None;
    }
    Some((original.to_string(), naive.and_utc()))
}

/// Parse a retention such as `7d`, `12h`, `30m`, `45s` or `2w`.
pub fn parse_retention(raw: &str) -> DropResult<Duration> {
    let raw = raw.trim();
    let invalid = || DropError::Config {
        reason: format!("invalid retention '{raw}' (expected e.g. 7d, 12h, 30m)"),
    };
    let split = raw.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    if value == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(value.saturating_mul(secs_per_unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(root: &Path) -> BackupManager {
        BackupManager::new(root, root.join(".chatdrop-backup"))
    }

    #[test]
    fn missing_file_is_a_no_op() {
        let temp = tempfile::tempdir().expect("tempdir");
        let record = manager(temp.path()).backup("nope/a.go").expect("backup");
        assert!(record.is_none());
        assert!(!temp.path().join(".chatdrop-backup").exists());
    }

    #[test]
    fn existing_file_is_moved_under_backup_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dest = temp.path().join("pkg/a.go");
        fs::create_dir_all(dest.parent().expect("parent")).expect("mkdir");
        fs::write(&dest, "old").expect("write");

        let record = manager(temp.path())
            .backup("pkg/a.go")
            .expect("backup")
            .expect("record");

        assert!(!dest.exists());
        assert_eq!(record.original_path, dest);
        assert!(record.backup_path.starts_with(temp.path().join(".chatdrop-backup/pkg")));
        assert!(record.backup_path.to_string_lossy().ends_with(".backup"));
        assert_eq!(fs::read_to_string(&record.backup_path).expect("read"), "old");
    }

    #[test]
    fn repeated_backups_get_distinct_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mgr = manager(temp.path());
        let dest = temp.path().join("a.txt");
        let mut seen = Vec::new();
        for i in 0..3 {
            fs::write(&dest, format!("v{i}")).expect("write");
            let record = mgr.backup("a.txt").expect("backup").expect("record");
            assert!(!seen.contains(&record.backup_path));
            seen.push(record.backup_path);
        }
        let listed = mgr.list().expect("list");
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|e| e.original == "a.txt"));
    }

    #[test]
    fn directory_destination_fails_without_moving() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        let err = manager(temp.path()).backup("src").unwrap_err();
        assert!(matches!(err, DropError::BackupFailed { .. }));
        assert!(temp.path().join("src").is_dir());
    }

    #[test]
    fn prune_removes_only_expired_backups() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mgr = manager(temp.path());
        let root = mgr.backup_root().to_path_buf();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::write(root.join("src/old.rs.20200101T000000000Z.backup"), "x").expect("write");
        fs::write(root.join("src/new.rs.20300101T000000000Z.backup"), "y").expect("write");
        fs::write(root.join("README"), "not a backup").expect("write");

        let now = DateTime::parse_from_rfc3339("2029-12-31T00:00:00Z")
            .expect("parse")
            .with_timezone(&Utc);
        let removed = mgr
            .prune(parse_retention("7d").expect("retention"), now)
            .expect("prune");

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].original, "src/old.rs");
        assert!(root.join("src/new.rs.20300101T000000000Z.backup").exists());
        assert!(root.join("README").exists());
    }

    #[test]
    fn parse_backup_name_handles_collision_suffix() {
        let (original, created) =
            parse_backup_name("a/b.go.20240102T030405006Z-2.backup").expect("parse");
        assert_eq!(original, "a/b.go");
        assert_eq!(created.to_rfc3339(), "2024-01-02T03:04:05.006+00:00");
        assert!(parse_backup_name("a/b.go").is_none());
    }

    #[test]
    fn parse_retention_units() {
        assert_eq!(parse_retention("45s").expect("s"), Duration::from_secs(45));
        assert_eq!(parse_retention("12h").expect("h"), Duration::from_secs(43_200));
        assert_eq!(parse_retention(" 7d ").expect("d"), Duration::from_secs(604_800));
        assert!(parse_retention("0d").is_err());
        assert!(parse_retention("7").is_err());
        assert!(parse_retention("d").is_err());
        assert!(parse_retention("7y").is_err());
    }
}
