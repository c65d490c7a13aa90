//! Shared types passed between the extractor, the engine, and the reporters.
//!
//! These types carry no I/O and serialize deterministically so `--json`
//! output is stable across runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::stats::Stats;
use crate::error::DropError;

/// A parsed (destination path, file content) pair.
///
/// `path` is relative and slash-normalized, `code` is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    pub code: String,
}

impl FileSpec {
    pub fn new(path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Final status of a single file in a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum FileStatus {
    /// Destination did not exist before the write.
    Created,
    /// Destination existed and was overwritten.
    Updated,
    /// The file could not be written.
    Failed(String),
    /// No write was attempted.
    Skipped(String),
}

impl FileStatus {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

/// Safety copy made before an existing file was overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    /// RFC 3339 UTC timestamp of the rename.
    pub timestamp: String,
}

/// Per-file result produced by one engine worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(flatten)]
    pub status: FileStatus,
    pub bytes: usize,
    /// Advisory problems (backup, validation) that did not stop the write.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRecord>,
}

impl FileOutcome {
    pub fn new(path: impl Into<String>, status: FileStatus, bytes: usize) -> Self {
        Self {
            path: path.into(),
            status,
            bytes,
            warnings: Vec::new(),
            backup: None,
        }
    }
}

/// What happened to the optional commit step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "commit", content = "reason", rename_all = "snake_case")]
pub enum CommitStatus {
    NotRequested,
    /// Requested, but nothing was written.
    NothingToCommit,
    Committed,
    Failed(String),
}

/// Result of one pipeline run, in original extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub files: Vec<FileOutcome>,
    pub stats: Stats,
    #[serde(flatten)]
    pub commit: CommitStatus,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Skipped(_)))
            .count()
    }

    /// Paths that were written, in extraction order.
    pub fn written_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| f.status.is_written())
            .map(|f| f.path.clone())
            .collect()
    }

    pub fn backups(&self) -> impl Iterator<Item = &BackupRecord> {
        self.files.iter().filter_map(|f| f.backup.as_ref())
    }

    /// Success only if zero files failed to write.
    ///
    /// The error carries the counts and the first three failure reasons.
    pub fn to_result(&self) -> Result<(), DropError> {
        let failed = self.failed();
        if failed == 0 {
            return Ok(());
        }
        let reasons = self
            .files
            .iter()
            .filter_map(|f| match &f.status {
                FileStatus::Failed(reason) => Some(reason.clone()),
                _ => None,
            })
            .take(3)
            .collect();
        Err(DropError::BatchFailed {
            failed,
            succeeded: self.succeeded(),
            total: self.files.len(),
            reasons,
        })
    }
}

/// Dry-run action for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Skip(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub path: String,
    #[serde(flatten)]
    pub action: Action,
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(statuses: Vec<FileStatus>) -> PipelineOutcome {
        PipelineOutcome {
            files: statuses
                .into_iter()
                .enumerate()
                .map(|(i, s)| FileOutcome::new(format!("f{i}.rs"), s, 1))
                .collect(),
            stats: Stats::default(),
            commit: CommitStatus::NotRequested,
        }
    }

    #[test]
    fn to_result_ok_when_nothing_failed() {
        let out = outcome(vec![
            FileStatus::Created,
            FileStatus::Skipped("escapes target root".into()),
        ]);
        assert!(out.to_result().is_ok());
        assert_eq!(out.succeeded(), 1);
        assert_eq!(out.skipped(), 1);
    }

    #[test]
    fn to_result_caps_reasons_at_three() {
        let out = outcome(vec![
            FileStatus::Updated,
            FileStatus::Failed("a".into()),
            FileStatus::Failed("b".into()),
            FileStatus::Failed("c".into()),
            FileStatus::Failed("d".into()),
        ]);
        match out.to_result() {
            Err(DropError::BatchFailed {
                failed,
                succeeded,
                total,
                reasons,
            }) => {
                assert_eq!((failed, succeeded, total), (4, 1, 5));
                assert_eq!(reasons, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn file_outcome_serializes_status_inline() {
        let out = FileOutcome::new("a.go", FileStatus::Failed("denied".into()), 3);
        let json = serde_json::to_value(&out).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "denied");
        assert!(json.get("warnings").is_none());
    }
}
