//! Error taxonomy for the import pipeline.
//!
//! Only `WriteFailed` and the two "nothing to do" conditions (`NoInput`,
//! `NoBlocksFound`) stop work. Everything else is advisory: it is logged and
//! recorded on the affected file's outcome while sibling files proceed.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DropError {
    /// The input source produced nothing to parse.
    #[error("no input: {reason}")]
    NoInput { reason: String },

    /// The extractor found zero `(path, code)` blocks.
    #[error("no valid code blocks found")]
    NoBlocksFound,

    #[error("backup of {path} failed: {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    #[error("validation failed for {path}: {detail}")]
    ValidationFailed { path: PathBuf, detail: String },

    #[error("write {path} failed: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("commit failed: {reason}")]
    CommitFailed { reason: String },

    /// The watched source can no longer be observed; ends the watch session.
    #[error("watch source {source_name} unavailable: {reason}")]
    WatchSourceUnavailable { source_name: String, reason: String },

    /// A batch finished with at least one file that could not be written.
    #[error("{failed} of {total} files failed: {}", .reasons.join("; "))]
    BatchFailed {
        failed: usize,
        succeeded: usize,
        total: usize,
        /// First few failure reasons, in extraction order.
        reasons: Vec<String>,
    },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl DropError {
    pub fn no_input(reason: impl Into<String>) -> Self {
        Self::NoInput {
            reason: reason.into(),
        }
    }

    pub fn backup_failed(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::BackupFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn commit_failed(err: impl ToString) -> Self {
        Self::CommitFailed {
            reason: err.to_string(),
        }
    }
}

pub type DropResult<T> = std::result::Result<T, DropError>;
