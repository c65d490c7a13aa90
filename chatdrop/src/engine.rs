//! Concurrent materialization of extracted files onto disk.
//!
//! A fixed pool of `min(concurrency, files)` scoped workers drains a bounded
//! job queue. Each worker runs the per-file steps (backup, mkdir, validate,
//! write) and sends its [`FileOutcome`] to a single collector, which restores
//! extraction order and builds [`Stats`]. Workers never touch shared
//! aggregates, so the totals are exact regardless of interleaving.
//!
//! Two specs naming the same path race; whichever worker writes last wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::core::path::escape_reason;
use crate::core::stats::Stats;
use crate::core::types::{
    Action, CommitStatus, FileOutcome, FileSpec, FileStatus, PipelineOutcome, PlannedAction,
};
use crate::error::DropError;
use crate::io::backup::BackupManager;
use crate::io::config::{DEFAULT_BACKUP_DIR, DEFAULT_COMMIT_MESSAGE, DropConfig};
use crate::io::git::Committer;
use crate::io::validator::ValidatorRegistry;
use crate::io::writer::{FileWriter, FsWriter};

pub const DEFAULT_CONCURRENCY: usize = 4;

const CANCELLED: &str = "cancelled";

/// Per-run switches for [`MaterializationEngine::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Target root; file paths are resolved against it.
    pub root: PathBuf,
    /// Upper bound on files processed at once. Zero is treated as one.
    pub concurrency: usize,
    pub backup: bool,
    /// Where backups go. Usually `<root>/.chatdrop-backup`.
    pub backup_dir: PathBuf,
    pub validate: bool,
    pub commit: bool,
    pub commit_message: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::for_root(".")
    }
}

impl EngineOptions {
    /// Defaults rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            backup_dir: root.join(DEFAULT_BACKUP_DIR),
            root,
            concurrency: DEFAULT_CONCURRENCY,
            backup: true,
            validate: true,
            commit: false,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    /// Options from loaded configuration. CLI flags are applied on top.
    pub fn from_config(cfg: &DropConfig, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            concurrency: cfg.concurrency,
            backup: cfg.backup.enabled,
            backup_dir: cfg.backup_dir(root),
            validate: cfg.validation.enabled,
            commit: cfg.git.auto_commit,
            commit_message: cfg.git.message.clone(),
        }
    }
}

/// Writes a batch of [`FileSpec`]s and reports one outcome per spec.
///
/// Collaborators are borrowed, so one engine can serve many runs (the watch
/// loop reuses it across triggers).
pub struct MaterializationEngine<'a> {
    validators: &'a ValidatorRegistry,
    writer: &'a dyn FileWriter,
    committer: Option<&'a dyn Committer>,
    cancel: CancelFlag,
}

impl<'a> MaterializationEngine<'a> {
    pub fn new(validators: &'a ValidatorRegistry) -> Self {
        Self {
            validators,
            writer: &FsWriter,
            committer: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_writer(mut self, writer: &'a dyn FileWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_committer(mut self, committer: &'a dyn Committer) -> Self {
        self.committer = Some(committer);
        self
    }

    /// Files not yet started when the flag is set are reported as skipped.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Materialize `files` under `options.root`.
    ///
    /// Never fails as a whole: per-file problems become
    /// [`FileStatus::Failed`] or warnings on the outcome. Use
    /// [`PipelineOutcome::to_result`] for the aggregate verdict.
    #[instrument(skip_all, fields(files = files.len(), concurrency = options.concurrency))]
    pub fn process(&self, files: &[FileSpec], options: &EngineOptions) -> PipelineOutcome {
        let outcomes = self.run_workers(files, options);

        let mut stats = Stats::default();
        for outcome in outcomes.iter().filter(|o| o.status.is_written()) {
            stats.record(&outcome.path, outcome.bytes);
        }

        let mut result = PipelineOutcome {
            files: outcomes,
            stats,
            commit: CommitStatus::NotRequested,
        };
        result.commit = self.commit(&result, options);

        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            skipped = result.skipped(),
            "batch finished"
        );
        result
    }

    fn run_workers(&self, files: &[FileSpec], options: &EngineOptions) -> Vec<FileOutcome> {
        if files.is_empty() {
            return Vec::new();
        }
        let workers = options.concurrency.clamp(1, files.len());
        let backups = BackupManager::new(&options.root, &options.backup_dir);
        let mut slots: Vec<Option<FileOutcome>> = vec![None; files.len()];

        let (job_tx, job_rx) = bounded::<(usize, &FileSpec)>(workers);
        let (result_tx, result_rx) = bounded::<(usize, FileOutcome)>(workers);

        thread::scope(|scope| {
            let backups = &backups;
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (idx, spec) in job_rx {
                        let outcome = if self.cancel.is_cancelled() {
                            FileOutcome::new(
                                &spec.path,
                                FileStatus::Skipped(CANCELLED.to_string()),
                                spec.len(),
                            )
                        } else {
                            self.process_one(spec, options, backups)
                        };
                        if result_tx.send((idx, outcome)).is_err() {
                            break;
                        }
                    }
                    debug!(worker, "worker drained");
                });
            }
            drop(job_rx);
            drop(result_tx);

            // Feed from a separate thread so the collector below never stalls
            // the workers on a full result queue.
            scope.spawn(move || {
                for job in files.iter().enumerate() {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for (idx, outcome) in result_rx {
                slots[idx] = Some(outcome);
            }
        });

        slots
            .into_iter()
            .zip(files)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| {
                    FileOutcome::new(
                        &spec.path,
                        FileStatus::Failed("worker exited before processing".to_string()),
                        spec.len(),
                    )
                })
            })
            .collect()
    }

    #[instrument(skip_all, fields(path = %spec.path))]
    fn process_one(
        &self,
        spec: &FileSpec,
        options: &EngineOptions,
        backups: &BackupManager,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::new(&spec.path, FileStatus::Created, spec.len());
        if let Some(reason) = escape_reason(&spec.path) {
            warn!(reason, "refusing path outside target root");
            outcome.status = FileStatus::Skipped(reason.to_string());
            return outcome;
        }

        let dest = options.root.join(&spec.path);
        let existed = dest.exists();

        if options.backup && existed {
            match backups.backup(&spec.path) {
                Ok(record) => outcome.backup = record,
                Err(err) => {
                    warn!(err = %err, "backup failed, writing anyway");
                    outcome.warnings.push(err.to_string());
                }
            }
        }

        if let Some(parent) = dest.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            let err = DropError::write_failed(
                &spec.path,
                format!("create directory {}: {err}", parent.display()),
            );
            warn!(err = %err, "file failed");
            outcome.status = FileStatus::Failed(err.to_string());
            return outcome;
        }

        if options.validate
            && let Some(validator) = self.validators.resolve(&spec.path)
            && let Err(err) = validator.validate(&dest, &spec.code)
        {
            warn!(err = %err, "validation failed, writing anyway");
            outcome.warnings.push(err.to_string());
        }

        if let Err(err) = self.writer.write(&dest, spec.code.as_bytes()) {
            let err = DropError::write_failed(&spec.path, err);
            warn!(err = %err, "file failed");
            outcome.status = FileStatus::Failed(err.to_string());
            return outcome;
        }

        outcome.status = if existed {
            FileStatus::Updated
        } else {
            FileStatus::Created
        };
        debug!(status = outcome.status.label(), bytes = outcome.bytes, "file written");
        outcome
    }

    fn commit(&self, outcome: &PipelineOutcome, options: &EngineOptions) -> CommitStatus {
        if !options.commit {
            return CommitStatus::NotRequested;
        }
        let written = outcome.written_paths();
        if written.is_empty() {
            return CommitStatus::NothingToCommit;
        }
        let Some(committer) = self.committer else {
            warn!("commit requested but no committer configured");
            return CommitStatus::Failed("no committer configured".to_string());
        };
        match committer.commit(&written, &options.commit_message) {
            Ok(()) => {
                info!(files = written.len(), "committed written files");
                CommitStatus::Committed
            }
            Err(err) => {
                warn!(err = %err, "commit failed, files remain written");
                CommitStatus::Failed(err.to_string())
            }
        }
    }
}

/// What [`MaterializationEngine::process`] would do, without touching disk.
pub fn plan(files: &[FileSpec], root: &Path) -> Vec<PlannedAction> {
    files
        .iter()
        .map(|spec| {
            let dest = root.join(&spec.path);
            let action = if let Some(reason) = escape_reason(&spec.path) {
                Action::Skip(reason.to_string())
            } else if dest.is_dir() {
                Action::Skip("destination is a directory".to_string())
            } else if dest.exists() {
                Action::Update
            } else {
                Action::Create
            };
            PlannedAction {
                path: spec.path.clone(),
                action,
                bytes: spec.len(),
            }
        })
        .collect()
}
