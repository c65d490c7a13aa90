//! Product output on stdout: per-file lines and a summary, or JSON.
//!
//! Diagnostics go through `tracing` on stderr; nothing here logs.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{Action, CommitStatus, FileStatus, PipelineOutcome, PlannedAction};
use crate::io::backup::BackupEntry;

/// Pretty JSON with a trailing newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    out.write_all(payload.as_bytes()).context("write json")?;
    Ok(())
}

pub fn write_outcome<W: Write>(out: &mut W, outcome: &PipelineOutcome) -> Result<()> {
    for file in &outcome.files {
        match &file.status {
            FileStatus::Failed(reason) | FileStatus::Skipped(reason) => {
                writeln!(out, "{:<8} {} ({reason})", file.status.label(), file.path)?;
            }
            status => writeln!(out, "{:<8} {} ({} bytes)", status.label(), file.path, file.bytes)?,
        }
        if let Some(backup) = &file.backup {
            writeln!(out, "         backup: {}", backup.backup_path.display())?;
        }
        for warning in &file.warnings {
            writeln!(out, "         warning: {warning}")?;
        }
    }

    writeln!(
        out,
        "{} written, {} failed, {} skipped; {} bytes",
        outcome.succeeded(),
        outcome.failed(),
        outcome.skipped(),
        outcome.stats.total_bytes
    )?;
    if !outcome.stats.extensions.is_empty() {
        let by_ext: Vec<String> = outcome
            .stats
            .extensions
            .iter()
            .map(|(ext, count)| format!("{ext}: {count}"))
            .collect();
        writeln!(out, "by extension: {}", by_ext.join(", "))?;
    }
    let backups = outcome.backups().count();
    if backups > 0 {
        writeln!(out, "{backups} previous version(s) backed up")?;
    }
    match &outcome.commit {
        CommitStatus::NotRequested => {}
        CommitStatus::NothingToCommit => writeln!(out, "commit: nothing to commit")?,
        CommitStatus::Committed => writeln!(out, "commit: done")?,
        CommitStatus::Failed(reason) => writeln!(out, "commit: failed ({reason})")?,
    }
    Ok(())
}

pub fn write_plan<W: Write>(out: &mut W, actions: &[PlannedAction]) -> Result<()> {
    for planned in actions {
        match &planned.action {
            Action::Create => writeln!(out, "create   {} ({} bytes)", planned.path, planned.bytes)?,
            Action::Update => writeln!(out, "update   {} ({} bytes)", planned.path, planned.bytes)?,
            Action::Skip(reason) => writeln!(out, "skip     {} ({reason})", planned.path)?,
        }
    }
    writeln!(out, "dry run: {} file(s), nothing written", actions.len())?;
    Ok(())
}

pub fn write_backups<W: Write>(out: &mut W, entries: &[BackupEntry], verb: &str) -> Result<()> {
    for entry in entries {
        writeln!(
            out,
            "{}  {}  {} bytes  {}",
            entry.created.format("%Y-%m-%d %H:%M:%S"),
            entry.original,
            entry.bytes,
            entry.backup_path.display()
        )?;
    }
    writeln!(out, "{} backup(s) {verb}", entries.len())?;
    Ok(())
}
