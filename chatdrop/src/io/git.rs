//! Git adapter used as the best-effort commit collaborator.
//!
//! Only the paths written by a run are staged, so unrelated work in the tree
//! never ends up in the import commit.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::error::{DropError, DropResult};
use crate::io::process::{CommandOutput, DEFAULT_OUTPUT_LIMIT_BYTES, run_command_with_timeout};

/// Wall-clock bound for a single git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Receives the list of written paths after a batch settles.
pub trait Committer: Send + Sync {
    fn commit(&self, paths: &[String], message: &str) -> DropResult<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True if the workdir is inside a git work tree.
    pub fn is_repo(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.success() && out.stdout_lossy().trim() == "true")
            .unwrap_or(false)
    }

    /// Stage exactly `paths` (relative to the workdir).
    pub fn add_paths(&self, paths: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args)?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_checked(&["diff", "--cached", "--name-only"])?;
        Ok(!out.stdout_lossy().trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Last commit subject, mostly useful to tests and reporting.
    pub fn head_subject(&self) -> Result<String> {
        let out = self.run_checked(&["log", "-1", "--pretty=%s"])?;
        Ok(out.stdout_lossy().trim().to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                output.failure_detail(GIT_TIMEOUT)
            ));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        run_command_with_timeout(cmd, None, GIT_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES)
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// [`Committer`] backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitCommitter {
    git: Git,
}

impl GitCommitter {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            git: Git::new(workdir),
        }
    }
}

impl Committer for GitCommitter {
    #[instrument(skip_all, fields(paths = paths.len()))]
    fn commit(&self, paths: &[String], message: &str) -> DropResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        if !self.git.is_repo() {
            return Err(DropError::commit_failed(format!(
                "{} is not inside a git work tree",
                self.git.workdir().display()
            )));
        }
        self.git
            .add_paths(paths)
            .map_err(|e| DropError::commit_failed(format!("{e:#}")))?;
        let committed = self
            .git
            .commit_staged(message)
            .map_err(|e| DropError::commit_failed(format!("{e:#}")))?;
        debug!(committed, "commit step finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(path: &Path) {
        let git = Git::new(path);
        git.run_checked(&["init", "-q"]).expect("git init");
        git.run_checked(&["config", "user.email", "dev@example.com"])
            .expect("config email");
        git.run_checked(&["config", "user.name", "Dev"])
            .expect("config name");
        git.run_checked(&["config", "commit.gpgsign", "false"])
            .expect("config gpgsign");
    }

    #[test]
    fn commits_only_the_given_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_repo(temp.path());
        fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("src/a.rs"), "fn a() {}").expect("write");
        fs::write(temp.path().join("unrelated.txt"), "wip").expect("write");

        GitCommitter::new(temp.path())
            .commit(&["src/a.rs".to_string()], "chore(scaffold): import AI files")
            .expect("commit");

        let git = Git::new(temp.path());
        assert_eq!(
            git.head_subject().expect("subject"),
            "chore(scaffold): import AI files"
        );
        let status = git
            .run_checked(&["status", "--porcelain"])
            .expect("status")
            .stdout_lossy();
        assert!(status.contains("?? unrelated.txt"));
        assert!(!status.contains("src/a.rs"));
    }

    #[test]
    fn outside_a_repo_is_commit_failed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = GitCommitter::new(temp.path())
            .commit(&["a.rs".to_string()], "msg")
            .unwrap_err();
        assert!(matches!(err, DropError::CommitFailed { .. }));
    }
}
