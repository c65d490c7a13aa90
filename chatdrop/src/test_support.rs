//! Test-only collaborators: temp workspaces, instrumented writer, recording
//! committer, scripted validator, and chat-text builders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{DropError, DropResult};
use crate::io::git::Committer;
use crate::io::validator::Validator;
use crate::io::writer::{FileWriter, FsWriter};

/// Temp directory with a chat file next to (not inside) the target root.
pub struct TestRoot {
    dir: tempfile::TempDir,
}

impl TestRoot {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Target root; created lazily by the first write.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    pub fn chat_path(&self) -> PathBuf {
        self.dir.path().join("chat.md")
    }

    /// Replace the chat file's contents and return its path.
    pub fn write_chat(&self, text: &str) -> io::Result<PathBuf> {
        let path = self.chat_path();
        fs::write(&path, text)?;
        Ok(path)
    }
}

/// Writes through to disk while tracking how many writes overlap.
#[derive(Debug, Default)]
pub struct CountingWriter {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingWriter {
    /// `delay` is slept inside each write to widen the overlap window.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl FileWriter for CountingWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        let result = FsWriter.write(path, contents);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Committer that records each call, optionally failing.
#[derive(Debug, Default)]
pub struct RecordingCommitter {
    fail_with: Option<String>,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl RecordingCommitter {
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// `(paths, message)` per commit call, in call order.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Committer for RecordingCommitter {
    fn commit(&self, paths: &[String], message: &str) -> DropResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((paths.to_vec(), message.to_string()));
        }
        match &self.fail_with {
            Some(reason) => Err(DropError::commit_failed(reason)),
            None => Ok(()),
        }
    }
}

/// Validator that rejects code containing a marker and records what it saw.
#[derive(Debug, Default)]
pub struct ScriptedValidator {
    reject_marker: Option<String>,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScriptedValidator {
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn rejecting(marker: impl Into<String>) -> Self {
        Self {
            reject_marker: Some(marker.into()),
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl Validator for ScriptedValidator {
    fn validate(&self, path: &Path, code: &str) -> DropResult<()> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(path.to_path_buf());
        }
        match &self.reject_marker {
            Some(marker) if code.contains(marker.as_str()) => Err(DropError::ValidationFailed {
                path: path.to_path_buf(),
                detail: format!("found {marker}"),
            }),
            _ => Ok(()),
        }
    }
}

/// Chat text in the `--- path ---` grammar, with prose between blocks.
pub fn header_chat(files: &[(&str, &str)]) -> String {
    let mut text = String::from("Sure! Here are the files.\n\n");
    for (path, code) in files {
        text.push_str(&format!("--- {path} ---\n```\n{code}\n```\n\nNext one:\n\n"));
    }
    text
}

/// Chat text in the inline ```` ```lang path:<p> ```` grammar.
pub fn inline_chat(files: &[(&str, &str)]) -> String {
    let mut text = String::from("Here you go:\n\n");
    for (path, code) in files {
        text.push_str(&format!("```text path:{path}\n{code}\n```\n\n"));
    }
    text
}
