//! Watch mode: re-run the import whenever the watched source changes.
//!
//! The loop moves `Idle → Polling → Triggered → Polling → … → Stopped`.
//! Change detection compares [`Fingerprint`]s, so a source that reports the
//! same content twice never triggers twice. Cancellation is checked at the
//! top of each cycle and while sleeping, never during a pipeline run.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, trace, warn};

use crate::cancel::CancelFlag;
use crate::error::{DropError, DropResult};
use crate::io::source::InputSource;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Longest uninterrupted sleep between cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cheap comparable summary of a source's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    Modified { modified: SystemTime, len: u64 },
    /// Hex SHA-256 of the content.
    Digest(String),
}

impl Fingerprint {
    pub fn of_content(text: &str) -> Self {
        Self::Digest(hex::encode(Sha256::digest(text.as_bytes())))
    }
}

/// Something the watch loop can poll.
pub trait WatchSource {
    fn name(&self) -> String;
    fn fingerprint(&mut self) -> DropResult<Fingerprint>;
    fn read(&mut self) -> DropResult<String>;
}

fn unavailable(source_name: &str, reason: impl ToString) -> DropError {
    DropError::WatchSourceUnavailable {
        source_name: source_name.to_string(),
        reason: reason.to_string(),
    }
}

/// A file on disk, fingerprinted by modification time and length.
#[derive(Debug, Clone)]
pub struct FileWatch {
    path: PathBuf,
}

impl FileWatch {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WatchSource for FileWatch {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fingerprint(&mut self) -> DropResult<Fingerprint> {
        let meta = fs::metadata(&self.path).map_err(|e| unavailable(&self.name(), e))?;
        let modified = meta.modified().map_err(|e| unavailable(&self.name(), e))?;
        Ok(Fingerprint::Modified {
            modified,
            len: meta.len(),
        })
    }

    fn read(&mut self) -> DropResult<String> {
        fs::read_to_string(&self.path).map_err(|e| unavailable(&self.name(), e))
    }
}

/// Any [`InputSource`] (typically the clipboard), fingerprinted by content.
///
/// The content read for the fingerprint is kept so a trigger does not read
/// the source twice.
#[derive(Debug)]
pub struct ContentWatch<S> {
    source: S,
    last_read: Option<String>,
}

impl<S: InputSource> ContentWatch<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_read: None,
        }
    }
}

impl<S: InputSource> WatchSource for ContentWatch<S> {
    fn name(&self) -> String {
        self.source.name()
    }

    fn fingerprint(&mut self) -> DropResult<Fingerprint> {
        let text = self
            .source
            .read()
            .map_err(|e| unavailable(&self.source.name(), e))?;
        let fingerprint = Fingerprint::of_content(&text);
        self.last_read = Some(text);
        Ok(fingerprint)
    }

    fn read(&mut self) -> DropResult<String> {
        match self.last_read.take() {
            Some(text) => Ok(text),
            None => self
                .source
                .read()
                .map_err(|e| unavailable(&self.source.name(), e)),
        }
    }
}

/// `Idle → Polling → Triggered → Polling → … → Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchPhase {
    #[default]
    Idle,
    Polling,
    Triggered,
    Stopped,
}

impl WatchPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Triggered => "triggered",
            Self::Stopped => "stopped",
        }
    }
}

/// Mutable state of one watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchState {
    pub source: String,
    pub phase: WatchPhase,
    pub last_seen: Option<Fingerprint>,
}

impl WatchState {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            phase: WatchPhase::Idle,
            last_seen: None,
        }
    }

    /// Move to `next`. `Stopped` is terminal: later moves are refused.
    pub fn enter(&mut self, next: WatchPhase) -> bool {
        if self.phase == WatchPhase::Stopped {
            return false;
        }
        if self.phase != next {
            trace!(from = ?self.phase, to = ?next, "watch phase");
            self.phase = next;
        }
        true
    }

    /// Store `current` and report whether it differs from the previous value.
    pub fn observe(&mut self, current: Fingerprint) -> bool {
        let changed = self.last_seen.as_ref() != Some(&current);
        self.last_seen = Some(current);
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub interval: Duration,
    /// Record the first fingerprint without running the pipeline.
    pub skip_initial: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            skip_initial: false,
        }
    }
}

/// Counters for a finished watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchSummary {
    /// Phase the session ended in; `Stopped` after a clean cancel.
    pub phase: WatchPhase,
    pub cycles: u64,
    pub triggers: u64,
    /// Triggers whose pipeline run returned an error.
    pub failed_runs: u64,
}

/// Poll `source` until `cancel` is set, calling `on_trigger` with the new
/// text after each change.
///
/// Errors from `on_trigger` are logged and the loop continues; the
/// fingerprint is updated either way. Only an unavailable source ends the
/// session with an error.
#[instrument(skip_all, fields(source = %source.name(), interval_secs = options.interval.as_secs()))]
pub fn run_watch<W, F>(
    source: &mut W,
    options: &WatchOptions,
    cancel: &CancelFlag,
    mut on_trigger: F,
) -> DropResult<WatchSummary>
where
    W: WatchSource + ?Sized,
    F: FnMut(&str) -> DropResult<()>,
{
    let mut state = WatchState::new(source.name());
    let mut summary = WatchSummary::default();
    info!("watching for changes");

    loop {
        if cancel.is_cancelled() {
            state.enter(WatchPhase::Stopped);
            summary.phase = state.phase;
            info!(
                cycles = summary.cycles,
                triggers = summary.triggers,
                "watch stopped"
            );
            return Ok(summary);
        }

        state.enter(WatchPhase::Polling);
        summary.cycles += 1;
        let initial = state.last_seen.is_none();
        let current = source.fingerprint()?;

        if state.observe(current) && !(initial && options.skip_initial) {
            let text = source.read()?;
            if text.trim().is_empty() {
                debug!("source changed but is empty");
            } else {
                state.enter(WatchPhase::Triggered);
                summary.triggers += 1;
                info!(trigger = summary.triggers, "source changed, importing");
                if let Err(err) = on_trigger(&text) {
                    summary.failed_runs += 1;
                    warn!(err = %err, "import failed, waiting for next change");
                }
                state.enter(WatchPhase::Polling);
            }
        }

        sleep_until_cancelled(options.interval, cancel);
    }
}

fn sleep_until_cancelled(interval: Duration, cancel: &CancelFlag) {
    let deadline = Instant::now() + interval;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
