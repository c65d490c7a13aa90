//! Input sources: "give me the chat text".
//!
//! Where the text comes from is opaque to the pipeline; every source reports
//! problems as [`DropError::NoInput`].

use std::fs;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::{DropError, DropResult};
use crate::io::process::run_command_with_timeout;

/// Clipboard contents beyond this are truncated.
const CLIPBOARD_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub const DEFAULT_CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(5);

pub trait InputSource {
    /// Human-readable origin, used in logs and watch errors.
    fn name(&self) -> String;
    fn read(&self) -> DropResult<String>;
}

/// Reads a file from disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InputSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> DropResult<String> {
        fs::read_to_string(&self.path)
            .map_err(|e| DropError::no_input(format!("read {}: {e}", self.path.display())))
    }
}

/// Reads all of stdin. Refuses an interactive terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinSource;

impl InputSource for StdinSource {
    fn name(&self) -> String {
        "stdin".to_string()
    }

    fn read(&self) -> DropResult<String> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(DropError::no_input("no stdin data (stdin is a terminal)"));
        }
        let mut buf = String::new();
        stdin
            .lock()
            .read_to_string(&mut buf)
            .map_err(|e| DropError::no_input(format!("read stdin: {e}")))?;
        Ok(buf)
    }
}

/// Reads the system clipboard through the platform's paste command.
#[derive(Debug, Clone)]
pub struct ClipboardSource {
    timeout: Duration,
}

impl Default for ClipboardSource {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CLIPBOARD_TIMEOUT,
        }
    }
}

impl ClipboardSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

struct PasteCommand {
    program: &'static str,
    args: &'static [&'static str],
}

/// Paste commands, tried in order until one succeeds.
#[cfg(target_os = "windows")]
const PASTE_COMMANDS: &[PasteCommand] = &[PasteCommand {
    program: "powershell",
    args: &["-NoProfile", "-Command", "Get-Clipboard"],
}];

#[cfg(target_os = "macos")]
const PASTE_COMMANDS: &[PasteCommand] = &[PasteCommand {
    program: "pbpaste",
    args: &[],
}];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PASTE_COMMANDS: &[PasteCommand] = &[
    PasteCommand {
        program: "xclip",
        args: &["-selection", "clipboard", "-o"],
    },
    PasteCommand {
        program: "xsel",
        args: &["--clipboard", "--output"],
    },
    PasteCommand {
        program: "wl-paste",
        args: &["--no-newline"],
    },
];

impl InputSource for ClipboardSource {
    fn name(&self) -> String {
        "clipboard".to_string()
    }

    #[instrument(skip_all)]
    fn read(&self) -> DropResult<String> {
        let mut failures = Vec::new();
        for &PasteCommand { program, args } in PASTE_COMMANDS {
            let mut cmd = Command::new(program);
            cmd.args(args);
            match run_command_with_timeout(cmd, None, self.timeout, CLIPBOARD_LIMIT_BYTES) {
                Ok(out) if out.success() => {
                    debug!(program, bytes = out.stdout.len(), "read clipboard");
                    return Ok(out.stdout_lossy());
                }
                Ok(out) => failures.push(format!("{program}: {}", out.failure_detail(self.timeout))),
                Err(e) => failures.push(format!("{program}: {e:#}")),
            }
        }
        Err(DropError::no_input(format!(
            "clipboard unavailable ({})",
            failures.join("; ")
        )))
    }
}

/// Fixed text, for tests and programmatic callers.
#[derive(Debug, Clone)]
pub struct TextSource(pub String);

impl InputSource for TextSource {
    fn name(&self) -> String {
        "text".to_string()
    }

    fn read(&self) -> DropResult<String> {
        Ok(self.0.clone())
    }
}

impl<S: InputSource + ?Sized> InputSource for Box<S> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn read(&self) -> DropResult<String> {
        (**self).read()
    }
}
