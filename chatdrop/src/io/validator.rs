//! Extension-keyed registry of external syntax checkers.
//!
//! Validation is advisory: a failure is reported to the caller, which still
//! writes the file. An extension without a validator is not an error.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::{DropError, DropResult};
use crate::io::config::ValidatorConfig;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, run_command_with_timeout};

/// Argument placeholder replaced by the destination path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// A syntax check for one kind of file.
pub trait Validator: Send + Sync {
    fn validate(&self, path: &Path, code: &str) -> DropResult<()>;
}

/// Validator that runs an external command with the code on stdin.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandValidator {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    fn build(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        for arg in &self.args {
            if arg == PATH_PLACEHOLDER {
                cmd.arg(path);
            } else {
                cmd.arg(arg);
            }
        }
        cmd
    }
}

impl Validator for CommandValidator {
    #[instrument(skip_all, fields(command = %self.command, path = %path.display()))]
    fn validate(&self, path: &Path, code: &str) -> DropResult<()> {
        let failed = |detail: String| DropError::ValidationFailed {
            path: path.to_path_buf(),
            detail,
        };
        let output = run_command_with_timeout(
            self.build(path),
            Some(code.as_bytes()),
            self.timeout,
            DEFAULT_OUTPUT_LIMIT_BYTES,
        )
        .map_err(|e| failed(format!("{}: {e:#}", self.command)))?;

        if output.success() {
            debug!("validation passed");
            return Ok(());
        }
        Err(failed(output.failure_detail(self.timeout)))
    }
}

/// Maps file extensions to validators.
#[derive(Default)]
pub struct ValidatorRegistry {
    by_extension: HashMap<String, Box<dyn Validator>>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.by_extension.keys().collect();
        keys.sort();
        f.debug_struct("ValidatorRegistry")
            .field("extensions", &keys)
            .finish()
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build command validators from configuration. Later entries for the
    /// same extension replace earlier ones.
    pub fn from_config(validators: &[ValidatorConfig], timeout: Duration) -> Self {
        let mut registry = Self::new();
        for v in validators {
            registry.register(
                v.extension.clone(),
                CommandValidator::new(v.command.clone(), v.args.clone(), timeout),
            );
        }
        registry
    }

    pub fn register(&mut self, extension: impl Into<String>, validator: impl Validator + 'static) {
        self.by_extension
            .insert(extension.into(), Box::new(validator));
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }

    /// Validator for the path's extension (case-sensitive, no leading dot).
    pub fn resolve(&self, path: &str) -> Option<&dyn Validator> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        self.by_extension.get(ext).map(|v| v.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reject;

    impl Validator for Reject {
        fn validate(&self, path: &Path, _code: &str) -> DropResult<()> {
            Err(DropError::ValidationFailed {
                path: path.to_path_buf(),
                detail: "nope".to_string(),
            })
        }
    }

    #[test]
    fn resolve_is_case_sensitive_and_dotless() {
        let mut registry = ValidatorRegistry::new();
        registry.register("go", Reject);

        assert!(registry.resolve("cmd/main.go").is_some());
        assert!(registry.resolve("cmd/MAIN.GO").is_none());
        assert!(registry.resolve("Makefile").is_none());
        assert!(registry.resolve(".go").is_none());
        assert!(registry.resolve("dir.go/file").is_none());
    }

    #[test]
    fn resolved_validator_reports_failure() {
        let mut registry = ValidatorRegistry::new();
        registry.register("rs", Reject);
        let err = registry
            .resolve("a.rs")
            .expect("validator")
            .validate(Path::new("a.rs"), "fn")
            .unwrap_err();
        assert!(matches!(err, DropError::ValidationFailed { ref detail, .. } if detail == "nope"));
    }

    #[cfg(unix)]
    #[test]
    fn command_validator_passes_code_on_stdin_and_path_as_arg() {
        let validator = CommandValidator::new(
            "sh",
            vec![
                "-c".to_string(),
                "grep -q 'package main' && test \"$0\" = dest/main.go".to_string(),
                PATH_PLACEHOLDER.to_string(),
            ],
            Duration::from_secs(5),
        );
        validator
            .validate(Path::new("dest/main.go"), "package main\n")
            .expect("valid");
        let err = validator
            .validate(Path::new("dest/main.go"), "package other\n")
            .unwrap_err();
        assert!(matches!(err, DropError::ValidationFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn command_validator_times_out() {
        let validator = CommandValidator::new(
            "sh",
            vec!["-c".to_string(), "exec sleep 5".to_string()],
            Duration::from_millis(100),
        );
        let err = validator.validate(Path::new("a.py"), "x").unwrap_err();
        match err {
            DropError::ValidationFailed { detail, .. } => assert!(detail.starts_with("timed out")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn wrapper_script_timeout_returns_promptly() {
        let validator = CommandValidator::new(
            "sh",
            vec!["-c".to_string(), "sleep 5; true".to_string()],
            Duration::from_millis(200),
        );
        let started = std::time::Instant::now();
        let err = validator.validate(Path::new("a.py"), "x").unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(2), "validate took {elapsed:?}");
        assert!(matches!(err, DropError::ValidationFailed { ref detail, .. } if detail.starts_with("timed out")));
    }

    #[test]
    fn missing_command_is_a_validation_failure() {
        let validator =
            CommandValidator::new("no-such-checker-xyz", Vec::new(), Duration::from_secs(1));
        let err = validator.validate(Path::new("a.py"), "x").unwrap_err();
        assert!(matches!(err, DropError::ValidationFailed { .. }));
    }
}
