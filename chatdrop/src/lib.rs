//! Materialize files from AI chat transcripts.
//!
//! Chat text (clipboard, file, or stdin) is scanned for `(path, code)` blocks
//! which are then written under a target root with a backup of anything they
//! replace, optional syntax validation, and an optional git commit.
//!
//! - **[`core`]**: Pure, deterministic logic (block extraction, path rules,
//!   stats, outcome types). No I/O.
//! - **[`io`]**: Side-effecting adapters (filesystem, processes, git,
//!   clipboard), behind traits where tests need to substitute them.
//!
//! Orchestration modules ([`engine`], [`pipeline`], [`watch`]) combine the
//! two to implement CLI commands.

pub mod cancel;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
