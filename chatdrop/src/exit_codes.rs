//! Stable exit codes for chatdrop CLI commands.

use crate::error::DropError;

/// Command succeeded; every extracted file was written (or skipped).
pub const OK: i32 = 0;
/// Invalid config/arguments, watch source lost, or any other error.
pub const FAILED: i32 = 1;
/// The input source produced nothing to parse.
pub const NO_INPUT: i32 = 2;
/// The input contained no recognizable file blocks.
pub const NO_BLOCKS: i32 = 3;
/// Some files were written and at least one failed.
pub const PARTIAL: i32 = 4;

/// Exit code for a pipeline error.
pub fn for_error(err: &DropError) -> i32 {
    match err {
        DropError::NoInput { .. } => NO_INPUT,
        DropError::NoBlocksFound => NO_BLOCKS,
        DropError::BatchFailed { succeeded, .. } if *succeeded > 0 => PARTIAL,
        _ => FAILED,
    }
}
