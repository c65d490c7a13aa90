//! Aggregate statistics for one pipeline run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bucket used for files without an extension.
pub const UNKNOWN_EXTENSION: &str = "unknown";

/// Counts of written files.
///
/// Only the engine's collector mutates a run's `Stats`, so no locking is
/// needed here. Extension keys are kept sorted for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_files: usize,
    pub total_bytes: usize,
    pub extensions: BTreeMap<String, usize>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one written file.
    pub fn record(&mut self, path: &str, bytes: usize) {
        self.total_files += 1;
        self.total_bytes += bytes;
        *self
            .extensions
            .entry(extension_bucket(path).to_string())
            .or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }
}

/// Extension of the final path segment, without the dot (case preserved).
///
/// Dotfiles such as `.gitignore` and names without a dot map to
/// [`UNKNOWN_EXTENSION`].
pub fn extension_bucket(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => UNKNOWN_EXTENSION,
        Some(idx) if idx + 1 == name.len() => UNKNOWN_EXTENSION,
        Some(idx) => &name[idx + 1..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_counts_and_buckets() {
        let mut stats = Stats::new();
        stats.record("a/main.go", 10);
        stats.record("b/util.go", 5);
        stats.record("Makefile", 3);
        stats.record("web/App.TSX", 7);

        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.total_bytes, 25);
        assert_eq!(stats.extensions.get("go"), Some(&2));
        assert_eq!(stats.extensions.get(UNKNOWN_EXTENSION), Some(&1));
        assert_eq!(stats.extensions.get("TSX"), Some(&1));
    }

    #[test]
    fn extension_bucket_edge_cases() {
        assert_eq!(extension_bucket(".gitignore"), UNKNOWN_EXTENSION);
        assert_eq!(extension_bucket("dir.d/file"), UNKNOWN_EXTENSION);
        assert_eq!(extension_bucket("archive.tar.gz"), "gz");
        assert_eq!(extension_bucket("trailing."), UNKNOWN_EXTENSION);
    }
}
