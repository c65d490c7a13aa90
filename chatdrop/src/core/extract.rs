//! Block extraction: turn chat text into ordered `(path, code)` pairs.
//!
//! Two grammars are tried in priority order and the first one that yields at
//! least one block wins for the whole document. Results are never merged
//! across grammars.
//!
//! ```text
//! InlinePath:        ```go path:cmd/main.go        HeaderSeparator:   --- cmd/main.go ---
//!                    package main                                     ```go
//!                    ```                                              package main
//!                                                                     ```
//! ```
//!
//! Nested fences are not supported: the first line starting with a fence
//! closes the open block.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::core::path::normalize_path;
use crate::core::types::FileSpec;

const FENCE: &str = "```";

static INLINE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```[\w+#.\-]*[ \t]+path:[ \t]*(\S+)[ \t]*$").unwrap()
});

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-{3,}[ \t]*(?:(?i:file|path):[ \t]*)?([^\s\-]\S*?)[ \t]*(?:-{3,})?[ \t]*$")
        .unwrap()
});

/// A block grammar, tried as an isolated strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// Fence opening line carries a `path:<value>` token.
    InlinePath,
    /// A `--- <path> ---` marker line followed by a fenced block.
    HeaderSeparator,
}

impl Grammar {
    /// Trial order. Earlier grammars suppress later ones.
    pub const PRIORITY: [Grammar; 2] = [Grammar::InlinePath, Grammar::HeaderSeparator];

    pub fn name(self) -> &'static str {
        match self {
            Grammar::InlinePath => "inline-path",
            Grammar::HeaderSeparator => "header-separator",
        }
    }

    /// Run this grammar alone. `None` means it matched nothing.
    pub fn scan(self, text: &str) -> Option<Vec<FileSpec>> {
        let lines: Vec<&str> = text.lines().collect();
        let files = match self {
            Grammar::InlinePath => scan_inline_path(&lines),
            Grammar::HeaderSeparator => scan_header_separator(&lines),
        };
        if files.is_empty() { None } else { Some(files) }
    }
}

/// Extraction result plus the grammar that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub grammar: Option<Grammar>,
    pub files: Vec<FileSpec>,
}

/// Extract file specs in source order. Never fails; empty when nothing matches.
pub fn extract(text: &str) -> Vec<FileSpec> {
    extract_with_grammar(text).files
}

/// Like [`extract`], also reporting which grammar matched.
pub fn extract_with_grammar(text: &str) -> Extraction {
    for grammar in Grammar::PRIORITY {
        if let Some(files) = grammar.scan(text) {
            debug!(grammar = grammar.name(), count = files.len(), "extracted blocks");
            return Extraction {
                grammar: Some(grammar),
                files,
            };
        }
        trace!(grammar = grammar.name(), "grammar matched nothing");
    }
    Extraction::default()
}

fn scan_inline_path(lines: &[&str]) -> Vec<FileSpec> {
    let mut files = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if !is_fence(lines[i]) {
            i += 1;
            continue;
        }
        let Some(close) = find_closing_fence(lines, i + 1) else {
            trace!(line = i + 1, "unterminated fence, dropping remainder");
            break;
        };
        // Blocks without a path token are consumed so their closing fence is
        // never mistaken for an opening one.
        let path = INLINE_OPEN_RE
            .captures(lines[i])
            .and_then(|caps| normalize_path(&caps[1]));
        if let Some(path) = path {
            push_block(&mut files, path, &lines[i + 1..close]);
        }
        i = close + 1;
    }
    files
}

fn scan_header_separator(lines: &[&str]) -> Vec<FileSpec> {
    let mut files = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if is_fence(lines[i]) {
            // Unclaimed fenced block: skip it whole so marker-looking lines
            // inside code are not read as headers.
            match find_closing_fence(lines, i + 1) {
                Some(close) => i = close + 1,
                None => break,
            }
            continue;
        }

        let Some(path) = HEADER_RE
            .captures(lines[i])
            .and_then(|caps| normalize_path(&caps[1]))
        else {
            i += 1;
            continue;
        };

        let mut open = i + 1;
        while open < lines.len() && lines[open].trim().is_empty() {
            open += 1;
        }
        if open >= lines.len() || !is_fence(lines[open]) {
            i += 1;
            continue;
        }
        let Some(close) = find_closing_fence(lines, open + 1) else {
            trace!(line = open + 1, "unterminated fence after header, dropping remainder");
            break;
        };
        push_block(&mut files, path, &lines[open + 1..close]);
        i = close + 1;
    }
    files
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

fn find_closing_fence(lines: &[&str], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&idx| is_fence(lines[idx]))
}

fn push_block(files: &mut Vec<FileSpec>, path: String, body: &[&str]) {
    let code = body.join("\n").trim().to_string();
    if code.is_empty() {
        trace!(%path, "skipping whitespace-only block");
        return;
    }
    files.push(FileSpec { path, code });
}
