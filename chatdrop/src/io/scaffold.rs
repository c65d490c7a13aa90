//! `chatdrop new`: a minimal Go project skeleton to paste generated files into.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

/// Canonical paths of a scaffolded project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub cmd_dir: PathBuf,
    pub internal_dir: PathBuf,
    pub pkg_dir: PathBuf,
    pub main_path: PathBuf,
    pub go_mod_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let cmd_dir = root.join("cmd");
        Self {
            internal_dir: root.join("internal"),
            pkg_dir: root.join("pkg"),
            main_path: cmd_dir.join("main.go"),
            go_mod_path: root.join("go.mod"),
            cmd_dir,
            root,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScaffoldOptions {
    /// Overwrite `cmd/main.go` and `go.mod` if present.
    pub force: bool,
}

/// Create `<parent>/<name>` with `cmd/`, `internal/`, `pkg/`, a hello-world
/// `cmd/main.go` and a `go.mod` declaring module `<name>`.
pub fn new_project(parent: &Path, name: &str, options: &ScaffoldOptions) -> Result<ProjectPaths> {
    validate_name(name)?;
    let paths = ProjectPaths::new(parent.join(name));
    if paths.root.exists() && !paths.root.is_dir() {
        return Err(anyhow!(
            "new: {} exists but is not a directory",
            paths.root.display()
        ));
    }
    if !options.force {
        for existing in [&paths.main_path, &paths.go_mod_path] {
            if existing.exists() {
                return Err(anyhow!(
                    "new: {} already exists (use --force to overwrite)",
                    existing.display()
                ));
            }
        }
    }

    for dir in [&paths.cmd_dir, &paths.internal_dir, &paths.pkg_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    write_file(&paths.main_path, &main_go(name))?;
    write_file(&paths.go_mod_path, &go_mod(name))?;

    info!(root = %paths.root.display(), "project created");
    Ok(paths)
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_whitespace);
    if invalid {
        return Err(anyhow!(
            "new: invalid project name '{name}' (use a single path segment without spaces)"
        ));
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

fn main_go(name: &str) -> String {
    format!(
        "package main\n\nimport \"fmt\"\n\nfunc main() {{\n\tfmt.Println(\"Welcome to {name}!\")\n}}\n"
    )
}

fn go_mod(name: &str) -> String {
    format!("module {name}\n\ngo 1.22\n")
}
