//! Write files out of AI chat transcripts.
//!
//! `chatdrop import` reads chat text, extracts every `(path, code)` block and
//! writes them under the target root. `chatdrop watch` repeats that whenever
//! the source changes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use chatdrop::cancel::CancelFlag;
use chatdrop::core::types::PipelineOutcome;
use chatdrop::engine::{EngineOptions, MaterializationEngine};
use chatdrop::error::DropError;
use chatdrop::exit_codes;
use chatdrop::io::backup::{BackupManager, parse_retention};
use chatdrop::io::config::{CONFIG_FILE_NAME, DropConfig, load_config, write_config};
use chatdrop::io::git::GitCommitter;
use chatdrop::io::scaffold::{ScaffoldOptions, new_project};
use chatdrop::io::source::{ClipboardSource, FileSource, InputSource, StdinSource};
use chatdrop::io::validator::ValidatorRegistry;
use chatdrop::watch::{ContentWatch, FileWatch, WatchOptions, WatchSource, run_watch};
use chatdrop::{logging, pipeline, report};

#[derive(Parser)]
#[command(
    name = "chatdrop",
    version,
    about = "Materialize files from AI chat transcripts"
)]
struct Cli {
    /// Target root that extracted paths are relative to.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file (default: `<root>/chatdrop.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level diagnostics on stderr.
    #[arg(long, global = true)]
    debug: bool,
    /// Trace-level diagnostics on stderr.
    #[arg(long, global = true)]
    trace: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract files from chat text and write them.
    Import {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        engine: EngineArgs,
        /// Show what would be written without touching disk.
        #[arg(long)]
        dry_run: bool,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-import whenever the source changes, until Ctrl+C.
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        engine: EngineArgs,
        /// Poll interval in seconds (overrides `watch.interval_secs`).
        #[arg(long)]
        interval: Option<u64>,
        /// Do not import the content present when watching starts.
        #[arg(long)]
        skip_initial: bool,
        /// Print each outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect or prune backups.
    Backups {
        #[command(subcommand)]
        action: BackupsCommand,
    },
    /// Create a Go project skeleton.
    New {
        name: String,
        /// Overwrite `cmd/main.go` and `go.mod` if present.
        #[arg(short, long)]
        force: bool,
    },
    /// Write a default `chatdrop.toml`.
    InitConfig {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum BackupsCommand {
    /// List backups, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete backups older than the retention.
    Prune {
        /// Retention such as `7d`, `12h`, `30m` (default: `backup.retention`).
        #[arg(long)]
        older_than: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Read chat text from a file, or `-` for stdin.
    #[arg(short, long, conflicts_with = "clipboard")]
    input: Option<PathBuf>,
    /// Read chat text from the clipboard (the default when no input is given).
    #[arg(short, long)]
    clipboard: bool,
}

#[derive(Args)]
struct EngineArgs {
    /// Do not move existing files aside before overwriting them.
    #[arg(long)]
    no_backup: bool,
    /// Skip configured validators.
    #[arg(long)]
    no_validate: bool,
    /// Commit written files with git.
    #[arg(long)]
    git_commit: bool,
    /// Maximum files processed at once.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    jobs: Option<u16>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug, cli.trace);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            err.downcast_ref::<DropError>()
                .map_or(exit_codes::FAILED, exit_codes::for_error)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE_NAME));
    match cli.command {
        Command::Import {
            source,
            engine,
            dry_run,
            json,
        } => {
            let cfg = load_config(&config_path)?;
            cmd_import(&cfg, &cli.root, &source, &engine, dry_run, json)
        }
        Command::Watch {
            source,
            engine,
            interval,
            skip_initial,
            json,
        } => {
            let cfg = load_config(&config_path)?;
            let options = WatchOptions {
                interval: interval.map_or_else(|| cfg.watch_interval(), Duration::from_secs),
                skip_initial,
            };
            cmd_watch(&cfg, &cli.root, &source, &engine, &options, json)
        }
        Command::Backups { action } => {
            let cfg = load_config(&config_path)?;
            cmd_backups(&cfg, &cli.root, &action)
        }
        Command::New { name, force } => cmd_new(&cli.root, &name, force),
        Command::InitConfig { force } => cmd_init_config(&config_path, force),
    }
}

fn cmd_import(
    cfg: &DropConfig,
    root: &Path,
    source: &SourceArgs,
    engine_args: &EngineArgs,
    dry_run: bool,
    json: bool,
) -> Result<i32> {
    let options = engine_options(cfg, root, engine_args);
    let source = input_source(source);

    if dry_run {
        let text = source.read()?;
        let actions = pipeline::preview(&text, &options)?;
        let mut out = std::io::stdout().lock();
        if json {
            report::write_json(&mut out, &actions)?;
        } else {
            report::write_plan(&mut out, &actions)?;
        }
        return Ok(exit_codes::OK);
    }

    let registry =
        ValidatorRegistry::from_config(&cfg.validation.validators, cfg.validation_timeout());
    let committer = GitCommitter::new(root);
    let cancel = CancelFlag::new();
    cancel.install_ctrlc_handler()?;
    let engine = MaterializationEngine::new(&registry)
        .with_committer(&committer)
        .with_cancel(cancel);

    let outcome = pipeline::import(&source, &engine, &options)?;
    print_outcome(&outcome, json)?;
    outcome.to_result()?;
    Ok(exit_codes::OK)
}

fn cmd_watch(
    cfg: &DropConfig,
    root: &Path,
    source: &SourceArgs,
    engine_args: &EngineArgs,
    watch_options: &WatchOptions,
    json: bool,
) -> Result<i32> {
    let options = engine_options(cfg, root, engine_args);
    let mut watched: Box<dyn WatchSource> = match &source.input {
        Some(path) if path == Path::new("-") => bail!("watch: cannot watch stdin"),
        Some(path) => Box::new(FileWatch::new(path)),
        None => Box::new(ContentWatch::new(ClipboardSource::default())),
    };

    let registry =
        ValidatorRegistry::from_config(&cfg.validation.validators, cfg.validation_timeout());
    let committer = GitCommitter::new(root);
    let cancel = CancelFlag::new();
    cancel.install_ctrlc_handler()?;
    let engine = MaterializationEngine::new(&registry)
        .with_committer(&committer)
        .with_cancel(cancel.clone());

    let summary = run_watch(watched.as_mut(), watch_options, &cancel, |text| {
        let outcome = pipeline::import_text(text, &engine, &options)?;
        if let Err(err) = print_outcome(&outcome, json) {
            warn!(err = %err, "failed to print outcome");
        }
        outcome.to_result()
    })?;

    if json {
        report::write_json(&mut std::io::stdout().lock(), &summary)?;
    } else {
        println!(
            "watch {}: {} import(s), {} failed",
            summary.phase.label(), summary.triggers, summary.failed_runs
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_backups(cfg: &DropConfig, root: &Path, action: &BackupsCommand) -> Result<i32> {
    let manager = BackupManager::new(root, cfg.backup_dir(root));
    let mut out = std::io::stdout().lock();
    match action {
        BackupsCommand::List { json } => {
            let entries = manager.list()?;
            if *json {
                report::write_json(&mut out, &entries)?;
            } else {
                report::write_backups(&mut out, &entries, "found")?;
            }
        }
        BackupsCommand::Prune { older_than, json } => {
            let retention = parse_retention(older_than.as_deref().unwrap_or(&cfg.backup.retention))?;
            let removed = manager.prune(retention, Utc::now())?;
            if *json {
                report::write_json(&mut out, &removed)?;
            } else {
                report::write_backups(&mut out, &removed, "removed")?;
            }
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_new(root: &Path, name: &str, force: bool) -> Result<i32> {
    let paths = new_project(root, name, &ScaffoldOptions { force })?;
    let mut out = std::io::stdout().lock();
    for created in [
        &paths.cmd_dir,
        &paths.internal_dir,
        &paths.pkg_dir,
        &paths.main_path,
        &paths.go_mod_path,
    ] {
        writeln!(out, "created {}", created.display())?;
    }
    writeln!(out, "next steps:\n  cd {}\n  go mod tidy", paths.root.display())?;
    Ok(exit_codes::OK)
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!(
            "init-config: {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &DropConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn engine_options(cfg: &DropConfig, root: &Path, args: &EngineArgs) -> EngineOptions {
    let mut options = EngineOptions::from_config(cfg, root);
    if let Some(jobs) = args.jobs {
        options.concurrency = usize::from(jobs);
    }
    if args.no_backup {
        options.backup = false;
    }
    if args.no_validate {
        options.validate = false;
    }
    if args.git_commit {
        options.commit = true;
    }
    options
}

/// `--clipboard`, then `--input <file|->`, then the clipboard.
fn input_source(args: &SourceArgs) -> Box<dyn InputSource> {
    match &args.input {
        _ if args.clipboard => Box::new(ClipboardSource::default()),
        Some(path) if path == Path::new("-") => Box::new(StdinSource),
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(ClipboardSource::default()),
    }
}

fn print_outcome(outcome: &PipelineOutcome, json: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        report::write_json(&mut out, outcome)
    } else {
        report::write_outcome(&mut out, outcome)
    }
}
