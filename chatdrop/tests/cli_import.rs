//! CLI tests for `chatdrop import` and the housekeeping commands.
//!
//! Spawns the chatdrop binary and verifies exit codes, stdout and the files
//! left on disk.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use chatdrop::exit_codes;
use chatdrop::io::config::{CONFIG_FILE_NAME, DEFAULT_BACKUP_DIR};
use chatdrop::test_support::{TestRoot, header_chat, inline_chat};

fn chatdrop(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chatdrop"))
        .arg("--root")
        .arg(root)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("run chatdrop")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn import_from_file_writes_every_block() {
    let test = TestRoot::new().expect("test root");
    let root = test.root();
    let chat = test
        .write_chat(&header_chat(&[
            ("cmd/main.go", "package main\n\nfunc main() {}"),
            ("README.md", "# demo"),
        ]))
        .expect("write chat");

    let output = chatdrop(&root, &["import", "--input", chat.to_str().expect("utf8")]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{output:?}");
    assert_eq!(
        fs::read_to_string(root.join("cmd/main.go")).expect("read"),
        "package main\n\nfunc main() {}"
    );
    assert_eq!(fs::read_to_string(root.join("README.md")).expect("read"), "# demo");
    let text = stdout(&output);
    assert!(text.contains("created  cmd/main.go"));
    assert!(text.contains("2 written, 0 failed, 0 skipped"));
}

#[test]
fn import_reads_stdin_when_input_is_dash() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_chatdrop"))
        .arg("--root")
        .arg(temp.path())
        .args(["import", "--input", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn chatdrop");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(inline_chat(&[("src/lib.rs", "pub fn hi() {}")]).as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        fs::read_to_string(temp.path().join("src/lib.rs")).expect("read"),
        "pub fn hi() {}"
    );
}

#[test]
fn empty_input_exits_with_no_input() {
    let temp = tempfile::tempdir().expect("tempdir");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, "   \n").expect("write");

    let output = chatdrop(temp.path(), &["import", "--input", chat.to_str().expect("utf8")]);

    assert_eq!(output.status.code(), Some(exit_codes::NO_INPUT));
}

#[test]
fn prose_without_blocks_exits_with_no_blocks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, "Sorry, I can't help with that.\n```\nno path here\n```\n").expect("write");

    let output = chatdrop(temp.path(), &["import", "--input", chat.to_str().expect("utf8")]);

    assert_eq!(output.status.code(), Some(exit_codes::NO_BLOCKS));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no valid code blocks found"));
}

#[test]
fn partial_failure_exits_with_partial() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("project");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("blocker"), "not a directory").expect("write");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, header_chat(&[("ok.txt", "fine"), ("blocker/nope.txt", "x")])).expect("write");

    let output = chatdrop(&root, &["import", "--input", chat.to_str().expect("utf8")]);

    assert_eq!(output.status.code(), Some(exit_codes::PARTIAL));
    assert!(root.join("ok.txt").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 files failed"));
}

#[test]
fn dry_run_writes_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("project");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, header_chat(&[("a/b.go", "package b")])).expect("write");

    let output = chatdrop(
        &root,
        &["import", "--input", chat.to_str().expect("utf8"), "--dry-run", "--json"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let actions: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(actions[0]["path"], "a/b.go");
    assert_eq!(actions[0]["action"], "create");
    assert_eq!(actions[0]["bytes"], 9);
    assert!(!root.exists());
}

#[test]
fn reimport_backs_up_and_backups_list_reports_it() {
    let test = TestRoot::new().expect("test root");
    let root = test.root();
    let chat = test.chat_path();
    let chat_arg = chat.to_str().expect("utf8");

    test.write_chat(&header_chat(&[("main.py", "print('v1')")]))
        .expect("write chat");
    let first = chatdrop(&root, &["import", "--input", chat_arg, "--json"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));

    test.write_chat(&header_chat(&[("main.py", "print('v2')")]))
        .expect("write chat");
    let second = chatdrop(&root, &["import", "--input", chat_arg, "--json"]);
    assert_eq!(second.status.code(), Some(exit_codes::OK));
    let outcome: serde_json::Value = serde_json::from_slice(&second.stdout).expect("json");
    assert_eq!(outcome["files"][0]["status"], "updated");
    assert!(outcome["files"][0]["backup"]["backup_path"].is_string());

    assert_eq!(
        fs::read_to_string(root.join("main.py")).expect("read"),
        "print('v2')"
    );
    let listed = chatdrop(&root, &["backups", "list", "--json"]);
    assert_eq!(listed.status.code(), Some(exit_codes::OK));
    let entries: serde_json::Value = serde_json::from_slice(&listed.stdout).expect("json");
    let entries = entries.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["original"], "main.py");
    assert!(root.join(DEFAULT_BACKUP_DIR).is_dir());
}

#[test]
fn no_backup_flag_skips_backups() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("project");
    fs::create_dir_all(&root).expect("mkdir");
    fs::write(root.join("a.txt"), "old").expect("write");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, header_chat(&[("a.txt", "new")])).expect("write");

    let output = chatdrop(
        &root,
        &["import", "--input", chat.to_str().expect("utf8"), "--no-backup"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!root.join(DEFAULT_BACKUP_DIR).exists());
    assert_eq!(fs::read_to_string(root.join("a.txt")).expect("read"), "new");
}

#[test]
fn init_config_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = chatdrop(temp.path(), &["init-config"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let contents = fs::read_to_string(temp.path().join(CONFIG_FILE_NAME)).expect("read");
    assert!(contents.contains("concurrency = 4"));

    let second = chatdrop(temp.path(), &["init-config"]);
    assert_eq!(second.status.code(), Some(exit_codes::FAILED));

    let forced = chatdrop(temp.path(), &["init-config", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_config_fails_before_reading_input() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(CONFIG_FILE_NAME), "concurrency = 0\n").expect("write");
    let chat = temp.path().join("chat.md");
    fs::write(&chat, header_chat(&[("a.txt", "x")])).expect("write");

    let output = chatdrop(temp.path(), &["import", "--input", chat.to_str().expect("utf8")]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(!temp.path().join("a.txt").exists());
}

#[test]
fn new_scaffolds_a_go_project() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = chatdrop(temp.path(), &["new", "demo"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("demo/internal").is_dir());
    assert!(temp.path().join("demo/pkg").is_dir());
    assert_eq!(
        fs::read_to_string(temp.path().join("demo/go.mod")).expect("read"),
        "module demo\n\ngo 1.22\n"
    );
    assert!(stdout(&output).contains("go mod tidy"));
}
