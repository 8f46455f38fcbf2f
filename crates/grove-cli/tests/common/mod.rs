//! Helpers for driving the `grove` binary in temporary directories.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

fn command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_grove"));
    cmd.args(args)
        .current_dir(dir)
        .env_remove("GROVE_LOG")
        .env("TZ", "UTC")
        .env("LC_ALL", "C");
    cmd
}

fn collect(output: std::process::Output) -> CommandResult {
    CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(128),
    }
}

pub fn grove(dir: &Path, args: &[&str]) -> CommandResult {
    collect(command(dir, args).output().expect("failed to run grove"))
}

pub fn grove_stdin(dir: &Path, args: &[&str], input: &[u8]) -> CommandResult {
    let mut child = command(dir, args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn grove");
    child.stdin.take().unwrap().write_all(input).unwrap();
    collect(child.wait_with_output().unwrap())
}

/// Run and require success, returning trimmed stdout.
pub fn ok(dir: &Path, args: &[&str]) -> String {
    let result = grove(dir, args);
    assert_eq!(
        result.exit_code, 0,
        "grove {:?} failed\nstdout: {}\nstderr: {}",
        args, result.stdout, result.stderr
    );
    result.stdout.trim_end().to_string()
}

pub fn init(dir: &Path) {
    ok(dir, &["init", "-b", "main"]);
}

/// Stage `files`, write a tree and a commit on top of `parent`, and return
/// the commit id. The ref is not moved.
pub fn commit(dir: &Path, files: &[(&str, &str)], parent: Option<&str>, time: u64) -> String {
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, content).unwrap();
    }
    let mut add = vec!["add"];
    add.extend(files.iter().map(|(p, _)| *p));
    ok(dir, &add);
    let tree = ok(dir, &["write-tree"]);

    let mut payload = format!("tree {}\n", tree);
    if let Some(parent) = parent {
        payload.push_str(&format!("parent {}\n", parent));
    }
    let who = format!("A U Thor <author@example.com> {} +0000", time);
    payload.push_str(&format!("author {}\ncommitter {}\n\ncommit at {}\n", who, who, time));

    let result = grove_stdin(dir, &["hash-object", "-w", "-t", "commit", "--stdin"], payload.as_bytes());
    assert_eq!(result.exit_code, 0, "{}", result.stderr);
    result.stdout.trim().to_string()
}
