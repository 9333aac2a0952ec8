//! Tests for the telegram_ci_upload binary
//!
//! None of these reach the network: every case stops at validation or runs
//! with --dry-run.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const REQUIRED: [(&str, &str); 6] = [
    ("BOT_TOKEN", "123:abc"),
    ("CHAT_ID", "-1001234567890"),
    ("RUN_URL", "https://x/run/1"),
    ("TITLE", "Build #12"),
    ("VERSION", "1.2.3"),
    ("BRANCH", "main"),
];

fn workdir() -> TempDir {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("app.apk"), b"apk").expect("write artifact");
    dir
}

fn command(dir: &Path, env: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_telegram_ci_upload"));
    cmd.env_clear().current_dir(dir).envs(env.iter().copied());
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_missing_variable_exits_with_one() {
    for (i, (key, _)) in REQUIRED.iter().enumerate() {
        let dir = workdir();
        let env: Vec<(&str, &str)> = REQUIRED
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, pair)| *pair)
            .collect();

        let output = command(dir.path(), &env)
            .arg("app.apk")
            .output()
            .expect("run binary");

        assert_eq!(output.status.code(), Some(1), "missing {}", key);
        let out = stdout(&output);
        assert!(out.contains(&format!("[-] Invalid {}", key)), "{}", out);
        assert!(!out.contains("Logging in"));
    }
}

#[test]
fn test_invalid_thread_id_exits_with_one() {
    let dir = workdir();
    let mut env = REQUIRED.to_vec();
    env.push(("MESSAGE_THREAD_ID", "general"));

    let output = command(dir.path(), &env)
        .arg("app.apk")
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("[-] Invalid MESSAGE_THREAD_ID"));
}

#[test]
fn test_zero_files_exits_with_one() {
    let dir = workdir();
    let output = command(dir.path(), &REQUIRED).output().expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("[-] No files to upload"));
    assert!(!out.contains("Logging in"));
}

#[test]
fn test_missing_file_exits_with_one() {
    let dir = workdir();
    let output = command(dir.path(), &REQUIRED)
        .args(["app.apk", "missing.zip"])
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("[-] File not found: missing.zip"));
}

#[test]
fn test_dry_run_prints_caption_list() {
    let dir = workdir();
    std::fs::write(dir.path().join("app.aab"), b"aab").unwrap();
    let mut env = REQUIRED.to_vec();
    env.push(("COMMIT_MESSAGE", "fix bug"));
    env.push(("COMMIT_URL", "https://x/commit/abc"));

    let output = command(dir.path(), &env)
        .args(["--dry-run", "app.apk", "app.aab"])
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("[+] Uploading to telegram"));
    assert!(out.contains(r#"["", "**Build #12**\nBranch: main\n#ci_1.2.3"#), "{}", out);
    assert!(out.contains("[Commit](https://x/commit/abc)"));
    assert!(out.contains("[+] Dry run, nothing sent"));
}

#[test]
fn test_invalid_api_id_exits_with_one() {
    let dir = workdir();
    let mut env = REQUIRED.to_vec();
    env.push(("TELEGRAM_API_ID", "not-a-number"));

    let output = command(dir.path(), &env)
        .args(["--dry-run", "app.apk"])
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("[-] Invalid TELEGRAM_API_ID"));
}
