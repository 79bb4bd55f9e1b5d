//! Command-line smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn openbio() -> Command {
    Command::cargo_bin("openbio-rs").unwrap_or_else(|_| unreachable!())
}

#[test]
fn help_lists_commands() {
    openbio()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn init_prompts_writes_templates() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let target = dir.path().join("prompts");

    openbio()
        .args(["init-prompts", "--dir"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 prompt template(s)"));

    assert!(target.join("router.md").exists());
    assert!(target.join("database_fetch.md").exists());
}

#[test]
fn ask_without_api_key_fails() {
    openbio()
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENBIO_API_KEY")
        .args(["ask", "What is TP53?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn batch_missing_input_fails() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    openbio()
        .args(["batch", "does-not-exist.json", "--output"])
        .arg(dir.path().join("out.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("input file not found"));
}
