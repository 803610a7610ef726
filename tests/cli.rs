//! Tests for the `docqa` binary with embedding and generation disabled.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Release notes.\n\nVersion two adds offline mode.\n\nVersion three removes the legacy API.",
    )
    .unwrap();
    fs::write(files_dir.join("diagram.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/docqa.sqlite"

[storage]
upload_dir = "{root}/data/uploads"

[chunking]
chunk_size = 200
chunk_overlap = 20

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_docqa");
    let output = Command::new(binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_docqa(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_docqa(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_list_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["list"]);
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_docqa(&tmp.path().join("nope.toml"), &["list"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_upload_unsupported_format() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let png = files_dir(&config_path).join("diagram.png");
    let (_, stderr, success) = run_docqa(&config_path, &["upload", png.to_str().unwrap()]);
    assert!(!success, "unsupported upload should fail");
    assert!(stderr.contains("unsupported file format"), "stderr: {}", stderr);

    let (stdout, _, _) = run_docqa(&config_path, &["list"]);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_upload_without_embeddings_marks_failed() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let txt = files_dir(&config_path).join("notes.txt");
    let (_, stderr, success) = run_docqa(&config_path, &["upload", txt.to_str().unwrap()]);
    assert!(!success, "upload should fail with embeddings disabled");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);

    let (stdout, _, success) = run_docqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("notes.txt"));
    assert!(stdout.contains("failed"));
}

#[test]
fn test_query_small_talk_works_without_models() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docqa(&config_path, &["query", "hello"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("Hi there!"));
    assert!(!stdout.contains("Sources:"));
}

#[test]
fn test_query_rejects_top_k_out_of_range() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (_, stderr, success) =
        run_docqa(&config_path, &["query", "what changed?", "--top-k", "11"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}

#[test]
fn test_query_without_embeddings_errors() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (_, stderr, success) = run_docqa(&config_path, &["query", "what changed in version two?"]);
    assert!(!success);
    assert!(stderr.contains("embedding"), "stderr: {}", stderr);
}

#[test]
fn test_get_missing_document() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (_, stderr, success) = run_docqa(&config_path, &["get", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_delete_missing_document() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (_, stderr, success) = run_docqa(&config_path, &["delete", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_get_and_delete_failed_upload() {
    let (_tmp, config_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let txt = files_dir(&config_path).join("notes.txt");
    run_docqa(&config_path, &["upload", txt.to_str().unwrap()]);

    let (stdout, _, _) = run_docqa(&config_path, &["list"]);
    let id = stdout
        .lines()
        .find(|l| l.contains("notes.txt"))
        .and_then(|l| l.split_whitespace().next())
        .expect("document id in list output")
        .to_string();

    let (stdout, _, success) = run_docqa(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("status:      failed"));
    assert!(stdout.contains("chunks:      0"));

    let (stdout, stderr, success) = run_docqa(&config_path, &["delete", &id]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("Deleted document"));
    assert!(stdout.contains("record:        removed"));

    let (stdout, _, _) = run_docqa(&config_path, &["list"]);
    assert!(stdout.contains("No documents."));
}
