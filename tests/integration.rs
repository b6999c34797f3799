use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lidx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lidx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Two folders, one excluded archive folder.
    let collection = root.join("leaks").join("Collection 1");
    let alpha = collection.join("alpha");
    let beta = collection.join("beta");
    let archive = collection.join("old.tar.gz");
    for dir in [&alpha, &beta, &archive] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(
        alpha.join("a.txt"),
        "a@x.com:pw1\nb@y.com;pw2\ngarbage\na@x.com:pw1\n",
    )
    .unwrap();
    fs::write(alpha.join("notes.md"), "c@x.com:ignored\n").unwrap();
    fs::write(beta.join("b.txt"), "b@y.com:pw2\nd@z.com:pw4\r\n").unwrap();
    fs::write(archive.join("hidden.txt"), "e@x.com:pw5\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/leaks.sqlite"

[source]
root = "{root}/leaks"
collection = "Collection 1"

[pipeline]
workers = 2
batch_size = 2
tick_secs = 1
"#,
        root = root.display(),
    );

    let config_path = config_dir.join("lidx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lidx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lidx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lidx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lidx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/leaks.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_lidx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_lidx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_collection() {
    let (_tmp, config_path) = setup_test_env();

    run_lidx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_lidx(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("index Collection 1"));
    assert!(stdout.contains("jobs: 2"), "got: {}", stdout);
    assert!(stdout.contains("completed: 2"));
    assert!(stdout.contains("credentials inserted: 3"));
    assert!(stdout.contains("duplicates: 2"));
    assert!(stdout.contains("lines skipped: 1"));
    assert!(stdout.lines().last().unwrap_or("").trim() == "ok");
}

#[test]
fn test_index_without_init() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lidx(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("credentials inserted: 3"));
}

#[test]
fn test_index_rerun_is_noop() {
    let (_tmp, config_path) = setup_test_env();

    run_lidx(&config_path, &["init"]);
    run_lidx(&config_path, &["index", "--progress", "off"]);

    let (stdout, _, success) = run_lidx(&config_path, &["index", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("jobs: 0"), "got: {}", stdout);
    assert!(stdout.contains("2 already done"));
}

#[test]
fn test_index_overrides() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lidx(
        &config_path,
        &["index", "--progress", "off", "--workers", "0"],
    );
    assert!(!success);
    assert!(stderr.contains("workers"), "got: {}", stderr);

    let (_, _, success) = run_lidx(
        &config_path,
        &["index", "--progress", "off", "--collection", "Missing"],
    );
    assert!(!success, "missing collection must fail");
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();

    run_lidx(&config_path, &["init"]);
    run_lidx(&config_path, &["index", "--progress", "off"]);

    let (stdout, stderr, success) = run_lidx(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Leak files:   2"), "got: {}", stdout);
    assert!(stdout.contains("done:       2"));
    assert!(stdout.contains("Hosts:        3"));
    assert!(stdout.contains("Credentials:  3"));
    assert!(stdout.contains("x.com"));
}

#[test]
fn test_reset_requires_confirmation() {
    let (_tmp, config_path) = setup_test_env();

    run_lidx(&config_path, &["init"]);
    run_lidx(&config_path, &["index", "--progress", "off"]);

    let (_, _, success) = run_lidx(&config_path, &["reset"]);
    assert!(!success);

    let (stdout, _, success) = run_lidx(&config_path, &["reset", "--yes"]);
    assert!(success);
    assert!(stdout.contains("2 leak files removed"));

    let (stdout, _, _) = run_lidx(&config_path, &["stats"]);
    assert!(stdout.contains("Credentials:  0"));
}

#[test]
fn test_missing_config() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_lidx(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
}
