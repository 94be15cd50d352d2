//! Temporary git repositories for tests.
//!
//! Available to this crate's unit tests and, through the `test-support`
//! feature, to the CLI's integration tests. All helpers panic on failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git <args>` in `dir`, panicking on failure. Returns stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Initialize a repository on `main` with identity config and one commit
/// (worktrees need a commit to branch from).
pub fn init_git_repo(dir: &Path) {
    git(dir, &["init", "--initial-branch=main"]);
    git(dir, &["config", "user.email", "test@test.local"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);

    fs::write(dir.join("README.md"), "# Test\n").unwrap();
    git(dir, &["add", "README.md"]);
    git(dir, &["commit", "-m", "Initial commit"]);
}

/// Create `<parent>/repo` (initialized, canonical path) and return it.
pub fn create_repo(parent: &Path) -> PathBuf {
    let repo = parent.join("repo");
    fs::create_dir_all(&repo).unwrap();
    init_git_repo(&repo);
    fs::canonicalize(&repo).unwrap()
}

/// Create `<parent>/repo` with a bare `<parent>/remote.git` configured as
/// `origin`, with `main` pushed and tracking. Returns `(repo, remote)`.
pub fn init_repo_with_remote(parent: &Path) -> (PathBuf, PathBuf) {
    let repo = create_repo(parent);
    let remote = parent.join("remote.git");
    git(
        parent,
        &[
            "init",
            "--bare",
            "--initial-branch=main",
            remote.to_str().unwrap(),
        ],
    );
    let remote = fs::canonicalize(&remote).unwrap();

    git(&repo, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&repo, &["push", "-u", "origin", "main"]);
    (repo, remote)
}

/// Commit a single file change in `dir` with the given message.
pub fn commit_file(dir: &Path, file: &str, contents: &str, message: &str) {
    fs::write(dir.join(file), contents).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "-m", message]);
}

/// Branch checked out in `dir`.
pub fn current_branch(dir: &Path) -> String {
    git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).trim().to_string()
}

/// SHA that `rev` resolves to in `dir`.
pub fn rev_parse(dir: &Path, rev: &str) -> String {
    git(dir, &["rev-parse", rev]).trim().to_string()
}

/// A fresh repository inside its own temporary directory. Keep the
/// `TempDir` alive for as long as the repository is used.
pub fn temp_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_repo(temp_dir.path());
    (temp_dir, repo)
}

/// Like [`temp_repo`], with a bare `origin` remote. Returns
/// `(temp_dir, repo, remote)`.
pub fn temp_repo_with_remote() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let (repo, remote) = init_repo_with_remote(temp_dir.path());
    (temp_dir, repo, remote)
}
