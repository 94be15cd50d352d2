//! Git operations used by the agent lifecycle commands.
//!
//! Every call shells out to `git` with a discrete argument vector (nothing is
//! interpolated into a shell string) and turns a non-zero exit into a typed
//! [`GitOpsError`] carrying git's own diagnostic output verbatim.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, warn};

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum GitOpsError {
    /// IO error (usually: `git` is not installed or the directory is gone).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Staging found nothing to commit.
    #[error("Nothing to commit: the worktree has no pending changes")]
    NothingToCommit,

    /// `git commit` failed for a reason other than an empty index.
    #[error("Commit failed:\n{0}")]
    CommitFailed(String),

    /// The remote refused a push (non-fast-forward, auth, unknown remote).
    #[error("Push rejected:\n{0}")]
    PushRejected(String),

    /// Rebasing onto the base branch stopped on conflicts; the rebase was aborted.
    #[error("Rebase conflict (rebase aborted, resolve manually and retry):\n{0}")]
    RebaseConflict(String),

    /// Fetching the base branch failed.
    #[error("Fetch failed:\n{0}")]
    FetchFailed(String),

    /// Switching a checkout to another branch failed.
    #[error("Checkout failed:\n{0}")]
    CheckoutFailed(String),

    /// The target branch could not be fast-forwarded.
    #[error("Fast-forward merge failed:\n{0}")]
    FastForwardFailed(String),

    /// Any other git command failure.
    #[error("Git command failed: {0}")]
    Git(String),
}

/// Run `git <args>` in `dir`, capturing output.
pub(crate) fn run_git<I, S>(dir: &Path, args: I) -> io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    debug!(dir = %dir.display(), args = ?cmd.get_args().collect::<Vec<_>>(), "git");
    cmd.output()
}

/// Git's diagnostic text for a failed command: stderr, or stdout when stderr
/// is empty.
pub(crate) fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim_end().to_string()
    } else {
        stderr.trim_end().to_string()
    }
}

/// Both output streams, for commands (like rebase) that report conflicts on
/// stdout and the summary on stderr.
fn combined_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = String::new();
    if !stdout.trim().is_empty() {
        text.push_str(stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    text
}

/// Top-level directory of the checkout containing `dir`.
pub fn show_toplevel(dir: impl AsRef<Path>) -> Result<PathBuf, GitOpsError> {
    let output = run_git(dir.as_ref(), ["rev-parse", "--show-toplevel"])?;

    if !output.status.success() {
        return Err(GitOpsError::Git(failure_text(&output)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(PathBuf::from(stdout.trim()))
}

/// Stage every change in the worktree: modified, deleted and untracked files.
pub fn stage_all(path: impl AsRef<Path>) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["add", "-A"])?;

    if !output.status.success() {
        return Err(GitOpsError::Git(format!(
            "Failed to stage changes: {}",
            failure_text(&output)
        )));
    }
    Ok(())
}

/// Whether the index differs from HEAD.
pub fn has_staged_changes(path: impl AsRef<Path>) -> Result<bool, GitOpsError> {
    let output = run_git(path.as_ref(), ["diff", "--cached", "--quiet"])?;

    // --quiet: 0 = no differences, 1 = differences, anything else = error
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(GitOpsError::Git(failure_text(&output))),
    }
}

/// Stage all changes and commit them with `message`.
///
/// Returns the new HEAD commit SHA. Fails with
/// [`GitOpsError::NothingToCommit`] when staging leaves the index identical
/// to HEAD.
pub fn commit_all(path: impl AsRef<Path>, message: &str) -> Result<String, GitOpsError> {
    let path = path.as_ref();

    stage_all(path)?;

    if !has_staged_changes(path)? {
        debug!(path = %path.display(), "nothing staged");
        return Err(GitOpsError::NothingToCommit);
    }

    let output = run_git(path, ["commit", "-m", message])?;
    if !output.status.success() {
        return Err(GitOpsError::CommitFailed(failure_text(&output)));
    }

    get_head_sha(path)
}

/// Get the HEAD commit SHA.
pub fn get_head_sha(path: impl AsRef<Path>) -> Result<String, GitOpsError> {
    let output = run_git(path.as_ref(), ["rev-parse", "HEAD"])?;

    if !output.status.success() {
        return Err(GitOpsError::Git(failure_text(&output)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Push the current branch to `remote`, setting upstream tracking.
pub fn push_upstream(path: impl AsRef<Path>, remote: &str) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["push", "-u", remote, "HEAD"])?;

    if !output.status.success() {
        return Err(GitOpsError::PushRejected(failure_text(&output)));
    }
    Ok(())
}

/// Push a named local branch to `remote`.
pub fn push_branch(path: impl AsRef<Path>, remote: &str, branch: &str) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["push", remote, branch])?;

    if !output.status.success() {
        return Err(GitOpsError::PushRejected(failure_text(&output)));
    }
    Ok(())
}

/// Fetch `branch` from `remote`, updating `<remote>/<branch>`.
pub fn fetch(path: impl AsRef<Path>, remote: &str, branch: &str) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["fetch", remote, branch])?;

    if !output.status.success() {
        return Err(GitOpsError::FetchFailed(failure_text(&output)));
    }
    Ok(())
}

/// Rebase the checked-out branch onto `upstream`.
///
/// On failure the rebase is aborted so the worktree is left on its original
/// commits, and [`GitOpsError::RebaseConflict`] carries git's full output.
pub fn rebase_onto(path: impl AsRef<Path>, upstream: &str) -> Result<(), GitOpsError> {
    let path = path.as_ref();
    let output = run_git(path, ["rebase", upstream])?;

    if output.status.success() {
        return Ok(());
    }

    let details = combined_text(&output);
    let abort = run_git(path, ["rebase", "--abort"])?;
    if !abort.status.success() {
        // Nothing to abort: the rebase never started (e.g. unknown upstream).
        warn!(
            path = %path.display(),
            "rebase --abort failed: {}",
            failure_text(&abort)
        );
        return Err(GitOpsError::Git(format!("Rebase failed: {details}")));
    }
    Err(GitOpsError::RebaseConflict(details))
}

/// Check out an existing branch.
pub fn checkout(path: impl AsRef<Path>, branch: &str) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["checkout", branch])?;

    if !output.status.success() {
        return Err(GitOpsError::CheckoutFailed(failure_text(&output)));
    }
    Ok(())
}

/// Fast-forward the checked-out branch to `branch`; never creates a merge commit.
pub fn merge_ff_only(path: impl AsRef<Path>, branch: &str) -> Result<(), GitOpsError> {
    let output = run_git(path.as_ref(), ["merge", "--ff-only", branch])?;

    if !output.status.success() {
        return Err(GitOpsError::FastForwardFailed(failure_text(&output)));
    }
    Ok(())
}
