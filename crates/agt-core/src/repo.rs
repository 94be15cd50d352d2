//! Repository root discovery.
//!
//! Every lifecycle command works relative to the *main* checkout, even when
//! invoked from inside an agent worktree. `git rev-parse --show-toplevel`
//! alone would return the worktree's own directory there, so linked
//! worktrees are followed back through their `.git` link file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::git_ops::{self, GitOpsError};

/// Name of git's metadata entry at the top of every checkout.
const GIT_DIR_NAME: &str = ".git";

/// Prefix of the single line inside a linked worktree's `.git` file.
const GITDIR_PREFIX: &str = "gitdir:";

/// Errors from locating the repository root.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// No git metadata at or above the start directory.
    #[error("Not a git repository: {0} (run agt from inside a git checkout)")]
    NotARepository(String),

    /// IO error reading the worktree link file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Find the main repository root for `start_dir`.
///
/// From the main checkout this is the top-level directory. From a linked
/// worktree (where `.git` is a file such as
/// `gitdir: /repo/.git/worktrees/agent-1a2b3c4d`) it is the parent of the
/// shared `.git` directory.
pub fn locate_repo_root(start_dir: impl AsRef<Path>) -> Result<PathBuf, RepoError> {
    let start_dir = start_dir.as_ref();

    // A missing start directory surfaces as an IO error; treat it the same way
    let toplevel = git_ops::show_toplevel(start_dir).map_err(|e: GitOpsError| {
        debug!(start = %start_dir.display(), error = %e, "rev-parse --show-toplevel failed");
        RepoError::NotARepository(start_dir.display().to_string())
    })?;

    let git_entry = toplevel.join(GIT_DIR_NAME);
    if !git_entry.is_file() {
        return Ok(toplevel);
    }

    let content = fs::read_to_string(&git_entry)?;
    let root = main_root_from_link(&toplevel, &content).unwrap_or(toplevel);
    debug!(root = %root.display(), "resolved main repository root from linked worktree");
    Ok(root)
}

/// Resolve the main repository root from a linked worktree's `.git` file.
///
/// Returns `None` when the file is not a `gitdir:` link or its target has no
/// `.git` ancestor.
fn main_root_from_link(worktree_top: &Path, link_content: &str) -> Option<PathBuf> {
    let target = link_content.trim().strip_prefix(GITDIR_PREFIX)?.trim();
    let mut git_dir = PathBuf::from(target);
    if git_dir.is_relative() {
        git_dir = worktree_top.join(git_dir);
    }
    // Resolve `..` segments when the target exists; keep the joined path otherwise
    let git_dir = fs::canonicalize(&git_dir).unwrap_or(git_dir);

    // <root>/.git/worktrees/<name> -> <root>/.git -> <root>
    git_dir
        .ancestors()
        .find(|p| p.file_name().is_some_and(|n| n == GIT_DIR_NAME))
        .and_then(Path::parent)
        .map(Path::to_path_buf)
}
