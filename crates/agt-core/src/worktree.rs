//! Git worktree management for concurrent agents.
//!
//! Each agent gets its own linked worktree at `<repo-root>/.work/<agent-id>`,
//! checked out on `feat/<agent-id>`. Worktrees share history with the main
//! checkout but have their own working directory and HEAD, so agents never
//! see each other's uncommitted work.
//!
//! Nothing is persisted besides what git itself records: the directory under
//! `.work/` plus the naming convention is the whole registry.
//!
//! # Example
//!
//! ```no_run
//! use agt_core::worktree::{create_agent_worktree, list_agent_worktrees, remove_agent_worktree};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = std::path::Path::new("/path/to/repo");
//!
//!     let worktree = create_agent_worktree(root, "main")?;
//!     println!("{} on {}", worktree.path.display(), worktree.branch);
//!
//!     for id in list_agent_worktrees(root)? {
//!         println!("  {id}");
//!     }
//!
//!     remove_agent_worktree(root, &worktree.id, false)?;
//!     Ok(())
//! }
//! ```

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::agent_id::AgentId;
use crate::git_ops::{failure_text, get_head_sha, run_git};

/// Directory under the repository root that holds all agent worktrees.
pub const WORK_DIR_NAME: &str = ".work";

/// A freshly created agent worktree.
#[derive(Debug, Clone)]
pub struct AgentWorktree {
    /// The agent this worktree belongs to.
    pub id: AgentId,

    /// Absolute path to the worktree directory.
    pub path: PathBuf,

    /// The branch checked out in this worktree.
    pub branch: String,

    /// HEAD commit (if available).
    pub head: Option<String>,
}

/// Errors that can occur during worktree operations.
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Git rejected creating the agent branch (bad base ref, name collision).
    #[error("Failed to create branch {branch}:\n{stderr}")]
    BranchCreationFailed { branch: String, stderr: String },

    /// Git rejected attaching the worktree.
    #[error("Failed to create worktree at {}:\n{stderr}", path.display())]
    WorktreeCreationFailed { path: PathBuf, stderr: String },

    /// Git command failed.
    #[error("Git command failed: {0}")]
    Git(String),
}

/// `<repo-root>/.work`
pub fn work_dir(repo_root: impl AsRef<Path>) -> PathBuf {
    repo_root.as_ref().join(WORK_DIR_NAME)
}

/// `<repo-root>/.work/<agent-id>`. Pure derivation, no IO.
pub fn worktree_path(repo_root: impl AsRef<Path>, id: &AgentId) -> PathBuf {
    work_dir(repo_root).join(id.as_str())
}

/// Check if a worktree directory exists for the given agent.
pub fn worktree_exists(repo_root: impl AsRef<Path>, id: &AgentId) -> bool {
    worktree_path(repo_root, id).exists()
}

/// Whether `path` is the top of a linked worktree, i.e. holds a `.git` link
/// file pointing back at the main repository.
pub fn is_linked_worktree(path: impl AsRef<Path>) -> bool {
    let git_entry = path.as_ref().join(".git");
    if !git_entry.is_file() {
        return false;
    }
    fs::read_to_string(&git_entry)
        .map(|content| content.trim_start().starts_with("gitdir:"))
        .unwrap_or(false)
}

/// Create a new worktree for a freshly generated agent.
///
/// Creates branch `feat/<id>` from `base_branch`, then attaches a linked
/// worktree at `.work/<id>`. If attaching fails the branch is deleted again,
/// so a failed create leaves nothing behind.
pub fn create_agent_worktree(
    repo_root: impl AsRef<Path>,
    base_branch: &str,
) -> Result<AgentWorktree, WorktreeError> {
    let repo_root = repo_root.as_ref();

    let id = AgentId::generate();
    let path = worktree_path(repo_root, &id);
    let branch = id.branch_name();

    fs::create_dir_all(work_dir(repo_root))?;

    // git branch <branch> <base>
    let output = run_git(repo_root, ["branch", branch.as_str(), base_branch])?;
    if !output.status.success() {
        return Err(WorktreeError::BranchCreationFailed {
            branch,
            stderr: failure_text(&output),
        });
    }

    // git worktree add <path> <branch>
    let output = run_git(
        repo_root,
        [
            OsStr::new("worktree"),
            OsStr::new("add"),
            path.as_os_str(),
            OsStr::new(&branch),
        ],
    )?;
    if !output.status.success() {
        let stderr = failure_text(&output);
        let cleanup = run_git(repo_root, ["branch", "-D", branch.as_str()])?;
        if !cleanup.status.success() {
            warn!(
                "Failed to delete branch {} after worktree error: {}",
                branch,
                failure_text(&cleanup)
            );
        }
        return Err(WorktreeError::WorktreeCreationFailed { path, stderr });
    }

    let head = get_head_sha(&path).ok();

    info!(
        agent = %id,
        path = %path.display(),
        %branch,
        base = base_branch,
        "Created agent worktree"
    );

    Ok(AgentWorktree {
        id,
        path,
        branch,
        head,
    })
}

/// Remove an agent's worktree.
///
/// Returns `Ok(false)` without touching git when the directory does not
/// exist, so calling this twice is safe. `force` removes the worktree even
/// with uncommitted changes. The agent's branch is kept.
pub fn remove_agent_worktree(
    repo_root: impl AsRef<Path>,
    id: &AgentId,
    force: bool,
) -> Result<bool, WorktreeError> {
    let repo_root = repo_root.as_ref();
    let path = worktree_path(repo_root, id);

    if !path.exists() {
        debug!(agent = %id, "worktree already absent");
        return Ok(false);
    }

    let mut args = vec![OsStr::new("worktree"), OsStr::new("remove")];
    if force {
        args.push(OsStr::new("--force"));
    }
    args.push(path.as_os_str());

    let output = run_git(repo_root, args)?;
    if !output.status.success() {
        return Err(WorktreeError::Git(failure_text(&output)));
    }

    info!(agent = %id, path = %path.display(), "Removed agent worktree");
    Ok(true)
}

/// List agent worktrees under `<repo-root>/.work`, sorted by identity.
///
/// Only directories named like an agent identity that hold a worktree link
/// file count; stray or manually created directories are skipped.
pub fn list_agent_worktrees(repo_root: impl AsRef<Path>) -> Result<Vec<AgentId>, WorktreeError> {
    let dir = work_dir(repo_root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(AgentId::parse) else {
            continue;
        };
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if !is_linked_worktree(entry.path()) {
            debug!(agent = %id, "skipping directory without worktree link");
            continue;
        }
        ids.push(id);
    }

    ids.sort();
    Ok(ids)
}
