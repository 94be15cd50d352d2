//! # agt-core
//!
//! Worktree-based isolation for agents sharing one git repository.
//!
//! This crate provides:
//! - Repository root discovery, including from inside linked worktrees
//! - Agent identities and the `.work/<id>` / `feat/<id>` naming convention
//! - Identity resolution from flags, directory, environment and singleton
//! - The lifecycle verbs (new, run, save, push, merge, clean) as [`Lifecycle`]

pub mod agent_id;
pub mod git_ops;
pub mod identity;
pub mod lifecycle;
pub mod repo;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod worktree;

pub use agent_id::{AgentId, InvalidAgentId};
pub use git_ops::GitOpsError;
pub use identity::{ResolutionSource, ResolveContext, ResolveError, Resolved, resolve};
pub use lifecycle::{Lifecycle, LifecycleCommand, LifecycleError, LifecycleSettings, Outcome};
pub use repo::{RepoError, locate_repo_root};
pub use worktree::{AgentWorktree, WorktreeError};
