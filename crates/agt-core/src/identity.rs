//! "Which agent am I?"
//!
//! Several agents may run commands against the same repository at the same
//! time, so there is no stored "current agent". Every invocation derives the
//! identity from its own context, in this order (first match wins):
//!
//! 1. an explicit `--agent` override
//! 2. the current directory, when it lies inside `.work/<agent-id>/`
//! 3. the legacy `AGENT_ID` environment variable, if its worktree exists
//! 4. the only existing worktree, when there is exactly one
//!
//! Anything else is an error: no worktrees at all, or several with nothing
//! to pick between them.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::agent_id::AgentId;
use crate::worktree::{
    WORK_DIR_NAME, WorktreeError, is_linked_worktree, list_agent_worktrees, worktree_exists,
};

/// Name of the legacy environment variable holding an agent identity.
pub const LEGACY_AGENT_ENV: &str = "AGENT_ID";

/// Inputs for identity resolution, gathered by the caller.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Identity passed on the command line.
    pub explicit: Option<AgentId>,

    /// The invocation's working directory.
    pub cwd: PathBuf,

    /// Raw value of the legacy `AGENT_ID` variable, if set.
    pub legacy_env: Option<String>,
}

impl ResolveContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Self::default()
        }
    }

    pub fn with_explicit(mut self, explicit: Option<AgentId>) -> Self {
        self.explicit = explicit;
        self
    }

    pub fn with_legacy_env(mut self, value: Option<String>) -> Self {
        self.legacy_env = value;
        self
    }
}

/// Which strategy produced a resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Explicit,
    Directory,
    Environment,
    Singleton,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explicit => "--agent flag",
            Self::Directory => "current directory",
            Self::Environment => "AGENT_ID environment variable",
            Self::Singleton => "only existing worktree",
        };
        f.write_str(s)
    }
}

/// A resolved agent identity and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: AgentId,
    pub source: ResolutionSource,
}

/// Errors from identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("No agent worktrees found. Run 'agt ws new' first!")]
    NoAgent,

    #[error(
        "Multiple agent worktrees found: {}\nEither:\n  - run the command from within a worktree directory: cd .work/<agent-id>\n  - specify the agent explicitly: --agent <agent-id>",
        join_ids(candidates)
    )]
    AmbiguousAgent { candidates: Vec<AgentId> },

    #[error(transparent)]
    Worktree(#[from] WorktreeError),
}

fn join_ids(ids: &[AgentId]) -> String {
    ids.iter()
        .map(AgentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the agent an invocation should act on.
///
/// The explicit override is returned as is; whether its worktree exists is
/// checked by the command that uses it.
pub fn resolve(ctx: &ResolveContext, repo_root: &Path) -> Result<Resolved, ResolveError> {
    if let Some(id) = &ctx.explicit {
        return Ok(found(id.clone(), ResolutionSource::Explicit));
    }

    if let Some(id) = agent_from_dir(&ctx.cwd) {
        return Ok(found(id, ResolutionSource::Directory));
    }

    if let Some(raw) = ctx.legacy_env.as_deref().filter(|v| !v.is_empty()) {
        match AgentId::parse(raw) {
            Some(id) if worktree_exists(repo_root, &id) => {
                return Ok(found(id, ResolutionSource::Environment));
            }
            Some(id) => debug!(
                agent = %id,
                "{LEGACY_AGENT_ENV} names a missing worktree, ignoring"
            ),
            None => warn!("Ignoring malformed {LEGACY_AGENT_ENV}={raw:?}"),
        }
    }

    let mut candidates = list_agent_worktrees(repo_root)?;
    match candidates.len() {
        0 => Err(ResolveError::NoAgent),
        1 => Ok(found(candidates.remove(0), ResolutionSource::Singleton)),
        _ => Err(ResolveError::AmbiguousAgent { candidates }),
    }
}

fn found(id: AgentId, source: ResolutionSource) -> Resolved {
    debug!(agent = %id, %source, "resolved agent");
    Resolved { id, source }
}

/// Agent identity from a directory inside `.../.work/<agent-id>/...`.
///
/// The worktree itself must still exist and carry its link file; a leftover
/// directory does not count.
pub fn agent_from_dir(dir: &Path) -> Option<AgentId> {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

    let components: Vec<Component<'_>> = dir.components().collect();
    for (i, pair) in components.windows(2).enumerate() {
        let (Component::Normal(container), Component::Normal(name)) = (pair[0], pair[1]) else {
            continue;
        };
        if container != WORK_DIR_NAME {
            continue;
        }
        let Some(id) = name.to_str().and_then(AgentId::parse) else {
            continue;
        };

        let worktree: PathBuf = components[..i + 2].iter().collect();
        if worktree.is_dir() && is_linked_worktree(&worktree) {
            return Some(id);
        }
    }
    None
}
