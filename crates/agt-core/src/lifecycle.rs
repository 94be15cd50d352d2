//! Lifecycle commands over an agent worktree.
//!
//! A worktree moves through `absent -> created -> (run | save)* -> pushed ->
//! merged -> absent`, with `clean` allowed from any state where the worktree
//! exists. [`Lifecycle::execute`] runs one verb per call; nothing is rolled
//! back when a multi-step verb (merge) fails halfway, and re-running it starts
//! again from the fetch.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::{debug, info};

use crate::agent_id::AgentId;
use crate::git_ops::{self, GitOpsError};
use crate::identity::{self, ResolveContext, ResolveError, Resolved};
use crate::repo::RepoError;
use crate::worktree::{self, AgentWorktree, WorktreeError, worktree_path};

/// Base branch used when neither the command nor the settings name one.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Remote used when neither the command nor the settings name one.
pub const DEFAULT_REMOTE: &str = "origin";

/// One lifecycle verb. `None` fields fall back to [`LifecycleSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Create a worktree for a new agent.
    New { base_branch: Option<String> },

    /// Run a shell command inside the worktree.
    Run { command: String },

    /// Stage everything and commit.
    Save { message: String },

    /// Publish the agent branch.
    Push { remote: Option<String> },

    /// Rebase onto the remote base branch and fast-forward it.
    Merge {
        remote: Option<String>,
        base_branch: Option<String>,
    },

    /// Remove the worktree; the branch is kept.
    Clean { force: bool },
}

impl LifecycleCommand {
    /// Verb name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::New { .. } => "new",
            Self::Run { .. } => "run",
            Self::Save { .. } => "save",
            Self::Push { .. } => "push",
            Self::Merge { .. } => "merge",
            Self::Clean { .. } => "clean",
        }
    }
}

/// Defaults applied to commands that leave a branch or remote unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub base_branch: String,
    pub remote: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// What a successful command did.
#[derive(Debug, Clone)]
pub enum Outcome {
    Created(AgentWorktree),

    /// The command ran; a non-zero code is still an `Ok` outcome.
    Ran { exit_code: i32 },

    Saved { commit: String },

    Pushed { remote: String, branch: String },

    Merged {
        base_branch: String,
        branch: String,
        commit: String,
    },

    Cleaned { path: PathBuf },
}

/// Errors from lifecycle commands.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(
        "No worktree for {agent} at {}. Run 'agt ws new' to create one.",
        path.display()
    )]
    WorktreeNotFound { agent: AgentId, path: PathBuf },

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Git(#[from] GitOpsError),

    /// The shell for `run` could not be started.
    #[error("Failed to start command: {0}")]
    Io(#[from] io::Error),
}

/// Executes lifecycle commands against one repository.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    repo_root: PathBuf,
    settings: LifecycleSettings,
}

impl Lifecycle {
    /// Creates an executor for an already located repository root.
    pub fn new(repo_root: impl Into<PathBuf>, settings: LifecycleSettings) -> Self {
        Self {
            repo_root: repo_root.into(),
            settings,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolves which agent an invocation acts on.
    pub fn resolve(&self, ctx: &ResolveContext) -> Result<Resolved, LifecycleError> {
        Ok(identity::resolve(ctx, &self.repo_root)?)
    }

    /// Lists existing agent worktrees, sorted.
    pub fn list(&self) -> Result<Vec<AgentId>, LifecycleError> {
        Ok(worktree::list_agent_worktrees(&self.repo_root)?)
    }

    /// Runs one command.
    ///
    /// `agent` is ignored by `New` and required by everything else; `None`
    /// there is reported as [`ResolveError::NoAgent`].
    pub fn execute(
        &self,
        command: LifecycleCommand,
        agent: Option<&AgentId>,
    ) -> Result<Outcome, LifecycleError> {
        debug!(command = command.name(), agent = ?agent.map(AgentId::as_str), "execute");

        match command {
            LifecycleCommand::New { base_branch } => {
                let base = base_branch.unwrap_or_else(|| self.settings.base_branch.clone());
                let created = worktree::create_agent_worktree(&self.repo_root, &base)?;
                Ok(Outcome::Created(created))
            }
            LifecycleCommand::Run { command } => {
                let (_, path) = self.existing_worktree(agent)?;
                run_in(&path, &command)
            }
            LifecycleCommand::Save { message } => {
                let (_, path) = self.existing_worktree(agent)?;
                save(&path, &message)
            }
            LifecycleCommand::Push { remote } => {
                let (agent, path) = self.existing_worktree(agent)?;
                let remote = remote.unwrap_or_else(|| self.settings.remote.clone());
                push(&path, agent, remote)
            }
            LifecycleCommand::Merge {
                remote,
                base_branch,
            } => {
                let (agent, path) = self.existing_worktree(agent)?;
                let remote = remote.unwrap_or_else(|| self.settings.remote.clone());
                let base = base_branch.unwrap_or_else(|| self.settings.base_branch.clone());
                self.merge(&path, agent, &remote, &base)
            }
            LifecycleCommand::Clean { force } => {
                let (agent, path) = self.existing_worktree(agent)?;
                worktree::remove_agent_worktree(&self.repo_root, agent, force)?;
                Ok(Outcome::Cleaned { path })
            }
        }
    }

    fn existing_worktree<'a>(
        &self,
        agent: Option<&'a AgentId>,
    ) -> Result<(&'a AgentId, PathBuf), LifecycleError> {
        let agent = agent.ok_or(ResolveError::NoAgent)?;
        let path = worktree_path(&self.repo_root, agent);
        if !path.is_dir() {
            return Err(LifecycleError::WorktreeNotFound {
                agent: agent.clone(),
                path,
            });
        }
        Ok((agent, path))
    }

    /// fetch, rebase (worktree) then checkout, fast-forward, push (root).
    fn merge(
        &self,
        path: &Path,
        agent: &AgentId,
        remote: &str,
        base_branch: &str,
    ) -> Result<Outcome, LifecycleError> {
        let branch = agent.branch_name();
        let upstream = format!("{remote}/{base_branch}");

        git_ops::fetch(path, remote, base_branch)?;
        git_ops::rebase_onto(path, &upstream)?;
        debug!(agent = %agent, %upstream, "rebased");

        git_ops::checkout(&self.repo_root, base_branch)?;
        git_ops::merge_ff_only(&self.repo_root, &branch)?;
        git_ops::push_branch(&self.repo_root, remote, base_branch)?;

        let commit = git_ops::get_head_sha(&self.repo_root)?;
        info!(agent = %agent, %base_branch, %commit, "Merged into base branch");
        Ok(Outcome::Merged {
            base_branch: base_branch.to_string(),
            branch,
            commit,
        })
    }
}

fn save(path: &Path, message: &str) -> Result<Outcome, LifecycleError> {
    let commit = git_ops::commit_all(path, message)?;
    info!(path = %path.display(), %commit, "Saved changes");
    Ok(Outcome::Saved { commit })
}

fn push(path: &Path, agent: &AgentId, remote: String) -> Result<Outcome, LifecycleError> {
    git_ops::push_upstream(path, &remote)?;
    let branch = agent.branch_name();
    info!(%remote, %branch, "Pushed");
    Ok(Outcome::Pushed { remote, branch })
}

/// Run `command` through the platform shell in `dir`, inheriting stdio.
fn run_in(dir: &Path, command: &str) -> Result<Outcome, LifecycleError> {
    debug!(dir = %dir.display(), command, "run");
    let status = shell(command).current_dir(dir).status()?;
    Ok(Outcome::Ran {
        exit_code: exit_code(status),
    })
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Exit code of a finished child; death by signal N reports 128 + N.
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        commit_file, create_repo, current_branch, git, init_repo_with_remote, rev_parse,
    };
    use std::fs;
    use tempfile::TempDir;

    fn lifecycle(repo: &Path) -> Lifecycle {
        Lifecycle::new(repo, LifecycleSettings::default())
    }

    fn new_agent(lc: &Lifecycle) -> AgentWorktree {
        match lc.execute(LifecycleCommand::New { base_branch: None }, None) {
            Ok(Outcome::Created(wt)) => wt,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn test_new_creates_worktree() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);

        let wt = new_agent(&lc);

        assert!(wt.id.as_str().starts_with("agent-"));
        assert_eq!(wt.path, repo.join(".work").join(wt.id.as_str()));
        assert!(wt.path.join("README.md").exists());
        assert_eq!(current_branch(&wt.path), wt.branch);
        assert_eq!(wt.head.as_deref(), Some(rev_parse(&repo, "main").as_str()));
        assert_eq!(lc.list().unwrap(), vec![wt.id]);
    }

    #[test]
    fn test_new_uses_settings_base_branch() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        git(&repo, &["checkout", "-b", "develop"]);
        commit_file(&repo, "dev.txt", "dev\n", "Develop work");
        git(&repo, &["checkout", "main"]);

        let settings = LifecycleSettings {
            base_branch: "develop".to_string(),
            ..LifecycleSettings::default()
        };
        let lc = Lifecycle::new(&repo, settings);
        let wt = new_agent(&lc);

        assert!(wt.path.join("dev.txt").exists());
    }

    #[test]
    fn test_command_without_agent_is_no_agent() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);

        let err = lc
            .resolve(&ResolveContext::new(&repo))
            .expect_err("no worktrees exist");
        assert!(matches!(
            err,
            LifecycleError::Resolve(ResolveError::NoAgent)
        ));

        let err = lc
            .execute(LifecycleCommand::Clean { force: false }, None)
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Resolve(ResolveError::NoAgent)
        ));
    }

    #[test]
    fn test_missing_worktree_for_every_verb() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let ghost = AgentId::parse("agent-deadbeef").unwrap();

        let commands = [
            LifecycleCommand::Run {
                command: "true".to_string(),
            },
            LifecycleCommand::Save {
                message: "x".to_string(),
            },
            LifecycleCommand::Push { remote: None },
            LifecycleCommand::Merge {
                remote: None,
                base_branch: None,
            },
            LifecycleCommand::Clean { force: false },
        ];
        for command in commands {
            let err = lc.execute(command, Some(&ghost)).unwrap_err();
            match err {
                LifecycleError::WorktreeNotFound { agent, path } => {
                    assert_eq!(agent, ghost);
                    assert_eq!(path, repo.join(".work/agent-deadbeef"));
                }
                other => panic!("expected WorktreeNotFound, got {other:?}"),
            }
        }
        assert!(
            lc.execute(LifecycleCommand::Clean { force: false }, Some(&ghost))
                .unwrap_err()
                .to_string()
                .contains("agt ws new")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_code_and_uses_worktree_dir() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);

        let outcome = lc
            .execute(
                LifecycleCommand::Run {
                    command: "echo hi > marker.txt && exit 3".to_string(),
                },
                Some(&wt.id),
            )
            .unwrap();

        assert!(matches!(outcome, Outcome::Ran { exit_code: 3 }));
        assert!(wt.path.join("marker.txt").exists());
        assert!(!repo.join("marker.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_signal_maps_to_128_plus_signal() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);

        let outcome = lc
            .execute(
                LifecycleCommand::Run {
                    command: "kill -9 $$".to_string(),
                },
                Some(&wt.id),
            )
            .unwrap();

        assert!(matches!(outcome, Outcome::Ran { exit_code: 137 }));
    }

    #[test]
    fn test_save_commits_changes() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        fs::write(wt.path.join("work.txt"), "done\n").unwrap();

        let outcome = lc
            .execute(
                LifecycleCommand::Save {
                    message: "Add work".to_string(),
                },
                Some(&wt.id),
            )
            .unwrap();

        let Outcome::Saved { commit } = outcome else {
            panic!("expected Saved, got {outcome:?}");
        };
        assert_eq!(commit, rev_parse(&wt.path, "HEAD"));
        assert_eq!(rev_parse(&repo, &wt.branch), commit);
        assert_ne!(rev_parse(&repo, "main"), commit);
    }

    #[test]
    fn test_save_with_nothing_to_commit() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        let before = rev_parse(&wt.path, "HEAD");

        let err = lc
            .execute(
                LifecycleCommand::Save {
                    message: "empty".to_string(),
                },
                Some(&wt.id),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Git(GitOpsError::NothingToCommit)
        ));
        assert_eq!(rev_parse(&wt.path, "HEAD"), before);
    }

    #[test]
    fn test_push_publishes_agent_branch() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, remote) = init_repo_with_remote(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        commit_file(&wt.path, "a.txt", "a\n", "Agent work");

        let outcome = lc
            .execute(LifecycleCommand::Push { remote: None }, Some(&wt.id))
            .unwrap();

        match outcome {
            Outcome::Pushed { remote, branch } => {
                assert_eq!(remote, "origin");
                assert_eq!(branch, wt.branch);
            }
            other => panic!("expected Pushed, got {other:?}"),
        }
        assert_eq!(rev_parse(&remote, &wt.branch), rev_parse(&wt.path, "HEAD"));
    }

    #[test]
    fn test_push_to_unknown_remote_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);

        let err = lc
            .execute(
                LifecycleCommand::Push {
                    remote: Some("nowhere".to_string()),
                },
                Some(&wt.id),
            )
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Git(GitOpsError::PushRejected(_))));
    }

    #[test]
    fn test_merge_fast_forwards_base_and_pushes() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, remote) = init_repo_with_remote(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        commit_file(&wt.path, "feature.txt", "feature\n", "Add feature");

        // Base moves on in the meantime; the agent branch must be rebased onto it
        commit_file(&repo, "other.txt", "other\n", "Other work");
        git(&repo, &["push", "origin", "main"]);

        let outcome = lc
            .execute(
                LifecycleCommand::Merge {
                    remote: None,
                    base_branch: None,
                },
                Some(&wt.id),
            )
            .unwrap();

        let Outcome::Merged {
            base_branch,
            branch,
            commit,
        } = outcome
        else {
            panic!("expected Merged, got {outcome:?}");
        };
        assert_eq!(base_branch, "main");
        assert_eq!(branch, wt.branch);
        assert_eq!(commit, rev_parse(&wt.path, "HEAD"));
        assert_eq!(rev_parse(&repo, "main"), commit);
        assert_eq!(rev_parse(&remote, "main"), commit);
        assert!(repo.join("feature.txt").exists());
        assert!(repo.join("other.txt").exists());
    }

    #[test]
    fn test_merge_conflict_leaves_base_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let (repo, remote) = init_repo_with_remote(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        commit_file(&wt.path, "shared.txt", "agent version\n", "Agent edit");
        let agent_head = rev_parse(&wt.path, "HEAD");

        commit_file(&repo, "shared.txt", "main version\n", "Main edit");
        git(&repo, &["push", "origin", "main"]);
        let main_before = rev_parse(&repo, "main");

        let err = lc
            .execute(
                LifecycleCommand::Merge {
                    remote: None,
                    base_branch: None,
                },
                Some(&wt.id),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Git(GitOpsError::RebaseConflict(_))
        ));
        assert_eq!(rev_parse(&repo, "main"), main_before);
        assert_eq!(rev_parse(&remote, "main"), main_before);
        assert_eq!(current_branch(&repo), "main");
        // Rebase was aborted: the agent is back on its own commit, on its branch
        assert_eq!(rev_parse(&wt.path, "HEAD"), agent_head);
        assert_eq!(current_branch(&wt.path), wt.branch);
    }

    #[test]
    fn test_merge_with_unknown_remote_fails_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);

        let err = lc
            .execute(
                LifecycleCommand::Merge {
                    remote: Some("nowhere".to_string()),
                    base_branch: None,
                },
                Some(&wt.id),
            )
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Git(GitOpsError::FetchFailed(_))));
    }

    #[test]
    fn test_clean_removes_worktree_and_keeps_branch() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);

        let outcome = lc
            .execute(LifecycleCommand::Clean { force: false }, Some(&wt.id))
            .unwrap();

        assert!(matches!(outcome, Outcome::Cleaned { ref path } if *path == wt.path));
        assert!(!wt.path.exists());
        assert!(lc.list().unwrap().is_empty());
        git(&repo, &["rev-parse", "--verify", &wt.branch]);

        // Second clean: the worktree is gone
        let err = lc
            .execute(LifecycleCommand::Clean { force: false }, Some(&wt.id))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::WorktreeNotFound { .. }));
    }

    #[test]
    fn test_clean_dirty_worktree_needs_force() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(temp_dir.path());
        let lc = lifecycle(&repo);
        let wt = new_agent(&lc);
        fs::write(wt.path.join("scratch.txt"), "wip\n").unwrap();

        assert!(
            lc.execute(LifecycleCommand::Clean { force: false }, Some(&wt.id))
                .is_err()
        );
        assert!(wt.path.exists());

        lc.execute(LifecycleCommand::Clean { force: true }, Some(&wt.id))
            .unwrap();
        assert!(!wt.path.exists());
    }

    #[test]
    fn test_command_names() {
        assert_eq!(LifecycleCommand::New { base_branch: None }.name(), "new");
        assert_eq!(LifecycleCommand::Clean { force: true }.name(), "clean");
    }
}
