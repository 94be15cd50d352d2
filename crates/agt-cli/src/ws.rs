//! CLI commands for the `agt ws` namespace.
//!
//! Subcommands:
//! - `new`: create a worktree for a fresh agent
//! - `run`: run a shell command in the agent's worktree
//! - `save`: stage and commit everything
//! - `push`: publish the agent branch
//! - `merge`: rebase onto the base branch and fast-forward it
//! - `clean`: remove the agent's worktree
//! - `list`: show existing agent worktrees

use std::env;
use std::path::{Path, PathBuf};

use agt_core::identity::LEGACY_AGENT_ENV;
use agt_core::worktree::worktree_path;
use agt_core::{
    AgentId, AgentWorktree, Lifecycle, LifecycleCommand, Outcome, ResolveContext,
    locate_repo_root,
};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use crate::config::AgtConfig;
use crate::display::{colors, paint, print_success, short_sha};
use crate::exit_codes;

/// Manage agent worktrees.
#[derive(Parser, Debug)]
pub struct WsArgs {
    #[command(subcommand)]
    pub command: WsCommands,
}

#[derive(Subcommand, Debug)]
pub enum WsCommands {
    /// Create a worktree and branch for a new agent
    New(NewArgs),

    /// Run a shell command inside the agent's worktree
    Run(RunArgs),

    /// Stage all changes and commit them
    Save(SaveArgs),

    /// Push the agent branch and set upstream tracking
    Push(PushArgs),

    /// Rebase onto the base branch and fast-forward it
    Merge(MergeArgs),

    /// Remove the agent's worktree (the branch is kept)
    Clean(CleanArgs),

    /// List agent worktrees
    List(ListArgs),
}

/// Agent selection shared by every per-agent subcommand.
#[derive(Args, Debug, Default)]
pub struct AgentSelector {
    /// Agent to act on (default: inferred from directory, AGENT_ID, or the only worktree)
    #[arg(long, value_name = "AGENT_ID")]
    pub agent: Option<AgentId>,
}

#[derive(Parser, Debug)]
pub struct NewArgs {
    /// Branch to start from (default: config base_branch, then main)
    pub base_branch: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selector: AgentSelector,

    /// Command to run; words are joined with spaces and passed to the shell.
    /// `--agent` may also follow the command, up to a literal `--`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub selector: AgentSelector,

    /// Commit message
    pub message: String,
}

#[derive(Parser, Debug)]
pub struct PushArgs {
    #[command(flatten)]
    pub selector: AgentSelector,

    /// Remote to push to (default: config remote, then origin)
    pub remote: Option<String>,
}

#[derive(Parser, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub selector: AgentSelector,

    /// Remote holding the base branch
    #[arg(long)]
    pub remote: Option<String>,

    /// Base branch to fast-forward
    #[arg(long = "base", value_name = "BRANCH")]
    pub base_branch: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub selector: AgentSelector,

    /// Remove even with uncommitted or untracked changes
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output JSON instead of plain lines
    #[arg(long)]
    pub json: bool,
}

/// Runs a `ws` subcommand and returns the process exit code.
pub fn execute(args: WsArgs, config_path: Option<&Path>, use_colors: bool) -> Result<i32> {
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    let repo_root = locate_repo_root(&cwd)?;
    let config = AgtConfig::load(&repo_root, config_path)?;
    let lifecycle = Lifecycle::new(repo_root, config.settings());

    let (command, selector) = match args.command {
        WsCommands::List(list_args) => return list(&lifecycle, &list_args, use_colors),
        WsCommands::New(new_args) => {
            let command = LifecycleCommand::New {
                base_branch: new_args.base_branch,
            };
            return report(lifecycle.execute(command, None)?, use_colors);
        }
        WsCommands::Run(run_args) => {
            let (words, agent) = split_run_words(run_args.command, run_args.selector.agent)?;
            (
                LifecycleCommand::Run {
                    command: words.join(" "),
                },
                AgentSelector { agent },
            )
        }
        WsCommands::Save(save_args) => (
            LifecycleCommand::Save {
                message: save_args.message,
            },
            save_args.selector,
        ),
        WsCommands::Push(push_args) => (
            LifecycleCommand::Push {
                remote: push_args.remote,
            },
            push_args.selector,
        ),
        WsCommands::Merge(merge_args) => (
            LifecycleCommand::Merge {
                remote: merge_args.remote,
                base_branch: merge_args.base_branch,
            },
            merge_args.selector,
        ),
        WsCommands::Clean(clean_args) => (
            LifecycleCommand::Clean {
                force: clean_args.force,
            },
            clean_args.selector,
        ),
    };

    let ctx = ResolveContext::new(cwd)
        .with_explicit(selector.agent)
        .with_legacy_env(env::var(LEGACY_AGENT_ENV).ok());
    let resolved = lifecycle.resolve(&ctx)?;
    debug!(agent = %resolved.id, source = %resolved.source, "Using agent");

    let outcome = lifecycle.execute(command, Some(&resolved.id))?;
    report(outcome, use_colors)
}

/// Pulls `--agent <id>` and `--agent=<id>` out of the words given to `run`.
///
/// clap stops parsing options at the first command word, so a selector
/// written after the command arrives here. Words after a literal `--` are
/// left alone.
fn split_run_words(
    words: Vec<String>,
    leading: Option<AgentId>,
) -> Result<(Vec<String>, Option<AgentId>)> {
    let mut command = Vec::with_capacity(words.len());
    let mut agent = leading;
    let mut words = words.into_iter();

    while let Some(word) = words.next() {
        let value = if word == "--" {
            command.push(word);
            command.extend(words.by_ref());
            break;
        } else if word == "--agent" {
            words.next().context("--agent requires a value")?
        } else if let Some(value) = word.strip_prefix("--agent=") {
            value.to_string()
        } else {
            command.push(word);
            continue;
        };

        let id: AgentId = value.parse()?;
        match &agent {
            Some(existing) if *existing != id => {
                bail!("Conflicting --agent values: {existing} and {id}")
            }
            _ => agent = Some(id),
        }
    }

    if command.is_empty() {
        bail!("No command given to run");
    }
    Ok((command, agent))
}

fn report(outcome: Outcome, use_colors: bool) -> Result<i32> {
    match outcome {
        Outcome::Created(AgentWorktree {
            id,
            path,
            branch,
            head,
        }) => {
            let at = head
                .as_deref()
                .map(|sha| format!(" at {}", short_sha(sha)))
                .unwrap_or_default();
            print_success(
                &format!("Worktree ready: {} (branch {branch}{at})", path.display()),
                use_colors,
            );
            // Machine-readable; scripts capture this line
            println!("AGENT_ID={id}");
        }
        Outcome::Ran { exit_code } => return Ok(exit_code),
        Outcome::Saved { commit } => {
            print_success(&format!("Commit ready: {}", short_sha(&commit)), use_colors);
        }
        Outcome::Pushed { remote, branch } => {
            print_success(&format!("Pushed {branch} to {remote}"), use_colors);
        }
        Outcome::Merged {
            base_branch,
            branch,
            commit,
        } => {
            print_success(
                &format!(
                    "Fast-forwarded {base_branch} to {branch} ({})",
                    short_sha(&commit)
                ),
                use_colors,
            );
        }
        Outcome::Cleaned { path } => {
            print_success(&format!("Worktree removed: {}", path.display()), use_colors);
        }
    }
    Ok(exit_codes::OK)
}

#[derive(Debug, Serialize)]
struct WorktreeRow {
    id: AgentId,
    branch: String,
    path: PathBuf,
}

fn list(lifecycle: &Lifecycle, args: &ListArgs, use_colors: bool) -> Result<i32> {
    let rows: Vec<WorktreeRow> = lifecycle
        .list()?
        .into_iter()
        .map(|id| WorktreeRow {
            branch: id.branch_name(),
            path: worktree_path(lifecycle.repo_root(), &id),
            id,
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(exit_codes::OK);
    }

    if rows.is_empty() {
        println!("No agent worktrees. Run 'agt ws new' to create one.");
        return Ok(exit_codes::OK);
    }

    for row in &rows {
        println!(
            "{}  {}",
            paint(row.id.as_str(), colors::CYAN, use_colors),
            paint(&row.path.display().to_string(), colors::DIM, use_colors)
        );
    }
    Ok(exit_codes::OK)
}
