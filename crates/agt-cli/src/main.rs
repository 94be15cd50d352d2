//! # agt
//!
//! Worktree-based workflow for agents sharing one repository.
//!
//! ```text
//! agt ws new                 # create .work/<agent-id> on feat/<agent-id>
//! agt ws run cargo test      # run inside the agent's worktree
//! agt ws save "message"      # stage everything and commit
//! agt ws push                # publish the branch
//! agt ws merge               # rebase onto origin/main and fast-forward main
//! agt ws clean               # remove the worktree
//! ```

mod config;
mod display;
mod exit_codes;
mod ws;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::display::{ColorMode, print_error};

/// agt - isolated git worktrees for concurrent agents
#[derive(Parser, Debug)]
#[command(name = "agt", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: agt.yml at the repository root, if present)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage agent worktrees
    Ws(ws::WsArgs),
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are reported as "errors" that go to stdout
            if !err.use_stderr() {
                err.exit();
            }
            let _ = err.print();
            process::exit(exit_codes::FAILURE);
        }
    };

    init_logging(cli.verbose);

    let color = cli.color;
    let code = match run(cli, color.for_stdout()) {
        Ok(code) => code,
        Err(err) => {
            print_error(&err, color.for_stderr());
            exit_codes::FAILURE
        }
    };
    process::exit(code);
}

fn run(cli: Cli, use_colors: bool) -> Result<i32> {
    match cli.command {
        Commands::Ws(args) => ws::execute(args, cli.config.as_deref(), use_colors),
    }
}

/// Logs go to stderr so they never mix with command output. `RUST_LOG` wins
/// over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
