//! Terminal output helpers.

use std::io::{IsTerminal, stderr, stdout};

use clap::ValueEnum;

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Color when the stream is a terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Whether stdout output should be colored.
    pub fn for_stdout(self) -> bool {
        self.resolve(stdout().is_terminal())
    }

    /// Whether stderr output should be colored.
    pub fn for_stderr(self) -> bool {
        self.resolve(stderr().is_terminal())
    }

    fn resolve(self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => is_terminal,
        }
    }
}

/// Wraps `text` in `color` when colors are enabled.
pub fn paint(text: &str, color: &str, use_colors: bool) -> String {
    if use_colors {
        format!("{color}{text}{}", colors::RESET)
    } else {
        text.to_string()
    }
}

/// Prints a success line to stdout.
pub fn print_success(message: &str, use_colors: bool) {
    println!("{}", paint(message, colors::GREEN, use_colors));
}

/// Prints `error: <message>` to stderr, including the error's causes.
pub fn print_error(err: &anyhow::Error, use_colors: bool) {
    let label = paint("error:", &format!("{}{}", colors::BOLD, colors::RED), use_colors);
    eprintln!("{label} {err:#}");
}

/// First 8 characters of a commit SHA.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
