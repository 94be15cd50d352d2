//! Stable exit codes for `agt`.
//!
//! `agt ws run` is the exception: it exits with the inner command's code.

/// Command succeeded.
pub const OK: i32 = 0;
/// Any failure: bad arguments, no repository, unresolvable agent, git errors.
pub const FAILURE: i32 = 1;
