//! Integration tests for nightly-release
//!
//! Every test drives the compiled binary against a throwaway product
//! repository with fake build tools, a local release host and bare mirror
//! remotes. The fake tools are shell scripts, so the suite is unix-only.

#![cfg(unix)]

mod helpers;
mod test_commands;
mod test_gate;
mod test_run;
