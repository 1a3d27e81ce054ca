//! System git backend
//!
//! Uses git porcelain/plumbing commands through `std::process::Command`:
//! - Isolated environment (no user config leaks into automated commits)
//! - Explicit identities for every commit the pipeline creates
//! - One subprocess per operation, errors carry the failing command and stderr

use crate::core::error::{GitError, NightlyError, NightlyResult, ResultExt};
use crate::core::vcs::Signature;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Git backend using system git (zero crate dependencies)
pub struct SystemGit {
  /// Repository working directory
  pub(crate) repo_path: PathBuf,

  /// Working tree root
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  ///
  /// This performs ONE subprocess call to get the repository metadata.
  pub fn open(path: &Path) -> NightlyResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(NightlyError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(NightlyError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let work_tree = stdout.trim();

    Ok(Self {
      repo_path: path.to_path_buf(),
      work_tree: PathBuf::from(work_tree),
    })
  }

  /// Clone a single branch of `url` into `dest`
  ///
  /// `dest` must not exist yet. Unreachable remotes surface as `CloneFailed`.
  pub fn clone_branch(url: &str, branch: &str, dest: &Path) -> NightlyResult<Self> {
    let mut cmd = isolated_git();
    cmd
      .args(["clone", "--quiet", "--single-branch", "--branch", branch, url])
      .arg(dest);

    let output = cmd.output().context("Failed to execute git clone")?;
    if !output.status.success() {
      return Err(NightlyError::Git(GitError::CloneFailed {
        url: url.to_string(),
        reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      }));
    }

    Self::open(dest)
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> NightlyResult<String> {
    let output = self.run(&["rev-parse", "HEAD"], "Failed to get HEAD commit")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Get current branch name
  pub fn current_branch(&self) -> NightlyResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Working tree root
  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Run a git command and fail with `CommandFailed` on non-zero exit
  pub(crate) fn run(&self, args: &[&str], what: &str) -> NightlyResult<Output> {
    let output = self.git_cmd().args(args).output().context(what.to_string())?;

    if !output.status.success() {
      return Err(NightlyError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(output)
  }

  /// Git command with the commit identity forced through the environment
  pub(crate) fn git_cmd_as(&self, identity: &Signature) -> Command {
    let mut cmd = self.git_cmd();
    cmd.env("GIT_AUTHOR_NAME", &identity.name);
    cmd.env("GIT_AUTHOR_EMAIL", &identity.email);
    cmd.env("GIT_COMMITTER_NAME", &identity.name);
    cmd.env("GIT_COMMITTER_EMAIL", &identity.email);
    cmd
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists PATH, HOME and the SSH agent/command used for pushes
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = isolated_git();
    cmd.arg("-C").arg(&self.repo_path);
    cmd
  }
}

fn isolated_git() -> Command {
  let mut cmd = Command::new("git");

  // Isolated environment (don't trust global config)
  cmd.env_clear();
  for var in ["PATH", "HOME", "SSH_AUTH_SOCK", "GIT_SSH_COMMAND"] {
    if let Ok(value) = std::env::var(var) {
      cmd.env(var, value);
    }
  }

  // Force safe behavior (override user config)
  cmd.arg("-c").arg("protocol.version=2");
  cmd.arg("-c").arg("advice.detachedHead=false");
  cmd.arg("-c").arg("core.quotePath=false");
  cmd.arg("-c").arg("commit.gpgsign=false");

  cmd
}
