//! Additional operations for SystemGit (history inspection, commits, pushes)

use super::system_git::SystemGit;
use super::{CommitInfo, Signature};
use crate::core::error::{GitError, NightlyError, NightlyResult, ResultExt};

impl SystemGit {
  /// Get commit metadata for a single revision
  ///
  /// Uses `git log -1 --format` for efficient single-commit lookup.
  pub fn get_commit(&self, rev: &str) -> NightlyResult<CommitInfo> {
    // Format: %H (hash) %ce (committer email) %P (parent hashes) %B (body)
    let format = "%H%n%ce%n%P%n%B";

    let output = self
      .git_cmd()
      .args(["log", "-1", &format!("--format={}", format), rev])
      .output()
      .context("Failed to get commit info")?;

    if !output.status.success() {
      return Err(NightlyError::Git(GitError::CommitNotFound { sha: rev.to_string() }));
    }

    parse_commit_output(&output.stdout)
  }

  /// Committer timestamp (seconds since epoch) of `rev`
  pub fn commit_timestamp(&self, rev: &str) -> NightlyResult<i64> {
    let output = self.run(&["log", "-1", "--format=%ct", rev], "Failed to read commit timestamp")?;
    let raw = String::from_utf8_lossy(&output.stdout);
    let ts = raw
      .trim()
      .parse::<i64>()
      .with_context(|| format!("Unexpected timestamp for {}: '{}'", rev, raw.trim()))?;
    Ok(ts)
  }

  /// Move the branch to `sha`, keeping index and working tree
  pub fn reset_soft(&self, sha: &str) -> NightlyResult<()> {
    self.run(&["reset", "--soft", sha], "Failed to reset")?;
    Ok(())
  }

  /// Delete the current branch ref so the next commit becomes a root commit
  ///
  /// Index and working tree are left untouched.
  pub fn unborn_current_branch(&self) -> NightlyResult<()> {
    let branch = self.current_branch()?;
    self.run(
      &["update-ref", "-d", &format!("refs/heads/{}", branch)],
      "Failed to delete branch ref",
    )?;
    Ok(())
  }

  /// Stage every change in the working tree, including deletions
  pub fn add_all(&self) -> NightlyResult<()> {
    self.run(&["add", "-A"], "Failed to stage changes")?;
    Ok(())
  }

  /// Whether the index differs from HEAD
  pub fn has_staged_changes(&self) -> NightlyResult<bool> {
    let status = self
      .git_cmd()
      .args(["diff", "--cached", "--quiet"])
      .status()
      .context("Failed to run git diff")?;

    // --quiet exits 1 when there are differences
    match status.code() {
      Some(0) => Ok(false),
      Some(1) => Ok(true),
      _ => Err(NightlyError::Git(GitError::CommandFailed {
        command: "git diff --cached --quiet".to_string(),
        stderr: format!("exit status {:?}", status.code()),
      })),
    }
  }

  /// Commit the index under an explicit identity, returning the new SHA
  ///
  /// `allow_empty` lets an unchanged payload still produce the replacement commit.
  pub fn commit_as(&self, identity: &Signature, message: &str, allow_empty: bool) -> NightlyResult<String> {
    let mut cmd = self.git_cmd_as(identity);
    cmd.args(["commit", "--quiet", "-m", message]);
    if allow_empty {
      cmd.arg("--allow-empty");
    }

    let output = cmd.output().context("Failed to run git commit")?;
    if !output.status.success() {
      return Err(NightlyError::Git(GitError::CommandFailed {
        command: "git commit".to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    self.head_commit()
  }

  /// Push a branch, optionally with `--force`
  pub fn push(&self, remote_name: &str, branch: &str, force: bool) -> NightlyResult<()> {
    tracing::debug!(remote = remote_name, branch, force, "git push");

    let mut cmd = self.git_cmd();
    cmd.arg("push");
    if force {
      cmd.arg("--force");
    }
    cmd.args([remote_name, branch]);

    let output = cmd.output().context("Failed to push")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(NightlyError::Git(GitError::PushFailed {
        remote: remote_name.to_string(),
        branch: branch.to_string(),
        reason: stderr.to_string(),
      }));
    }

    Ok(())
  }
}

/// Parse git log output into CommitInfo
///
/// Format is %H%n%ce%n%P%n%B: hash, committer email, parent hashes, body
fn parse_commit_output(data: &[u8]) -> NightlyResult<CommitInfo> {
  let output = String::from_utf8_lossy(data);
  let mut lines = output.lines();

  let sha = lines.next().ok_or_else(|| NightlyError::message("Missing commit SHA"))?.to_string();
  let committer_email = lines
    .next()
    .ok_or_else(|| NightlyError::message("Missing committer email"))?
    .to_string();
  let parents_line = lines
    .next()
    .ok_or_else(|| NightlyError::message("Missing parent line"))?;
  let parent_shas = parents_line.split_whitespace().map(|s| s.to_string()).collect();

  // Rest is commit message
  let message: Vec<String> = lines.map(|s| s.to_string()).collect();
  let message = message.join("\n").trim().to_string();

  Ok(CommitInfo {
    sha,
    committer_email,
    message,
    parent_shas,
  })
}
