//! Demo and docs mirrors, and the idempotent mirror updater
//!
//! # Protocol
//!
//! A mirror carries at most one automated commit on top of its pre-existing
//! history. Every update:
//!
//! 1. Rewinds: if the tip is automated (bot committer email and the
//!    `Nightly build` subject prefix), move the branch to the tip's parent
//!    with the working tree kept. An automated root commit is rewound by
//!    deleting the branch ref, so the next commit is a new root.
//! 2. Replaces the payload directory, stages everything, commits under the
//!    bot identity and force-pushes.
//!
//! Re-running on the same day, or on consecutive days, therefore never grows
//! the mirror's history.

use super::{Channel, PublishRecord};
use crate::core::clock::ReleaseDate;
use crate::core::config::{IdentityConfig, MirrorConfig};
use crate::core::context::RunContext;
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use crate::core::process::ExternalCommand;
use crate::core::vcs::{CommitInfo, Signature, SystemGit};
use std::fs;
use std::path::Path;

/// Subject prefix of every automated mirror commit
pub const NIGHTLY_COMMIT_PREFIX: &str = "Nightly build";

const REMOTE: &str = "origin";

/// What step 1 of the protocol did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewind {
  /// Tip is not automated; history is left alone
  Untouched,
  /// Automated tip dropped; branch now points at this parent
  ToParent(String),
  /// Automated root dropped; branch is unborn
  ToRoot,
}

pub struct MirrorUpdater {
  identity: Signature,
}

impl MirrorUpdater {
  pub fn new(identity: Signature) -> Self {
    Self { identity }
  }

  pub fn from_config(identity: &IdentityConfig) -> Self {
    Self::new(Signature::new(&identity.name, &identity.email))
  }

  /// `Nightly build <dash date>`
  pub fn commit_message(date: &ReleaseDate) -> String {
    format!("{} {}", NIGHTLY_COMMIT_PREFIX, date.dashed)
  }

  pub fn is_automated(&self, commit: &CommitInfo) -> bool {
    commit.committer_email == self.identity.email && commit.message.starts_with(NIGHTLY_COMMIT_PREFIX)
  }

  /// Step 1: drop the previous automated commit, keeping the working tree
  pub fn rewind(&self, git: &SystemGit) -> NightlyResult<Rewind> {
    let tip = git.get_commit("HEAD")?;
    if !self.is_automated(&tip) {
      return Ok(Rewind::Untouched);
    }
    tracing::debug!(sha = %tip.sha, "dropping previous automated commit");

    match tip.parent_shas.first() {
      Some(parent) => {
        git.reset_soft(parent)?;
        Ok(Rewind::ToParent(parent.clone()))
      }
      None => {
        git.unborn_current_branch()?;
        Ok(Rewind::ToRoot)
      }
    }
  }

  /// Step 2: stage everything and record the replacement commit
  ///
  /// An unchanged payload still produces a commit so the rewind is undone.
  pub fn commit(&self, git: &SystemGit, message: &str) -> NightlyResult<String> {
    git.add_all()?;
    git.commit_as(&self.identity, message, true)
  }

  /// Full update of a cloned mirror: rewind, write payload, commit, force-push
  pub fn update<F>(&self, git: &SystemGit, branch: &str, message: &str, write_payload: F) -> NightlyResult<String>
  where
    F: FnOnce(&Path) -> NightlyResult<()>,
  {
    let rewind = self.rewind(git)?;
    tracing::debug!(?rewind, branch, "mirror rewound");

    write_payload(git.work_tree())?;
    let sha = self.commit(git, message)?;
    git.push(REMOTE, branch, true)?;
    Ok(sha)
  }
}

/// Publish a generated tree (demo or docs) to its mirror repository
pub fn publish_mirror(ctx: &RunContext, mirror: &MirrorConfig, updater: &MirrorUpdater) -> NightlyResult<PublishRecord> {
  let channel = mirror.channel.as_str();

  if let Some(build) = &mirror.build {
    tracing::info!(channel, program = %build.program, "generating mirror payload");
    ExternalCommand::new(&build.program)
      .args(build.args.iter().cloned())
      .current_dir(&ctx.root)
      .run()
      .with_context(|| format!("{} build step failed", channel))?;
  }

  let source = ctx.resolve(&mirror.source);
  if !source.is_dir() {
    return Err(NightlyError::with_help(
      format!("Generated {} output not found at {}", channel, source.display()),
      "Check the mirror's `source` path and its build step",
    ));
  }

  let checkout = ctx.work_dir().join(format!("mirror-{}", channel));
  if checkout.exists() {
    fs::remove_dir_all(&checkout).with_context(|| format!("Failed to clear {}", checkout.display()))?;
  }
  if let Some(parent) = checkout.parent() {
    fs::create_dir_all(parent)?;
  }

  let git = SystemGit::clone_branch(&mirror.repository, &mirror.branch, &checkout)?;
  let message = MirrorUpdater::commit_message(&ctx.date);
  let sha = updater.update(&git, &mirror.branch, &message, |tree| {
    replace_payload(&source, tree, &mirror.target)
  })?;

  tracing::info!(channel, repository = %mirror.repository, sha = %sha, "mirror updated");
  Ok(PublishRecord {
    channel: Channel::from(mirror.channel),
    name: message,
    location: mirror.repository.clone(),
    changed: true,
  })
}

/// Delete the previous generated output under `target` and copy `source` in
///
/// A target of `.` (or empty) means the whole tree except `.git`.
fn replace_payload(source: &Path, tree: &Path, target: &Path) -> NightlyResult<()> {
  let is_root = target.as_os_str().is_empty() || target == Path::new(".");
  let dest = if is_root { tree.to_path_buf() } else { tree.join(target) };

  if is_root {
    for entry in fs::read_dir(tree)? {
      let path = entry?.path();
      if path.file_name().is_some_and(|n| n == ".git") {
        continue;
      }
      remove_path(&path)?;
    }
  } else if dest.exists() {
    remove_path(&dest)?;
  }

  copy_dir_all(source, &dest)
}

fn remove_path(path: &Path) -> NightlyResult<()> {
  if path.is_dir() {
    fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))
  } else {
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
  }
}

fn copy_dir_all(src: &Path, dest: &Path) -> NightlyResult<()> {
  fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
  for entry in fs::read_dir(src).with_context(|| format!("Failed to read {}", src.display()))? {
    let entry = entry?;
    let path = entry.path();
    let to = dest.join(entry.file_name());
    if path.is_dir() {
      copy_dir_all(&path, &to)?;
    } else {
      fs::copy(&path, &to).with_context(|| format!("Failed to copy {}", path.display()))?;
    }
  }
  Ok(())
}
