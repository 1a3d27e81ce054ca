//! Downstream package index publisher
//!
//! Renders the package definition from its template (placeholder → dot date)
//! and commits it to the index repository under the index's own identity.
//! Plain push, no history rewriting. An identical rendering commits nothing.

use super::{Channel, PublishRecord};
use crate::core::config::PackageIndexConfig;
use crate::core::context::RunContext;
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use crate::core::vcs::{Signature, SystemGit};
use std::fs;

/// Replace every occurrence of `placeholder` with `version`
///
/// A template without the placeholder is rejected; it would publish a stale
/// version forever.
pub fn render_template(template: &str, placeholder: &str, version: &str) -> NightlyResult<String> {
  if placeholder.is_empty() || !template.contains(placeholder) {
    return Err(NightlyError::with_help(
      format!("Package template does not contain the placeholder '{}'", placeholder),
      "Add the placeholder where the version belongs, or set [package_index].placeholder",
    ));
  }
  Ok(template.replace(placeholder, version))
}

/// `Update to Nightly <dash date>`
pub fn commit_message(date_dashed: &str) -> String {
  format!("Update to Nightly {}", date_dashed)
}

pub fn publish_package_index(ctx: &RunContext, index: &PackageIndexConfig) -> NightlyResult<PublishRecord> {
  if !ctx.decision.is_alive {
    return Err(NightlyError::message(
      "Activity gate did not pass; the package index is only updated on alive runs",
    ));
  }

  let template_path = ctx.resolve(&index.template);
  let template = fs::read_to_string(&template_path)
    .with_context(|| format!("Failed to read package template {}", template_path.display()))?;
  let rendered = render_template(&template, &index.placeholder, &ctx.date.dotted)?;

  let checkout = ctx.work_dir().join("package-index");
  if checkout.exists() {
    fs::remove_dir_all(&checkout).with_context(|| format!("Failed to clear {}", checkout.display()))?;
  }
  if let Some(parent) = checkout.parent() {
    fs::create_dir_all(parent)?;
  }

  let git = SystemGit::clone_branch(&index.repository, &index.branch, &checkout)?;
  let target = git.work_tree().join(&index.file_name);
  fs::write(&target, rendered).with_context(|| format!("Failed to write {}", target.display()))?;
  git.add_all()?;

  let message = commit_message(&ctx.date.dashed);
  if !git.has_staged_changes()? {
    tracing::info!(repository = %index.repository, "package index already up to date");
    return Ok(PublishRecord {
      channel: Channel::PackageIndex,
      name: message,
      location: index.repository.clone(),
      changed: false,
    });
  }

  let author = Signature::new(&index.author_name, &index.author_email);
  let sha = git.commit_as(&author, &message, false)?;
  git.push("origin", &index.branch, false)?;
  tracing::info!(repository = %index.repository, sha = %sha, version = %ctx.date.dotted, "package index updated");

  Ok(PublishRecord {
    channel: Channel::PackageIndex,
    name: message,
    location: index.repository.clone(),
    changed: true,
  })
}
