//! One fan-out job: build a single platform and route its output
//!
//! Merge-reserved targets yield a raw binary for the merger. Every other
//! target yields a packaged bundle for the release asset store.

use super::artifact::Artifact;
use super::builder::PlatformBuilder;
use super::package::{Packager, mark_executable};
use super::targets::BuildTarget;
use crate::core::error::{NightlyResult, ResultExt};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum FanoutOutput {
  /// Packaged bundle, to be uploaded directly
  Packaged(Artifact),
  /// Raw binary, reserved for the merger
  Raw(Artifact),
}

impl FanoutOutput {
  pub fn artifact(&self) -> &Artifact {
    match self {
      FanoutOutput::Packaged(a) | FanoutOutput::Raw(a) => a,
    }
  }
}

pub fn build_platform(
  builder: &dyn PlatformBuilder,
  packager: &Packager,
  target: &'static BuildTarget,
  binary: &str,
  prefix: &str,
) -> NightlyResult<FanoutOutput> {
  let built = builder.build(target)?;
  let binary_name = target.binary_file_name(binary);

  if target.is_merge_input() {
    let raw = preserve_raw(packager.work_dir(), target.name, &built, &binary_name)?;
    return Ok(FanoutOutput::Raw(Artifact::raw(target.name, raw)?));
  }

  let archive = packager.package(target.name, &built, &binary_name, prefix)?;
  Ok(FanoutOutput::Packaged(Artifact::packaged(target.name, archive)?))
}

/// Copy a raw binary out of the shared target dir so later builds cannot clobber it
fn preserve_raw(work_dir: &Path, platform: &str, built: &Path, binary_name: &str) -> NightlyResult<std::path::PathBuf> {
  let dir = work_dir.join("raw").join(platform);
  fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
  let dest = dir.join(binary_name);
  fs::copy(built, &dest).with_context(|| format!("Failed to copy {}", built.display()))?;
  mark_executable(&dest)?;
  Ok(dest)
}
