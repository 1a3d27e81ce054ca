//! Artifacts produced by the fan-out and the merger
//!
//! Artifacts are moved, not cloned: a packaged bundle goes to the release
//! asset publisher, a raw binary goes to the merger's input set.

use super::targets::{ArchiveFormat, BuildTarget, MERGE_INPUTS, MERGED_PLATFORM};
use crate::core::error::{NightlyError, NightlyResult, PipelineError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  /// Compressed package ready for upload
  PackagedBundle,
  /// Uncompressed binary reserved for the merger
  RawBinary,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
  source_build_target: &'static BuildTarget,
  pub kind: ArtifactKind,
  pub path: PathBuf,
  /// Set for packaged bundles only
  pub archive_format: Option<ArchiveFormat>,
}

impl Artifact {
  /// Packaged bundle for `platform`; fails for undeclared platforms
  pub fn packaged(platform: &str, path: PathBuf) -> NightlyResult<Self> {
    let target = declared(platform)?;
    Ok(Self {
      source_build_target: target,
      kind: ArtifactKind::PackagedBundle,
      path,
      archive_format: Some(target.archive_format()),
    })
  }

  /// Raw binary for `platform`; fails for undeclared platforms
  pub fn raw(platform: &str, path: PathBuf) -> NightlyResult<Self> {
    let target = declared(platform)?;
    Ok(Self {
      source_build_target: target,
      kind: ArtifactKind::RawBinary,
      path,
      archive_format: None,
    })
  }

  pub fn source_build_target(&self) -> &'static BuildTarget {
    self.source_build_target
  }

  pub fn record(&self) -> ArtifactRecord {
    ArtifactRecord {
      platform: self.source_build_target.name.to_string(),
      kind: self.kind,
      path: self.path.clone(),
      archive_format: self.archive_format,
    }
  }
}

fn declared(platform: &str) -> NightlyResult<&'static BuildTarget> {
  BuildTarget::find(platform)
    .ok_or_else(|| NightlyError::message(format!("'{}' is not a declared build target", platform)))
}

/// The fused cross-architecture binary
///
/// Can only be built from a complete input set; see `MergeInputs::take_pair`.
#[derive(Debug)]
pub struct MergedArtifact {
  pub inputs: [Artifact; 2],
  pub output_path: PathBuf,
}

impl MergedArtifact {
  pub fn record(&self) -> ArtifactRecord {
    ArtifactRecord {
      platform: MERGED_PLATFORM.to_string(),
      kind: ArtifactKind::RawBinary,
      path: self.output_path.clone(),
      archive_format: None,
    }
  }
}

/// Raw binaries handed over by the fan-out, keyed by platform
#[derive(Debug, Default)]
pub struct MergeInputs {
  binaries: HashMap<&'static str, Artifact>,
}

impl MergeInputs {
  /// Accept a raw binary from a merge-reserved target
  pub fn insert(&mut self, artifact: Artifact) -> NightlyResult<()> {
    let target = artifact.source_build_target();
    if artifact.kind != ArtifactKind::RawBinary || !target.is_merge_input() {
      return Err(NightlyError::message(format!(
        "{} does not feed the merger",
        target.name
      )));
    }
    self.binaries.insert(target.name, artifact);
    Ok(())
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.binaries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.binaries.is_empty()
  }

  /// Take both inputs in merge order, or report every missing platform
  ///
  /// On failure nothing is taken.
  pub fn take_pair(&mut self, output_path: &Path) -> Result<MergedArtifact, PipelineError> {
    let missing: Vec<String> = MERGE_INPUTS
      .iter()
      .filter(|name| !self.binaries.contains_key(*name))
      .map(|name| name.to_string())
      .collect();
    if !missing.is_empty() {
      return Err(PipelineError::MergeBarrierFailure { missing });
    }

    let [first, second] = MERGE_INPUTS;
    match (self.binaries.remove(first), self.binaries.remove(second)) {
      (Some(a), Some(b)) => Ok(MergedArtifact {
        inputs: [a, b],
        output_path: output_path.to_path_buf(),
      }),
      _ => Err(PipelineError::MergeBarrierFailure {
        missing: MERGE_INPUTS.iter().map(|n| n.to_string()).collect(),
      }),
    }
  }
}

/// Serializable trace of an artifact for the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
  pub platform: String,
  pub kind: ArtifactKind,
  pub path: PathBuf,
  pub archive_format: Option<ArchiveFormat>,
}
