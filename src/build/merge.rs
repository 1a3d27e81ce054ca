//! Artifact Merger
//!
//! Fuses the two macOS raw binaries into one universal binary. The merge tool
//! is opaque; it is invoked as `<program> -create -output <out> <a> <b>`.

use super::artifact::MergedArtifact;
use super::package::mark_executable;
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use crate::core::process::ExternalCommand;
use std::fs;
use std::path::Path;

pub trait Merger: Send + Sync {
  fn merge(&self, inputs: [&Path; 2], output: &Path) -> NightlyResult<()>;
}

pub struct LipoMerger {
  program: String,
}

impl LipoMerger {
  pub fn new(program: impl Into<String>) -> Self {
    Self { program: program.into() }
  }
}

impl Merger for LipoMerger {
  fn merge(&self, inputs: [&Path; 2], output: &Path) -> NightlyResult<()> {
    let [a, b] = inputs;
    ExternalCommand::new(&self.program)
      .args(["-create", "-output"])
      .arg(output.to_string_lossy())
      .arg(a.to_string_lossy())
      .arg(b.to_string_lossy())
      .run()?;
    Ok(())
  }
}

/// Run the merge tool over a complete input pair and mark the result executable
pub fn fuse(merger: &dyn Merger, merged: &MergedArtifact) -> NightlyResult<()> {
  if let Some(parent) = merged.output_path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }

  let [a, b] = &merged.inputs;
  merger.merge([a.path.as_path(), b.path.as_path()], &merged.output_path)?;

  if !merged.output_path.is_file() {
    return Err(NightlyError::message(format!(
      "Merge tool produced no output at {}",
      merged.output_path.display()
    )));
  }
  mark_executable(&merged.output_path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::artifact::{Artifact, MergeInputs};

  struct ConcatMerger;

  impl Merger for ConcatMerger {
    fn merge(&self, inputs: [&Path; 2], output: &Path) -> NightlyResult<()> {
      let mut bytes = fs::read(inputs[0])?;
      bytes.extend(fs::read(inputs[1])?);
      fs::write(output, bytes)?;
      Ok(())
    }
  }

  struct NoOutputMerger;

  impl Merger for NoOutputMerger {
    fn merge(&self, _inputs: [&Path; 2], _output: &Path) -> NightlyResult<()> {
      Ok(())
    }
  }

  fn pair(dir: &Path) -> MergedArtifact {
    let x86 = dir.join("x86");
    let arm = dir.join("arm");
    fs::write(&x86, "x86").unwrap();
    fs::write(&arm, "arm").unwrap();

    let mut inputs = MergeInputs::default();
    inputs.insert(Artifact::raw("macos-x86_64", x86).unwrap()).unwrap();
    inputs.insert(Artifact::raw("macos-aarch64", arm).unwrap()).unwrap();
    inputs.take_pair(&dir.join("out").join("universal")).unwrap()
  }

  #[test]
  fn test_fuse_merges_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let merged = pair(dir.path());
    fuse(&ConcatMerger, &merged).unwrap();
    assert_eq!(fs::read_to_string(&merged.output_path).unwrap(), "x86arm");
  }

  #[test]
  fn test_fuse_requires_output() {
    let dir = tempfile::tempdir().unwrap();
    let merged = pair(dir.path());
    assert!(fuse(&NoOutputMerger, &merged).is_err());
  }

  #[cfg(unix)]
  #[test]
  fn test_lipo_merger_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let merged = pair(dir.path());
    // lipo -create -output <out> <a> <b>
    let script = dir.path().join("fake-lipo");
    fs::write(&script, "#!/bin/sh\ncat \"$4\" \"$5\" > \"$3\"\n").unwrap();
    mark_executable(&script).unwrap();

    fuse(&LipoMerger::new(script.to_string_lossy()), &merged).unwrap();
    assert_eq!(fs::read_to_string(&merged.output_path).unwrap(), "x86arm");
  }
}
