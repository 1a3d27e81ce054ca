//! Filesystem release host
//!
//! Layout under the host root:
//!
//! ```text
//! <root>/<tag>/release.json     # record + asset manifest
//! <root>/<tag>/assets/<name>    # uploaded files
//! ```
//!
//! Used for offline runs, staging and tests. The upload target is the
//! release directory.

use super::{RegisteredRelease, ReleaseHost, UploadTarget};
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalRelease {
  pub tag: String,
  pub title: String,
  pub prerelease: bool,
  #[serde(default)]
  pub assets: Vec<LocalAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalAsset {
  pub name: String,
  pub content_type: String,
  pub size: u64,
}

pub struct LocalHost {
  root: PathBuf,
  /// Serializes manifest rewrites between concurrent uploads
  manifest_lock: Mutex<()>,
}

impl LocalHost {
  pub fn new(root: PathBuf) -> Self {
    Self {
      root,
      manifest_lock: Mutex::new(()),
    }
  }

  fn release_dir(&self, tag: &str) -> PathBuf {
    self.root.join(tag)
  }

  /// Read a release record back (None if it was never created)
  #[cfg(test)]
  pub fn release(&self, tag: &str) -> NightlyResult<Option<LocalRelease>> {
    read_manifest(&self.release_dir(tag))
  }
}

fn manifest_path(dir: &Path) -> PathBuf {
  dir.join("release.json")
}

fn read_manifest(dir: &Path) -> NightlyResult<Option<LocalRelease>> {
  let path = manifest_path(dir);
  if !path.exists() {
    return Ok(None);
  }
  let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
  Ok(Some(serde_json::from_str(&content)?))
}

fn write_manifest(dir: &Path, release: &LocalRelease) -> NightlyResult<()> {
  let path = manifest_path(dir);
  let content = serde_json::to_string_pretty(release)?;
  fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(())
}

impl ReleaseHost for LocalHost {
  fn ensure_release(&self, tag: &str, title: &str, prerelease: bool) -> NightlyResult<RegisteredRelease> {
    let _guard = self
      .manifest_lock
      .lock()
      .map_err(|_| NightlyError::message("local host manifest lock poisoned"))?;

    let dir = self.release_dir(tag);
    let created = if read_manifest(&dir)?.is_some() {
      false
    } else {
      fs::create_dir_all(dir.join("assets")).with_context(|| format!("Failed to create {}", dir.display()))?;
      write_manifest(
        &dir,
        &LocalRelease {
          tag: tag.to_string(),
          title: title.to_string(),
          prerelease,
          assets: Vec::new(),
        },
      )?;
      true
    };

    Ok(RegisteredRelease {
      upload_target: UploadTarget::new(dir.to_string_lossy().to_string()),
      created,
    })
  }

  fn upload_asset(&self, target: &UploadTarget, path: &Path, name: &str, content_type: &str) -> NightlyResult<()> {
    let dir = PathBuf::from(target.as_str());
    let dest = dir.join("assets").join(name);
    let size = fs::copy(path, &dest).with_context(|| format!("Failed to copy {} to {}", path.display(), dest.display()))?;

    let _guard = self
      .manifest_lock
      .lock()
      .map_err(|_| NightlyError::message("local host manifest lock poisoned"))?;
    let mut release = read_manifest(&dir)?
      .ok_or_else(|| NightlyError::message(format!("No release at upload target {}", target)))?;

    // Replace semantics: same name overwrites
    release.assets.retain(|a| a.name != name);
    release.assets.push(LocalAsset {
      name: name.to_string(),
      content_type: content_type.to_string(),
      size,
    });
    release.assets.sort_by(|a, b| a.name.cmp(&b.name));
    write_manifest(&dir, &release)
  }

  fn describe(&self) -> String {
    format!("local:{}", self.root.display())
  }
}
