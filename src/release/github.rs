//! GitHub Releases host
//!
//! The upload target is the release's `upload_url`, exactly as GitHub returns it.

use super::{RegisteredRelease, ReleaseHost, UploadTarget};
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use crate::github::{AssetResponse, GithubClient};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Assets already attached to the registered release (name → id)
///
/// Each entry is handed out once: the first upload under a name replaces the
/// stale asset, later uploads in the same run go straight through.
#[derive(Debug, Default)]
struct AssetIndex {
  ids: HashMap<String, u64>,
}

impl AssetIndex {
  fn reset(&mut self, assets: &[AssetResponse]) {
    self.ids.clear();
    self.ids.extend(assets.iter().map(|a| (a.name.clone(), a.id)));
  }

  fn take(&mut self, name: &str) -> Option<u64> {
    self.ids.remove(name)
  }
}

pub struct GithubHost {
  client: GithubClient,
  existing_assets: Mutex<AssetIndex>,
}

impl GithubHost {
  pub fn new(client: GithubClient) -> Self {
    Self {
      client,
      existing_assets: Mutex::new(AssetIndex::default()),
    }
  }

  fn assets(&self) -> NightlyResult<std::sync::MutexGuard<'_, AssetIndex>> {
    self
      .existing_assets
      .lock()
      .map_err(|_| NightlyError::message("asset index lock poisoned"))
  }
}

impl ReleaseHost for GithubHost {
  fn ensure_release(&self, tag: &str, title: &str, prerelease: bool) -> NightlyResult<RegisteredRelease> {
    let (release, created) = match self.client.release_by_tag(tag)? {
      Some(existing) => (existing, false),
      None => (self.client.create_release(tag, title, prerelease)?, true),
    };
    self.assets()?.reset(&release.assets);

    Ok(RegisteredRelease {
      upload_target: UploadTarget::new(release.upload_url),
      created,
    })
  }

  fn upload_asset(&self, target: &UploadTarget, path: &Path, name: &str, content_type: &str) -> NightlyResult<()> {
    let stale = self.assets()?.take(name);
    if let Some(asset_id) = stale {
      tracing::info!(asset = name, "replacing existing release asset");
      self.client.delete_asset(asset_id)?;
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    self.client.upload_asset(target.as_str(), name, content_type, bytes)
  }

  fn describe(&self) -> String {
    format!("github:{}", self.client.repository())
  }
}
