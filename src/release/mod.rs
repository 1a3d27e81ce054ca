//! Release Registrar and release hosts
//!
//! # Core Invariants
//!
//! 1. **Exactly one ReleaseIdentity per run**
//!    - Built from the run's single `ReleaseDate`
//!    - Shared read-only by every build and publish stage
//!
//! 2. **Registration is idempotent**
//!    - An existing release with the same tag is reused, never duplicated
//!    - Re-uploading an asset replaces the previous one with the same name
//!
//! 3. **The upload target is opaque**
//!    - A URL for GitHub, a directory for the local host
//!    - Only the host that produced it interprets it

pub mod github;
pub mod local;
pub mod registrar;

pub use github::GithubHost;
pub use local::LocalHost;
pub use registrar::{ReleaseIdentity, register};

use crate::core::config::{HostKind, NightlyConfig};
use crate::core::error::{ConfigError, NightlyError, NightlyResult};
use crate::github::GithubClient;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Opaque handle accepted by `ReleaseHost::upload_asset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTarget(String);

impl UploadTarget {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UploadTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Result of `ensure_release`
#[derive(Debug, Clone)]
pub struct RegisteredRelease {
  pub upload_target: UploadTarget,
  /// false when an existing release was reused
  pub created: bool,
}

/// Where release records and their assets live
///
/// Implementations must tolerate concurrent `upload_asset` calls with distinct
/// asset names; the asset list is append-only.
pub trait ReleaseHost: Send + Sync {
  /// Create the release for `tag`, or return the existing one
  fn ensure_release(&self, tag: &str, title: &str, prerelease: bool) -> NightlyResult<RegisteredRelease>;

  /// Attach a file to the release behind `target` under `name`
  fn upload_asset(&self, target: &UploadTarget, path: &Path, name: &str, content_type: &str) -> NightlyResult<()>;

  fn describe(&self) -> String;
}

/// Build the configured release host
pub fn release_host(config: &NightlyConfig, root: &Path) -> NightlyResult<Arc<dyn ReleaseHost>> {
  let host = &config.host;
  match host.kind {
    HostKind::Github => {
      let repository = host.repository.as_deref().ok_or_else(|| {
        NightlyError::Config(ConfigError::MissingField {
          field: "host.repository".to_string(),
        })
      })?;
      let token = GithubClient::token_from_env(&host.token_env)?;
      let client = GithubClient::new(&host.api_url, repository, Some(token))?;
      Ok(Arc::new(GithubHost::new(client)))
    }
    HostKind::Local => {
      let dir = host.root.as_deref().ok_or_else(|| {
        NightlyError::Config(ConfigError::MissingField {
          field: "host.root".to_string(),
        })
      })?;
      let dir = if dir.is_absolute() { dir.to_path_buf() } else { root.join(dir) };
      Ok(Arc::new(LocalHost::new(dir)))
    }
  }
}
