//! Channel Publishers
//!
//! Four independent channels, each with its own idempotency rule:
//!
//! | Channel        | Re-run behavior                                   |
//! |----------------|---------------------------------------------------|
//! | release assets | same-name asset is replaced                       |
//! | demo / docs    | previous automated commit is replaced, force-push |
//! | package index  | no commit when the rendered file is unchanged     |
//!
//! A failing channel never rolls back another.

pub mod assets;
pub mod mirror;
pub mod package_index;

pub use assets::{upload_archive, upload_artifact};
pub use mirror::{MirrorUpdater, publish_mirror};
pub use package_index::publish_package_index;

use crate::core::config::MirrorChannel;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
  ReleaseAssets,
  Demo,
  Docs,
  PackageIndex,
}

impl Channel {
  pub fn as_str(self) -> &'static str {
    match self {
      Channel::ReleaseAssets => "release-assets",
      Channel::Demo => "demo",
      Channel::Docs => "docs",
      Channel::PackageIndex => "package-index",
    }
  }
}

impl From<MirrorChannel> for Channel {
  fn from(channel: MirrorChannel) -> Self {
    match channel {
      MirrorChannel::Demo => Channel::Demo,
      MirrorChannel::Docs => Channel::Docs,
    }
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One completed publish operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRecord {
  pub channel: Channel,
  /// Asset name, or the commit subject for repository channels
  pub name: String,
  /// Release tag or repository URL
  pub location: String,
  /// false when the channel was already up to date
  pub changed: bool,
}
