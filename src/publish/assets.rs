//! Release asset store publisher

use super::{Channel, PublishRecord};
use crate::build::{ArchiveFormat, Artifact};
use crate::core::error::NightlyResult;
use crate::release::{ReleaseHost, ReleaseIdentity};
use std::path::Path;

/// Upload a packaged artifact under its file name
///
/// Takes the artifact by value: once uploaded it belongs to the release.
pub fn upload_artifact(
  host: &dyn ReleaseHost,
  identity: &ReleaseIdentity,
  artifact: Artifact,
) -> NightlyResult<PublishRecord> {
  let format = artifact.archive_format.ok_or_else(|| {
    format!(
      "{} is a raw binary, not a packaged bundle",
      artifact.source_build_target().name
    )
  })?;
  upload_archive(host, identity, &artifact.path, format)
}

/// Upload any archive under its file name, typed by its format
pub fn upload_archive(
  host: &dyn ReleaseHost,
  identity: &ReleaseIdentity,
  path: &Path,
  format: ArchiveFormat,
) -> NightlyResult<PublishRecord> {
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .ok_or_else(|| format!("Archive path has no file name: {}", path.display()))?;
  let content_type = format.content_type();

  host.upload_asset(&identity.upload_target, path, &name, content_type)?;
  tracing::info!(asset = %name, content_type, tag = %identity.tag_name, "uploaded release asset");

  Ok(PublishRecord {
    channel: Channel::ReleaseAssets,
    name,
    location: identity.tag_name.clone(),
    changed: true,
  })
}
