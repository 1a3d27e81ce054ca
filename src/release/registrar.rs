//! Release Registrar
//!
//! Creates the addressable release record every artifact attaches to.

use super::{ReleaseHost, UploadTarget};
use crate::core::clock::ReleaseDate;
use crate::core::error::NightlyResult;
use serde::Serialize;

/// The release this run publishes into. Produced once, read by every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseIdentity {
  pub date_dashed: String,
  pub date_underscored: String,
  pub date_dotted: String,
  pub tag_name: String,
  pub display_name: String,
  pub upload_target: UploadTarget,
}

impl ReleaseIdentity {
  pub fn new(date: &ReleaseDate, upload_target: UploadTarget) -> Self {
    Self {
      date_dashed: date.dashed.clone(),
      date_underscored: date.underscored.clone(),
      date_dotted: date.dotted.clone(),
      tag_name: date.tag_name(),
      display_name: date.display_name(),
      upload_target,
    }
  }
}

/// Create (or reuse) the nightly prerelease for `date`
pub fn register(host: &dyn ReleaseHost, date: &ReleaseDate) -> NightlyResult<ReleaseIdentity> {
  let tag = date.tag_name();
  let title = date.display_name();

  let registered = host.ensure_release(&tag, &title, true)?;
  if registered.created {
    tracing::info!(tag = %tag, host = %host.describe(), "created release");
  } else {
    tracing::info!(tag = %tag, host = %host.describe(), "reusing existing release");
  }

  Ok(ReleaseIdentity::new(date, registered.upload_target))
}
