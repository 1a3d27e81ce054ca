//! Run clock: the single instant every stage agrees on
//!
//! The clock is sampled exactly once when the run starts. Tags, artifact
//! prefixes, package-index versions and mirror commit messages are all rendered
//! from that one `ReleaseDate`, so a run that straddles midnight still produces
//! matching names.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One sampled instant with its three fixed renderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDate {
  instant: DateTime<Utc>,
  /// `2025-01-15` (tags, titles, commit messages)
  pub dashed: String,
  /// `2025_01_15` (artifact prefixes)
  pub underscored: String,
  /// `2025.01.15` (package-index version)
  pub dotted: String,
}

impl ReleaseDate {
  /// Sample the wall clock. Call once per run.
  pub fn sample() -> Self {
    Self::from_instant(Utc::now())
  }

  /// Render a fixed instant (tests, replays)
  pub fn from_instant(instant: DateTime<Utc>) -> Self {
    Self {
      instant,
      dashed: instant.format("%Y-%m-%d").to_string(),
      underscored: instant.format("%Y_%m_%d").to_string(),
      dotted: instant.format("%Y.%m.%d").to_string(),
    }
  }

  pub fn instant(&self) -> DateTime<Utc> {
    self.instant
  }

  /// Release tag: `nightly-<dash date>`
  pub fn tag_name(&self) -> String {
    format!("nightly-{}", self.dashed)
  }

  /// Release title: `Nightly <dash date>`
  pub fn display_name(&self) -> String {
    format!("Nightly {}", self.dashed)
  }

  /// Artifact prefix: `<product>-nightly-<underscore date>`
  pub fn artifact_prefix(&self, product: &str) -> String {
    format!("{}-nightly-{}", product, self.underscored)
  }
}
