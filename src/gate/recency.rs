//! Upstream recency sources for the Activity Gate

use crate::core::config::{NightlyConfig, UpstreamKind};
use crate::core::error::{ConfigError, NightlyError, NightlyResult, ResultExt};
use crate::core::vcs::SystemGit;
use crate::github::GithubClient;
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Time of the most recent upstream change
pub trait RecencySource {
  fn last_change(&self) -> NightlyResult<DateTime<Utc>>;

  /// Human-readable origin for logs
  fn describe(&self) -> String;
}

/// Latest commit on a GitHub branch (committer date)
pub struct GithubRecency {
  client: GithubClient,
  branch: String,
}

impl GithubRecency {
  pub fn new(client: GithubClient, branch: impl Into<String>) -> Self {
    Self {
      client,
      branch: branch.into(),
    }
  }
}

impl RecencySource for GithubRecency {
  fn last_change(&self) -> NightlyResult<DateTime<Utc>> {
    let commit = self.client.latest_commit(&self.branch)?;
    let date = DateTime::parse_from_rfc3339(&commit.commit.committer.date)
      .with_context(|| format!("Unparseable committer date for {}", commit.sha))?;
    Ok(date.with_timezone(&Utc))
  }

  fn describe(&self) -> String {
    format!("github:{}@{}", self.client.repository(), self.branch)
  }
}

/// Latest commit on a ref of a local checkout
pub struct GitRecency {
  path: PathBuf,
  rev: String,
}

impl GitRecency {
  pub fn new(path: &Path, rev: impl Into<String>) -> Self {
    Self {
      path: path.to_path_buf(),
      rev: rev.into(),
    }
  }
}

impl RecencySource for GitRecency {
  fn last_change(&self) -> NightlyResult<DateTime<Utc>> {
    let git = SystemGit::open(&self.path)?;
    let ts = git.commit_timestamp(&self.rev)?;
    Utc
      .timestamp_opt(ts, 0)
      .single()
      .ok_or_else(|| NightlyError::message(format!("Commit timestamp out of range: {}", ts)))
  }

  fn describe(&self) -> String {
    format!("git:{}@{}", self.path.display(), self.rev)
  }
}

/// Build the configured recency source
pub fn recency_source(config: &NightlyConfig, root: &Path) -> NightlyResult<Box<dyn RecencySource>> {
  let upstream = &config.upstream;
  match upstream.kind {
    UpstreamKind::Github => {
      let repository = upstream.repository.as_deref().ok_or_else(|| {
        NightlyError::Config(ConfigError::MissingField {
          field: "upstream.repository".to_string(),
        })
      })?;
      // Public repositories can be read without a token
      let token = std::env::var(&config.host.token_env).ok();
      let client = GithubClient::new(&config.host.api_url, repository, token)?;
      Ok(Box::new(GithubRecency::new(client, upstream.branch.clone())))
    }
    UpstreamKind::Git => {
      let path = upstream.path.as_deref().ok_or_else(|| {
        NightlyError::Config(ConfigError::MissingField {
          field: "upstream.path".to_string(),
        })
      })?;
      let path = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };
      Ok(Box::new(GitRecency::new(&path, upstream.branch.clone())))
    }
  }
}
