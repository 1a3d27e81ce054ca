use crate::core::error::{ConfigError, NightlyError, NightlyResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for nightly-release
/// Searched in order: nightly.toml, .nightly.toml, .config/nightly.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightlyConfig {
  pub project: ProjectConfig,
  pub upstream: UpstreamConfig,
  pub host: HostConfig,
  pub build: BuildConfig,
  #[serde(default)]
  pub merge: MergeConfig,
  #[serde(default)]
  pub identity: IdentityConfig,
  #[serde(default)]
  pub mirrors: Vec<MirrorConfig>,
  #[serde(default)]
  pub package_index: Option<PackageIndexConfig>,
  #[serde(default)]
  pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
  /// Product name used in artifact prefixes (`<name>-nightly-<date>`)
  pub name: String,

  /// Files copied next to the binary in every package (relative to repo root)
  #[serde(default = "default_package_files")]
  pub package_files: Vec<PathBuf>,
}

fn default_package_files() -> Vec<PathBuf> {
  vec![PathBuf::from("LICENSE.md"), PathBuf::from("README.md")]
}

/// Where the Activity Gate looks up the most recent upstream change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
  pub kind: UpstreamKind,

  /// `owner/repo` for GitHub
  #[serde(default)]
  pub repository: Option<String>,

  #[serde(default = "default_branch")]
  pub branch: String,

  /// Local checkout for the git kind
  #[serde(default)]
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
  Github,
  Git,
}

fn default_branch() -> String {
  "master".to_string()
}

/// Release record host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
  pub kind: HostKind,

  /// `owner/repo` for GitHub
  #[serde(default)]
  pub repository: Option<String>,

  #[serde(default = "default_token_env")]
  pub token_env: String,

  #[serde(default = "default_api_url")]
  pub api_url: String,

  /// Directory for the local host
  #[serde(default)]
  pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
  Github,
  Local,
}

fn default_token_env() -> String {
  "GITHUB_TOKEN".to_string()
}

fn default_api_url() -> String {
  "https://api.github.com".to_string()
}

/// The opaque product build, invoked once per platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
  #[serde(default = "default_build_program")]
  pub program: String,

  #[serde(default)]
  pub args: Vec<String>,

  /// Binary name without platform suffix (`.exe` is appended on Windows targets)
  pub binary: String,

  #[serde(default = "default_target_dir")]
  pub target_dir: PathBuf,

  #[serde(default = "default_profile")]
  pub profile: String,
}

fn default_build_program() -> String {
  "cargo".to_string()
}

fn default_target_dir() -> PathBuf {
  PathBuf::from("target")
}

fn default_profile() -> String {
  "release".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
  /// Architecture-fusing tool, invoked as `<program> -create -output <out> <a> <b>`
  #[serde(default = "default_merge_program")]
  pub program: String,
}

fn default_merge_program() -> String {
  "lipo".to_string()
}

impl Default for MergeConfig {
  fn default() -> Self {
    Self {
      program: default_merge_program(),
    }
  }
}

/// Bot identity for automated mirror commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
  #[serde(default = "default_identity_name")]
  pub name: String,
  #[serde(default = "default_identity_email")]
  pub email: String,
}

fn default_identity_name() -> String {
  "nightly-bot".to_string()
}

fn default_identity_email() -> String {
  "nightly-bot@users.noreply.github.com".to_string()
}

impl Default for IdentityConfig {
  fn default() -> Self {
    Self {
      name: default_identity_name(),
      email: default_identity_email(),
    }
  }
}

/// Which mirror a `[[mirrors]]` entry feeds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MirrorChannel {
  Demo,
  Docs,
}

impl MirrorChannel {
  pub fn as_str(self) -> &'static str {
    match self {
      MirrorChannel::Demo => "demo",
      MirrorChannel::Docs => "docs",
    }
  }
}

/// External repository that receives a generated tree every night
///
/// # Example
///
/// ```toml
/// [[mirrors]]
/// channel = "demo"
/// repository = "git@github.com:example/demo.git"
/// branch = "master"
/// source = "web/packages/demo/dist"
/// target = "dist"
/// build = { program = "npm", args = ["run", "build:demo"] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
  pub channel: MirrorChannel,
  pub repository: String,
  #[serde(default = "default_branch")]
  pub branch: String,
  /// Generated output (relative to repo root)
  pub source: PathBuf,
  /// Directory inside the mirror that is replaced wholesale
  pub target: PathBuf,
  #[serde(default)]
  pub build: Option<CommandConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
  pub program: String,
  #[serde(default)]
  pub args: Vec<String>,
}

/// Third-party package index (e.g. an AUR package repository)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIndexConfig {
  pub repository: String,
  #[serde(default = "default_branch")]
  pub branch: String,
  /// Package definition template (relative to repo root)
  pub template: PathBuf,
  #[serde(default = "default_placeholder")]
  pub placeholder: String,
  /// File name inside the index repository
  pub file_name: String,
  pub author_name: String,
  pub author_email: String,
}

fn default_placeholder() -> String {
  "@VERSION@".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
  /// Staging, archives and mirror clones (relative to repo root)
  #[serde(default = "default_work_dir")]
  pub work_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
  PathBuf::from("target").join("nightly")
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      work_dir: default_work_dir(),
    }
  }
}

impl NightlyConfig {
  /// Find config file in search order: nightly.toml, .nightly.toml, .config/nightly.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = [
      path.join("nightly.toml"),
      path.join(".nightly.toml"),
      path.join(".config").join("nightly.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from the search path under `root`
  pub fn load(root: &Path) -> NightlyResult<Self> {
    let config_path = Self::find_config_path(root).ok_or_else(|| {
      NightlyError::Config(ConfigError::NotFound {
        search_root: root.to_path_buf(),
      })
    })?;
    Self::load_from(&config_path, root)
  }

  /// Load config from an explicit file; relative paths resolve against `root`
  pub fn load_from(config_path: &Path, root: &Path) -> NightlyResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: NightlyConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config
      .validate(root)
      .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    Ok(config)
  }

  /// Validate cross-field requirements
  pub fn validate(&self, root: &Path) -> NightlyResult<()> {
    if self.project.name.trim().is_empty() {
      return Err(NightlyError::Config(ConfigError::MissingField {
        field: "project.name".to_string(),
      }));
    }

    match self.upstream.kind {
      UpstreamKind::Github if self.upstream.repository.is_none() => {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: "upstream.repository".to_string(),
        }));
      }
      UpstreamKind::Git if self.upstream.path.is_none() => {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: "upstream.path".to_string(),
        }));
      }
      _ => {}
    }

    match self.host.kind {
      HostKind::Github if self.host.repository.is_none() => {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: "host.repository".to_string(),
        }));
      }
      HostKind::Local if self.host.root.is_none() => {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: "host.root".to_string(),
        }));
      }
      _ => {}
    }

    let mut seen = HashSet::new();
    for mirror in &self.mirrors {
      if !seen.insert(mirror.channel) {
        return Err(NightlyError::with_help(
          format!("Mirror channel '{}' is configured twice", mirror.channel.as_str()),
          "Keep one [[mirrors]] entry per channel",
        ));
      }
      if mirror.repository.trim().is_empty() {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: format!("repository for mirror '{}'", mirror.channel.as_str()),
        }));
      }
    }

    if let Some(index) = &self.package_index {
      if index.repository.trim().is_empty() {
        return Err(NightlyError::Config(ConfigError::MissingField {
          field: "package_index.repository".to_string(),
        }));
      }
      if !root.join(&index.template).exists() {
        return Err(NightlyError::Config(ConfigError::Invalid {
          field: "package_index.template".to_string(),
          reason: format!("{} does not exist", root.join(&index.template).display()),
        }));
      }
    }

    Ok(())
  }

  /// Mirror entry for a channel, if configured
  pub fn mirror(&self, channel: MirrorChannel) -> Option<&MirrorConfig> {
    self.mirrors.iter().find(|m| m.channel == channel)
  }
}
