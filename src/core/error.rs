//! Error types for nightly-release with contextual messages and exit codes
//!
//! `NightlyError` is the process-level error: every command returns it and `main`
//! maps it to an exit code. `PipelineError` is the per-stage taxonomy recorded in
//! the run report; a failed stage never aborts the process on its own.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for nightly-release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// One or more pipeline stages failed
  Pipeline = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for nightly-release
#[derive(Debug)]
pub enum NightlyError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// GitHub API / network errors
  Http(HttpError),

  /// External command failures (build, merge, docs)
  Command(CommandError),

  /// The run finished but some stages failed
  Pipeline { failed: usize },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl NightlyError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    NightlyError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    NightlyError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      NightlyError::Message { message, context, help } => NightlyError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      NightlyError::Io(e) => NightlyError::Message {
        message: format!("{}: {}", ctx_str, e),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      NightlyError::Config(_) => ExitCode::User,
      NightlyError::Git(_) => ExitCode::System,
      NightlyError::Http(_) => ExitCode::System,
      NightlyError::Command(_) => ExitCode::System,
      NightlyError::Pipeline { .. } => ExitCode::Pipeline,
      NightlyError::Io(_) => ExitCode::System,
      NightlyError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      NightlyError::Config(e) => e.help_message(),
      NightlyError::Git(e) => e.help_message(),
      NightlyError::Http(e) => e.help_message(),
      NightlyError::Pipeline { .. } => {
        Some("Every stage is safe to re-run. Fix the failing stage and run the pipeline again.".to_string())
      }
      NightlyError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for NightlyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NightlyError::Config(e) => write!(f, "{}", e),
      NightlyError::Git(e) => write!(f, "{}", e),
      NightlyError::Http(e) => write!(f, "{}", e),
      NightlyError::Command(e) => write!(f, "{}", e),
      NightlyError::Pipeline { failed } => write!(f, "Pipeline finished with {} failed stage(s)", failed),
      NightlyError::Io(e) => write!(f, "I/O error: {}", e),
      NightlyError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for NightlyError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      NightlyError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for NightlyError {
  fn from(err: io::Error) -> Self {
    NightlyError::Io(err)
  }
}

impl From<String> for NightlyError {
  fn from(msg: String) -> Self {
    NightlyError::message(msg)
  }
}

impl From<&str> for NightlyError {
  fn from(msg: &str) -> Self {
    NightlyError::message(msg)
  }
}

impl From<toml_edit::de::Error> for NightlyError {
  fn from(err: toml_edit::de::Error) -> Self {
    NightlyError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for NightlyError {
  fn from(err: serde_json::Error) -> Self {
    NightlyError::message(format!("JSON error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for NightlyError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    NightlyError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<chrono::ParseError> for NightlyError {
  fn from(err: chrono::ParseError) -> Self {
    NightlyError::message(format!("Timestamp parse error: {}", err))
  }
}

impl From<std::num::ParseIntError> for NightlyError {
  fn from(err: std::num::ParseIntError) -> Self {
    NightlyError::message(format!("Parse error: {}", err))
  }
}

impl From<reqwest::Error> for NightlyError {
  fn from(err: reqwest::Error) -> Self {
    NightlyError::Http(HttpError::Request {
      url: err.url().map(|u| u.to_string()).unwrap_or_default(),
      reason: err.to_string(),
    })
  }
}

impl From<zip::result::ZipError> for NightlyError {
  fn from(err: zip::result::ZipError) -> Self {
    NightlyError::message(format!("Zip archive error: {}", err))
  }
}

impl From<std::path::StripPrefixError> for NightlyError {
  fn from(err: std::path::StripPrefixError) -> Self {
    NightlyError::message(format!("Path strip prefix error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// nightly.toml not found
  NotFound { search_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable
  Invalid { field: String, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create nightly.toml in the repository root, or pass --config <path>.".to_string())
      }
      ConfigError::MissingField { field } => Some(format!("Add `{}` to nightly.toml.", field)),
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { search_root } => {
        write!(
          f,
          "No nightly-release configuration found.\nSearched: {}/nightly.toml, .nightly.toml, .config/nightly.toml",
          search_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::Invalid { field, reason } => {
        write!(f, "Invalid config field '{}': {}", field, reason)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Commit not found
  CommitNotFound { sha: String },

  /// Clone failed (remote unreachable, auth)
  CloneFailed { url: String, reason: String },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } | GitError::CloneFailed { reason, .. } => {
        if reason.contains("Permission denied") || reason.contains("403") {
          Some("Check the deploy key or token configured for this mirror.".to_string())
        } else if reason.contains("Could not resolve host") {
          Some("The remote is unreachable. Re-run the pipeline once the network is back.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Initialize the repository first or check the path: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::CommitNotFound { sha } => {
        write!(f, "Commit not found: {}", sha)
      }
      GitError::CloneFailed { url, reason } => {
        write!(f, "Clone of {} failed: {}", url, reason)
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// GitHub API / network errors
#[derive(Debug)]
pub enum HttpError {
  /// Request could not be sent or the body could not be read
  Request { url: String, reason: String },

  /// Server answered with a non-success status
  Status { url: String, status: u16, body: String },

  /// Token environment variable missing
  MissingToken { env: String },
}

impl HttpError {
  fn help_message(&self) -> Option<String> {
    match self {
      HttpError::MissingToken { env } => Some(format!("Export a GitHub token: export {}=<token>", env)),
      HttpError::Status { status: 401, .. } | HttpError::Status { status: 403, .. } => {
        Some("The token lacks permission for this repository (needs contents: write).".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for HttpError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HttpError::Request { url, reason } => write!(f, "Request to {} failed: {}", url, reason),
      HttpError::Status { url, status, body } => {
        write!(f, "{} answered HTTP {}", url, status)?;
        if !body.is_empty() {
          write!(f, "\n{}", body)?;
        }
        Ok(())
      }
      HttpError::MissingToken { env } => write!(f, "Environment variable {} is not set", env),
    }
  }
}

/// An external program exited unsuccessfully or could not be spawned
#[derive(Debug)]
pub struct CommandError {
  pub program: String,
  pub status: Option<i32>,
  pub stderr: String,
}

impl fmt::Display for CommandError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.status {
      Some(code) => write!(f, "`{}` exited with status {}", self.program, code)?,
      None => write!(f, "`{}` did not run to completion", self.program)?,
    }
    let tail = self.stderr.trim();
    if !tail.is_empty() {
      write!(f, "\n{}", tail)?;
    }
    Ok(())
  }
}

/// Per-stage failure taxonomy recorded in the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
  /// Upstream recency unavailable; the gate failed closed
  GateFailure { reason: String },
  /// The release record could not be created or looked up
  RegistrarFailure { reason: String },
  /// One platform's build, packaging or upload failed
  BuildFailure { target: String, reason: String },
  /// A raw binary reserved for merging was missing at the barrier
  MergeBarrierFailure { missing: Vec<String> },
  /// The merge tool or the merged upload failed
  MergeFailure { reason: String },
  /// A channel's upload or push failed
  PublishFailure { channel: String, reason: String },
}

impl fmt::Display for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineError::GateFailure { reason } => write!(f, "activity gate failed closed: {}", reason),
      PipelineError::RegistrarFailure { reason } => write!(f, "release registration failed: {}", reason),
      PipelineError::BuildFailure { target, reason } => write!(f, "build {} failed: {}", target, reason),
      PipelineError::MergeBarrierFailure { missing } => {
        write!(f, "merge barrier failed: missing raw binaries for {}", missing.join(", "))
      }
      PipelineError::MergeFailure { reason } => write!(f, "merge failed: {}", reason),
      PipelineError::PublishFailure { channel, reason } => write!(f, "publish to {} failed: {}", channel, reason),
    }
  }
}

/// Result type alias for nightly-release
pub type NightlyResult<T> = Result<T, NightlyError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> NightlyResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> NightlyResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<NightlyError>,
{
  fn context(self, ctx: impl Into<String>) -> NightlyResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> NightlyResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &NightlyError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
