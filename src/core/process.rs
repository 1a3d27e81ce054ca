//! External command execution
//!
//! The product build, the merge tool and the demo/docs generators are opaque
//! collaborators. They all go through `ExternalCommand` so failures carry the
//! program name, exit status and stderr in one `CommandError`.

use crate::core::error::{CommandError, NightlyError, NightlyResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// A fully described invocation of an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
  pub program: String,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub cwd: Option<PathBuf>,
}

impl ExternalCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: BTreeMap::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn current_dir(mut self, dir: &Path) -> Self {
    self.cwd = Some(dir.to_path_buf());
    self
  }

  /// Shell-like rendering for logs
  pub fn display(&self) -> String {
    let mut parts: Vec<String> = self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    parts.push(self.program.clone());
    parts.extend(self.args.iter().cloned());
    parts.join(" ")
  }

  /// Run to completion; non-zero exit is an error
  pub fn run(&self) -> NightlyResult<Output> {
    tracing::debug!(command = %self.display(), "spawning");

    let mut cmd = Command::new(&self.program);
    cmd.args(&self.args);
    cmd.envs(&self.env);
    if let Some(dir) = &self.cwd {
      cmd.current_dir(dir);
    }

    let output = cmd.output().map_err(|e| {
      NightlyError::Command(CommandError {
        program: self.program.clone(),
        status: None,
        stderr: e.to_string(),
      })
    })?;

    if !output.status.success() {
      return Err(NightlyError::Command(CommandError {
        program: self.program.clone(),
        status: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(output)
  }

  /// Run and return trimmed stdout
  pub fn stdout(&self) -> NightlyResult<String> {
    let output = self.run()?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }
}
