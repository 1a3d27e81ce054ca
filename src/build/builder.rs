//! Product build invocation
//!
//! The product build is opaque. `CommandBuilder` runs the configured program
//! once per target with the triple, the target's extra flags and any pre-step
//! environment, then locates the binary cargo-style under the target dir.

use super::targets::BuildTarget;
use crate::core::config::BuildConfig;
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use crate::core::process::ExternalCommand;
use std::path::{Path, PathBuf};

/// Builds one platform and returns the path of the produced binary
pub trait PlatformBuilder: Send + Sync {
  fn build(&self, target: &BuildTarget) -> NightlyResult<PathBuf>;
}

pub struct CommandBuilder {
  program: String,
  args: Vec<String>,
  binary: String,
  profile: String,
  /// Absolute target directory
  target_dir: PathBuf,
  /// Working directory of the build (repository root)
  cwd: PathBuf,
}

impl CommandBuilder {
  pub fn new(config: &BuildConfig, root: &Path) -> Self {
    let target_dir = if config.target_dir.is_absolute() {
      config.target_dir.clone()
    } else {
      root.join(&config.target_dir)
    };
    Self {
      program: config.program.clone(),
      args: config.args.clone(),
      binary: config.binary.clone(),
      profile: config.profile.clone(),
      target_dir,
      cwd: root.to_path_buf(),
    }
  }

  /// `<target_dir>/[<triple>/]<profile>/<binary>[.exe]`
  pub fn binary_path(&self, target: &BuildTarget) -> PathBuf {
    let mut path = self.target_dir.clone();
    if let Some(triple) = target.architecture_triple {
      path.push(triple);
    }
    path.push(&self.profile);
    path.push(target.binary_file_name(&self.binary));
    path
  }

  /// The full invocation for `target`, including pre-step environment
  pub fn command(&self, target: &BuildTarget) -> NightlyResult<ExternalCommand> {
    let mut cmd = ExternalCommand::new(&self.program)
      .args(self.args.iter().cloned())
      .current_dir(&self.cwd)
      .env("CARGO_TARGET_DIR", self.target_dir.to_string_lossy())
      .env("NIGHTLY_TARGET", target.name);

    if let Some(triple) = target.architecture_triple {
      cmd = cmd.args(["--target", triple]).env("NIGHTLY_TRIPLE", triple);
    }
    if !target.extra_flags.is_empty() {
      cmd = cmd.env("RUSTFLAGS", target.extra_flags.join(" "));
    }
    if let Some(step) = &target.pre_step {
      let extra = step
        .apply()
        .with_context(|| format!("Pre-step for {} failed", target.name))?;
      for (key, value) in extra {
        cmd = cmd.env(key, value);
      }
    }
    Ok(cmd)
  }
}

impl PlatformBuilder for CommandBuilder {
  fn build(&self, target: &BuildTarget) -> NightlyResult<PathBuf> {
    let cmd = self.command(target)?;
    tracing::info!(target = target.name, command = %cmd.display(), "building");
    cmd.run()?;

    let binary = self.binary_path(target);
    if !binary.is_file() {
      return Err(NightlyError::with_help(
        format!("Build for {} produced no binary at {}", target.name, binary.display()),
        "Check [build].binary, target_dir and profile in nightly.toml",
      ));
    }
    Ok(binary)
  }
}
