//! Test helpers for integration tests
//!
//! A `TestProject` is a product repository that doubles as its own git
//! upstream, with fake build/merge/xcrun tools on PATH, a local release host
//! and bare remotes standing in for the demo, docs and package-index repos.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_BUILD: &str = r#"#!/bin/sh
set -e
if [ -n "$FAIL_TARGET" ] && [ "$NIGHTLY_TARGET" = "$FAIL_TARGET" ]; then
  echo "simulated build failure for $NIGHTLY_TARGET" >&2
  exit 1
fi
if [ "$NIGHTLY_TARGET" = "macos-aarch64" ] && [ -z "$SDKROOT" ]; then
  echo "SDK was not pinned" >&2
  exit 1
fi
dir="$CARGO_TARGET_DIR"
if [ -n "$NIGHTLY_TRIPLE" ]; then
  dir="$dir/$NIGHTLY_TRIPLE"
fi
dir="$dir/release"
mkdir -p "$dir"
name=app
case "$NIGHTLY_TARGET" in
  windows-*) name=app.exe ;;
esac
echo "binary for $NIGHTLY_TARGET" > "$dir/$name"
"#;

// lipo -create -output <out> <a> <b>
const FAKE_LIPO: &str = r#"#!/bin/sh
cat "$4" "$5" > "$3"
"#;

const FAKE_XCRUN: &str = r#"#!/bin/sh
case "$3" in
  --show-sdk-path) echo /fake/MacOSX11.0.sdk ;;
  --show-sdk-platform-version) echo 11.0 ;;
  *) exit 1 ;;
esac
"#;

const PKGBUILD_TEMPLATE: &str = "pkgname=app-nightly-bin\npkgver=@VERSION@\npkgrel=1\n";

/// Product repository with everything the pipeline talks to
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
  pub bin_dir: PathBuf,
  pub demo_remote: PathBuf,
  pub docs_remote: PathBuf,
  pub index_remote: PathBuf,
}

impl TestProject {
  /// Create the project, its tools, remotes and nightly.toml
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("product");
    fs::create_dir_all(&path)?;

    init_repo(&path, "main")?;
    fs::write(path.join("LICENSE.md"), "MIT\n")?;
    fs::write(path.join("README.md"), "# app\n")?;
    fs::write(path.join("PKGBUILD.in"), PKGBUILD_TEMPLATE)?;
    fs::create_dir_all(path.join("doc"))?;
    fs::write(path.join("doc").join("index.html"), "<h1>docs</h1>\n")?;
    fs::write(path.join(".gitignore"), "target/\nreleases/\nweb/\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial product"])?;

    let bin_dir = root.path().join("bin");
    fs::create_dir_all(&bin_dir)?;
    write_script(&bin_dir.join("fake-build"), FAKE_BUILD)?;
    write_script(&bin_dir.join("lipo"), FAKE_LIPO)?;
    write_script(&bin_dir.join("xcrun"), FAKE_XCRUN)?;

    let demo_remote = bare_remote(root.path(), "demo")?;
    let docs_remote = bare_remote(root.path(), "docs")?;
    let index_remote = bare_remote(root.path(), "index")?;

    let project = Self {
      _root: root,
      path,
      bin_dir,
      demo_remote,
      docs_remote,
      index_remote,
    };
    project.write_config()?;
    Ok(project)
  }

  fn write_config(&self) -> Result<()> {
    let config = format!(
      r#"[project]
name = "app"

[upstream]
kind = "git"
path = "."
branch = "main"

[host]
kind = "local"
root = "releases"

[build]
program = "{build}"
binary = "app"

[identity]
name = "nightly-bot"
email = "nightly-bot@example.com"

[[mirrors]]
channel = "demo"
repository = "{demo}"
source = "web/demo"
target = "."
build = {{ program = "sh", args = ["-c", "mkdir -p web/demo && echo demo > web/demo/index.html"] }}

[[mirrors]]
channel = "docs"
repository = "{docs}"
source = "doc"
target = "api"

[package_index]
repository = "{index}"
template = "PKGBUILD.in"
file_name = "PKGBUILD"
author_name = "Index Bot"
author_email = "index-bot@example.com"
"#,
      build = self.bin_dir.join("fake-build").display(),
      demo = self.demo_remote.display(),
      docs = self.docs_remote.display(),
      index = self.index_remote.display(),
    );
    fs::write(self.path.join("nightly.toml"), config)?;
    Ok(())
  }

  /// Rewrite the upstream tip so its committer date is `days` days old
  pub fn age_upstream(&self, days: i64) -> Result<()> {
    let date = chrono::Utc::now() - chrono::Duration::days(days);
    let output = Command::new("git")
      .current_dir(&self.path)
      .args(["commit", "--amend", "--no-edit", "--allow-empty"])
      .env("GIT_COMMITTER_DATE", format!("{} +0000", date.timestamp()))
      .output()
      .context("Failed to run git commit --amend")?;
    if !output.status.success() {
      anyhow::bail!("git commit --amend failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(())
  }

  /// Run nightly-release with the fake tools first on PATH
  pub fn run(&self, args: &[&str]) -> Result<Output> {
    self.run_with_env(args, &[])
  }

  pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
    let path = format!(
      "{}:{}",
      self.bin_dir.display(),
      std::env::var("PATH").unwrap_or_default()
    );
    let output = Command::new(env!("CARGO_BIN_EXE_nightly-release"))
      .current_dir(&self.path)
      .args(args)
      .env("PATH", path)
      .env_remove("RUST_LOG")
      .envs(env.iter().copied())
      .output()
      .context("Failed to run nightly-release")?;
    Ok(output)
  }

  /// Release manifest written by the local host
  pub fn release_manifest(&self, tag: &str) -> Result<serde_json::Value> {
    let path = self.path.join("releases").join(tag).join("release.json");
    let content = fs::read_to_string(&path).with_context(|| format!("No release at {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
  }
}

/// Parse stdout as JSON, with stderr in the failure message
pub fn stdout_json(output: &Output) -> Result<serde_json::Value> {
  serde_json::from_slice(&output.stdout).with_context(|| {
    format!(
      "stdout is not JSON\nstdout: {}\nstderr: {}",
      String::from_utf8_lossy(&output.stdout),
      String::from_utf8_lossy(&output.stderr)
    )
  })
}

/// Number of commits on `branch` of a (bare) repository
pub fn commit_count(repo: &Path, branch: &str) -> Result<usize> {
  let output = git(repo, &["rev-list", "--count", branch])?;
  Ok(String::from_utf8_lossy(&output.stdout).trim().parse()?)
}

/// `git show <rev>:<path>` in a (bare) repository
pub fn show_file(repo: &Path, rev: &str, path: &str) -> Result<String> {
  let output = git(repo, &["show", &format!("{}:{}", rev, path)])?;
  Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// `<committer email>\n<subject>` of `rev`
pub fn tip_signature(repo: &Path, rev: &str) -> Result<(String, String)> {
  let output = git(repo, &["log", "-1", "--format=%ce%n%s", rev])?;
  let text = String::from_utf8_lossy(&output.stdout).to_string();
  let mut lines = text.lines();
  let email = lines.next().unwrap_or_default().to_string();
  let subject = lines.next().unwrap_or_default().to_string();
  Ok((email, subject))
}

fn init_repo(path: &Path, branch: &str) -> Result<()> {
  git(path, &["init", &format!("--initial-branch={}", branch)])?;
  git(path, &["config", "user.name", "Test User"])?;
  git(path, &["config", "user.email", "test@example.com"])?;
  git(path, &["config", "commit.gpgsign", "false"])?;
  Ok(())
}

/// Bare repository on `master` with one pre-existing human commit
fn bare_remote(root: &Path, name: &str) -> Result<PathBuf> {
  let seed = root.join(format!("{}-seed", name));
  fs::create_dir_all(&seed)?;
  init_repo(&seed, "master")?;
  fs::write(seed.join("README.md"), format!("# {}\n", name))?;
  git(&seed, &["add", "."])?;
  git(&seed, &["commit", "-m", "Initial commit"])?;

  let bare = root.join(format!("{}.git", name));
  git(root, &["clone", "--bare", "--quiet", &seed.to_string_lossy(), &bare.to_string_lossy()])?;
  Ok(bare)
}

fn write_script(path: &Path, content: &str) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::write(path, content)?;
  fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
  Ok(())
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}
