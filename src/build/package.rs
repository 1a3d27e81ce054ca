//! Package staging and compression
//!
//! A package is a flat directory: the binary plus the configured package
//! files. It is compressed in the platform's native format with every entry
//! at the archive root.

use super::targets::{ArchiveFormat, archive_format_for, artifact_file_name};
use crate::core::error::{NightlyError, NightlyResult, ResultExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const COMPRESSION_LEVEL: u32 = 9;

/// Stages and compresses packages under one work directory
#[derive(Debug, Clone)]
pub struct Packager {
  /// Repository root; package files resolve against it
  root: PathBuf,
  package_files: Vec<PathBuf>,
  work_dir: PathBuf,
}

impl Packager {
  pub fn new(root: &Path, package_files: &[PathBuf], work_dir: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      package_files: package_files.to_vec(),
      work_dir: work_dir.to_path_buf(),
    }
  }

  pub fn work_dir(&self) -> &Path {
    &self.work_dir
  }

  /// Stage `binary` as `binary_name` plus package files, then compress
  ///
  /// Returns the archive path, `<work_dir>/dist/<prefix>-<platform>.<ext>`.
  pub fn package(&self, platform: &str, binary: &Path, binary_name: &str, prefix: &str) -> NightlyResult<PathBuf> {
    let stage = self.work_dir.join("stage").join(platform);
    self.stage(binary, binary_name, &stage)?;

    let dist = self.work_dir.join("dist");
    fs::create_dir_all(&dist).with_context(|| format!("Failed to create {}", dist.display()))?;
    let archive = dist.join(artifact_file_name(prefix, platform));
    compress(&stage, archive_format_for(platform), &archive)?;

    tracing::debug!(platform, archive = %archive.display(), "packaged");
    Ok(archive)
  }

  fn stage(&self, binary: &Path, binary_name: &str, stage: &Path) -> NightlyResult<()> {
    if stage.exists() {
      fs::remove_dir_all(stage).with_context(|| format!("Failed to clear {}", stage.display()))?;
    }
    fs::create_dir_all(stage).with_context(|| format!("Failed to create {}", stage.display()))?;

    let dest = stage.join(binary_name);
    fs::copy(binary, &dest).with_context(|| format!("Failed to copy binary {}", binary.display()))?;
    mark_executable(&dest)?;

    for file in &self.package_files {
      let src = self.root.join(file);
      let name = file
        .file_name()
        .ok_or_else(|| NightlyError::message(format!("Invalid package file: {}", file.display())))?;
      if !src.is_file() {
        return Err(NightlyError::with_help(
          format!("Package file {} not found", src.display()),
          "Adjust [project].package_files in nightly.toml",
        ));
      }
      fs::copy(&src, stage.join(name)).with_context(|| format!("Failed to copy {}", src.display()))?;
    }
    Ok(())
  }
}

/// Set 0o755 on unix; no-op elsewhere
pub fn mark_executable(path: &Path) -> NightlyResult<()> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
      .with_context(|| format!("Failed to mark {} executable", path.display()))?;
  }
  #[cfg(not(unix))]
  let _ = path;
  Ok(())
}

/// Compress the contents of `dir` (not `dir` itself) into `output`
pub fn compress(dir: &Path, format: ArchiveFormat, output: &Path) -> NightlyResult<()> {
  let entries = sorted_entries(dir)?;
  match format {
    ArchiveFormat::Zip => write_zip(&entries, output),
    ArchiveFormat::TarGz => write_tar_gz(&entries, output),
  }
  .with_context(|| format!("Failed to write archive {}", output.display()))
}

/// (path, archive name) for every file below `dir`, sorted by name
fn sorted_entries(dir: &Path) -> NightlyResult<Vec<(PathBuf, String)>> {
  let mut out = Vec::new();
  collect_files(dir, dir, &mut out)?;
  out.sort_by(|a, b| a.1.cmp(&b.1));
  Ok(out)
}

fn collect_files(dir: &Path, base: &Path, out: &mut Vec<(PathBuf, String)>) -> NightlyResult<()> {
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
    let path = entry?.path();
    if path.is_dir() {
      collect_files(&path, base, out)?;
    } else {
      let name = path.strip_prefix(base)?.to_string_lossy().replace('\\', "/");
      out.push((path, name));
    }
  }
  Ok(())
}

fn write_zip(entries: &[(PathBuf, String)], output: &Path) -> NightlyResult<()> {
  let file = File::create(output)?;
  let mut zip = ZipWriter::new(file);

  for (path, name) in entries {
    let mut options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      options = options.unix_permissions(fs::metadata(path)?.permissions().mode());
    }
    zip.start_file(name.as_str(), options)?;
    let mut f = File::open(path)?;
    io::copy(&mut f, &mut zip)?;
  }

  zip.finish()?;
  Ok(())
}

fn write_tar_gz(entries: &[(PathBuf, String)], output: &Path) -> NightlyResult<()> {
  let file = File::create(output)?;
  let encoder = GzEncoder::new(file, Compression::new(COMPRESSION_LEVEL));
  let mut builder = tar::Builder::new(encoder);

  for (path, name) in entries {
    builder.append_path_with_name(path, name)?;
  }

  builder.into_inner()?.finish()?;
  Ok(())
}
