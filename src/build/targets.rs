//! Static platform table driving the fan-out
//!
//! The table is fixed at compile time. Platform-specific workarounds are
//! attached to their row as a `PreStep` instead of being special-cased in the
//! shared build logic.

use crate::core::error::NightlyResult;
use crate::core::process::ExternalCommand;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Raw binaries fused by the Artifact Merger, in merge order
pub const MERGE_INPUTS: [&str; 2] = ["macos-x86_64", "macos-aarch64"];

/// Platform name of the merged bundle
pub const MERGED_PLATFORM: &str = "macos-universal";

const STATIC_CRT: &[&str] = &["-Ctarget-feature=+crt-static"];

/// Every platform the nightly builds, one fan-out job per row
pub const BUILD_TARGETS: [BuildTarget; 5] = [
  BuildTarget {
    name: "linux-x86_64",
    operating_system: OperatingSystem::Linux,
    architecture_triple: None,
    extra_flags: &[],
    pre_step: None,
  },
  BuildTarget {
    name: "macos-x86_64",
    operating_system: OperatingSystem::Macos,
    architecture_triple: Some("x86_64-apple-darwin"),
    extra_flags: &[],
    pre_step: None,
  },
  BuildTarget {
    name: "macos-aarch64",
    operating_system: OperatingSystem::Macos,
    architecture_triple: Some("aarch64-apple-darwin"),
    extra_flags: &[],
    pre_step: Some(PreStep::PinMacosSdk {
      developer_dir: "/Applications/Xcode_12.2.app/Contents/Developer",
      sdk: "macosx11.0",
    }),
  },
  BuildTarget {
    name: "windows-x86_32",
    operating_system: OperatingSystem::Windows,
    architecture_triple: Some("i686-pc-windows-msvc"),
    extra_flags: STATIC_CRT,
    pre_step: None,
  },
  BuildTarget {
    name: "windows-x86_64",
    operating_system: OperatingSystem::Windows,
    architecture_triple: Some("x86_64-pc-windows-msvc"),
    extra_flags: STATIC_CRT,
    pre_step: None,
  },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
  Linux,
  Macos,
  Windows,
}

/// Native archive format of a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
  Zip,
  TarGz,
}

impl ArchiveFormat {
  pub fn extension(self) -> &'static str {
    match self {
      ArchiveFormat::Zip => "zip",
      ArchiveFormat::TarGz => "tar.gz",
    }
  }

  /// Content type used for release asset uploads
  pub fn content_type(self) -> &'static str {
    match self {
      ArchiveFormat::Zip => "application/zip",
      ArchiveFormat::TarGz => "application/gzip",
    }
  }
}

/// Host-toolchain workaround that must run before a specific target builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreStep {
  /// Build against an older Xcode/SDK; the default host toolchain cannot
  /// produce arm64 binaries.
  PinMacosSdk {
    developer_dir: &'static str,
    sdk: &'static str,
  },
}

impl PreStep {
  /// Run the hook and return the environment the build must see
  pub fn apply(&self) -> NightlyResult<BTreeMap<String, String>> {
    match self {
      PreStep::PinMacosSdk { developer_dir, sdk } => {
        let xcrun = |flag: &str| {
          ExternalCommand::new("xcrun")
            .args(["-sdk", sdk, flag])
            .env("DEVELOPER_DIR", *developer_dir)
            .stdout()
        };
        let sdk_root = xcrun("--show-sdk-path")?;
        let deployment_target = xcrun("--show-sdk-platform-version")?;

        let mut env = BTreeMap::new();
        env.insert("DEVELOPER_DIR".to_string(), developer_dir.to_string());
        env.insert("SDKROOT".to_string(), sdk_root);
        env.insert("MACOSX_DEPLOYMENT_TARGET".to_string(), deployment_target);
        Ok(env)
      }
    }
  }
}

/// One row of the platform table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
  pub name: &'static str,
  pub operating_system: OperatingSystem,
  pub architecture_triple: Option<&'static str>,
  pub extra_flags: &'static [&'static str],
  pub pre_step: Option<PreStep>,
}

impl BuildTarget {
  /// Look up a declared target by platform name
  pub fn find(name: &str) -> Option<&'static BuildTarget> {
    BUILD_TARGETS.iter().find(|t| t.name == name)
  }

  pub fn archive_format(&self) -> ArchiveFormat {
    archive_format_for(self.name)
  }

  /// Whether this target's raw binary feeds the Artifact Merger
  pub fn is_merge_input(&self) -> bool {
    MERGE_INPUTS.contains(&self.name)
  }

  /// `ruffle` → `ruffle.exe` on Windows
  pub fn binary_file_name(&self, binary: &str) -> String {
    match self.operating_system {
      OperatingSystem::Windows => format!("{}.exe", binary),
      _ => binary.to_string(),
    }
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// `zip` iff the platform is a Windows one
pub fn archive_format_for(platform: &str) -> ArchiveFormat {
  if platform.starts_with("windows") {
    ArchiveFormat::Zip
  } else {
    ArchiveFormat::TarGz
  }
}

/// `<prefix>-<platform>.<ext>`
pub fn artifact_file_name(prefix: &str, platform: &str) -> String {
  format!("{}-{}.{}", prefix, platform, archive_format_for(platform).extension())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_table_matches_declared_platforms() {
    let names: Vec<_> = BUILD_TARGETS.iter().map(|t| t.name).collect();
    assert_eq!(
      names,
      vec!["linux-x86_64", "macos-x86_64", "macos-aarch64", "windows-x86_32", "windows-x86_64"]
    );
    assert!(BuildTarget::find("linux-x86_64").unwrap().architecture_triple.is_none());
    assert_eq!(
      BuildTarget::find("windows-x86_32").unwrap().architecture_triple,
      Some("i686-pc-windows-msvc")
    );
  }

  #[test]
  fn test_zip_iff_windows() {
    for target in &BUILD_TARGETS {
      let is_zip = target.archive_format() == ArchiveFormat::Zip;
      assert_eq!(is_zip, target.name.starts_with("windows"), "{}", target.name);
    }
    assert_eq!(archive_format_for(MERGED_PLATFORM), ArchiveFormat::TarGz);
  }

  #[test]
  fn test_static_crt_only_on_windows() {
    for target in &BUILD_TARGETS {
      let has_crt = target.extra_flags.contains(&"-Ctarget-feature=+crt-static");
      assert_eq!(has_crt, target.operating_system == OperatingSystem::Windows);
    }
  }

  #[test]
  fn test_only_aarch64_has_pre_step() {
    let with_hook: Vec<_> = BUILD_TARGETS.iter().filter(|t| t.pre_step.is_some()).map(|t| t.name).collect();
    assert_eq!(with_hook, vec!["macos-aarch64"]);
  }

  #[test]
  fn test_merge_inputs_are_declared_targets() {
    for name in MERGE_INPUTS {
      assert!(BuildTarget::find(name).unwrap().is_merge_input());
    }
    assert_eq!(BUILD_TARGETS.iter().filter(|t| t.is_merge_input()).count(), 2);
  }

  #[test]
  fn test_artifact_file_names() {
    let prefix = "ruffle-nightly-2025_01_05";
    assert_eq!(
      artifact_file_name(prefix, "linux-x86_64"),
      "ruffle-nightly-2025_01_05-linux-x86_64.tar.gz"
    );
    assert_eq!(
      artifact_file_name(prefix, "windows-x86_64"),
      "ruffle-nightly-2025_01_05-windows-x86_64.zip"
    );
    assert_eq!(
      artifact_file_name(prefix, MERGED_PLATFORM),
      "ruffle-nightly-2025_01_05-macos-universal.tar.gz"
    );
  }

  #[test]
  fn test_binary_file_name() {
    assert_eq!(BuildTarget::find("windows-x86_64").unwrap().binary_file_name("app"), "app.exe");
    assert_eq!(BuildTarget::find("macos-aarch64").unwrap().binary_file_name("app"), "app");
  }
}
