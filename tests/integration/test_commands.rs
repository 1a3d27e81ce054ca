//! Integration tests for the inspection commands: `targets`, `graph`, config loading

use crate::helpers::{TestProject, stdout_json};
use anyhow::Result;
use std::fs;

#[test]
fn test_targets_json_lists_platform_table() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["targets", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let json = stdout_json(&output)?;
  let targets = json["targets"].as_array().cloned().unwrap_or_default();
  let names: Vec<&str> = targets.iter().filter_map(|t| t["name"].as_str()).collect();
  assert_eq!(
    names,
    vec!["linux-x86_64", "macos-x86_64", "macos-aarch64", "windows-x86_32", "windows-x86_64"]
  );

  // Merge inputs have no asset of their own
  let uploaded = targets.iter().filter(|t| !t["asset"].is_null()).count();
  assert_eq!(uploaded, 3);

  let merged = json["merged_asset"].as_str().unwrap_or_default();
  assert!(merged.starts_with("app-nightly-"));
  assert!(merged.ends_with("-macos-universal.tar.gz"));
  Ok(())
}

#[test]
fn test_graph_json_shape() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["graph", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let nodes = stdout_json(&output)?.as_array().cloned().unwrap_or_default();
  // registrar, 5 builds, merge, 2 mirrors, package index
  assert_eq!(nodes.len(), 10);
  assert_eq!(nodes[0]["stage"], "registrar");

  let merge = nodes.iter().find(|n| n["stage"] == "merge").cloned().unwrap_or_default();
  assert_eq!(merge["barrier"], true);
  assert_eq!(merge["needs_success"], serde_json::json!(["registrar"]));
  assert_eq!(merge["needs_completion"].as_array().map(Vec::len), Some(5));

  let index = nodes
    .iter()
    .find(|n| n["stage"] == "package-index")
    .cloned()
    .unwrap_or_default();
  assert_eq!(index["needs_success"].as_array().map(Vec::len), Some(6));

  let demo = nodes.iter().find(|n| n["stage"] == "mirror:demo").cloned().unwrap_or_default();
  assert_eq!(demo["needs_success"], serde_json::json!(["registrar"]));
  Ok(())
}

#[test]
fn test_graph_without_optional_channels() -> Result<()> {
  let project = TestProject::new()?;
  let config_path = project.path.join("nightly.toml");
  let config = fs::read_to_string(&config_path)?;
  let core = config.split("[[mirrors]]").next().unwrap_or_default().to_string();
  fs::write(&config_path, core)?;

  let output = project.run(&["graph", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  let nodes = stdout_json(&output)?.as_array().cloned().unwrap_or_default();
  assert_eq!(nodes.len(), 7);
  Ok(())
}

#[test]
fn test_explicit_config_path() -> Result<()> {
  let project = TestProject::new()?;
  let ci_dir = project.path.join("ci");
  fs::create_dir_all(&ci_dir)?;
  let moved = ci_dir.join("nightly.toml");
  fs::rename(project.path.join("nightly.toml"), &moved)?;

  let output = project.run(&["graph", "--json", "--config", "ci/nightly.toml"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  Ok(())
}

#[test]
fn test_missing_config_is_user_error() -> Result<()> {
  let project = TestProject::new()?;
  fs::remove_file(project.path.join("nightly.toml"))?;

  let output = project.run(&["targets"])?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("nightly.toml"));
  Ok(())
}

#[test]
fn test_invalid_config_is_user_error() -> Result<()> {
  let project = TestProject::new()?;
  let config_path = project.path.join("nightly.toml");
  let config = fs::read_to_string(&config_path)?;
  fs::write(&config_path, config.replace("template = \"PKGBUILD.in\"", "template = \"missing.in\""))?;

  let output = project.run(&["graph"])?;
  assert_eq!(output.status.code(), Some(1));
  Ok(())
}
