//! Integration tests for `nightly-release gate`

use crate::helpers::{TestProject, stdout_json};
use anyhow::Result;
use std::fs;

fn point_upstream_at(project: &TestProject, path: &str) -> Result<()> {
  let config_path = project.path.join("nightly.toml");
  let config = fs::read_to_string(&config_path)?;
  fs::write(&config_path, config.replace("path = \".\"", &format!("path = \"{}\"", path)))?;
  Ok(())
}

#[test]
fn test_gate_fresh_upstream_is_alive() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["gate", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let decision = stdout_json(&output)?;
  assert_eq!(decision["is_alive"], true);
  assert_eq!(decision["days_since_change"], 0);
  assert!(decision["failure"].is_null());
  Ok(())
}

#[test]
fn test_gate_stale_upstream() -> Result<()> {
  let project = TestProject::new()?;
  project.age_upstream(2)?;

  let output = project.run(&["gate", "--json"])?;
  assert!(output.status.success());

  let decision = stdout_json(&output)?;
  assert_eq!(decision["is_alive"], false);
  assert_eq!(decision["days_since_change"], 2);
  Ok(())
}

#[test]
fn test_gate_manual_bypasses_staleness() -> Result<()> {
  let project = TestProject::new()?;
  project.age_upstream(2)?;

  let output = project.run(&["gate", "--trigger", "manual", "--json"])?;
  assert!(output.status.success());

  let decision = stdout_json(&output)?;
  assert_eq!(decision["is_alive"], true);
  assert!(decision["days_since_change"].is_null());
  Ok(())
}

#[test]
fn test_gate_fails_closed_without_upstream() -> Result<()> {
  let project = TestProject::new()?;
  point_upstream_at(&project, "does-not-exist")?;

  let output = project.run(&["gate", "--json"])?;
  assert!(output.status.success());

  let decision = stdout_json(&output)?;
  assert_eq!(decision["is_alive"], false);
  assert_eq!(decision["failure"]["kind"], "gate_failure");
  Ok(())
}

#[test]
fn test_run_fails_closed_without_upstream() -> Result<()> {
  let project = TestProject::new()?;
  point_upstream_at(&project, "does-not-exist")?;

  // A scheduled release never fires on ambiguous data, and that is not an error
  let output = project.run(&["run", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let report = stdout_json(&output)?;
  assert_eq!(report["nodes"].as_array().map(Vec::len), Some(0));
  assert!(!project.path.join("releases").exists());
  Ok(())
}

#[test]
fn test_gate_human_output() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["gate"])?;
  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Activity gate (scheduled trigger)"));
  Ok(())
}
