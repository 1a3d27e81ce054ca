//! Integration tests for `nightly-release run`

use crate::helpers::{TestProject, commit_count, show_file, stdout_json, tip_signature};
use anyhow::Result;
use serde_json::Value;

fn asset_names(manifest: &Value) -> Vec<String> {
  manifest["assets"]
    .as_array()
    .map(|assets| {
      assets
        .iter()
        .filter_map(|a| a["name"].as_str().map(str::to_string))
        .collect()
    })
    .unwrap_or_default()
}

fn publishes(report: &Value) -> Vec<Value> {
  report["publishes"].as_array().cloned().unwrap_or_default()
}

fn publish_for<'a>(publishes: &'a [Value], channel: &str) -> Option<&'a Value> {
  publishes.iter().find(|p| p["channel"] == channel)
}

#[test]
fn test_full_run_publishes_every_channel() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["run", "--trigger", "manual", "--run-id", "42", "--json"])?;
  assert!(
    output.status.success(),
    "run failed: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  let report = stdout_json(&output)?;
  assert_eq!(report["run_id"], "42");

  // 5 fan-out builds + the merged universal binary
  assert_eq!(report["artifacts"].as_array().map(Vec::len), Some(6));

  // 3 direct uploads, 1 merged upload, demo, docs, package index
  let publishes = publishes(&report);
  assert_eq!(publishes.len(), 7);
  let assets = publishes.iter().filter(|p| p["channel"] == "release-assets").count();
  assert_eq!(assets, 4);

  let tag = report["identity"]["tag_name"].as_str().unwrap_or_default().to_string();
  let dashed = report["identity"]["date_dashed"].as_str().unwrap_or_default().to_string();
  let dotted = report["identity"]["date_dotted"].as_str().unwrap_or_default().to_string();
  let underscored = report["identity"]["date_underscored"]
    .as_str()
    .unwrap_or_default()
    .to_string();
  assert_eq!(tag, format!("nightly-{}", dashed));

  let manifest = project.release_manifest(&tag)?;
  assert_eq!(manifest["prerelease"], true);
  assert_eq!(manifest["title"], format!("Nightly {}", dashed));
  let names = asset_names(&manifest);
  let prefix = format!("app-nightly-{}", underscored);
  assert_eq!(
    names,
    vec![
      format!("{}-linux-x86_64.tar.gz", prefix),
      format!("{}-macos-universal.tar.gz", prefix),
      format!("{}-windows-x86_32.zip", prefix),
      format!("{}-windows-x86_64.zip", prefix),
    ]
  );
  // Merge inputs are never uploaded on their own
  assert!(!names.iter().any(|n| n.contains("macos-x86_64") || n.contains("macos-aarch64")));

  // Mirrors: one bot commit on top of the human history
  assert_eq!(commit_count(&project.demo_remote, "master")?, 2);
  let (email, subject) = tip_signature(&project.demo_remote, "master")?;
  assert_eq!(email, "nightly-bot@example.com");
  assert_eq!(subject, format!("Nightly build {}", dashed));
  assert_eq!(show_file(&project.demo_remote, "master", "index.html")?, "demo\n");

  assert_eq!(commit_count(&project.docs_remote, "master")?, 2);
  assert!(show_file(&project.docs_remote, "master", "api/index.html")?.contains("docs"));
  // Outside the target directory nothing is touched
  assert_eq!(show_file(&project.docs_remote, "master", "README.md")?, "# docs\n");

  // Package index: rendered with the dotted date, committed as the index author
  let pkgbuild = show_file(&project.index_remote, "master", "PKGBUILD")?;
  assert!(pkgbuild.contains(&format!("pkgver={}", dotted)));
  assert!(!pkgbuild.contains("@VERSION@"));
  let (email, subject) = tip_signature(&project.index_remote, "master")?;
  assert_eq!(email, "index-bot@example.com");
  assert_eq!(subject, format!("Update to Nightly {}", dashed));

  Ok(())
}

#[test]
fn test_rerun_same_day_is_idempotent() -> Result<()> {
  let project = TestProject::new()?;

  let first = project.run(&["run", "--trigger", "manual", "--json"])?;
  assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
  let first = stdout_json(&first)?;
  let tag = first["identity"]["tag_name"].as_str().unwrap_or_default().to_string();

  let second = project.run(&["run", "--trigger", "manual", "--json"])?;
  assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));
  let second = stdout_json(&second)?;

  // Same release, assets replaced rather than duplicated
  assert_eq!(second["identity"]["tag_name"], first["identity"]["tag_name"]);
  assert_eq!(asset_names(&project.release_manifest(&tag)?).len(), 4);

  // The previous bot commit is rewound, not stacked on
  assert_eq!(commit_count(&project.demo_remote, "master")?, 2);
  assert_eq!(commit_count(&project.docs_remote, "master")?, 2);

  // Nothing new to say to the package index
  assert_eq!(commit_count(&project.index_remote, "master")?, 2);
  let publishes = publishes(&second);
  let index = publish_for(&publishes, "package-index");
  assert_eq!(index.map(|p| p["changed"].clone()), Some(Value::Bool(false)));
  assert_eq!(publishes.len(), 7);

  Ok(())
}

#[test]
fn test_stale_scheduled_run_does_nothing() -> Result<()> {
  let project = TestProject::new()?;
  project.age_upstream(2)?;

  let output = project.run(&["run", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let report = stdout_json(&output)?;
  assert_eq!(report["decision"]["is_alive"], false);
  assert_eq!(report["decision"]["days_since_change"], 2);
  assert_eq!(report["nodes"].as_array().map(Vec::len), Some(0));
  assert_eq!(report["publishes"].as_array().map(Vec::len), Some(0));
  assert!(report["identity"].is_null());

  // No release record, no mirror commits
  assert!(!project.path.join("releases").exists());
  assert_eq!(commit_count(&project.demo_remote, "master")?, 1);
  assert_eq!(commit_count(&project.index_remote, "master")?, 1);

  Ok(())
}

#[test]
fn test_manual_run_ignores_staleness() -> Result<()> {
  let project = TestProject::new()?;
  project.age_upstream(30)?;

  let output = project.run(&["run", "--trigger", "manual", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let report = stdout_json(&output)?;
  assert_eq!(report["decision"]["is_alive"], true);
  assert_eq!(publishes(&report).len(), 7);

  Ok(())
}

#[test]
fn test_failed_merge_input_blocks_merge_only() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run_with_env(
    &["run", "--trigger", "manual", "--json"],
    &[("FAIL_TARGET", "macos-aarch64")],
  )?;
  assert_eq!(output.status.code(), Some(3));

  let report = stdout_json(&output)?;
  let nodes = report["nodes"].as_array().cloned().unwrap_or_default();
  let node = |stage: &str| nodes.iter().find(|n| n["stage"] == stage).cloned();

  let build = node("build:macos-aarch64").unwrap_or_default();
  assert_eq!(build["outcome"]["status"], "failed");
  assert_eq!(build["outcome"]["error"]["kind"], "build_failure");

  let merge = node("merge").unwrap_or_default();
  assert_eq!(merge["outcome"]["status"], "failed");
  assert_eq!(merge["outcome"]["error"]["kind"], "merge_barrier_failure");

  // The package index waits on every build
  let index = node("package-index").unwrap_or_default();
  assert_eq!(index["outcome"]["status"], "skipped");

  // Siblings still publish; mirrors only need the registrar
  assert_eq!(node("build:linux-x86_64").unwrap_or_default()["outcome"]["status"], "succeeded");
  assert_eq!(node("mirror:demo").unwrap_or_default()["outcome"]["status"], "succeeded");
  let publishes = publishes(&report);
  assert_eq!(publishes.iter().filter(|p| p["channel"] == "release-assets").count(), 3);
  assert!(publish_for(&publishes, "package-index").is_none());
  assert_eq!(commit_count(&project.index_remote, "master")?, 1);

  Ok(())
}

#[test]
fn test_dry_run_has_no_side_effects() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["run", "--trigger", "manual", "--dry-run", "--json"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let plan = stdout_json(&output)?;
  assert_eq!(plan["would_run"], true);
  assert_eq!(plan["stages"].as_array().map(Vec::len), Some(10));
  assert_eq!(plan["assets"].as_array().map(Vec::len), Some(4));

  assert!(!project.path.join("releases").exists());
  assert!(!project.path.join("target").exists());
  assert_eq!(commit_count(&project.demo_remote, "master")?, 1);

  Ok(())
}

#[test]
fn test_human_summary_output() -> Result<()> {
  let project = TestProject::new()?;

  let output = project.run(&["run", "--trigger", "manual"])?;
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("summary"));
  assert!(stdout.contains("7 publish operation(s)"));
  assert!(stdout.contains("Nightly complete!"));

  Ok(())
}
