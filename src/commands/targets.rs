use crate::build::{BUILD_TARGETS, BuildTarget, MERGED_PLATFORM, artifact_file_name};
use crate::commands::load_config;
use crate::core::clock::ReleaseDate;
use crate::core::error::NightlyResult;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct TargetRow<'a> {
  #[serde(flatten)]
  target: &'a BuildTarget,
  /// Name of the uploaded asset, or None for merge inputs
  asset: Option<String>,
}

#[derive(Debug, Serialize)]
struct TargetsOutput<'a> {
  date: String,
  targets: Vec<TargetRow<'a>>,
  merged_asset: String,
}

/// Print the platform table with today's artifact names
pub fn run_targets(root: &Path, config: Option<&Path>, json: bool) -> NightlyResult<()> {
  let config = load_config(root, config)?;
  let date = ReleaseDate::sample();
  let prefix = date.artifact_prefix(&config.project.name);

  let output = TargetsOutput {
    date: date.dashed.clone(),
    targets: BUILD_TARGETS
      .iter()
      .map(|target| TargetRow {
        target,
        asset: (!target.is_merge_input()).then(|| artifact_file_name(&prefix, target.name)),
      })
      .collect(),
    merged_asset: artifact_file_name(&prefix, MERGED_PLATFORM),
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&output)?);
    return Ok(());
  }

  println!("🎯 Build targets for {}\n", output.date);
  for row in &output.targets {
    let target = row.target;
    println!("  {}", target.name);
    println!("     triple:  {}", target.architecture_triple.unwrap_or("(host)"));
    if !target.extra_flags.is_empty() {
      println!("     flags:   {}", target.extra_flags.join(" "));
    }
    if target.pre_step.is_some() {
      println!("     pre-step: pin macOS SDK");
    }
    match &row.asset {
      Some(asset) => println!("     asset:   {}", asset),
      None => println!("     asset:   (raw binary → {})", MERGED_PLATFORM),
    }
  }
  println!("\n  {}", MERGED_PLATFORM);
  println!("     asset:   {}", output.merged_asset);

  Ok(())
}
