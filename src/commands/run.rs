use crate::build::{BUILD_TARGETS, MERGED_PLATFORM, artifact_file_name};
use crate::commands::gate::{evaluate_gate, print_decision};
use crate::commands::graph::{describe, print_graph};
use crate::commands::load_config;
use crate::core::clock::ReleaseDate;
use crate::core::context::{RunContext, RunId, TriggerContext, TriggerKind};
use crate::core::error::{NightlyError, NightlyResult};
use crate::pipeline::{NodeOutcome, Pipeline, RunReport, StageGraph};
use crate::ui::StageProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for `nightly-release run`
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub trigger: TriggerKind,
  pub config: Option<PathBuf>,
  pub run_id: Option<String>,
  pub dry_run: bool,
  pub json: bool,
}

/// Run the nightly pipeline
///
/// Exit status: success when every stage succeeded or the gate skipped the
/// run; `NightlyError::Pipeline` when any stage failed.
pub fn run_nightly(root: &Path, opts: RunOptions) -> NightlyResult<()> {
  let config = Arc::new(load_config(root, opts.config.as_deref())?);

  // The single clock sample of this run
  let date = ReleaseDate::sample();
  let run_id = match &opts.run_id {
    Some(id) => RunId::external(id),
    None => RunId::generate(opts.trigger, &date),
  };
  let trigger = TriggerContext {
    kind: opts.trigger,
    run_id,
  };

  let decision = evaluate_gate(&config, root, opts.trigger, date.instant());
  let ctx = RunContext::new(root.to_path_buf(), trigger, date, config, decision);
  tracing::info!(run_id = %ctx.trigger.run_id, trigger = %ctx.trigger.kind, date = %ctx.date.dashed, "run started");

  if opts.dry_run {
    return print_plan(&ctx, opts.json);
  }

  if ctx.decision.skips_run(ctx.trigger.kind) {
    let report = RunReport::skipped(&ctx);
    if opts.json {
      println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
      print_decision(ctx.trigger.kind, &ctx.decision);
      println!("\n💤 Nothing to release today. No builds, no uploads.");
    }
    return Ok(());
  }

  let pipeline = Pipeline::from_context(&ctx)?;
  let report = if opts.json {
    pipeline.run(&ctx, |_| {})?
  } else {
    print_decision(ctx.trigger.kind, &ctx.decision);
    println!("\n🚀 Running nightly {} ({})\n", ctx.date.dashed, ctx.trigger.run_id);
    let total = StageGraph::nightly(&ctx.config).node_count();
    let mut progress = StageProgress::new(total, "Stages");
    let report = pipeline.run(&ctx, |node| progress.stage_done(node))?;
    if progress.failed() > 0 {
      println!();
    }
    report
  };

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_summary(&report);
  }

  let failed = report.failures().count();
  if failed > 0 {
    return Err(NightlyError::Pipeline { failed });
  }
  Ok(())
}

fn print_plan(ctx: &RunContext, json: bool) -> NightlyResult<()> {
  let graph = StageGraph::nightly(&ctx.config);
  let nodes = describe(&graph)?;
  let prefix = ctx.artifact_prefix();
  let mut assets: Vec<String> = BUILD_TARGETS
    .iter()
    .filter(|t| !t.is_merge_input())
    .map(|t| artifact_file_name(&prefix, t.name))
    .collect();
  assets.push(artifact_file_name(&prefix, MERGED_PLATFORM));

  if json {
    let plan = serde_json::json!({
      "run_id": ctx.trigger.run_id,
      "trigger": ctx.trigger.kind,
      "tag": ctx.date.tag_name(),
      "decision": ctx.decision,
      "would_run": !ctx.decision.skips_run(ctx.trigger.kind),
      "stages": nodes,
      "assets": assets,
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    return Ok(());
  }

  print_decision(ctx.trigger.kind, &ctx.decision);
  if ctx.decision.skips_run(ctx.trigger.kind) {
    println!("\n💤 DRY RUN - the gate would skip this run entirely");
    return Ok(());
  }

  println!("\n📋 DRY RUN - release {} ({})\n", ctx.date.tag_name(), ctx.date.display_name());
  print_graph(&nodes);
  println!("\n📦 Assets:");
  for asset in &assets {
    println!("  {}", asset);
  }
  println!("\n💡 Drop --dry-run to execute");
  Ok(())
}

fn print_summary(report: &RunReport) {
  println!("\n📊 Nightly {} summary\n", report.date);
  for node in &report.nodes {
    match &node.outcome {
      NodeOutcome::Succeeded => println!("  ✅ {} ({} ms)", node.stage, node.duration_ms),
      NodeOutcome::Skipped { reason } => println!("  ⏭️  {} (skipped: {})", node.stage, reason),
      NodeOutcome::Failed { error } => println!("  ❌ {}: {}", node.stage, error),
    }
  }

  println!(
    "\n  {} artifact(s) ({} from fan-out), {} publish operation(s)",
    report.artifact_count(),
    report.fanout_artifact_count(),
    report.publish_count()
  );
  for publish in &report.publishes {
    let note = if publish.changed { "" } else { " (unchanged)" };
    println!("  📤 {} → {}{}", publish.channel, publish.name, note);
  }

  if !report.has_failures() {
    println!("\n🎉 Nightly complete!");
  }
}
