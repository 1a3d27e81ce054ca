use crate::commands::load_config;
use crate::core::config::NightlyConfig;
use crate::core::context::TriggerKind;
use crate::core::error::NightlyResult;
use crate::gate::{self, ActivityDecision};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Evaluate the Activity Gate and print the decision
///
/// Always exits successfully: a stale or failed-closed gate is a decision,
/// not an error.
pub fn run_gate(root: &Path, config: Option<&Path>, trigger: TriggerKind, json: bool) -> NightlyResult<()> {
  let config = load_config(root, config)?;
  let decision = evaluate_gate(&config, root, trigger, Utc::now());

  if json {
    println!("{}", serde_json::to_string_pretty(&decision)?);
    return Ok(());
  }

  print_decision(trigger, &decision);
  Ok(())
}

/// Build the recency source and decide; a source that cannot be built fails closed
pub(crate) fn evaluate_gate(
  config: &NightlyConfig,
  root: &Path,
  trigger: TriggerKind,
  now: DateTime<Utc>,
) -> ActivityDecision {
  match gate::recency_source(config, root) {
    Ok(source) => {
      tracing::debug!(source = %source.describe(), "recency source");
      gate::evaluate(trigger, source.as_ref(), now)
    }
    Err(err) => {
      let decision = gate::decide(trigger, Err(err), now);
      if let Some(failure) = &decision.failure {
        tracing::warn!(%failure, "activity gate failed closed");
      }
      decision
    }
  }
}

pub(crate) fn print_decision(trigger: TriggerKind, decision: &ActivityDecision) {
  let icon = if decision.is_alive { "🟢" } else { "⏸️ " };
  println!("{} Activity gate ({} trigger): {}", icon, trigger, decision.reason);
  if let Some(days) = decision.days_since_change {
    println!("   Days since last upstream change: {}", days);
  }
  if let Some(failure) = &decision.failure {
    println!("   ⚠️  {}", failure);
  }
}
