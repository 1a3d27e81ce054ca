//! Run report: what every node did, what was produced, what was published

use super::graph::Stage;
use crate::build::{ArtifactRecord, MERGED_PLATFORM};
use crate::core::context::{RunContext, RunId, TriggerKind};
use crate::core::error::PipelineError;
use crate::gate::ActivityDecision;
use crate::publish::PublishRecord;
use crate::release::ReleaseIdentity;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
  Succeeded,
  Skipped { reason: String },
  Failed { error: PipelineError },
}

impl NodeOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, NodeOutcome::Succeeded)
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
  pub stage: Stage,
  pub outcome: NodeOutcome,
  pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub run_id: RunId,
  pub trigger: TriggerKind,
  pub date: String,
  pub decision: ActivityDecision,
  pub identity: Option<ReleaseIdentity>,
  pub nodes: Vec<NodeReport>,
  pub artifacts: Vec<ArtifactRecord>,
  pub publishes: Vec<PublishRecord>,
}

impl RunReport {
  /// Report for a run the gate cancelled before the graph was built
  pub fn skipped(ctx: &RunContext) -> Self {
    Self {
      run_id: ctx.trigger.run_id.clone(),
      trigger: ctx.trigger.kind,
      date: ctx.date.dashed.clone(),
      decision: ctx.decision.clone(),
      identity: None,
      nodes: Vec::new(),
      artifacts: Vec::new(),
      publishes: Vec::new(),
    }
  }

  pub fn publish_count(&self) -> usize {
    self.publishes.len()
  }

  /// Every artifact, including the merged bundle
  pub fn artifact_count(&self) -> usize {
    self.artifacts.len()
  }

  /// Artifacts produced by the fan-out (packaged bundles and raw binaries)
  pub fn fanout_artifact_count(&self) -> usize {
    self.artifacts.iter().filter(|a| a.platform != MERGED_PLATFORM).count()
  }

  pub fn failures(&self) -> impl Iterator<Item = (&Stage, &PipelineError)> {
    self.nodes.iter().filter_map(|n| match &n.outcome {
      NodeOutcome::Failed { error } => Some((&n.stage, error)),
      _ => None,
    })
  }

  pub fn has_failures(&self) -> bool {
    self.failures().next().is_some()
  }

  #[cfg(test)]
  pub fn outcome_of(&self, stage: Stage) -> Option<&NodeOutcome> {
    self.nodes.iter().find(|n| n.stage == stage).map(|n| &n.outcome)
  }
}
