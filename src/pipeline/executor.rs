//! Dependency-counting DAG executor
//!
//! # Design
//!
//! Every node keeps a count of unfinished dependencies. Nodes at zero are
//! dispatched onto a dedicated rayon pool; finished nodes report back through
//! an mpsc channel and the coordinator (the calling thread) decrements their
//! dependents. No polling, no sleeps.
//!
//! - A node with a `Success` dependency that did not succeed is resolved as
//!   skipped without being dispatched; its dependents see the skip.
//! - `Completion` dependencies only order; a failed build still releases the
//!   merge barrier.
//! - A panicking stage is contained and reported as that stage's failure.
//!
//! The pool has one thread per node so stages blocking on external commands
//! never starve each other, and the coordinator blocks outside the pool.

use super::graph::{DepKind, Stage, StageGraph};
use super::report::{NodeOutcome, NodeReport};
use crate::core::error::{NightlyError, NightlyResult};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Run every node of `graph`, calling `on_complete` as each one resolves
///
/// Reports are returned in topological order.
pub fn execute<F, C>(graph: &StageGraph, run: F, mut on_complete: C) -> NightlyResult<Vec<NodeReport>>
where
  F: Fn(&Stage) -> NodeOutcome + Sync,
  C: FnMut(&NodeReport),
{
  let order = graph.topological_order()?;
  if order.is_empty() {
    return Ok(Vec::new());
  }

  let pool = rayon::ThreadPoolBuilder::new()
    .num_threads(graph.node_count())
    .thread_name(|i| format!("nightly-stage-{}", i))
    .build()
    .map_err(|e| NightlyError::message(format!("Failed to start stage pool: {}", e)))?;

  let mut pending: HashMap<NodeIndex, usize> = graph.nodes().map(|n| (n, graph.dependencies(n).len())).collect();
  let mut outcomes: HashMap<NodeIndex, NodeReport> = HashMap::new();
  let mut ready: VecDeque<NodeIndex> = graph.nodes().filter(|n| pending[n] == 0).collect();

  let (tx, rx) = mpsc::channel::<(NodeIndex, NodeOutcome, Duration)>();
  let run = &run;

  pool.in_place_scope(|scope| -> NightlyResult<()> {
    let mut in_flight = 0usize;

    loop {
      while let Some(node) = ready.pop_front() {
        let stage = graph.stage(node);

        if let Some(reason) = blocked_by(graph, node, &outcomes) {
          tracing::info!(stage = %stage, %reason, "stage skipped");
          let report = NodeReport {
            stage,
            outcome: NodeOutcome::Skipped { reason },
            duration_ms: 0,
          };
          resolve(graph, node, report, &mut pending, &mut outcomes, &mut ready, &mut on_complete);
          continue;
        }

        tracing::info!(stage = %stage, "stage started");
        let tx = tx.clone();
        in_flight += 1;
        scope.spawn(move |_| {
          let start = Instant::now();
          let outcome = catch_unwind(AssertUnwindSafe(|| run(&stage))).unwrap_or_else(|panic| {
            NodeOutcome::Failed {
              error: stage.failure(format!("stage panicked: {}", panic_message(panic.as_ref()))),
            }
          });
          // The coordinator outlives every spawned stage
          let _ = tx.send((node, outcome, start.elapsed()));
        });
      }

      if in_flight == 0 {
        break;
      }

      let (node, outcome, elapsed) = rx
        .recv()
        .map_err(|_| NightlyError::message("Stage pool disconnected before all stages reported"))?;
      in_flight -= 1;

      let stage = graph.stage(node);
      match &outcome {
        NodeOutcome::Failed { error } => tracing::error!(stage = %stage, %error, "stage failed"),
        _ => tracing::info!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished"),
      }
      let report = NodeReport {
        stage,
        outcome,
        duration_ms: elapsed.as_millis() as u64,
      };
      resolve(graph, node, report, &mut pending, &mut outcomes, &mut ready, &mut on_complete);
    }

    Ok(())
  })?;

  let mut by_stage: HashMap<Stage, NodeReport> = outcomes.into_values().map(|r| (r.stage, r)).collect();
  Ok(order.into_iter().filter_map(|stage| by_stage.remove(&stage)).collect())
}

/// First `Success` dependency that did not succeed, as a skip reason
fn blocked_by(graph: &StageGraph, node: NodeIndex, outcomes: &HashMap<NodeIndex, NodeReport>) -> Option<String> {
  graph
    .dependencies(node)
    .into_iter()
    .filter(|(_, kind)| *kind == DepKind::Success)
    .find_map(|(dep, _)| match outcomes.get(&dep) {
      Some(report) if report.outcome.is_success() => None,
      _ => Some(format!("{} did not succeed", graph.stage(dep))),
    })
}

/// Record a finished node and release dependents whose count drops to zero
fn resolve<C: FnMut(&NodeReport)>(
  graph: &StageGraph,
  node: NodeIndex,
  report: NodeReport,
  pending: &mut HashMap<NodeIndex, usize>,
  outcomes: &mut HashMap<NodeIndex, NodeReport>,
  ready: &mut VecDeque<NodeIndex>,
  on_complete: &mut C,
) {
  on_complete(&report);
  outcomes.insert(node, report);

  for dependent in graph.dependents(node) {
    if let Some(count) = pending.get_mut(&dependent) {
      *count = count.saturating_sub(1);
      if *count == 0 {
        ready.push_back(dependent);
      }
    }
  }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::NightlyConfig;
  use crate::core::error::PipelineError;
  use std::sync::Mutex;

  const CONFIG: &str = r#"
[project]
name = "app"

[upstream]
kind = "git"
path = "."

[host]
kind = "local"
root = "releases"

[build]
binary = "app"

[[mirrors]]
channel = "docs"
repository = "docs.git"
source = "doc"
target = "."

[package_index]
repository = "index.git"
template = "PKGBUILD.in"
file_name = "PKGBUILD"
author_name = "Index"
author_email = "index@example.com"
"#;

  fn graph() -> StageGraph {
    let config: NightlyConfig = toml_edit::de::from_str(CONFIG).unwrap();
    StageGraph::nightly(&config)
  }

  fn outcome_of(reports: &[NodeReport], stage: Stage) -> &NodeOutcome {
    &reports.iter().find(|r| r.stage == stage).unwrap().outcome
  }

  #[test]
  fn test_all_succeed_runs_every_node_once() {
    let graph = graph();
    let started = Mutex::new(Vec::new());
    let reports = execute(
      &graph,
      |stage| {
        started.lock().unwrap().push(*stage);
        NodeOutcome::Succeeded
      },
      |_| {},
    )
    .unwrap();

    assert_eq!(reports.len(), graph.node_count());
    assert!(reports.iter().all(|r| r.outcome.is_success()));
    let started = started.into_inner().unwrap();
    assert_eq!(started.len(), graph.node_count());
    assert_eq!(started[0], Stage::Registrar);
  }

  #[test]
  fn test_failed_build_releases_barrier_and_skips_index() {
    let graph = graph();
    let merge_saw_builds = Mutex::new(0usize);
    let builds_done = std::sync::atomic::AtomicUsize::new(0);

    let reports = execute(
      &graph,
      |stage| match stage {
        Stage::Build("macos-aarch64") => {
          builds_done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
          NodeOutcome::Failed {
            error: stage.failure("toolchain missing"),
          }
        }
        Stage::Build(_) => {
          builds_done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
          NodeOutcome::Succeeded
        }
        Stage::Merge => {
          *merge_saw_builds.lock().unwrap() = builds_done.load(std::sync::atomic::Ordering::SeqCst);
          NodeOutcome::Succeeded
        }
        _ => NodeOutcome::Succeeded,
      },
      |_| {},
    )
    .unwrap();

    // The merge ran only after the whole fan-out finished
    assert_eq!(*merge_saw_builds.lock().unwrap(), 5);
    assert!(matches!(
      outcome_of(&reports, Stage::PackageIndex),
      NodeOutcome::Skipped { reason } if reason.contains("macos-aarch64")
    ));
    assert!(outcome_of(&reports, Stage::Build("linux-x86_64")).is_success());
  }

  #[test]
  fn test_failed_registrar_skips_everything_downstream() {
    let graph = graph();
    let reports = execute(
      &graph,
      |stage| match stage {
        Stage::Registrar => NodeOutcome::Failed {
          error: PipelineError::RegistrarFailure { reason: "403".into() },
        },
        _ => panic!("{} must not run", stage),
      },
      |_| {},
    )
    .unwrap();

    assert_eq!(reports.len(), graph.node_count());
    assert!(
      reports
        .iter()
        .filter(|r| r.stage != Stage::Registrar)
        .all(|r| matches!(r.outcome, NodeOutcome::Skipped { .. }))
    );
  }

  #[test]
  fn test_panicking_stage_becomes_failure() {
    let graph = graph();
    let reports = execute(
      &graph,
      |stage| {
        if *stage == Stage::Mirror(crate::core::config::MirrorChannel::Docs) {
          panic!("docs generator exploded");
        }
        NodeOutcome::Succeeded
      },
      |_| {},
    )
    .unwrap();

    match outcome_of(&reports, Stage::Mirror(crate::core::config::MirrorChannel::Docs)) {
      NodeOutcome::Failed {
        error: PipelineError::PublishFailure { channel, reason },
      } => {
        assert_eq!(channel, "docs");
        assert!(reason.contains("docs generator exploded"));
      }
      other => panic!("unexpected outcome {:?}", other),
    }
    assert!(outcome_of(&reports, Stage::Merge).is_success());
  }

  #[test]
  fn test_on_complete_sees_every_node() {
    let graph = graph();
    let mut seen = Vec::new();
    execute(&graph, |_| NodeOutcome::Succeeded, |r| seen.push(r.stage)).unwrap();
    assert_eq!(seen.len(), graph.node_count());
  }
}
