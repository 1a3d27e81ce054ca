use crate::commands::load_config;
use crate::core::error::NightlyResult;
use crate::pipeline::{DepKind, Stage, StageGraph};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub(crate) struct GraphNode {
  pub stage: Stage,
  pub barrier: bool,
  pub needs_success: Vec<Stage>,
  pub needs_completion: Vec<Stage>,
}

/// Nodes in execution order with their dependencies
pub(crate) fn describe(graph: &StageGraph) -> NightlyResult<Vec<GraphNode>> {
  let mut nodes = Vec::new();
  for stage in graph.topological_order()? {
    let Some(node) = graph.node(stage) else { continue };
    let mut needs_success = Vec::new();
    let mut needs_completion = Vec::new();
    for (dep, kind) in graph.dependencies(node) {
      match kind {
        DepKind::Success => needs_success.push(graph.stage(dep)),
        DepKind::Completion => needs_completion.push(graph.stage(dep)),
      }
    }
    needs_success.sort_by_key(|s| s.to_string());
    needs_completion.sort_by_key(|s| s.to_string());
    nodes.push(GraphNode {
      stage,
      barrier: graph.is_barrier(node),
      needs_success,
      needs_completion,
    });
  }
  Ok(nodes)
}

pub(crate) fn print_graph(nodes: &[GraphNode]) {
  for (i, node) in nodes.iter().enumerate() {
    let marker = if node.barrier { " [barrier]" } else { "" };
    println!("  {:>2}. {}{}", i + 1, node.stage, marker);
    if !node.needs_success.is_empty() {
      let deps: Vec<String> = node.needs_success.iter().map(|s| s.to_string()).collect();
      println!("       after success of: {}", deps.join(", "));
    }
    if !node.needs_completion.is_empty() {
      let deps: Vec<String> = node.needs_completion.iter().map(|s| s.to_string()).collect();
      println!("       after completion of: {}", deps.join(", "));
    }
  }
}

/// Print the stage graph in topological order
pub fn run_graph(root: &Path, config: Option<&Path>, json: bool) -> NightlyResult<()> {
  let config = load_config(root, config)?;
  let graph = StageGraph::nightly(&config);
  let nodes = describe(&graph)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    return Ok(());
  }

  println!("🕸️  Stage graph ({} stages)\n", nodes.len());
  print_graph(&nodes);
  Ok(())
}
