//! Stage graph built with petgraph
//!
//! ## Graph Structure
//!
//! - **Directed Graph**: `A → B` means "B waits for A"
//! - **Nodes**: Stages (registrar, one build per target, merge, publishers)
//! - **Edges**: `DepKind::Success` (B is skipped unless A succeeded) or
//!   `DepKind::Completion` (B only waits for A to finish)
//!
//! ```text
//!                 ┌──► build:<target> ×5 ──(completion)──► merge
//! registrar ──────┼──────────────────────────(success)───► merge
//!                 ├──► mirror:demo, mirror:docs
//!                 └──► (via every build, success) ──► package-index
//! ```

use crate::build::BUILD_TARGETS;
use crate::core::config::{MirrorChannel, NightlyConfig};
use crate::core::error::{NightlyError, NightlyResult, PipelineError};
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// One node of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  Registrar,
  Build(&'static str),
  Merge,
  Mirror(MirrorChannel),
  PackageIndex,
}

impl Stage {
  /// Failure of this stage in the per-stage taxonomy
  pub fn failure(&self, reason: impl Into<String>) -> PipelineError {
    let reason = reason.into();
    match self {
      Stage::Registrar => PipelineError::RegistrarFailure { reason },
      Stage::Build(target) => PipelineError::BuildFailure {
        target: target.to_string(),
        reason,
      },
      Stage::Merge => PipelineError::MergeFailure { reason },
      Stage::Mirror(channel) => PipelineError::PublishFailure {
        channel: channel.as_str().to_string(),
        reason,
      },
      Stage::PackageIndex => PipelineError::PublishFailure {
        channel: "package-index".to_string(),
        reason,
      },
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Registrar => write!(f, "registrar"),
      Stage::Build(target) => write!(f, "build:{}", target),
      Stage::Merge => write!(f, "merge"),
      Stage::Mirror(channel) => write!(f, "mirror:{}", channel.as_str()),
      Stage::PackageIndex => write!(f, "package-index"),
    }
  }
}

impl Serialize for Stage {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
  /// Dependent is skipped unless the dependency succeeded
  Success,
  /// Pure ordering; dependent runs whatever the outcome
  Completion,
}

pub struct StageGraph {
  graph: DiGraph<Stage, DepKind>,
  index: HashMap<Stage, NodeIndex>,
}

impl StageGraph {
  /// The nightly graph for this configuration
  ///
  /// Mirrors and the package index only appear when configured.
  pub fn nightly(config: &NightlyConfig) -> Self {
    let mut g = Self {
      graph: DiGraph::new(),
      index: HashMap::new(),
    };

    let registrar = g.add(Stage::Registrar);
    let merge = g.add(Stage::Merge);
    g.graph.add_edge(registrar, merge, DepKind::Success);

    let builds: Vec<NodeIndex> = BUILD_TARGETS
      .iter()
      .map(|target| {
        let node = g.add(Stage::Build(target.name));
        g.graph.add_edge(registrar, node, DepKind::Success);
        g.graph.add_edge(node, merge, DepKind::Completion);
        node
      })
      .collect();

    for channel in [MirrorChannel::Demo, MirrorChannel::Docs] {
      if config.mirror(channel).is_some() {
        let node = g.add(Stage::Mirror(channel));
        g.graph.add_edge(registrar, node, DepKind::Success);
      }
    }

    if config.package_index.is_some() {
      let node = g.add(Stage::PackageIndex);
      g.graph.add_edge(registrar, node, DepKind::Success);
      for build in &builds {
        g.graph.add_edge(*build, node, DepKind::Success);
      }
    }

    g
  }

  fn add(&mut self, stage: Stage) -> NodeIndex {
    let node = self.graph.add_node(stage);
    self.index.insert(stage, node);
    node
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub fn stage(&self, node: NodeIndex) -> Stage {
    self.graph[node]
  }

  pub fn node(&self, stage: Stage) -> Option<NodeIndex> {
    self.index.get(&stage).copied()
  }

  pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
    self.graph.node_indices()
  }

  /// Stages in an order where every dependency precedes its dependents
  pub fn topological_order(&self) -> NightlyResult<Vec<Stage>> {
    let topo = algo::toposort(&self.graph, None).map_err(|cycle| {
      NightlyError::message(format!("Stage cycle detected involving '{}'", self.graph[cycle.node_id()]))
    })?;
    Ok(topo.into_iter().map(|n| self.graph[n]).collect())
  }

  /// What `node` waits for
  pub fn dependencies(&self, node: NodeIndex) -> Vec<(NodeIndex, DepKind)> {
    self
      .graph
      .edges_directed(node, Direction::Incoming)
      .map(|e| (e.source(), *e.weight()))
      .collect()
  }

  /// What waits for `node`
  pub fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(node, Direction::Outgoing).collect()
  }

  /// Nodes that wait for the completion of others (fan-in barriers)
  pub fn is_barrier(&self, node: NodeIndex) -> bool {
    self
      .graph
      .edges_directed(node, Direction::Incoming)
      .any(|e| *e.weight() == DepKind::Completion)
  }
}
