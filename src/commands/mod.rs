//! CLI commands for nightly-release
//!
//! - **run**: Full pipeline (gate → registrar → fan-out → merge → publishers)
//! - **gate**: Evaluate the Activity Gate only
//! - **targets**: Show the platform table and today's artifact names
//! - **graph**: Show the stage graph in execution order
//!
//! Every command loads the configuration once through `load_config`.

pub mod gate;
pub mod graph;
pub mod run;
pub mod targets;

pub use gate::run_gate;
pub use graph::run_graph;
pub use run::{RunOptions, run_nightly};
pub use targets::run_targets;

use crate::core::config::NightlyConfig;
use crate::core::error::NightlyResult;
use std::path::Path;

/// Explicit `--config` path, or the search path under `root`
pub fn load_config(root: &Path, config: Option<&Path>) -> NightlyResult<NightlyConfig> {
  match config {
    Some(path) => NightlyConfig::load_from(path, root),
    None => NightlyConfig::load(root),
  }
}
