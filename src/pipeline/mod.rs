//! Pipeline orchestration
//!
//! # Core Invariants
//!
//! 1. **The gate runs first**
//!    - A stale scheduled run never builds the graph
//!    - Zero builds, zero uploads, successful exit
//!
//! 2. **Failure isolation**
//!    - A failed stage only skips stages with a `Success` edge on it
//!    - The merge waits on the whole fan-out, not on its success
//!
//! 3. **One report per run**
//!    - Every node appears exactly once: succeeded, failed or skipped
//!    - Process exit status is derived from the report, never from a stage

pub mod executor;
pub mod graph;
pub mod report;
pub mod runner;

pub use graph::{DepKind, Stage, StageGraph};
pub use report::{NodeOutcome, NodeReport, RunReport};
pub use runner::Pipeline;
