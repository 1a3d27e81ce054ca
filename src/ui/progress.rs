//! Progress indicators for pipeline runs
//!
//! Uses `linya` for allocation-free progress bars. Updated from the executor's
//! coordinator thread only, so no locking is needed.

use crate::pipeline::{NodeOutcome, NodeReport};
use linya::{Bar, Progress};

/// One bar over every stage of the graph
pub struct StageProgress {
  progress: Progress,
  bar: Bar,
  failed: usize,
}

impl StageProgress {
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self {
      progress,
      bar,
      failed: 0,
    }
  }

  /// Advance by one resolved stage
  pub fn stage_done(&mut self, report: &NodeReport) {
    if matches!(report.outcome, NodeOutcome::Failed { .. }) {
      self.failed += 1;
    }
    self.progress.inc_and_draw(&self.bar, 1);
  }

  pub fn failed(&self) -> usize {
    self.failed
  }
}
