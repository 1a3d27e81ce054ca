//! Activity Gate
//!
//! Decides whether a run may proceed at all. Manual runs always proceed.
//! Scheduled runs proceed only if the upstream repository changed within the
//! last day. Any failure to determine recency fails closed: a scheduled
//! release never fires on ambiguous data.

mod recency;

pub use recency::{RecencySource, recency_source};

use crate::core::context::TriggerKind;
use crate::core::error::{NightlyResult, PipelineError};
use chrono::{DateTime, Utc};
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 86_400;

/// Outcome of the Activity Gate, computed once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityDecision {
  pub is_alive: bool,
  pub reason: String,
  /// Whole days since the last upstream change (scheduled runs with data only)
  pub days_since_change: Option<i64>,
  /// Set when the gate failed closed
  pub failure: Option<PipelineError>,
}

impl ActivityDecision {
  /// Decision for a run that bypasses the gate entirely
  #[cfg(test)]
  pub fn forced() -> Self {
    Self {
      is_alive: true,
      reason: "gate bypassed".to_string(),
      days_since_change: None,
      failure: None,
    }
  }

  /// Scheduled and not alive: the whole graph is skipped with a successful no-op
  pub fn skips_run(&self, trigger: TriggerKind) -> bool {
    trigger == TriggerKind::Scheduled && !self.is_alive
  }
}

/// Pure gate policy
///
/// `last_change` is the result of the recency lookup. It is only consulted for
/// scheduled triggers.
pub fn decide(trigger: TriggerKind, last_change: NightlyResult<DateTime<Utc>>, now: DateTime<Utc>) -> ActivityDecision {
  if trigger == TriggerKind::Manual {
    return ActivityDecision {
      is_alive: true,
      reason: "manual trigger always proceeds".to_string(),
      days_since_change: None,
      failure: None,
    };
  }

  match last_change {
    Ok(ts) => {
      let days = (now - ts).num_seconds().div_euclid(SECONDS_PER_DAY);
      let is_alive = days < 1;
      let reason = if is_alive {
        format!("upstream changed {}", ts.to_rfc3339())
      } else {
        format!("no upstream change for {} day(s)", days)
      };
      ActivityDecision {
        is_alive,
        reason,
        days_since_change: Some(days),
        failure: None,
      }
    }
    Err(err) => ActivityDecision {
      is_alive: false,
      reason: "upstream recency unavailable; failing closed".to_string(),
      days_since_change: None,
      failure: Some(PipelineError::GateFailure { reason: err.to_string() }),
    },
  }
}

/// Evaluate the gate, consulting `source` only when the trigger needs it
pub fn evaluate(trigger: TriggerKind, source: &dyn RecencySource, now: DateTime<Utc>) -> ActivityDecision {
  let last_change = match trigger {
    TriggerKind::Manual => Ok(now),
    TriggerKind::Scheduled => source.last_change(),
  };

  let decision = decide(trigger, last_change, now);
  match &decision.failure {
    Some(failure) => tracing::warn!(%failure, "activity gate failed closed"),
    None => tracing::info!(
      alive = decision.is_alive,
      days = ?decision.days_since_change,
      reason = %decision.reason,
      "activity gate decided"
    ),
  }
  decision
}
