use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Step;

/// Convert a duration to fractional minutes, the unit used in log records.
pub fn minutes(duration: Duration) -> f64 {
    duration.as_secs_f64() / 60.0
}

/// Which sequence a run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Load,
    Undo,
}

/// Elapsed time of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
    #[serde(serialize_with = "serialize_step")]
    pub step: Step,
    pub duration_minutes: f64,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub data_model: String,
    pub model_version: String,
    pub phases: Vec<PhaseTiming>,
    pub rows_loaded: u64,
    /// Minutes since the load step began (load runs) or since the first
    /// drop (undo runs).
    pub duration_minutes: f64,
}

impl RunReport {
    /// Steps in the order they ran.
    pub fn steps(&self) -> Vec<Step> {
        self.phases.iter().map(|phase| phase.step).collect()
    }
}

/// Records per-phase durations against a shared start instant.
#[derive(Debug)]
pub(crate) struct Stopwatch {
    origin: Option<Instant>,
    phases: Vec<PhaseTiming>,
}

impl Stopwatch {
    pub(crate) fn new() -> Self {
        Self {
            origin: None,
            phases: Vec::new(),
        }
    }

    /// Fix the instant the run total is measured from. Only the first call
    /// takes effect.
    pub(crate) fn mark_origin(&mut self) {
        self.origin.get_or_insert_with(Instant::now);
    }

    /// Record a finished phase that began at `started`.
    pub(crate) fn record(&mut self, step: Step, started: Instant) -> f64 {
        let duration_minutes = minutes(started.elapsed());
        self.phases.push(PhaseTiming {
            step,
            duration_minutes,
        });
        duration_minutes
    }

    pub(crate) fn total_minutes(&self) -> f64 {
        self.origin
            .map(|origin| minutes(origin.elapsed()))
            .unwrap_or_default()
    }

    pub(crate) fn into_phases(self) -> Vec<PhaseTiming> {
        self.phases
    }
}

fn serialize_step<S: serde::Serializer>(step: &Step, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(step.as_str())
}
