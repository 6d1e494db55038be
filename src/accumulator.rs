//! Running state for reducing one load test's event log.
//!
//! An [`AccumulatorState`] is mutated once per classified record, in the order the
//! records were read, and is never shared between load test runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{Classified, MetricKind};

/// The running reduction for a single load test run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AccumulatorState {
    /// Number of request records seen.
    pub request_count: u64,
    /// Sum of check values.
    pub checks_total: u64,
    /// Sum of the load test's own failure flag, the canonical failure count.
    pub failure_count_primary: u64,
    /// Sum of the transport-level failure flag.
    pub failure_count_secondary: u64,
    /// Every request duration, in arrival order.
    pub duration_samples: Vec<f64>,
    /// Every waiting time, in arrival order.
    pub waiting_samples: Vec<f64>,
    /// How many point records were tagged with each status code.
    pub status_histogram: BTreeMap<String, u64>,
    /// Earliest point record seen, in milliseconds since the Unix epoch.
    pub earliest_timestamp: Option<i64>,
    /// Latest point record seen, in milliseconds since the Unix epoch.
    pub latest_timestamp: Option<i64>,
}

impl AccumulatorState {
    pub fn new() -> Self {
        AccumulatorState::default()
    }

    /// Apply all updates triggered by one classified record.
    pub fn apply(&mut self, classified: &Classified) {
        if let Some(timestamp) = classified.timestamp {
            self.update_time_bounds(timestamp);
        }

        if let Some(status) = classified.status {
            *self.status_histogram.entry(status.to_string()).or_insert(0) += 1;
        }

        match (classified.kind, classified.value) {
            (Some(MetricKind::Requests), _) => self.request_count += 1,
            (Some(MetricKind::Checks), Some(value)) => {
                self.checks_total = add_value(self.checks_total, value)
            }
            (Some(MetricKind::Failed), Some(value)) => {
                self.failure_count_primary = add_value(self.failure_count_primary, value)
            }
            (Some(MetricKind::TransportFailed), Some(value)) => {
                self.failure_count_secondary = add_value(self.failure_count_secondary, value)
            }
            (Some(MetricKind::Duration), Some(value)) => self.duration_samples.push(value),
            (Some(MetricKind::Waiting), Some(value)) => self.waiting_samples.push(value),
            // A value-driven metric without a value, or an unrecognized metric.
            _ => (),
        }
    }

    /// Widen the time bounds of the run to include this timestamp.
    pub fn update_time_bounds(&mut self, timestamp: i64) {
        self.earliest_timestamp = Some(update_min_timestamp(self.earliest_timestamp, timestamp));
        self.latest_timestamp = Some(update_max_timestamp(self.latest_timestamp, timestamp));
    }

    /// Milliseconds between the earliest and latest point records, if both are known.
    pub fn elapsed_millis(&self) -> Option<i64> {
        match (self.earliest_timestamp, self.latest_timestamp) {
            (Some(earliest), Some(latest)) => Some(latest - earliest),
            _ => None,
        }
    }

    /// Returns true if no point record has updated this state.
    pub fn is_empty(&self) -> bool {
        *self == AccumulatorState::default()
    }
}

/// Add a value to a counter. Values are rounded to the nearest integer, negative and
/// non-finite values are ignored.
fn add_value(counter: u64, value: f64) -> u64 {
    if !value.is_finite() || value < 0.0 {
        debug!("ignoring counter value {}", value);
        return counter;
    }
    counter.saturating_add(value.round() as u64)
}

fn update_min_timestamp(global_min: Option<i64>, timestamp: i64) -> i64 {
    match global_min {
        Some(min) if min <= timestamp => min,
        _ => timestamp,
    }
}

fn update_max_timestamp(global_max: Option<i64>, timestamp: i64) -> i64 {
    match global_max {
        Some(max) if max >= timestamp => max,
        _ => timestamp,
    }
}
