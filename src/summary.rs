//! Reduction of accumulated load test state into a final summary.
//!
//! [`reduce`] is a pure function: it reads an [`AccumulatorState`] and returns a new
//! [`SummaryResult`], so reducing the same state twice always yields the same summary.
//!
//! Two behaviors are kept exactly as they appear in previously persisted summaries so
//! new summaries can be compared against them:
//!  - percentiles are the sample at index `floor(len * p)` of the sorted durations, with
//!    no interpolation between ranks (see [`percentile`]);
//!  - error and success rates are `ceil(part / total) * 100`, so any failure at all is
//!    reported as an error rate of 100. This is a known defect, isolated in
//!    [`ceiling_rate_percent`] so a corrected formula can be swapped in later.

mod fixed;

pub use fixed::{FixedFloat, FIXED_DIGITS};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;

use crate::accumulator::AccumulatorState;

/// The percentiles included in every summary.
pub const PERCENTILES: [f64; 3] = [0.50, 0.95, 0.99];

/// Statistical summary of a single load test run.
///
/// Field names are camelCase when serialized, matching previously persisted summaries.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    /// Total number of requests.
    pub total_requests: u64,
    /// Requests per second over the time spanned by the event log.
    pub total_requests_rate: FixedFloat,
    /// Number of failed requests, as reported by the load test's own failure flag.
    pub failed_count: u64,
    /// Requests minus failures, may be negative if more failures than requests were seen.
    pub success_count: i64,
    /// Failed requests as a ceiling percentage, always 0 or a multiple of 100.
    pub error_rate: u64,
    /// Successful requests as a ceiling percentage, always 0 or a multiple of 100.
    pub success_rate: u64,
    /// How many times each status code was seen.
    pub status_codes: BTreeMap<String, u64>,
    /// Average request duration.
    pub avg_duration: FixedFloat,
    /// Average time waiting for the first byte.
    pub avg_waiting: FixedFloat,
    /// Fastest request.
    pub min_duration: FixedFloat,
    /// Slowest request.
    pub max_duration: FixedFloat,
    pub p50: FixedFloat,
    pub p95: FixedFloat,
    pub p99: FixedFloat,
    /// Number of failed requests, as reported by the transport-level failure flag.
    #[serde(default)]
    pub transport_failed_count: u64,
    /// Total passed checks.
    #[serde(default)]
    pub checks: u64,
}
impl SummaryResult {
    /// Time to first byte, the same value as [`SummaryResult::avg_waiting`].
    pub fn ttfb(&self) -> FixedFloat {
        self.avg_waiting
    }
}

/// A summary together with the identity of the load test run it describes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Identifies the load test run.
    pub test_id: String,
    /// When the summary was produced (RFC 3339, UTC).
    pub timestamp: String,
    #[serde(flatten)]
    pub summary: SummaryResult,
}
impl RunSummary {
    /// Wrap a summary, timestamped with the current time.
    pub fn new(test_id: &str, summary: SummaryResult) -> Self {
        RunSummary {
            test_id: test_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            summary,
        }
    }
}

/// Reduce accumulated state into a summary.
///
/// Never fails: empty or partial state degrades the affected statistics to 0.
///
/// # Example
/// ```rust
/// use k6_summary::accumulator::AccumulatorState;
/// use k6_summary::summary::reduce;
///
/// let mut state = AccumulatorState::new();
/// state.request_count = 5;
/// state.duration_samples = vec![10.0, 20.0, 30.0, 40.0, 50.0];
///
/// let summary = reduce(&state);
/// assert_eq!(summary.total_requests, 5);
/// assert_eq!(summary.p50.to_string(), "30.00");
/// assert_eq!(summary.error_rate, 0);
/// ```
pub fn reduce(state: &AccumulatorState) -> SummaryResult {
    let total_requests = state.request_count;
    let failed_count = state.failure_count_primary;
    let success_count = clamp_i64(total_requests).saturating_sub(clamp_i64(failed_count));

    // The average is calculated over samples in arrival order, before sorting.
    let avg_duration = mean(&state.duration_samples);
    let avg_waiting = mean(&state.waiting_samples);

    let mut sorted_durations = state.duration_samples.clone();
    sorted_durations.sort_by(|a, b| a.total_cmp(b));

    let summary = SummaryResult {
        total_requests,
        total_requests_rate: requests_per_second(state).into(),
        failed_count,
        success_count,
        error_rate: error_rate_percent(failed_count, total_requests),
        success_rate: success_rate_percent(success_count, total_requests),
        status_codes: state.status_histogram.clone(),
        avg_duration: avg_duration.into(),
        avg_waiting: avg_waiting.into(),
        min_duration: sorted_durations.first().copied().unwrap_or(0.0).into(),
        max_duration: sorted_durations.last().copied().unwrap_or(0.0).into(),
        p50: percentile(&sorted_durations, PERCENTILES[0]).into(),
        p95: percentile(&sorted_durations, PERCENTILES[1]).into(),
        p99: percentile(&sorted_durations, PERCENTILES[2]).into(),
        transport_failed_count: state.failure_count_secondary,
        checks: state.checks_total,
    };
    debug!(
        "reduced {} requests and {} duration samples",
        summary.total_requests,
        sorted_durations.len()
    );
    summary
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Requests per second over the time between the earliest and latest point records.
///
/// Returns 0 if there were no requests, if either time bound is missing, or if all
/// records share the same timestamp.
pub fn requests_per_second(state: &AccumulatorState) -> f64 {
    if state.request_count == 0 {
        return 0.0;
    }
    match state.elapsed_millis() {
        Some(elapsed) if elapsed > 0 => {
            let duration_seconds = elapsed as f64 / 1000.0;
            state.request_count as f64 / duration_seconds
        }
        _ => 0.0,
    }
}

/// The rate formula behind [`SummaryResult::error_rate`] and
/// [`SummaryResult::success_rate`]: `ceil(part / total) * 100`.
///
/// Any non-zero part smaller than the total rounds up to 100. Returns 0 when `total` is 0.
pub fn ceiling_rate_percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    // Integer ceiling division, equivalent to ceil(part / total) for all inputs.
    let ceiling = part / total + u64::from(part % total != 0);
    ceiling.saturating_mul(100)
}

/// Error rate reported in a summary.
pub fn error_rate_percent(failed_count: u64, total_requests: u64) -> u64 {
    ceiling_rate_percent(failed_count, total_requests)
}

/// Success rate reported in a summary, 0 when there were no successful requests.
pub fn success_rate_percent(success_count: i64, total_requests: u64) -> u64 {
    if success_count <= 0 {
        return 0;
    }
    ceiling_rate_percent(success_count as u64, total_requests)
}

/// Arithmetic mean of the samples, 0 if there are none.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Rank-based percentile of a sorted slice: the sample at index `floor(len * percent)`.
///
/// Returns 0 if the slice is empty. An index past the end, only possible for
/// `percent >= 1.0`, returns the largest sample.
pub fn percentile(sorted: &[f64], percent: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (sorted.len() as f64 * percent).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[cfg(test)]
mod test {
    use super::*;

    fn durations(samples: &[f64]) -> AccumulatorState {
        AccumulatorState {
            request_count: samples.len() as u64,
            duration_samples: samples.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_state() {
        let summary = reduce(&AccumulatorState::new());
        assert_eq!(summary, SummaryResult::default());
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.error_rate, 0);
        assert_eq!(summary.success_rate, 0);
        assert_eq!(*summary.total_requests_rate, 0.0);
        assert_eq!(*summary.p99, 0.0);
        assert!(summary.status_codes.is_empty());
    }

    #[test]
    fn duration_statistics() {
        // Arrival order doesn't matter.
        let summary = reduce(&durations(&[40.0, 10.0, 50.0, 30.0, 20.0]));
        assert_eq!(summary.min_duration.to_string(), "10.00");
        assert_eq!(summary.max_duration.to_string(), "50.00");
        assert_eq!(summary.avg_duration.to_string(), "30.00");
        // floor(5 * 0.5) = 2
        assert_eq!(summary.p50.to_string(), "30.00");
        // floor(5 * 0.95) = 4
        assert_eq!(summary.p95.to_string(), "50.00");
        assert_eq!(summary.p99.to_string(), "50.00");
    }

    #[test]
    fn percentiles() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 0.50), 51.0);
        assert_eq!(percentile(&sorted, 0.95), 96.0);
        assert_eq!(percentile(&sorted, 0.99), 100.0);
        assert_eq!(percentile(&sorted, 1.0), 100.0);
        assert_eq!(percentile(&[7.0], 0.99), 7.0);
        assert_eq!(percentile(&[1.0, 2.0], 0.5), 2.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn percentile_order() {
        let samples = [
            12.2, 3.4, 99.9, 45.0, 45.0, 0.5, 18.75, 230.1, 7.0, 61.3, 61.2, 5.5, 14.0,
        ];
        for len in 1..=samples.len() {
            let summary = reduce(&durations(&samples[..len]));
            assert!(*summary.min_duration <= *summary.p50);
            assert!(*summary.p50 <= *summary.p95);
            assert!(*summary.p95 <= *summary.p99);
            assert!(*summary.p99 <= *summary.max_duration);
        }
    }

    #[test]
    fn waiting_time() {
        let state = AccumulatorState {
            waiting_samples: vec![1.0, 2.0, 4.5],
            ..Default::default()
        };
        let summary = reduce(&state);
        assert_eq!(summary.avg_waiting.to_string(), "2.50");
        assert_eq!(summary.ttfb(), summary.avg_waiting);
        // Waiting times don't contribute to durations.
        assert_eq!(*summary.max_duration, 0.0);
    }

    #[test]
    fn ceiling_rates() {
        assert_eq!(ceiling_rate_percent(0, 100), 0);
        assert_eq!(ceiling_rate_percent(1, 100), 100);
        assert_eq!(ceiling_rate_percent(99, 100), 100);
        assert_eq!(ceiling_rate_percent(100, 100), 100);
        assert_eq!(ceiling_rate_percent(101, 100), 200);
        assert_eq!(ceiling_rate_percent(1, 0), 0);

        assert_eq!(error_rate_percent(1, 100), 100);
        assert_eq!(success_rate_percent(99, 100), 100);
        assert_eq!(success_rate_percent(0, 100), 0);
        assert_eq!(success_rate_percent(-1, 100), 0);
    }

    #[test]
    fn single_failure_is_reported_as_total_failure() {
        let state = AccumulatorState {
            request_count: 100,
            failure_count_primary: 1,
            ..Default::default()
        };
        let summary = reduce(&state);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.success_count, 99);
        assert_eq!(summary.error_rate, 100);
        assert_eq!(summary.success_rate, 100);
    }

    #[test]
    fn failure_counters_are_independent() {
        let state = AccumulatorState {
            request_count: 10,
            failure_count_primary: 0,
            failure_count_secondary: 4,
            checks_total: 20,
            ..Default::default()
        };
        let summary = reduce(&state);
        assert_eq!(summary.failed_count, 0);
        assert_eq!(summary.error_rate, 0);
        assert_eq!(summary.transport_failed_count, 4);
        assert_eq!(summary.checks, 20);

        // More failures than requests.
        let state = AccumulatorState {
            request_count: 2,
            failure_count_primary: 3,
            ..Default::default()
        };
        let summary = reduce(&state);
        assert_eq!(summary.success_count, -1);
        assert_eq!(summary.success_rate, 0);
        assert_eq!(summary.error_rate, 200);
    }

    #[test]
    fn request_rate() {
        let mut state = AccumulatorState {
            request_count: 30,
            ..Default::default()
        };
        // No time bounds.
        assert_eq!(requests_per_second(&state), 0.0);

        state.update_time_bounds(1_000);
        // All records at the same instant.
        assert_eq!(requests_per_second(&state), 0.0);

        state.update_time_bounds(11_000);
        assert_eq!(requests_per_second(&state), 3.0);
        assert_eq!(reduce(&state).total_requests_rate.to_string(), "3.00");

        // No requests, so no rate regardless of time bounds.
        state.request_count = 0;
        assert_eq!(requests_per_second(&state), 0.0);
    }

    #[test]
    fn reduce_is_pure() {
        let mut state = durations(&[3.0, 1.0, 2.0]);
        state.failure_count_primary = 1;
        state.status_histogram.insert("200".to_string(), 3);
        state.update_time_bounds(0);
        state.update_time_bounds(1_500);
        let before = state.clone();

        let first = reduce(&state);
        let second = reduce(&state);
        assert_eq!(first, second);
        assert_eq!(state, before);
        // Samples are not sorted in place.
        assert_eq!(state.duration_samples, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn encode_summary() {
        let mut state = durations(&[10.0, 20.0]);
        state.status_histogram.insert("200".to_string(), 2);
        let run = RunSummary::new("1700000000000", reduce(&state));
        let value = serde_json::to_value(&run).unwrap();

        assert_eq!(value["testId"], "1700000000000");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["totalRequests"], 2);
        assert_eq!(value["totalRequestsRate"], "0.00");
        assert_eq!(value["errorRate"], 0);
        assert_eq!(value["successRate"], 100);
        assert_eq!(value["statusCodes"]["200"], 2);
        assert_eq!(value["avgDuration"], "15.00");
        assert_eq!(value["p50"], "20.00");
        assert_eq!(value["transportFailedCount"], 0);

        // And back again.
        let decoded: RunSummary = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, run);
    }

    #[test]
    fn decode_persisted_summary() {
        // A summary written before transport failures and checks were included, with
        // bare zeros for empty duration statistics.
        let persisted = r#"{
            "testId": "1712345678901",
            "timestamp": "2024-04-05T19:34:38.901Z",
            "totalRequests": 0,
            "totalRequestsRate": "0.00",
            "failedCount": 0,
            "successCount": 0,
            "errorRate": 0,
            "successRate": 0,
            "statusCodes": {},
            "avgDuration": "0.00",
            "avgWaiting": "0.00",
            "minDuration": 0,
            "maxDuration": 0,
            "p50": 0,
            "p95": 0,
            "p99": 0
        }"#;
        let run: RunSummary = serde_json::from_str(persisted).unwrap();
        assert_eq!(run.test_id, "1712345678901");
        assert_eq!(run.summary, SummaryResult::default());
    }
}
