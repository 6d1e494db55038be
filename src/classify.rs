//! Routing of decoded records to the accumulator fields they update.
//!
//! Only point-like records carry metrics. A point-like record always updates the run's
//! time bounds and, when tagged with a status code, the status code histogram. If its
//! metric name is one of the recognized [`MetricKind`]s it additionally updates the
//! matching counter or sample list. Unrecognized metric names are not an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::record::MeasurementRecord;
use crate::SummaryError;

/// Every metric the accumulator knows how to reduce.
///
/// Kinds are listed in the order they are displayed by `--list-metrics`.
#[derive(Clone, Copy, Debug, EnumIter, Eq, Hash, PartialEq)]
pub enum MetricKind {
    /// One record per request sent, increments the request count by one.
    Requests,
    /// Check results, the value is added to the checks total.
    Checks,
    /// The load test's own failure flag, the canonical failure count.
    Failed,
    /// Transport-level failure flag, tracked separately from [`MetricKind::Failed`].
    TransportFailed,
    /// Total request duration samples, in milliseconds.
    Duration,
    /// Time spent waiting for the first byte of the response, in milliseconds.
    Waiting,
}
impl MetricKind {
    /// A short description of what this kind of metric contributes to a summary.
    pub fn describe(&self) -> &'static str {
        match self {
            MetricKind::Requests => "counts requests",
            MetricKind::Checks => "sums passed checks",
            MetricKind::Failed => "sums failed requests (reported failure count)",
            MetricKind::TransportFailed => "sums transport-level failed requests",
            MetricKind::Duration => "collects request durations",
            MetricKind::Waiting => "collects waiting times (TTFB)",
        }
    }
}
impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MetricKind::Requests => "requests",
            MetricKind::Checks => "checks",
            MetricKind::Failed => "failed",
            MetricKind::TransportFailed => "transport-failed",
            MetricKind::Duration => "duration",
            MetricKind::Waiting => "waiting",
        };
        write!(f, "{}", name)
    }
}

/// The metric names emitted by the load generator for each [`MetricKind`].
///
/// Defaults to the names k6 uses, including the `custom_http_req_failed` rate that the
/// generated k6 scripts define.
///
/// Names missing when deserializing fall back to their defaults.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MetricNames {
    pub requests: String,
    pub checks: String,
    pub failed: String,
    pub transport_failed: String,
    pub duration: String,
    pub waiting: String,
}
impl Default for MetricNames {
    fn default() -> Self {
        MetricNames {
            requests: "http_reqs".to_string(),
            checks: "checks".to_string(),
            failed: "custom_http_req_failed".to_string(),
            transport_failed: "http_req_failed".to_string(),
            duration: "http_req_duration".to_string(),
            waiting: "http_req_waiting".to_string(),
        }
    }
}
impl MetricNames {
    /// The configured metric name for a kind of metric.
    pub fn name(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::Requests => &self.requests,
            MetricKind::Checks => &self.checks,
            MetricKind::Failed => &self.failed,
            MetricKind::TransportFailed => &self.transport_failed,
            MetricKind::Duration => &self.duration,
            MetricKind::Waiting => &self.waiting,
        }
    }
}

/// The accumulator updates that apply to a single point-like record.
#[derive(Clone, Debug, PartialEq)]
pub struct Classified<'r> {
    /// The recognized metric, `None` if the metric name isn't known.
    pub kind: Option<MetricKind>,
    /// The record's value, if any.
    pub value: Option<f64>,
    /// Updates the run's time bounds, if set.
    pub timestamp: Option<i64>,
    /// Increments this entry in the status code histogram, if set.
    pub status: Option<&'r str>,
}

/// Maps metric names to [`MetricKind`]s.
#[derive(Clone, Debug)]
pub struct Classifier {
    kinds: HashMap<String, MetricKind>,
}
impl Default for Classifier {
    fn default() -> Self {
        let names = MetricNames::default();
        Classifier {
            kinds: MetricKind::iter()
                .map(|kind| (names.name(kind).to_string(), kind))
                .collect(),
        }
    }
}
impl Classifier {
    /// Build a classifier from configured metric names. Each kind must be given a
    /// distinct, non-empty name.
    pub fn new(names: &MetricNames) -> Result<Self, SummaryError> {
        let mut kinds: HashMap<String, MetricKind> = HashMap::new();
        for kind in MetricKind::iter() {
            let name = names.name(kind);
            if name.is_empty() {
                return Err(SummaryError::InvalidOption {
                    option: format!("--{}-metric", kind),
                    value: name.to_string(),
                    detail: "metric names can not be empty.".to_string(),
                });
            }
            if let Some(existing) = kinds.insert(name.to_string(), kind) {
                return Err(SummaryError::InvalidOption {
                    option: format!("--{}-metric", kind),
                    value: name.to_string(),
                    detail: format!("metric name is already used for {} metrics.", existing),
                });
            }
        }
        Ok(Classifier { kinds })
    }

    /// Look up the kind of metric a name refers to.
    pub fn kind(&self, metric: &str) -> Option<MetricKind> {
        self.kinds.get(metric).copied()
    }

    /// Determine which updates a record triggers. Returns `None` for records that are not
    /// point-like, as those never update the accumulator.
    pub fn classify<'r>(&self, record: &'r MeasurementRecord) -> Option<Classified<'r>> {
        if !record.is_point() {
            return None;
        }

        let kind = self.kind(&record.metric);
        if kind.is_none() {
            trace!("unrecognized metric: {}", record.metric);
        }

        Some(Classified {
            kind,
            value: record.value,
            timestamp: record.timestamp,
            status: record.status(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::parse_line;

    #[test]
    fn default_names() {
        let classifier = Classifier::default();
        assert_eq!(classifier.kind("http_reqs"), Some(MetricKind::Requests));
        assert_eq!(classifier.kind("checks"), Some(MetricKind::Checks));
        assert_eq!(
            classifier.kind("custom_http_req_failed"),
            Some(MetricKind::Failed)
        );
        assert_eq!(
            classifier.kind("http_req_failed"),
            Some(MetricKind::TransportFailed)
        );
        assert_eq!(
            classifier.kind("http_req_duration"),
            Some(MetricKind::Duration)
        );
        assert_eq!(classifier.kind("http_req_waiting"), Some(MetricKind::Waiting));
        assert_eq!(classifier.kind("http_req_blocked"), None);

        // The default classifier matches one built from the default names.
        let built = Classifier::new(&MetricNames::default()).unwrap();
        for kind in MetricKind::iter() {
            let name = MetricNames::default().name(kind).to_string();
            assert_eq!(built.kind(&name), classifier.kind(&name));
        }
    }

    #[test]
    fn custom_names() {
        let names = MetricNames {
            duration: "request_duration".to_string(),
            ..Default::default()
        };
        let classifier = Classifier::new(&names).unwrap();
        assert_eq!(
            classifier.kind("request_duration"),
            Some(MetricKind::Duration)
        );
        assert_eq!(classifier.kind("http_req_duration"), None);
    }

    #[test]
    fn names_from_json() {
        let names: MetricNames =
            serde_json::from_str(r#"{"duration":"request_duration","waiting":"ttfb"}"#).unwrap();
        assert_eq!(names.duration, "request_duration");
        assert_eq!(names.waiting, "ttfb");
        assert_eq!(names.requests, "http_reqs");
        assert_eq!(names.failed, "custom_http_req_failed");

        let json = serde_json::to_string(&names).unwrap();
        assert!(json.contains(r#""transport_failed":"http_req_failed""#));
        assert_eq!(serde_json::from_str::<MetricNames>(&json).unwrap(), names);
    }

    #[test]
    fn invalid_names() {
        let names = MetricNames {
            failed: "http_req_failed".to_string(),
            ..Default::default()
        };
        match Classifier::new(&names) {
            Err(SummaryError::InvalidOption { option, value, .. }) => {
                assert_eq!(option, "--transport-failed-metric");
                assert_eq!(value, "http_req_failed");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let names = MetricNames {
            checks: "".to_string(),
            ..Default::default()
        };
        assert!(Classifier::new(&names).is_err());
    }

    #[test]
    fn classify_point() {
        let classifier = Classifier::default();
        let record = parse_line(
            r#"{"type":"Point","metric":"http_req_duration","data":{"time":"1970-01-01T00:00:01Z","value":12.5,"tags":{"status":"404"}}}"#,
        )
        .unwrap();
        let classified = classifier.classify(&record).unwrap();
        assert_eq!(classified.kind, Some(MetricKind::Duration));
        assert_eq!(classified.value, Some(12.5));
        assert_eq!(classified.timestamp, Some(1_000));
        assert_eq!(classified.status, Some("404"));
    }

    #[test]
    fn classify_other() {
        let classifier = Classifier::default();

        // Metric declarations never update the accumulator.
        let record =
            parse_line(r#"{"type":"Metric","metric":"http_reqs","data":{"type":"counter"}}"#)
                .unwrap();
        assert!(classifier.classify(&record).is_none());

        // Unrecognized points still carry a timestamp and status.
        let record = parse_line(
            r#"{"type":"Point","metric":"data_received","data":{"time":"1970-01-01T00:00:02Z","value":512,"tags":{"status":"200"}}}"#,
        )
        .unwrap();
        let classified = classifier.classify(&record).unwrap();
        assert_eq!(classified.kind, None);
        assert_eq!(classified.timestamp, Some(2_000));
        assert_eq!(classified.status, Some("200"));
    }
}
