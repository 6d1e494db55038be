//! Decoding of the line-oriented k6 JSON event log.
//!
//! When k6 runs with `--out json=<file>` it writes one JSON object per line. Two kinds of
//! objects are interleaved: `Metric` declarations, emitted once per metric, and `Point`
//! samples, emitted every time a metric is observed:
//!
//! ```json
//! {"type":"Metric","data":{"name":"http_reqs","type":"counter","contains":"default"},"metric":"http_reqs"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:00.123456+02:00","value":1,"tags":{"status":"200"}},"metric":"http_reqs"}
//! ```
//!
//! Each line is decoded on its own into a [`MeasurementRecord`]. The log may still be
//! written to while it is read, so a torn or otherwise malformed line is expected: the
//! [`Records`] iterator skips it and carries on with the next line.

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// The literal `type` of a point-like record.
pub const POINT_TYPE: &str = "Point";

/// The tag carrying the HTTP status code of a request.
pub const STATUS_TAG: &str = "status";

/// Distinguishes measurement samples from everything else found in the event log.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordType {
    /// A single timestamped measurement, the only kind of record that carries metrics.
    Point,
    /// Any other record, for example a `Metric` declaration.
    Other(String),
}
impl From<String> for RecordType {
    fn from(record_type: String) -> Self {
        if record_type == POINT_TYPE {
            RecordType::Point
        } else {
            RecordType::Other(record_type)
        }
    }
}

/// One observed event, decoded from a single line of the event log.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementRecord {
    /// Whether this is a point-like record.
    pub record_type: RecordType,
    /// The name of the metric, for example `http_req_duration`.
    pub metric: String,
    /// The observed value, if one was included.
    pub value: Option<f64>,
    /// When the value was observed, in milliseconds since the Unix epoch. `None` if the
    /// record had no time or the time could not be parsed.
    pub timestamp: Option<i64>,
    /// Tags attached to the observation.
    pub tags: HashMap<String, String>,
}
impl MeasurementRecord {
    /// Returns true if this record carries a metric sample.
    pub fn is_point(&self) -> bool {
        self.record_type == RecordType::Point
    }

    /// The HTTP status code tagged on this record, if any. Empty values are ignored.
    pub fn status(&self) -> Option<&str> {
        self.tags
            .get(STATUS_TAG)
            .map(String::as_str)
            .filter(|status| !status.is_empty())
    }
}

/// The record exactly as it appears on the wire. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    metric: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default, deserialize_with = "deserialize_value")]
    value: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_time")]
    time: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    tags: HashMap<String, String>,
}

/// k6 always writes tag values as strings, but numbers and booleans are accepted too.
/// Any other shape (null, arrays, objects) is dropped rather than failing the line.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<HashMap<String, Value>>::deserialize(deserializer)?;
    Ok(tags
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name, s)),
            Value::Number(n) => Some((name, n.to_string())),
            Value::Bool(b) => Some((name, b.to_string())),
            _ => None,
        })
        .collect())
}

/// A value that isn't a number is treated as missing, so the rest of the record still
/// counts.
fn deserialize_value<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            trace!("ignoring non-numeric value {}", other);
            None
        }
        None => None,
    })
}

/// A time that isn't a string is treated as missing.
fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(time)) => Some(time),
        Some(other) => {
            trace!("ignoring non-string time {}", other);
            None
        }
        None => None,
    })
}

/// Convert an RFC 3339 timestamp into milliseconds since the Unix epoch.
pub fn parse_timestamp(time: &str) -> Option<i64> {
    match DateTime::parse_from_rfc3339(time) {
        Ok(t) => Some(t.timestamp_millis()),
        Err(e) => {
            trace!("ignoring unparseable time {:?}: {}", time, e);
            None
        }
    }
}

/// Decode a single line of the event log.
pub fn parse_line(line: &str) -> Result<MeasurementRecord, serde_json::Error> {
    let raw: RawRecord = serde_json::from_str(line)?;
    let data = raw.data.unwrap_or_default();

    Ok(MeasurementRecord {
        record_type: raw.record_type.into(),
        metric: raw.metric,
        value: data.value,
        timestamp: data.time.as_deref().and_then(parse_timestamp),
        tags: data.tags,
    })
}

/// Decode a single line of the event log, returning `None` if the line is blank or not a
/// valid record.
pub fn parse_record(line: &str) -> Option<MeasurementRecord> {
    if line.trim().is_empty() {
        return None;
    }
    match parse_line(line) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("skipping line: {}", e);
            None
        }
    }
}

/// A lazy sequence of records decoded from a sequence of lines.
///
/// Lines that fail to decode are skipped. Records are returned in the same order as the
/// lines they were decoded from.
pub struct Records<I> {
    lines: I,
    skipped: usize,
}
impl<I> Records<I> {
    /// How many lines have been skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<I, S> Iterator for Records<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = MeasurementRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match parse_record(line.as_ref()) {
                Some(record) => return Some(record),
                None => self.skipped += 1,
            }
        }
        None
    }
}

/// Decode each line of an event log, skipping any line that is not a valid record.
///
/// # Example
/// ```rust
/// use k6_summary::record::parse_lines;
///
/// let log = "{\"type\":\"Point\",\"metric\":\"http_reqs\",\"data\":{\"value\":1}}\n{\"type\":\"Po";
/// let mut records = parse_lines(log.lines());
/// assert_eq!(records.next().unwrap().metric, "http_reqs");
/// assert!(records.next().is_none());
/// assert_eq!(records.skipped(), 1);
/// ```
pub fn parse_lines<I, S>(lines: I) -> Records<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Records {
        lines: lines.into_iter(),
        skipped: 0,
    }
}
