//! # k6-summary
//!
//! k6-summary reduces the event log written by the [k6](https://k6.io/) load generator
//! into a single statistical summary per load test run: throughput, percentile
//! latencies, error rates and the distribution of status codes.
//!
//! k6 writes one JSON object per line when run with `--out json=FILE`. The log is read
//! once, from the first line to the last:
//!
//!  1. each line is decoded into a [`MeasurementRecord`](./record/struct.MeasurementRecord.html),
//!     skipping any line that isn't a valid record (the log may still be being written);
//!  2. each point-like record is classified by its metric name;
//!  3. the classified record updates an
//!     [`AccumulatorState`](./accumulator/struct.AccumulatorState.html) owned by the run;
//!  4. when the log ends, the state is reduced into a
//!     [`SummaryResult`](./summary/struct.SummaryResult.html).
//!
//! Reducing never fails. A log that is empty, truncated or full of garbage produces a
//! complete summary in which the affected statistics are 0.
//!
//! ## Summarizing an event log
//!
//! ```rust
//! use k6_summary::prelude::*;
//!
//! let log = r#"{"type":"Metric","data":{"name":"http_reqs","type":"counter"},"metric":"http_reqs"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:00Z","value":1,"tags":{"status":"200"}},"metric":"http_reqs"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:00Z","value":84.1,"tags":{"status":"200"}},"metric":"http_req_duration"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:02Z","value":1,"tags":{"status":"500"}},"metric":"http_reqs"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:02Z","value":12.9,"tags":{"status":"500"}},"metric":"http_req_duration"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:02Z","value":1,"tags":{"status":"500"}},"metric":"custom_http_req_failed"}
//! {"type":"Point","data":{"time":"2024-05-01T10:00:0"#;
//!
//! let summary = k6_summary::summarize_str(log);
//! assert_eq!(summary.total_requests, 2);
//! assert_eq!(summary.failed_count, 1);
//! assert_eq!(summary.total_requests_rate.to_string(), "1.00");
//! assert_eq!(summary.max_duration.to_string(), "84.10");
//! assert_eq!(summary.status_codes["500"], 3);
//! ```
//!
//! To keep the run's identity, or to read a file, use a [`SummaryRun`] or one of
//! [`summarize_reader`] and [`summarize_file`]. Each returns a
//! [`RunSummary`](./summary/struct.RunSummary.html) that serializes to the same JSON
//! layout as previously persisted summaries.
//!
//! ## Known defects
//!
//! The `errorRate` and `successRate` of a summary are calculated as
//! `ceil(part / total) * 100`, so a single failed request out of a hundred is reported
//! as an error rate of 100. This is reproduced on purpose so new summaries can be
//! compared against persisted ones, see
//! [`ceiling_rate_percent`](./summary/fn.ceiling_rate_percent.html).
//!
//! ## License
//!
//! Copyright 2020-21 Jeremy Andrews
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod accumulator;
pub mod classify;
pub mod config;
pub mod prelude;
pub mod record;
mod report;
pub mod summary;
pub mod util;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::{fmt, str};
use tokio::io::AsyncBufReadExt;

use crate::accumulator::AccumulatorState;
use crate::classify::{Classifier, MetricNames};
use crate::record::{parse_lines, parse_record, MeasurementRecord};
use crate::summary::{reduce, RunSummary, SummaryResult};

/// Read buffer used when streaming event logs from disk.
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// An enumeration of all errors k6-summary can return.
///
/// Reducing an event log never fails: these errors come from reading files, writing
/// output and validating configuration.
#[derive(Debug)]
pub enum SummaryError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Json(serde_json::Error),
    /// Wraps a ['tokio::task::JoinError'](https://tokio-rs.github.io/tokio/doc/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl SummaryError {
    fn describe(&self) -> &str {
        match *self {
            SummaryError::Io(_) => "io::Error",
            SummaryError::Json(_) => "serde_json::Error",
            SummaryError::TokioJoin(_) => "tokio::task::JoinError",
            SummaryError::InvalidOption { .. } => "invalid option or value specified",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for SummaryError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SummaryError::Io(ref source) => {
                write!(f, "SummaryError: {} ({})", self.describe(), source)
            }
            SummaryError::Json(ref source) => {
                write!(f, "SummaryError: {} ({})", self.describe(), source)
            }
            SummaryError::TokioJoin(ref source) => {
                write!(f, "SummaryError: {} ({})", self.describe(), source)
            }
            SummaryError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "SummaryError: {} ({} = {:?}): {}",
                self.describe(),
                option,
                value,
                detail
            ),
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for SummaryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            SummaryError::Io(ref source) => Some(source),
            SummaryError::Json(ref source) => Some(source),
            SummaryError::TokioJoin(ref source) => Some(source),
            _ => None,
        }
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for SummaryError {
    fn from(err: io::Error) -> SummaryError {
        SummaryError::Io(err)
    }
}

/// Auto-convert JSON errors.
impl From<serde_json::Error> for SummaryError {
    fn from(err: serde_json::Error) -> SummaryError {
        SummaryError::Json(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for SummaryError {
    fn from(err: tokio::task::JoinError) -> SummaryError {
        SummaryError::TokioJoin(err)
    }
}

/// Reduces the event log of a single load test run.
///
/// Each run owns its own [`AccumulatorState`], so any number of runs can be reduced at
/// the same time without sharing anything. Records must be ingested in the order they
/// appear in the event log. [`SummaryRun::finish`] consumes the run and produces its
/// summary exactly once.
///
/// # Example
/// ```rust
/// use k6_summary::SummaryRun;
///
/// let mut run = SummaryRun::new("1712345678901");
/// run.ingest_line(r#"{"type":"Point","metric":"http_reqs","data":{"value":1}}"#);
/// run.ingest_line(r#"{"type":"Point","metric":"http_req_duration","data":{"val"#);
/// assert_eq!(run.skipped(), 1);
///
/// let run_summary = run.finish();
/// assert_eq!(run_summary.test_id, "1712345678901");
/// assert_eq!(run_summary.summary.total_requests, 1);
/// ```
#[derive(Clone, Debug)]
pub struct SummaryRun {
    test_id: String,
    classifier: Classifier,
    state: AccumulatorState,
    records: usize,
    skipped: usize,
}
impl SummaryRun {
    /// Start reducing a run, recognizing the default k6 metric names.
    pub fn new(test_id: &str) -> Self {
        SummaryRun {
            test_id: test_id.to_string(),
            classifier: Classifier::default(),
            state: AccumulatorState::new(),
            records: 0,
            skipped: 0,
        }
    }

    /// Start reducing a run, recognizing custom metric names.
    pub fn with_metric_names(test_id: &str, names: &MetricNames) -> Result<Self, SummaryError> {
        Ok(SummaryRun {
            classifier: Classifier::new(names)?,
            ..SummaryRun::new(test_id)
        })
    }

    /// The test id this run was started with.
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// The running state, for inspecting a run that hasn't finished yet.
    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// How many valid records have been ingested.
    pub fn records(&self) -> usize {
        self.records
    }

    /// How many lines were skipped because they weren't valid records.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Accumulate one decoded record. Records that aren't point-like are counted, but
    /// don't change the state.
    pub fn ingest(&mut self, record: &MeasurementRecord) {
        self.records += 1;
        if let Some(classified) = self.classifier.classify(record) {
            self.state.apply(&classified);
        }
    }

    /// Decode and accumulate one line of the event log. Invalid lines are skipped.
    pub fn ingest_line(&mut self, line: &str) {
        match parse_record(line) {
            Some(record) => self.ingest(&record),
            None => self.skipped += 1,
        }
    }

    /// Decode and accumulate one raw line. A line that isn't valid UTF-8, for example
    /// because a multi-byte character was torn in half, is skipped.
    pub fn ingest_bytes(&mut self, line: &[u8]) {
        match str::from_utf8(line) {
            Ok(line) => self.ingest_line(line),
            Err(e) => {
                self.skipped += 1;
                debug!("{}: skipping line: {}", self.test_id, e);
            }
        }
    }

    /// Decode and accumulate a sequence of lines, in order.
    pub fn ingest_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = parse_lines(lines);
        for record in records.by_ref() {
            self.ingest(&record);
        }
        self.skipped += records.skipped();
    }

    /// Finish the run, reducing its state into a summary.
    pub fn finish(self) -> RunSummary {
        if log_enabled!(log::Level::Trace) {
            match serde_json::to_string(&self.state) {
                Ok(state) => trace!("{}: final state: {}", self.test_id, state),
                Err(e) => trace!("{}: failed to encode final state: {}", self.test_id, e),
            }
        }
        info!(
            "{}: summarizing {} records ({} lines skipped)",
            self.test_id, self.records, self.skipped
        );
        RunSummary::new(&self.test_id, reduce(&self.state))
    }
}

/// Summarize a sequence of event log lines, using the default k6 metric names.
pub fn summarize_lines<I, S>(lines: I) -> SummaryResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut run = SummaryRun::new("");
    run.ingest_lines(lines);
    reduce(run.state())
}

/// Summarize an entire event log held in memory, using the default k6 metric names.
pub fn summarize_str(log: &str) -> SummaryResult {
    summarize_lines(log.lines())
}

/// Summarize an event log from any buffered reader.
///
/// Only failing to read from `reader` is an error, invalid lines are skipped.
pub fn summarize_reader<R: BufRead>(
    test_id: &str,
    mut reader: R,
    names: &MetricNames,
) -> Result<RunSummary, SummaryError> {
    let mut run = SummaryRun::with_metric_names(test_id, names)?;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        run.ingest_bytes(&line);
    }
    Ok(run.finish())
}

/// Summarize an event log file, streaming it line by line.
///
/// The test id defaults to one derived from the file name, see
/// [`util::test_id_from_path`](./util/fn.test_id_from_path.html).
///
/// # Example
/// ```rust,no_run
/// use k6_summary::classify::MetricNames;
///
/// #[tokio::main]
/// async fn main() -> Result<(), k6_summary::SummaryError> {
///     let run_summary =
///         k6_summary::summarize_file("results/result-1712345678901.json", None, &MetricNames::default())
///             .await?;
///     println!("{}", run_summary);
///
///     Ok(())
/// }
/// ```
pub async fn summarize_file<P: AsRef<Path>>(
    path: P,
    test_id: Option<&str>,
    names: &MetricNames,
) -> Result<RunSummary, SummaryError> {
    let path = path.as_ref();
    let test_id = match test_id {
        Some(test_id) => test_id.to_string(),
        None => util::test_id_from_path(path),
    };
    let mut run = SummaryRun::with_metric_names(&test_id, names)?;

    info!("{}: reading {}", test_id, path.display());
    let file = tokio::fs::File::open(path).await?;
    let mut reader = tokio::io::BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        run.ingest_bytes(&line);
    }

    Ok(run.finish())
}

/// Summarize several event log files at the same time, one task per file.
///
/// Each file is reduced independently, so a file that can't be read doesn't affect the
/// others. Results are returned in the same order as `paths`.
pub async fn summarize_files(
    paths: &[PathBuf],
    test_id: Option<&str>,
    names: &MetricNames,
) -> Vec<Result<RunSummary, SummaryError>> {
    let runs: Vec<_> = paths
        .iter()
        .map(|path| {
            let path = path.clone();
            let test_id = test_id.map(str::to_string);
            let names = names.clone();
            tokio::spawn(async move { summarize_file(&path, test_id.as_deref(), &names).await })
        })
        .collect();

    futures::future::join_all(runs)
        .await
        .into_iter()
        .map(|joined| joined.map_err(SummaryError::from).and_then(|result| result))
        .collect()
}
