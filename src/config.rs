//! Functions and structures related to configuring k6-summary.
//!
//! k6-summary is configured at run time by passing in the options and flags defined by
//! the [`SummaryConfiguration`] structure.

use gumdrop::Options;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;

use crate::classify::MetricNames;
use crate::SummaryError;

/// How summaries are printed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SummaryFormat {
    /// One compact JSON object per line (default).
    Json,
    /// Indented JSON.
    Pretty,
    /// Human-readable tables.
    Table,
}
impl Default for SummaryFormat {
    fn default() -> Self {
        SummaryFormat::Json
    }
}
/// Allow `--format` from the command line using text variations on supported
/// `SummaryFormat`s by implementing [`FromStr`].
impl FromStr for SummaryFormat {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let formats = RegexSet::new(&[
            r"(?i)^(json|jsonl)$",
            r"(?i)^(pretty|pretty-json|indent|indented)$",
            r"(?i)^(table|tables|text|txt)$",
        ])
        .expect("failed to compile formats RegexSet");
        let matches = formats.matches(s);
        if matches.matched(0) {
            Ok(SummaryFormat::Json)
        } else if matches.matched(1) {
            Ok(SummaryFormat::Pretty)
        } else if matches.matched(2) {
            Ok(SummaryFormat::Table)
        } else {
            Err(SummaryError::InvalidOption {
                option: "--format".to_string(),
                value: s.to_string(),
                detail: "Invalid format, expected: json, pretty, or table".to_string(),
            })
        }
    }
}

/// Runtime options available when summarizing k6 event logs.
///
/// k6-summary leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive help from
/// the below structure.
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"k6-summary reduces the JSON event log written by `k6 run --out json=FILE` into
a single summary per load test run.

Usage: k6-summary [OPTIONS] FILE..."#
)]
pub struct SummaryConfiguration {
    /// Event logs to summarize
    #[options(free)]
    pub files: Vec<PathBuf>,

    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V")]
    pub version: bool,
    /// Lists recognized metrics and exits
    // Add a blank line after this option
    #[options(no_short, help = "Lists recognized metrics and exits\n")]
    pub list_metrics: bool,

    /// Sets output format (json, pretty, table)
    #[options(short = "f", meta = "FORMAT")]
    pub format: Option<SummaryFormat>,
    /// Sets test id (default: derived from file name)
    #[options(short = "i", meta = "ID")]
    pub test_id: String,
    /// Enables log file and sets name
    #[options(short = "L", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q", help = "Decreases verbosity (-q, -qq, etc)")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        // Add a blank line and then a 'Metrics:' header after this option
        help = "Increases verbosity (-v, -vv, etc)\n\nMetrics:"
    )]
    pub verbose: u8,

    /// Sets request counter metric (default: http_reqs)
    #[options(no_short, meta = "NAME")]
    pub requests_metric: Option<String>,
    /// Sets checks metric (default: checks)
    #[options(no_short, meta = "NAME")]
    pub checks_metric: Option<String>,
    /// Sets failure flag metric (default: custom_http_req_failed)
    #[options(no_short, meta = "NAME")]
    pub failed_metric: Option<String>,
    /// Sets transport failure metric (default: http_req_failed)
    #[options(no_short, meta = "NAME")]
    pub transport_failed_metric: Option<String>,
    /// Sets request duration metric (default: http_req_duration)
    #[options(no_short, meta = "NAME")]
    pub duration_metric: Option<String>,
    /// Sets waiting time metric (default: http_req_waiting)
    #[options(no_short, meta = "NAME")]
    pub waiting_metric: Option<String>,
}

impl SummaryConfiguration {
    /// Metric names to classify records with, defaults overridden by any metric options.
    pub fn metric_names(&self) -> MetricNames {
        let defaults = MetricNames::default();
        let pick = |configured: &Option<String>, default: String| match configured {
            Some(name) => name.clone(),
            None => default,
        };
        MetricNames {
            requests: pick(&self.requests_metric, defaults.requests),
            checks: pick(&self.checks_metric, defaults.checks),
            failed: pick(&self.failed_metric, defaults.failed),
            transport_failed: pick(&self.transport_failed_metric, defaults.transport_failed),
            duration: pick(&self.duration_metric, defaults.duration),
            waiting: pick(&self.waiting_metric, defaults.waiting),
        }
    }

    /// The configured output format, json if not set.
    pub fn output_format(&self) -> SummaryFormat {
        self.format.unwrap_or_default()
    }

    /// Validate the configuration, returning an error on the first invalid option.
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.files.is_empty() && !self.list_metrics {
            return Err(SummaryError::InvalidOption {
                option: "FILE".to_string(),
                value: "".to_string(),
                detail: "At least one event log must be specified.".to_string(),
            });
        }

        if !self.test_id.is_empty() && self.files.len() > 1 {
            return Err(SummaryError::InvalidOption {
                option: "`configuration.test_id`".to_string(),
                value: self.test_id.clone(),
                detail: "`configuration.test_id` can only be set when summarizing a single event log."
                    .to_string(),
            });
        }

        if self.log_level > 0 && self.log_file.is_empty() {
            return Err(SummaryError::InvalidOption {
                option: "`configuration.log_level`".to_string(),
                value: self.log_level.to_string(),
                detail: "`configuration.log_level` can not be set without `configuration.log_file`."
                    .to_string(),
            });
        }

        // Reject duplicate or empty metric names.
        crate::classify::Classifier::new(&self.metric_names())?;

        Ok(())
    }

    /// Initialize the logger which writes to standard error and optionally to a
    /// configurable log file.
    pub fn initialize_logger(&self) -> Result<(), SummaryError> {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                1 => LevelFilter::Warn,
                _ => LevelFilter::Error,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Summaries are written to stdout, so terminal logging goes to stderr.
        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
            debug_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )];

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };
        if let Some(log_to_file) = log_file.as_ref() {
            loggers.push(WriteLogger::new(
                log_level,
                Config::default(),
                File::create(log_to_file)?,
            ));
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }

        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }
        debug!("Output verbosity level: {}", debug_level);
        debug!("Logfile verbosity level: {}", log_level);

        Ok(())
    }
}
