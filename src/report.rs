//! Human-readable tables for summaries.
//!
//! When a [`RunSummary`] is viewed with [`std::fmt::Display`] it is rendered as a set of
//! tables, for example:
//!
//! ```text
//!  === SUMMARY: 1712345678901 ===
//!  ------------------------------------------------------------------------------
//!  # reqs        | # fails       | # transport   | req/s     | error % | success %
//!  ------------------------------------------------------------------------------
//!  4,352         | 12            | 3             | 145.07    | 100     | 100
//!  ------------------------------------------------------------------------------
//!  Avg (ms)  | Min       | Max       | 50%       | 95%       | 99%       | TTFB
//!  ------------------------------------------------------------------------------
//!  19.66     | 8.00      | 156.00    | 18.00     | 29.00     | 84.00     | 17.20
//!  ------------------------------------------------------------------------------
//!  Status code                                              | # reqs
//!  ------------------------------------------------------------------------------
//!  200 OK                                                   | 4,340
//!  500 Internal Server Error                                | 12
//!  ------------------------------------------------------------------------------
//! ```

use http::StatusCode;
use itertools::Itertools;
use std::fmt;

use crate::config::SummaryFormat;
use crate::summary::{RunSummary, SummaryResult};
use crate::{util, SummaryError};

const SEPARATOR: &str =
    " ------------------------------------------------------------------------------";

/// Describe a status code, including its canonical reason if it is a known HTTP status.
fn describe_status_code(status_code: &str) -> String {
    match status_code.parse::<StatusCode>() {
        Ok(code) => match code.canonical_reason() {
            Some(reason) => format!("{} {}", code.as_u16(), reason),
            None => code.as_u16().to_string(),
        },
        Err(_) => status_code.to_string(),
    }
}

impl SummaryResult {
    /// Prepares a table of request counts and rates.
    pub(crate) fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "{}", SEPARATOR)?;
        writeln!(
            fmt,
            " {:<13} | {:<13} | {:<13} | {:<9} | {:<7} | {}",
            "# reqs", "# fails", "# transport", "req/s", "error %", "success %"
        )?;
        writeln!(fmt, "{}", SEPARATOR)?;
        writeln!(
            fmt,
            " {:<13} | {:<13} | {:<13} | {:<9} | {:<7} | {}",
            util::format_number(self.total_requests),
            util::format_number(self.failed_count),
            util::format_number(self.transport_failed_count),
            self.total_requests_rate,
            self.error_rate,
            self.success_rate,
        )?;
        if self.checks > 0 {
            writeln!(fmt, " Checks passed: {}", util::format_number(self.checks))?;
        }

        Ok(())
    }

    /// Prepares a table of request durations.
    pub(crate) fn fmt_durations(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "{}", SEPARATOR)?;
        writeln!(
            fmt,
            " {:<9} | {:<9} | {:<9} | {:<9} | {:<9} | {:<9} | {}",
            "Avg (ms)", "Min", "Max", "50%", "95%", "99%", "TTFB"
        )?;
        writeln!(fmt, "{}", SEPARATOR)?;
        writeln!(
            fmt,
            " {:<9} | {:<9} | {:<9} | {:<9} | {:<9} | {:<9} | {}",
            self.avg_duration,
            self.min_duration,
            self.max_duration,
            self.p50,
            self.p95,
            self.p99,
            self.ttfb(),
        )
    }

    /// Optionally prepares a table of status codes.
    pub(crate) fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If there's nothing to display, exit immediately.
        if self.status_codes.is_empty() {
            return Ok(());
        }

        writeln!(fmt, "{}", SEPARATOR)?;
        writeln!(fmt, " {:<56} | {}", "Status code", "# reqs")?;
        writeln!(fmt, "{}", SEPARATOR)?;
        // Most frequent status codes first.
        for (status_code, count) in self
            .status_codes
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        {
            writeln!(
                fmt,
                " {:<56} | {}",
                util::truncate_string(&describe_status_code(status_code), 56),
                util::format_number(*count),
            )?;
        }

        Ok(())
    }
}

impl fmt::Display for SummaryResult {
    // Implement display of a summary with `{}` marker.
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_requests(fmt)?;
        self.fmt_durations(fmt)?;
        self.fmt_status_codes(fmt)?;
        writeln!(fmt, "{}", SEPARATOR)
    }
}

impl RunSummary {
    /// Render the summary in the requested output format.
    pub fn render(&self, format: SummaryFormat) -> Result<String, SummaryError> {
        Ok(match format {
            SummaryFormat::Json => serde_json::to_string(self)?,
            SummaryFormat::Pretty => serde_json::to_string_pretty(self)?,
            SummaryFormat::Table => self.to_string(),
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(fmt, " === SUMMARY: {} ===", self.test_id)?;
        write!(fmt, "{}", self.summary)
    }
}
