//! Utility functions used when decoding event logs and rendering summaries.

use num_format::{Locale, ToFormattedString};
use std::path::Path;

/// Prefix of the event log files written for each load test run, `result-<id>.json`.
pub const RESULT_FILE_PREFIX: &str = "result-";

/// Format a number with a fixed number of decimal places.
///
/// Exact ties are rounded away from zero, so the output matches JavaScript's
/// `Number.prototype.toFixed` that previously persisted summaries were written with.
/// Rust's own formatting rounds exact ties to even instead.
///
/// # Example
/// ```rust
/// use k6_summary::util;
///
/// assert_eq!(util::to_fixed(30.0, 2), "30.00");
/// // 0.125 is exactly representable, so this is a real tie.
/// assert_eq!(util::to_fixed(0.125, 2), "0.13");
/// // 2.675 is stored as 2.67499999..., so it rounds down.
/// assert_eq!(util::to_fixed(2.675, 2), "2.67");
/// ```
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    } else if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    // A value is an exact tie at `digits` places if and only if it is an odd multiple of
    // 2^-(digits + 1): its exact decimal expansion then ends in a 5 at `digits + 1` places.
    let scaled = magnitude * 2f64.powi(digits as i32 + 1);
    let is_tie = scaled.is_finite() && scaled.fract() == 0.0 && scaled % 2.0 == 1.0;

    let formatted = if is_tie {
        // The expansion is exact at one more place, drop the trailing 5 and round up.
        let mut exact = format!("{:.*}", digits + 1, magnitude);
        exact.pop();
        if exact.ends_with('.') {
            exact.pop();
        }
        increment_last_digit(&exact)
    } else {
        format!("{:.*}", digits, magnitude)
    };

    format!("{}{}", sign, formatted)
}

/// Add one to the last decimal digit of a formatted number, carrying as needed.
fn increment_last_digit(number: &str) -> String {
    let mut digits: Vec<char> = number.chars().collect();
    let mut index = digits.len();
    loop {
        if index == 0 {
            digits.insert(0, '1');
            break;
        }
        index -= 1;
        match digits[index] {
            '.' => continue,
            '9' => digits[index] = '0',
            c => {
                digits[index] = (c as u8 + 1) as char;
                break;
            }
        }
    }
    digits.into_iter().collect()
}

/// Format large number in locale appropriate style.
pub fn format_number(number: u64) -> String {
    number.to_formatted_string(&Locale::en)
}

/// Truncate strings when they're too long to display.
///
/// If a string is longer than the specified max length, this function removes extra
/// the characters and replaces the last two with a double-period ellipsis.
///
/// # Example
/// ```rust
/// use k6_summary::util;
///
/// // All but 7 characters are truncated, with ".." appended.
/// assert_eq!(util::truncate_string("this is a long string", 9), "this is..");
///
/// // All characters are returned as the string is less than 15 characters long.
/// assert_eq!(util::truncate_string("shorter string", 15), "shorter string");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if str_to_truncate.char_indices().count() > max_length {
        match str_to_truncate.char_indices().nth(max_length - 2) {
            None => str_to_truncate.to_string(),
            Some((idx, _)) => format!("{}..", &str_to_truncate[..idx]),
        }
    } else {
        str_to_truncate.to_string()
    }
}

/// Derive a test id from the path of an event log.
///
/// Event logs are named `result-<id>.json`, in which case `<id>` is returned. Otherwise
/// the file stem is used as is.
///
/// # Example
/// ```rust
/// use k6_summary::util;
///
/// assert_eq!(util::test_id_from_path("results/result-1712345678901.json"), "1712345678901");
/// assert_eq!(util::test_id_from_path("/tmp/smoke.json"), "smoke");
/// ```
pub fn test_id_from_path<P: AsRef<Path>>(path: P) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    match stem.strip_prefix(RESULT_FILE_PREFIX) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point() {
        assert_eq!(to_fixed(0.0, 2), "0.00");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
        assert_eq!(to_fixed(10.0, 2), "10.00");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(123.456, 2), "123.46");
        assert_eq!(to_fixed(1_000_000.1, 2), "1000000.10");
        assert_eq!(to_fixed(-1.5, 2), "-1.50");
        assert_eq!(to_fixed(-0.001, 2), "-0.00");
        assert_eq!(to_fixed(f64::NAN, 2), "NaN");
        assert_eq!(to_fixed(f64::INFINITY, 2), "Infinity");
        assert_eq!(to_fixed(f64::NEG_INFINITY, 2), "-Infinity");
    }

    #[test]
    fn fixed_point_ties() {
        // Rust's own formatting prints 0.12 here.
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(0.375, 2), "0.38");
        assert_eq!(to_fixed(0.625, 2), "0.63");
        assert_eq!(to_fixed(10.875, 2), "10.88");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        // Not exactly representable, so not a tie.
        assert_eq!(to_fixed(9.995, 2), "9.99");
        // Carry into the integer part.
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(9.5, 0), "10");
        assert_eq!(to_fixed(99.75, 1), "99.8");
        assert_eq!(to_fixed(0.5, 0), "1");
        // 0.25 is exact at two places, not a tie.
        assert_eq!(to_fixed(0.25, 2), "0.25");
    }

    #[test]
    fn increment() {
        assert_eq!(increment_last_digit("0.12"), "0.13");
        assert_eq!(increment_last_digit("0.99"), "1.00");
        assert_eq!(increment_last_digit("99.99"), "100.00");
        assert_eq!(increment_last_digit("9"), "10");
    }

    #[test]
    fn numbers() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn truncate() {
        assert_eq!(
            truncate_string("the quick brown fox", 25),
            "the quick brown fox"
        );
        assert_eq!(truncate_string("the quick brown fox", 10), "the quic..");
        assert_eq!(truncate_string("abcde", 5), "abcde");
        assert_eq!(truncate_string("abcde", 4), "ab..");
        assert_eq!(truncate_string("abcde", 3), "a..");
        assert_eq!(truncate_string("abcde", 2), "..");
    }

    #[test]
    fn test_ids() {
        assert_eq!(test_id_from_path("result-42.json"), "42");
        assert_eq!(test_id_from_path("results/result-42.json"), "42");
        assert_eq!(test_id_from_path("result-.json"), "result-");
        assert_eq!(test_id_from_path("k6.log"), "k6");
        assert_eq!(test_id_from_path(""), "");
    }
}
