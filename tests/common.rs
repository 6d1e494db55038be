use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// Build one `Point` line of a k6 event log.
pub fn point(metric: &str, value: f64, time: &str, status: Option<&str>) -> String {
    let tags = match status {
        Some(status) => format!(r#"{{"status":"{}"}}"#, status),
        None => "{}".to_string(),
    };
    format!(
        r#"{{"type":"Point","metric":"{}","data":{{"time":"{}","value":{},"tags":{}}}}}"#,
        metric, time, value, tags
    )
}

/// Build the `Metric` declaration k6 writes before the first point of a metric.
#[allow(dead_code)]
pub fn declaration(metric: &str, metric_type: &str) -> String {
    format!(
        r#"{{"type":"Metric","metric":"{}","data":{{"name":"{}","type":"{}"}}}}"#,
        metric, metric, metric_type
    )
}

/// Build the lines k6 writes for a single completed request.
#[allow(dead_code)]
pub fn request(time: &str, status: &str, duration: f64, waiting: f64, failed: bool) -> Vec<String> {
    let failed = if failed { 1.0 } else { 0.0 };
    vec![
        point("http_reqs", 1.0, time, Some(status)),
        point("http_req_duration", duration, time, Some(status)),
        point("http_req_waiting", waiting, time, Some(status)),
        point("http_req_failed", failed, time, Some(status)),
        point("custom_http_req_failed", failed, time, Some(status)),
    ]
}

/// Write an event log into `dir`, returning its path.
#[allow(dead_code)]
pub fn write_log(dir: &Path, name: &str, lines: &[String], trailer: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("failed to create event log");
    for line in lines {
        writeln!(file, "{}", line).expect("failed to write event log");
    }
    file.write_all(trailer.as_bytes())
        .expect("failed to write event log");
    path
}

/// Create a temporary directory that is removed when dropped.
#[allow(dead_code)]
pub fn log_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temporary directory")
}
