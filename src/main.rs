#[macro_use]
extern crate log;

use gumdrop::Options;
use std::process::exit;
use strum::IntoEnumIterator;
use tokio::runtime::Runtime;

use k6_summary::classify::MetricKind;
use k6_summary::config::SummaryConfiguration;
use k6_summary::{summarize_files, SummaryError};

/// Summarize every configured event log, returning how many could not be summarized.
fn execute(configuration: SummaryConfiguration) -> Result<usize, SummaryError> {
    // If version flag is set, display package name and version and exit.
    if configuration.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    configuration.initialize_logger()?;
    configuration.validate()?;
    let names = configuration.metric_names();
    debug!("metric names: {}", serde_json::to_string(&names)?);

    // Display recognized metrics, then exit.
    if configuration.list_metrics {
        println!("Recognized metrics:");
        for kind in MetricKind::iter() {
            println!(" - {} ({})", names.name(kind), kind.describe());
        }
        return Ok(0);
    }

    let test_id = if configuration.test_id.is_empty() {
        None
    } else {
        Some(configuration.test_id.as_str())
    };
    let format = configuration.output_format();

    let rt = Runtime::new()?;
    let results = rt.block_on(summarize_files(&configuration.files, test_id, &names));

    let mut failed = 0;
    for (path, result) in configuration.files.iter().zip(results) {
        match result {
            Ok(run_summary) => println!("{}", run_summary.render(format)?),
            Err(e) => {
                error!("failed to summarize {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    Ok(failed)
}

fn main() {
    let configuration = SummaryConfiguration::parse_args_default_or_exit();
    match execute(configuration) {
        Ok(0) => (),
        Ok(failed) => {
            eprintln!("{} event log(s) could not be summarized", failed);
            exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    }
}
