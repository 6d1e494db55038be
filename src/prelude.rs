pub use crate::accumulator::AccumulatorState;
pub use crate::classify::{Classifier, MetricKind, MetricNames};
pub use crate::config::{SummaryConfiguration, SummaryFormat};
pub use crate::record::{parse_line, parse_lines, MeasurementRecord, RecordType};
pub use crate::summary::{reduce, FixedFloat, RunSummary, SummaryResult};
pub use crate::{
    summarize_file, summarize_files, summarize_lines, summarize_reader, summarize_str, SummaryError,
    SummaryRun,
};
