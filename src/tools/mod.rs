//! Offline utilities over collection files: shape validation, summaries,
//! schema reports, merging, splitting, and YAML conversion.

mod report;
mod transform;

pub use report::{
    schema_report, summarize, validate_records, FieldSummary, Issue, Summary, ValidationReport,
    ValueCount,
};
pub use transform::{merge_records, split_records, to_yaml, write_chunks, MergeOutcome};
