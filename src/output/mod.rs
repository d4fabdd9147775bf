//! Output formatting and export
//!
//! Supports console text, the CSV files the report is built from, and JSON run
//! records.

pub mod combine;
pub mod csv;
pub mod json;
pub mod text;

pub use combine::{ExceedanceCombiner, ExceedanceTable};
pub use csv::{write_series_csv, CsvWriter};
pub use json::{write_run_record, RunRecord};
