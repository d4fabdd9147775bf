//! fioreport - turn fio result artifacts into an ODS performance report
//!
//! fioreport post-processes the raw output of a storage test campaign: fio
//! JSON / JSON+ results and per-thread logs. It produces the CSV tables a
//! LibreOffice Calc template is filled from, then writes the final report.
//!
//! # Architecture
//!
//! - **Result parsing**: fio JSON and JSON+ in both histogram generations
//! - **Statistics**: histogram decoding, exceedance curves, per-second series
//! - **Tables**: summary rows, merged series and combined exceedance CSVs
//! - **Report**: template patching and dataset appending, all through an
//!   owned XML tree

pub mod config;
pub mod error;
pub mod output;
pub mod report;
pub mod results;
pub mod stats;
pub mod util;

pub use config::ReportContext;
pub use error::{ReportError, SkippedArtifact};

/// Result type used throughout fioreport
pub type Result<T> = anyhow::Result<T>;
