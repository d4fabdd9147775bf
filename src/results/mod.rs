//! fio run results
//!
//! - **fio**: the JSON / JSON+ result schema
//! - **summary**: the per-run summary row and exceedance files

pub mod fio;
pub mod summary;

pub use fio::{parse_fio_output, read_fio_output, DirectionResult, FioResult};
pub use summary::{record_run, record_skipped_run, ExceedanceStatus, RunConfig, RunOutcome, SummaryRow};
