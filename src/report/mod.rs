//! ODS report generation
//!
//! - **xml**: owned XML tree used for every edit (no regex over markup)
//! - **table**: CSV to spreadsheet table conversion
//! - **archive**: reading the template and writing the report container
//! - **patcher**: the report step proper
//! - **append**: merging a second report's dataset into an existing one

pub mod append;
pub mod archive;
pub mod patcher;
pub mod table;
pub mod xml;

pub use append::{append_dataset, AppendSummary};
pub use archive::{ArchiveStats, TemplateArchive};
pub use patcher::{patch_report, PatchPlan, PatchSummary, TableSubstitution};
