//! Error types for report generation
//!
//! Two families live here:
//!
//! - [`ReportError`]: fatal setup failures that abort the report step
//! - [`SkippedArtifact`]: per-run conditions that only drop that run's
//!   exceedance output and never stop the report

use std::path::PathBuf;

/// Fatal failures while building a report archive.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("template {0} has no content.xml document body")]
    MissingDocumentBody(PathBuf),

    #[error("cannot write destination {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed XML in {entry}: {message}")]
    Xml { entry: String, message: String },

    #[error("cannot read table source {path} for table {table}: {source}")]
    TableSource {
        table: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub(crate) fn xml(entry: &str, message: impl ToString) -> Self {
        ReportError::Xml {
            entry: entry.to_string(),
            message: message.to_string(),
        }
    }
}

/// Why a run produced no exceedance curve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkippedArtifact {
    /// Plain `json` output carries no bucket detail.
    #[error("no latency histogram in result")]
    NoHistogram,

    #[error("unsupported histogram shape: {0}")]
    UnsupportedShape(String),

    #[error("malformed histogram: {0}")]
    Malformed(String),
}

impl SkippedArtifact {
    /// Whether the input itself was bad, as opposed to just lacking detail.
    pub fn is_malformed(&self) -> bool {
        matches!(self, SkippedArtifact::Malformed(_) | SkippedArtifact::UnsupportedShape(_))
    }
}
