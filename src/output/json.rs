//! JSON run records
//!
//! One pretty-printed document per summarized run: the device identity, the
//! run parameters, the summary row values, the exceedance outcome per
//! direction and the HdrHistogram percentiles.

use crate::config::DeviceInfo;
use crate::results::summary::{ExceedanceStatus, RunConfig, RunOutcome};
use crate::stats::histogram::PercentileValue;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Per-direction part of a run record
#[derive(Debug, Clone, Serialize)]
pub struct JsonDirection {
    pub iops: f64,
    pub mean_latency_us: f64,
    pub exceedance: ExceedanceStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub percentiles: Vec<PercentileValue>,
}

/// JSON document describing one run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub fioreport_version: String,
    pub drive: String,
    pub model: String,
    pub serial: String,
    pub fio_version: String,
    pub run: RunConfig,
    pub description: String,
    pub total_iops: f64,
    pub bandwidth_mbs: f64,
    pub read: JsonDirection,
    pub write: JsonDirection,
}

impl RunRecord {
    pub fn new(device: &DeviceInfo, outcome: &RunOutcome) -> Self {
        let summary = &outcome.summary;
        Self {
            fioreport_version: env!("CARGO_PKG_VERSION").to_string(),
            drive: device.drive.clone(),
            model: device.model.clone(),
            serial: device.serial.clone(),
            fio_version: device.fio_version.clone(),
            run: summary.config,
            description: summary.config.description(),
            total_iops: summary.total_iops(),
            bandwidth_mbs: summary.bandwidth_mbs(),
            read: JsonDirection {
                iops: summary.read_iops,
                mean_latency_us: summary.read_latency_us,
                exceedance: outcome.read_exceedance.clone(),
                percentiles: outcome.read_percentiles.clone(),
            },
            write: JsonDirection {
                iops: summary.write_iops,
                mean_latency_us: summary.write_latency_us,
                exceedance: outcome.write_exceedance.clone(),
                percentiles: outcome.write_percentiles.clone(),
            },
        }
    }
}

/// Write a run record to file
pub fn write_run_record(output_path: &Path, record: &RunRecord, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, record)?;
    } else {
        serde_json::to_writer(writer, record)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessPattern;
    use crate::results::summary::SummaryRow;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn outcome() -> RunOutcome {
        let config = RunConfig {
            pattern: AccessPattern::Seq,
            write_pct: 0,
            block_size: 131072,
            threads: 1,
            iodepth: 4,
        };
        RunOutcome {
            summary: SummaryRow {
                config,
                read_iops: 8.0,
                write_iops: 0.0,
                read_latency_us: 120.5,
                write_latency_us: 0.0,
            },
            read_exceedance: ExceedanceStatus::Written { path: PathBuf::from("r.csv"), points: 4 },
            write_exceedance: ExceedanceStatus::Empty,
            read_percentiles: vec![PercentileValue { percentile: 50.0, latency_us: 118.0 }],
            write_percentiles: Vec::new(),
        }
    }

    #[test]
    fn test_run_record_fields() {
        let record = RunRecord::new(&DeviceInfo::default(), &outcome());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["run"]["pattern"], "Seq");
        assert_eq!(value["run"]["block_size"], 131072);
        assert_eq!(value["bandwidth_mbs"], 1.0);
        assert_eq!(value["read"]["exceedance"]["status"], "written");
        assert_eq!(value["read"]["exceedance"]["points"], 4);
        assert_eq!(value["read"]["percentiles"][0]["latency_us"], 118.0);
        assert_eq!(value["write"]["exceedance"]["status"], "empty");
        assert!(value["write"].get("percentiles").is_none());
    }

    #[test]
    fn test_write_run_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let record = RunRecord::new(&DeviceInfo::default(), &outcome());
        write_run_record(&path, &record, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"description\": \"131072B Seq 0% write, 1 threads x QD4\""));
    }
}
