//! Per-run summary rows and exceedance artifacts

use crate::config::{AccessPattern, ReportContext};
use crate::error::SkippedArtifact;
use crate::output::csv::{CsvWriter, TESTS_COLUMN_HEADER};
use crate::results::fio::{DirectionResult, FioResult};
use crate::stats::exceedance::build_exceedance;
use crate::stats::histogram::PercentileValue;
use crate::util::fs::remove_if_exists;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parameters of one fio run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub pattern: AccessPattern,
    pub write_pct: u8,
    pub block_size: u64,
    pub threads: u32,
    pub iodepth: u32,
}

impl RunConfig {
    /// Base path of the run's artifacts
    ///
    /// `{details}/Test{pattern}_w{wmix}_bs{bs}_threads{threads}_iodepth{qd}_{drive}.out`
    pub fn test_name(&self, details_dir: &Path, drive_base: &str) -> PathBuf {
        details_dir.join(format!(
            "Test{}_w{}_bs{}_threads{}_iodepth{}_{}.out",
            self.pattern, self.write_pct, self.block_size, self.threads, self.iodepth, drive_base
        ))
    }

    /// Read or write exceedance CSV of the run
    pub fn exceedance_path(&self, details_dir: &Path, drive_base: &str, direction: &str) -> PathBuf {
        let mut name = self.test_name(details_dir, drive_base).into_os_string();
        name.push(format!(".exc.{}.csv", direction));
        PathBuf::from(name)
    }

    /// Human description, e.g. `4096B Rand 30% write, 4 threads x QD16`
    pub fn description(&self) -> String {
        format!(
            "{}B {} {}% write, {} threads x QD{}",
            self.block_size, self.pattern, self.write_pct, self.threads, self.iodepth
        )
    }
}

/// One row of the `Tests` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub config: RunConfig,
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_latency_us: f64,
    pub write_latency_us: f64,
}

impl SummaryRow {
    pub fn from_result(config: RunConfig, result: &FioResult) -> Self {
        Self {
            config,
            read_iops: result.read.iops,
            write_iops: result.write.iops,
            read_latency_us: result.read.mean_latency_us,
            write_latency_us: result.write.mean_latency_us,
        }
    }

    /// Row for a run that was never executed
    pub fn skipped(config: RunConfig) -> Self {
        Self {
            config,
            read_iops: 0.0,
            write_iops: 0.0,
            read_latency_us: 0.0,
            write_latency_us: 0.0,
        }
    }

    pub fn total_iops(&self) -> f64 {
        self.read_iops + self.write_iops
    }

    /// Bandwidth in MiB/s
    pub fn bandwidth_mbs(&self) -> f64 {
        self.total_iops() * self.config.block_size as f64 / (1024.0 * 1024.0)
    }

    /// Worse of the two mean latencies
    pub fn max_latency_us(&self) -> f64 {
        self.read_latency_us.max(self.write_latency_us)
    }

    /// `type,writePct,blockSize,threads,queueDepth,iops,bandwidthMBs,readLatencyUs,writeLatencyUs`
    pub fn csv_line(&self) -> String {
        let c = &self.config;
        format!(
            "{},{},{},{},{},{:.0},{:.2},{},{}",
            c.pattern,
            c.write_pct,
            c.block_size,
            c.threads,
            c.iodepth,
            self.total_iops(),
            self.bandwidth_mbs(),
            self.read_latency_us,
            self.write_latency_us
        )
    }
}

/// What happened to one direction's exceedance output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExceedanceStatus {
    Written { path: PathBuf, points: usize },
    /// No IOs in this direction, nothing to plot
    Empty,
    Skipped { reason: String },
}

/// Everything recorded for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub summary: SummaryRow,
    pub read_exceedance: ExceedanceStatus,
    pub write_exceedance: ExceedanceStatus,
    pub read_percentiles: Vec<PercentileValue>,
    pub write_percentiles: Vec<PercentileValue>,
}

/// Record a completed run
///
/// Appends the summary row to the tests CSV (creating it with headers if
/// needed) and writes the run's read/write exceedance CSVs. A run without a
/// usable histogram still gets its summary row.
pub fn record_run(ctx: &ReportContext, config: RunConfig, result: &FioResult) -> Result<RunOutcome> {
    let summary = SummaryRow::from_result(config, result);
    append_summary(ctx, &summary)?;

    let details = &ctx.paths.details_dir;
    let drive = ctx.device.drive_base();
    let read_exceedance = write_direction(&result.read, &config.exceedance_path(details, &drive, "read"))?;
    let write_exceedance = write_direction(&result.write, &config.exceedance_path(details, &drive, "write"))?;

    Ok(RunOutcome {
        summary,
        read_exceedance,
        write_exceedance,
        read_percentiles: direction_percentiles(&result.read)?,
        write_percentiles: direction_percentiles(&result.write)?,
    })
}

/// Record a run that was not executed
///
/// Zero-filled summary row, and a single `1,1` point in both exceedance CSVs so
/// the combined table still has a column for it.
pub fn record_skipped_run(ctx: &ReportContext, config: RunConfig) -> Result<RunOutcome> {
    let summary = SummaryRow::skipped(config);
    append_summary(ctx, &summary)?;

    let details = &ctx.paths.details_dir;
    let drive = ctx.device.drive_base();
    let mut statuses = Vec::with_capacity(2);
    for direction in ["read", "write"] {
        let path = config.exceedance_path(details, &drive, direction);
        fs::write(&path, "1,1\n\n")
            .with_context(|| format!("Failed to write exceedance file: {}", path.display()))?;
        statuses.push(ExceedanceStatus::Written { path, points: 1 });
    }
    let write_exceedance = statuses.pop().unwrap_or(ExceedanceStatus::Empty);
    let read_exceedance = statuses.pop().unwrap_or(ExceedanceStatus::Empty);

    info!(run = %config.description(), "recorded skipped run");
    Ok(RunOutcome {
        summary,
        read_exceedance,
        write_exceedance,
        read_percentiles: Vec::new(),
        write_percentiles: Vec::new(),
    })
}

fn append_summary(ctx: &ReportContext, summary: &SummaryRow) -> Result<()> {
    let path = ctx.tests_csv();
    let mut writer = CsvWriter::open_or_create(&path, &ctx.device, TESTS_COLUMN_HEADER)?;
    writer.write_row(&summary.csv_line())?;
    debug!(path = %path.display(), row = %summary.csv_line(), "summary row appended");
    Ok(())
}

fn write_direction(direction: &DirectionResult, path: &Path) -> Result<ExceedanceStatus> {
    match build_exceedance(&direction.histogram, direction.total_ios) {
        Ok(curve) if curve.is_empty() => {
            remove_stale(path)?;
            Ok(ExceedanceStatus::Empty)
        }
        Ok(curve) => {
            curve.write_csv(path)?;
            Ok(ExceedanceStatus::Written { path: path.to_path_buf(), points: curve.len() })
        }
        Err(skip) => {
            remove_stale(path)?;
            log_skip(&skip, path);
            Ok(ExceedanceStatus::Skipped { reason: skip.to_string() })
        }
    }
}

/// Drop an exceedance CSV left by an earlier run of the same configuration
fn remove_stale(path: &Path) -> Result<()> {
    if remove_if_exists(path).with_context(|| format!("Failed to remove stale exceedance file: {}", path.display()))? {
        debug!(path = %path.display(), "stale exceedance file removed");
    }
    Ok(())
}

fn log_skip(skip: &SkippedArtifact, path: &Path) {
    if skip.is_malformed() {
        warn!(path = %path.display(), reason = %skip, "exceedance omitted");
    } else {
        debug!(path = %path.display(), reason = %skip, "exceedance omitted");
    }
}

fn direction_percentiles(direction: &DirectionResult) -> Result<Vec<PercentileValue>> {
    match direction.histogram.to_latency_histogram() {
        Some(hist) => hist.percentiles(),
        None => Ok(Vec::new()),
    }
}
