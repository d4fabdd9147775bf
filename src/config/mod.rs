//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Everything ends up in a [`ReportContext`], which is built once at startup
//! and then only borrowed.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Complete report context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportContext {
    #[serde(default)]
    pub device: DeviceInfo,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timeseries: TimeseriesConfig,
    #[serde(default)]
    pub exceedance: ExceedanceLayout,
}

/// Identity of the system under test, stamped into every CSV and the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device path, e.g. /dev/nvme0n1
    #[serde(default = "default_unknown")]
    pub drive: String,
    #[serde(default = "default_unknown")]
    pub model: String,
    #[serde(default = "default_unknown")]
    pub serial: String,
    /// Raw device capacity
    #[serde(default)]
    pub avail_capacity_gib: u64,
    /// Portion of the device exercised by the tests
    #[serde(default)]
    pub tested_capacity_gib: u64,
    #[serde(default = "default_unknown")]
    pub cpu: String,
    #[serde(default = "default_cores")]
    pub cores: usize,
    #[serde(default)]
    pub frequency_mhz: u64,
    #[serde(default = "default_os")]
    pub os: String,
    #[serde(default = "default_unknown")]
    pub fio_version: String,
}

fn default_unknown() -> String {
    "UNKNOWN".to_string()
}

fn default_cores() -> usize {
    num_cpus::get()
}

fn default_os() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            drive: default_unknown(),
            model: default_unknown(),
            serial: default_unknown(),
            avail_capacity_gib: 0,
            tested_capacity_gib: 0,
            cpu: default_unknown(),
            cores: default_cores(),
            frequency_mhz: 0,
            os: default_os(),
            fio_version: default_unknown(),
        }
    }
}

impl DeviceInfo {
    /// Last path component of the drive, e.g. `nvme0n1`
    pub fn drive_base(&self) -> String {
        Path::new(&self.drive)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.drive.clone())
    }

    /// Report placeholders and their values, in substitution order
    pub fn placeholders(&self) -> Vec<(String, String)> {
        vec![
            ("_DRIVE".to_string(), self.drive.clone()),
            ("_TESTCAP".to_string(), self.tested_capacity_gib.to_string()),
            ("_MODEL".to_string(), self.model.clone()),
            ("_SERIAL".to_string(), self.serial.clone()),
            ("_OS".to_string(), self.os.clone()),
            ("_FIO".to_string(), self.fio_version.clone()),
        ]
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {}), {} of {} GiB tested", self.drive, self.model, self.serial,
               self.tested_capacity_gib, self.avail_capacity_gib)
    }
}

/// Where artifacts are read from and written to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding per-run outputs and the intermediate CSVs
    #[serde(default = "default_details_dir")]
    pub details_dir: PathBuf,
    /// Report template (ODS)
    #[serde(default = "default_template")]
    pub template: PathBuf,
    /// Directory for the final report when `output` is not set
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Explicit report destination
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Fixed tag for generated file names; generated from the device and
    /// host when unset
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_details_dir() -> PathBuf {
    PathBuf::from("details")
}

fn default_template() -> PathBuf {
    PathBuf::from("original.ods")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            details_dir: default_details_dir(),
            template: default_template(),
            output_dir: default_output_dir(),
            output: None,
            tag: None,
        }
    }
}

/// Per-second series tables in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesTable {
    /// Throughput, `Timeseries`
    Iops,
    /// Completion latency, `TimeseriesCLAT`
    Clat,
    /// Submission latency, `TimeseriesSLAT`
    Slat,
}

impl SeriesTable {
    pub const ALL: [SeriesTable; 3] = [SeriesTable::Iops, SeriesTable::Clat, SeriesTable::Slat];

    /// Report table the series is substituted into
    pub fn table_name(&self) -> &'static str {
        match self {
            SeriesTable::Iops => "Timeseries",
            SeriesTable::Clat => "TimeseriesCLAT",
            SeriesTable::Slat => "TimeseriesSLAT",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            SeriesTable::Iops => "ezfio_timeseries.csv",
            SeriesTable::Clat => "ezfio_timeseries_clat.csv",
            SeriesTable::Slat => "ezfio_timeseries_slat.csv",
        }
    }
}

/// Time series windowing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesConfig {
    /// Measured run time in seconds
    #[serde(default = "default_runtime")]
    pub runtime_secs: u64,
    /// Extra seconds logged around the run; half is dropped from the front
    #[serde(default)]
    pub padding_secs: u64,
}

fn default_runtime() -> u64 {
    1200
}

impl Default for TimeseriesConfig {
    fn default() -> Self {
        Self {
            runtime_secs: default_runtime(),
            padding_secs: 0,
        }
    }
}

/// Sequential or random access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AccessPattern {
    #[serde(alias = "seq")]
    Seq,
    #[serde(alias = "rand")]
    Rand,
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Seq => write!(f, "Seq"),
            AccessPattern::Rand => write!(f, "Rand"),
        }
    }
}

/// Which runs are laid side by side in the `Exceedance` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceedanceLayout {
    #[serde(default = "default_pattern")]
    pub pattern: AccessPattern,
    #[serde(default = "default_write_pct")]
    pub write_pct: u8,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    #[serde(default = "default_iodepth")]
    pub iodepth: u32,
    /// One column group per thread count, in this order
    #[serde(default = "default_threads")]
    pub threads: Vec<u32>,
    /// Tag in the combined CSV's file name
    #[serde(default = "default_exceedance_suffix")]
    pub suffix: String,
}

fn default_pattern() -> AccessPattern {
    AccessPattern::Rand
}

fn default_write_pct() -> u8 {
    30
}

fn default_block_size() -> u64 {
    4096
}

fn default_iodepth() -> u32 {
    1
}

fn default_threads() -> Vec<u32> {
    vec![1, 4, 16, 32]
}

fn default_exceedance_suffix() -> String {
    "exceedance30".to_string()
}

impl Default for ExceedanceLayout {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            write_pct: default_write_pct(),
            block_size: default_block_size(),
            iodepth: default_iodepth(),
            threads: default_threads(),
            suffix: default_exceedance_suffix(),
        }
    }
}

impl ReportContext {
    /// Summary rows of every run
    pub fn tests_csv(&self) -> PathBuf {
        self.paths.details_dir.join("ezfio_tests.csv")
    }

    /// Merged per-second series for one report table
    pub fn series_csv(&self, table: SeriesTable) -> PathBuf {
        self.paths.details_dir.join(table.file_name())
    }

    /// Combined exceedance table
    pub fn exceedance_csv(&self) -> PathBuf {
        self.paths
            .details_dir
            .join(format!("ezfio_exceedance_{}.csv", self.exceedance.suffix))
    }

    /// Tag identifying this system and run in generated file names
    ///
    /// `{capacity}GiB_{cores}cores_{mhz}MHz_{drive}_{host}_{datestamp}` unless a
    /// fixed tag is configured.
    pub fn file_tag(&self, now: DateTime<Local>) -> String {
        if let Some(tag) = &self.paths.tag {
            return tag.clone();
        }
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        format!(
            "{}GiB_{}cores_{}MHz_{}_{}_{}",
            self.device.avail_capacity_gib,
            self.device.cores,
            self.device.frequency_mhz,
            self.device.drive_base(),
            host,
            now.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    /// Final report destination
    pub fn report_path(&self, now: DateTime<Local>) -> PathBuf {
        match &self.paths.output {
            Some(path) => path.clone(),
            None => self
                .paths
                .output_dir
                .join(format!("ezfio_results_{}.ods", self.file_tag(now))),
        }
    }
}
