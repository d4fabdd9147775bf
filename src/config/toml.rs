//! TOML configuration file parsing
//!
//! Example `fioreport.toml`:
//!
//! ```toml
//! [device]
//! drive = "/dev/nvme0n1"
//! model = "EXAMPLE NVMe 2TB"
//! serial = "S1234"
//! avail_capacity_gib = 1788
//! tested_capacity_gib = 1788
//! fio_version = "fio-3.36"
//!
//! [paths]
//! details_dir = "details_nvme0n1"
//! template = "original.ods"
//!
//! [timeseries]
//! runtime_secs = 1200
//! padding_secs = 10
//!
//! [exceedance]
//! pattern = "Rand"
//! write_pct = 30
//! threads = [1, 4, 16, 32]
//! ```

use super::*;
use crate::config::cli::{Cli, Command, LogKind};
use crate::config::cli_convert::parse_duration;
use anyhow::{Context, Result};
use std::fs;
use tracing::debug;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<ReportContext> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<ReportContext> {
    let ctx: ReportContext = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(ctx)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut ctx: ReportContext) -> Result<ReportContext> {
    if let Some(ref dir) = cli.details_dir {
        ctx.paths.details_dir = dir.clone();
    }
    if let Some(ref drive) = cli.drive {
        ctx.device.drive = drive.clone();
    }
    if let Some(ref version) = cli.fio_version {
        ctx.device.fio_version = version.clone();
    }

    match &cli.command {
        Command::Timeseries(args) => {
            if let Some(ref runtime) = args.runtime {
                ctx.timeseries.runtime_secs = parse_duration(runtime)?;
            }
            if let Some(ref padding) = args.padding {
                ctx.timeseries.padding_secs = parse_duration(padding)?;
            }
        }
        Command::Exceedance(args) => {
            if let Some(ref threads) = args.threads {
                ctx.exceedance.threads = threads.clone();
            }
        }
        Command::Report(args) => {
            if let Some(ref template) = args.template {
                ctx.paths.template = template.clone();
            }
            if let Some(ref output) = args.output {
                ctx.paths.output = Some(output.clone());
            }
        }
        Command::Summarize(_) | Command::Append(_) => {}
    }

    Ok(ctx)
}

/// Build the validated context for this invocation
///
/// Reads `--config` when given, otherwise starts from defaults.
pub fn load_context(cli: &Cli) -> Result<ReportContext> {
    let ctx = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => ReportContext::default(),
    };
    let ctx = merge_cli_with_config(cli, ctx)?;

    crate::config::validator::validate_context(&ctx)
        .context("Configuration validation failed")?;

    debug!(drive = %ctx.device.drive, details = %ctx.paths.details_dir.display(), "context loaded");
    Ok(ctx)
}

/// Series table a log kind feeds
pub fn series_table(kind: LogKind) -> SeriesTable {
    match kind {
        LogKind::Iops => SeriesTable::Iops,
        LogKind::Clat => SeriesTable::Clat,
        LogKind::Slat => SeriesTable::Slat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[device]
drive = "/dev/nvme0n1"
model = "EXAMPLE NVMe"
serial = "S1234"
avail_capacity_gib = 1788
tested_capacity_gib = 1000
cpu = "Xeon"
cores = 32
frequency_mhz = 2400
os = "Linux 6.1"
fio_version = "fio-3.36"

[paths]
details_dir = "/data/details"
tag = "run1"

[timeseries]
runtime_secs = 60
padding_secs = 10

[exceedance]
pattern = "Seq"
write_pct = 0
block_size = 131072
threads = [1, 2]
"#;
        let ctx = parse_toml_string(toml).unwrap();
        assert_eq!(ctx.device.drive, "/dev/nvme0n1");
        assert_eq!(ctx.device.cores, 32);
        assert_eq!(ctx.paths.details_dir, PathBuf::from("/data/details"));
        assert_eq!(ctx.paths.template, PathBuf::from("original.ods"));
        assert_eq!(ctx.timeseries.padding_secs, 10);
        assert_eq!(ctx.exceedance.pattern, AccessPattern::Seq);
        assert_eq!(ctx.exceedance.threads, vec![1, 2]);
        assert_eq!(ctx.exceedance.iodepth, 1);
        assert_eq!(ctx.exceedance.suffix, "exceedance30");
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let ctx = parse_toml_string("").unwrap();
        assert_eq!(ctx.device.drive, "UNKNOWN");
        assert_eq!(ctx.timeseries.runtime_secs, 1200);
        assert_eq!(ctx.exceedance.threads, vec![1, 4, 16, 32]);
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        assert!(parse_toml_string("[device]\ncores = \"many\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[device]\ndrive = \"/dev/sda\"\n[timeseries]\nruntime_secs = 60").unwrap();
        let config = file.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "fioreport", "--config", config.as_str(), "--drive", "/dev/sdb",
            "timeseries", "--runtime", "2m", "--padding", "10", "a.log",
        ])
        .unwrap();
        let ctx = load_context(&cli).unwrap();
        assert_eq!(ctx.device.drive, "/dev/sdb");
        assert_eq!(ctx.timeseries.runtime_secs, 120);
        assert_eq!(ctx.timeseries.padding_secs, 10);
    }

    #[test]
    fn test_report_overrides() {
        let cli = Cli::try_parse_from(["fioreport", "report", "--template", "t.ods", "-o", "out.ods"]).unwrap();
        let ctx = merge_cli_with_config(&cli, ReportContext::default()).unwrap();
        assert_eq!(ctx.paths.template, PathBuf::from("t.ods"));
        assert_eq!(ctx.paths.output, Some(PathBuf::from("out.ods")));
    }

    #[test]
    fn test_missing_config_file() {
        assert!(parse_toml_file(Path::new("/nonexistent/fioreport.toml")).is_err());
    }
}
