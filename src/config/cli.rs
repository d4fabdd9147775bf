//! CLI argument parsing using clap

use crate::config::AccessPattern;
use crate::config::cli_convert::parse_color;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// fioreport - turn fio result artifacts into an ODS performance report
#[derive(Parser, Debug)]
#[command(name = "fioreport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML report configuration
    #[arg(long, global = true, env = "FIOREPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding per-run artifacts and intermediate CSVs
    #[arg(long, global = true)]
    pub details_dir: Option<PathBuf>,

    /// Device under test (overrides [device].drive)
    #[arg(long, global = true)]
    pub drive: Option<String>,

    /// fio version string stamped into CSV headers and the report
    #[arg(long, global = true)]
    pub fio_version: Option<String>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record one fio run: summary row plus read/write exceedance CSVs
    Summarize(SummarizeArgs),
    /// Merge per-thread fio logs into one per-second series
    Timeseries(TimeseriesArgs),
    /// Lay several runs' exceedance CSVs side by side
    Exceedance(ExceedanceArgs),
    /// Build the final report from the template
    Report(ReportArgs),
    /// Add another report's dataset to an existing report
    Append(AppendArgs),
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// fio JSON or JSON+ output of the run
    #[arg(value_name = "RESULT")]
    pub result: Option<PathBuf>,

    /// Access pattern of the run
    #[arg(long, value_enum, default_value = "rand")]
    pub pattern: AccessPattern,

    /// Write percentage of the mix (0-100)
    #[arg(short = 'w', long, default_value = "0")]
    pub write_pct: u8,

    /// Block size (e.g., 4k, 128k)
    #[arg(short = 'b', long, default_value = "4k")]
    pub block_size: String,

    /// Number of fio jobs
    #[arg(short = 't', long, default_value = "1")]
    pub threads: u32,

    /// Queue depth per job
    #[arg(short = 'q', long, default_value = "1")]
    pub iodepth: u32,

    /// The run was not executed (block size below the device minimum)
    #[arg(long)]
    pub skipped: bool,

    /// Also write a JSON record of the run
    #[arg(long)]
    pub json_output: Option<PathBuf>,
}

/// fio log type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogKind {
    /// IOPS logs (summed across threads)
    Iops,
    /// Completion latency logs (averaged across threads)
    Clat,
    /// Submission latency logs (averaged across threads)
    Slat,
}

#[derive(Args, Debug)]
pub struct TimeseriesArgs {
    /// Per-thread log files of one run
    #[arg(value_name = "LOG", required = true)]
    pub logs: Vec<PathBuf>,

    /// Type of log being merged
    #[arg(long, value_enum, default_value = "iops")]
    pub kind: LogKind,

    /// Measured run time (e.g., 1200, 20m)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Warm-up padding logged around the run (e.g., 10s)
    #[arg(long)]
    pub padding: Option<String>,

    /// Output CSV (defaults to the series CSV in the details directory)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Append rows to an existing series CSV instead of starting a new one
    #[arg(long)]
    pub append: bool,
}

#[derive(Args, Debug)]
pub struct ExceedanceArgs {
    /// Thread counts to compare, in column order (e.g., 1,4,16,32)
    #[arg(long, value_delimiter = ',')]
    pub threads: Option<Vec<u32>>,

    /// Output CSV (defaults to ezfio_exceedance_<suffix>.csv)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report template (ODS)
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Report destination
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Leave the Exceedance table untouched even if its CSV exists
    #[arg(long)]
    pub no_exceedance: bool,
}

#[derive(Args, Debug)]
pub struct AppendArgs {
    /// Report with one or more datasets already included
    #[arg(short = 's', long)]
    pub source: PathBuf,

    /// Report whose dataset is added to the source
    #[arg(short = 'a', long)]
    pub append: PathBuf,

    /// Suffix for the appended tables and chart series label
    #[arg(short = 'x', long)]
    pub suffix: String,

    /// Chart color for the appended dataset (rrggbb)
    #[arg(short = 'c', long)]
    pub color: String,

    /// Where the combined report is written
    #[arg(short = 'o', long)]
    pub output: PathBuf,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Summarize(args) => {
                if args.result.is_none() && !args.skipped {
                    anyhow::bail!("a fio result file is required unless --skipped is given");
                }
                if args.write_pct > 100 {
                    anyhow::bail!("write_pct must be between 0 and 100");
                }
                if args.threads == 0 {
                    anyhow::bail!("threads must be at least 1");
                }
                if args.iodepth == 0 {
                    anyhow::bail!("iodepth must be at least 1");
                }
            }
            Command::Exceedance(args) => {
                if let Some(threads) = &args.threads {
                    if threads.is_empty() {
                        anyhow::bail!("--threads needs at least one value");
                    }
                }
            }
            Command::Append(args) => {
                if args.suffix.is_empty() {
                    anyhow::bail!("suffix must not be empty");
                }
                parse_color(&args.color)?;
                if args.source == args.output || args.append == args.output {
                    anyhow::bail!("output must differ from the input reports");
                }
            }
            Command::Timeseries(_) | Command::Report(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_summarize_args() {
        let cli = parse(&["fioreport", "summarize", "run.json", "--pattern", "seq", "-w", "30", "-b", "128k", "-t", "4", "-q", "16"]);
        cli.validate().unwrap();
        match cli.command {
            Command::Summarize(args) => {
                assert_eq!(args.pattern, AccessPattern::Seq);
                assert_eq!(args.write_pct, 30);
                assert_eq!(args.block_size, "128k");
                assert_eq!(args.threads, 4);
                assert_eq!(args.iodepth, 16);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_summarize_requires_result() {
        assert!(parse(&["fioreport", "summarize"]).validate().is_err());
        parse(&["fioreport", "summarize", "--skipped"]).validate().unwrap();
        assert!(parse(&["fioreport", "summarize", "r.json", "-w", "101"]).validate().is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["fioreport", "report", "--details-dir", "/tmp/d", "--debug"]);
        assert!(cli.debug);
        assert_eq!(cli.details_dir, Some(PathBuf::from("/tmp/d")));
    }

    #[test]
    fn test_exceedance_thread_list() {
        let cli = parse(&["fioreport", "exceedance", "--threads", "1,8,64"]);
        match cli.command {
            Command::Exceedance(args) => assert_eq!(args.threads, Some(vec![1, 8, 64])),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_append_validation() {
        let ok = parse(&["fioreport", "append", "-s", "a.ods", "-a", "b.ods", "-x", "_new", "-c", "223344", "-o", "c.ods"]);
        ok.validate().unwrap();
        let bad_color = parse(&["fioreport", "append", "-s", "a.ods", "-a", "b.ods", "-x", "_new", "-c", "blue", "-o", "c.ods"]);
        assert!(bad_color.validate().is_err());
        let same = parse(&["fioreport", "append", "-s", "a.ods", "-a", "b.ods", "-x", "_new", "-c", "223344", "-o", "a.ods"]);
        assert!(same.validate().is_err());
    }

    #[test]
    fn test_timeseries_requires_logs() {
        assert!(Cli::try_parse_from(["fioreport", "timeseries"]).is_err());
        let cli = parse(&["fioreport", "timeseries", "--kind", "clat", "a.log", "b.log"]);
        match cli.command {
            Command::Timeseries(args) => {
                assert_eq!(args.kind, LogKind::Clat);
                assert_eq!(args.logs.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
