//! fioreport CLI entry point

use anyhow::{Context, Result};
use chrono::Local;
use fioreport::config::cli::{
    AppendArgs, Cli, Command, ExceedanceArgs, LogKind, ReportArgs, SummarizeArgs, TimeseriesArgs,
};
use fioreport::config::cli_convert::{parse_color, parse_size};
use fioreport::config::toml::{load_context, series_table};
use fioreport::config::ReportContext;
use fioreport::output::combine::ExceedanceCombiner;
use fioreport::output::csv::write_series_csv;
use fioreport::output::json::{write_run_record, RunRecord};
use fioreport::output::text;
use fioreport::report::{append_dataset, patch_report, PatchPlan};
use fioreport::results::fio::read_fio_output;
use fioreport::results::summary::{record_run, record_skipped_run, RunConfig};
use fioreport::stats::timeseries::{SeriesKind, TimeSeriesMerger};
use std::fs;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli.validate()?;
    let ctx = load_context(&cli)?;
    debug!(command = ?cli.command, "starting");

    match &cli.command {
        Command::Summarize(args) => run_summarize(ctx, args),
        Command::Timeseries(args) => run_timeseries(&ctx, args),
        Command::Exceedance(args) => run_exceedance(&ctx, args),
        Command::Report(args) => run_report(&ctx, args),
        Command::Append(args) => run_append(args),
    }
}

/// Record one run into the details directory
fn run_summarize(mut ctx: ReportContext, args: &SummarizeArgs) -> Result<()> {
    let config = RunConfig {
        pattern: args.pattern,
        write_pct: args.write_pct,
        block_size: parse_size(&args.block_size).context("Invalid block size")?,
        threads: args.threads,
        iodepth: args.iodepth,
    };
    ensure_details_dir(&ctx)?;

    let outcome = match (&args.result, args.skipped) {
        (Some(path), false) => {
            let result = read_fio_output(path)?;
            if let Some(version) = &result.fio_version {
                if ctx.device.fio_version == "UNKNOWN" {
                    ctx.device.fio_version = version.clone();
                }
            }
            record_run(&ctx, config, &result)?
        }
        _ => record_skipped_run(&ctx, config)?,
    };

    text::print_run(&outcome);

    if let Some(json_path) = &args.json_output {
        let record = RunRecord::new(&ctx.device, &outcome);
        write_run_record(json_path, &record, true)?;
        info!(path = %json_path.display(), "run record written");
    }
    Ok(())
}

/// Merge per-thread logs into the series CSV
fn run_timeseries(ctx: &ReportContext, args: &TimeseriesArgs) -> Result<()> {
    let kind = match args.kind {
        LogKind::Iops => SeriesKind::Throughput,
        LogKind::Clat | LogKind::Slat => SeriesKind::Latency,
    };
    let merger = TimeSeriesMerger::new(
        ctx.timeseries.runtime_secs as usize,
        ctx.timeseries.padding_secs as usize,
    );
    let series = merger.merge_files(kind, &args.logs)?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => {
            ensure_details_dir(ctx)?;
            ctx.series_csv(series_table(args.kind))
        }
    };
    write_series_csv(&output, &ctx.device, &series, args.append)?;

    info!(path = %output.display(), seconds = series.len(), skipped = merger.skipped_secs(), "series written");
    text::print_series_summary(&output, &series);
    Ok(())
}

/// Lay the configured runs' exceedance CSVs side by side
fn run_exceedance(ctx: &ReportContext, args: &ExceedanceArgs) -> Result<()> {
    let combiner =
        ExceedanceCombiner::for_layout(&ctx.exceedance, &ctx.paths.details_dir, &ctx.device.drive_base());
    let table = combiner.combine()?;

    let output = args.output.clone().unwrap_or_else(|| ctx.exceedance_csv());
    let written = table.write_csv(&output, &ctx.device)?;
    text::print_exceedance_summary(&written, &table);
    Ok(())
}

/// Build the final report from the template
fn run_report(ctx: &ReportContext, args: &ReportArgs) -> Result<()> {
    text::print_banner("FIO REPORT");
    text::print_device_info(&ctx.device);

    let plan = PatchPlan::for_context(ctx, !args.no_exceedance);
    let dest = ctx.report_path(Local::now());
    let summary = patch_report(&ctx.paths.template, &dest, &plan)
        .with_context(|| format!("Failed to build report from {}", ctx.paths.template.display()))?;

    text::print_patch_summary(&dest, &summary);
    Ok(())
}

/// Add another report's dataset to an existing report
fn run_append(args: &AppendArgs) -> Result<()> {
    let color = parse_color(&args.color)?;
    let summary = append_dataset(&args.source, &args.append, &args.suffix, &color, &args.output)
        .with_context(|| format!("Failed to append {} to {}", args.append.display(), args.source.display()))?;

    text::print_append_summary(&args.output, &summary);
    Ok(())
}

fn ensure_details_dir(ctx: &ReportContext) -> Result<()> {
    let dir = &ctx.paths.details_dir;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create details directory: {}", dir.display()))
}
