//! Human-readable text output

use crate::config::DeviceInfo;
use crate::output::combine::ExceedanceTable;
use crate::report::{AppendSummary, PatchSummary};
use crate::results::summary::{ExceedanceStatus, RunOutcome, SummaryRow};
use crate::stats::histogram::PercentileValue;
use crate::stats::timeseries::MergedSeries;
use crate::util::format::{format_bytes, format_grouped, format_number, format_rate};
use std::fs;
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";

/// Print a boxed section title
pub fn print_banner(title: &str) {
    println!("{}", RULE);
    println!("{:^79}", title);
    println!("{}", RULE);
}

/// Print the system under test
pub fn print_device_info(device: &DeviceInfo) {
    let rows = [
        ("Drive", device.drive.clone()),
        ("Model", device.model.clone()),
        ("Serial", device.serial.clone()),
        ("AvailCapacity", format!("{} GiB", device.avail_capacity_gib)),
        ("TestedCapacity", format!("{} GiB", device.tested_capacity_gib)),
        ("CPU", device.cpu.clone()),
        ("Cores", device.cores.to_string()),
        ("Frequency", format!("{} MHz", device.frequency_mhz)),
        ("OS", device.os.clone()),
        ("FIOVersion", device.fio_version.clone()),
    ];
    for (name, value) in rows {
        println!("{:>20}: {}", name, value);
    }
    println!();
}

/// Column titles matching [`run_line`]
pub fn run_header() -> String {
    format!("{:<50} {:>10} {:>12} {:>10}", "Test Description", "BW(MB/s)", "IOPS", "Lat(us)")
}

/// One result line: description, bandwidth, IOPS and the worse mean latency
pub fn run_line(row: &SummaryRow) -> String {
    format!(
        "{:<50} {:>10} {:>12} {:>10}",
        row.config.description(),
        format_grouped(row.bandwidth_mbs(), 2),
        format_grouped(row.total_iops(), 0),
        format!("{:.1}", row.max_latency_us())
    )
}

/// Print a recorded run with its exceedance outcome and percentiles
pub fn print_run(outcome: &RunOutcome) {
    println!("{}", run_header());
    println!("{}", run_line(&outcome.summary));
    println!();

    for (direction, status, percentiles) in [
        ("Read", &outcome.read_exceedance, &outcome.read_percentiles),
        ("Write", &outcome.write_exceedance, &outcome.write_percentiles),
    ] {
        println!("{}:", direction);
        println!("  Exceedance: {}", status_text(status));
        if !percentiles.is_empty() {
            println!("  Percentiles:");
            for line in percentile_lines(percentiles) {
                println!("    {}", line);
            }
        }
    }
    println!();
}

fn status_text(status: &ExceedanceStatus) -> String {
    match status {
        ExceedanceStatus::Written { path, points } => {
            format!("{} points -> {}", format_number(*points as u64), path.display())
        }
        ExceedanceStatus::Empty => "no IOs".to_string(),
        ExceedanceStatus::Skipped { reason } => format!("skipped ({})", reason),
    }
}

fn percentile_lines(percentiles: &[PercentileValue]) -> Vec<String> {
    percentiles
        .iter()
        .map(|p| format!("p{:<6}: {:.1} us", p.percentile, p.latency_us))
        .collect()
}

/// Print where a merged series went
pub fn print_series_summary(path: &Path, series: &MergedSeries) {
    println!("Series:  {} ({} seconds)", path.display(), format_number(series.len() as u64));
    if let MergedSeries::Throughput(values) = series {
        if !values.is_empty() {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            println!("Mean:    {} IOPS", format_rate(mean));
        }
    }
}

pub fn print_exceedance_summary(path: &Path, table: &ExceedanceTable) {
    println!("Exceedance: {} ({} rows)", path.display(), format_number(table.row_count() as u64));
    println!("Columns:    QD {}", table.labels().join(", "));
}

pub fn print_patch_summary(dest: &Path, summary: &PatchSummary) {
    match fs::metadata(dest) {
        Ok(meta) => println!("Report:       {} ({})", dest.display(), format_bytes(meta.len())),
        Err(_) => println!("Report:       {}", dest.display()),
    }
    println!("Tables:       {}", summary.tables_replaced.join(", "));
    if !summary.tables_missing.is_empty() {
        println!("Not found:    {}", summary.tables_missing.join(", "));
    }
    println!("Placeholders: {}", summary.placeholders_replaced);
    println!("Entries:      {} copied, {} dropped", summary.entries_copied, summary.entries_dropped);
}

pub fn print_append_summary(dest: &Path, summary: &AppendSummary) {
    println!("Report:  {}", dest.display());
    println!("Tables:  {}", summary.tables_added.join(", "));
    println!("Series:  {} added", summary.series_added);
    if summary.legends_added > 0 {
        println!("Legends: {} added", summary.legends_added);
    }
}
