//! CSV output formatting
//!
//! Every table CSV handed to the report starts with the device identity block
//! so that a stray file in the details directory can still be traced back to
//! the system it came from.

use crate::config::DeviceInfo;
use crate::stats::timeseries::MergedSeries;
use crate::Result;
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Column header of the `Tests` table
pub const TESTS_COLUMN_HEADER: &str =
    "Type,Write %,Block Size,Threads,Queue Depth/Thread,IOPS,Bandwidth (MB/s),Read Latency (us),Write Latency (us)";

/// Write the device identity block
pub fn write_info_header<W: Write>(out: &mut W, device: &DeviceInfo) -> std::io::Result<()> {
    writeln!(out, "Drive,{}", device.drive)?;
    writeln!(out, "Model,{}", device.model)?;
    writeln!(out, "Serial,{}", device.serial)?;
    writeln!(out, "AvailCapacity,{},GiB", device.avail_capacity_gib)?;
    writeln!(out, "TestedCapacity,{},GiB", device.tested_capacity_gib)?;
    writeln!(out, "CPU,{}", device.cpu)?;
    writeln!(out, "Cores,{}", device.cores)?;
    writeln!(out, "Frequency,{}", device.frequency_mhz)?;
    writeln!(out, "OS,{}", device.os)?;
    writeln!(out, "FIOVersion,{}", device.fio_version)?;
    Ok(())
}

/// Line-oriented CSV writer
pub struct CsvWriter {
    path: PathBuf,
    file: BufWriter<File>,
}

impl CsvWriter {
    /// Create (truncate) a CSV with the info header and a column header
    pub fn create(path: &Path, device: &DeviceInfo, column_header: &str) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
        let mut writer = Self { path: path.to_path_buf(), file: BufWriter::new(file) };
        writer.write_header(device, column_header)?;
        Ok(writer)
    }

    /// Open for appending, writing the headers first if the file is new
    pub fn open_or_create(path: &Path, device: &DeviceInfo, column_header: &str) -> Result<Self> {
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open CSV: {}", path.display()))?;

        let mut writer = Self { path: path.to_path_buf(), file: BufWriter::new(file) };
        if is_new {
            writer.write_header(device, column_header)?;
        }
        Ok(writer)
    }

    fn write_header(&mut self, device: &DeviceInfo, column_header: &str) -> Result<()> {
        write_info_header(&mut self.file, device)
            .and_then(|_| writeln!(self.file, "{}", column_header))
            .with_context(|| format!("Failed to write CSV header: {}", self.path.display()))
    }

    /// Append one pre-formatted row
    pub fn write_row(&mut self, row: &str) -> Result<()> {
        writeln!(self.file, "{}", row)
            .with_context(|| format!("Failed to write CSV row: {}", self.path.display()))
    }

    /// Flush buffered rows
    pub fn finish(mut self) -> Result<()> {
        self.file
            .flush()
            .with_context(|| format!("Failed to flush CSV: {}", self.path.display()))
    }
}

impl Drop for CsvWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

/// Write a merged per-second series
///
/// With `append`, rows go to the end of an existing file (headers are only
/// written when the file does not exist yet).
pub fn write_series_csv(path: &Path, device: &DeviceInfo, series: &MergedSeries, append: bool) -> Result<()> {
    let mut writer = if append {
        CsvWriter::open_or_create(path, device, series.header())?
    } else {
        CsvWriter::create(path, device, series.header())?
    };
    for row in series.rows() {
        writer.write_row(&row)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn device() -> DeviceInfo {
        DeviceInfo {
            drive: "/dev/nvme0n1".into(),
            model: "EXAMPLE".into(),
            serial: "S1".into(),
            avail_capacity_gib: 100,
            tested_capacity_gib: 50,
            cpu: "Xeon".into(),
            cores: 8,
            frequency_mhz: 3000,
            os: "Linux".into(),
            fio_version: "fio-3.36".into(),
        }
    }

    #[test]
    fn test_info_header() {
        let mut out = Vec::new();
        write_info_header(&mut out, &device()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[3], "AvailCapacity,100,GiB");
        assert_eq!(lines[4], "TestedCapacity,50,GiB");
        assert_eq!(lines[9], "FIOVersion,fio-3.36");
    }

    #[test]
    fn test_open_or_create_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");

        let mut w = CsvWriter::open_or_create(&path, &device(), "A,B").unwrap();
        w.write_row("1,2").unwrap();
        w.finish().unwrap();
        let mut w = CsvWriter::open_or_create(&path, &device(), "A,B").unwrap();
        w.write_row("3,4").unwrap();
        w.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("A,B").count(), 1);
        assert!(text.ends_with("A,B\n1,2\n3,4\n"));
    }

    #[test]
    fn test_series_csv_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("series.csv");
        let series = MergedSeries::Throughput(vec![150.0, 250.0]);

        write_series_csv(&path, &device(), &series, false).unwrap();
        write_series_csv(&path, &device(), &series, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("IOPS\n150\n250\n150\n250\n"));

        write_series_csv(&path, &device(), &series, false).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("IOPS\n150\n250\n"));
    }
}
