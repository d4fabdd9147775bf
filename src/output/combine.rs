//! Side-by-side exceedance table
//!
//! Each configuration's read and write exceedance CSVs have their own length.
//! The combiner walks all of them in lock step, one line per stream per row,
//! padding exhausted streams with blank cells until every stream runs dry.

use crate::config::{DeviceInfo, ExceedanceLayout};
use crate::output::csv::write_info_header;
use crate::results::summary::RunConfig;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One configuration's column group
struct Column {
    label: String,
    read: Option<Box<dyn BufRead>>,
    write: Option<Box<dyn BufRead>>,
}

/// Lays several configurations' exceedance streams side by side
#[derive(Default)]
pub struct ExceedanceCombiner {
    columns: Vec<Column>,
}

impl ExceedanceCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column group; `None` streams behave as already exhausted
    pub fn add_column<R, W>(&mut self, label: impl Into<String>, read: Option<R>, write: Option<W>)
    where
        R: BufRead + 'static,
        W: BufRead + 'static,
    {
        self.columns.push(Column {
            label: label.into(),
            read: read.map(|r| Box::new(r) as Box<dyn BufRead>),
            write: write.map(|w| Box::new(w) as Box<dyn BufRead>),
        });
    }

    /// Add a column group from files; a file that cannot be opened is treated
    /// as an empty stream
    pub fn add_files(&mut self, label: impl Into<String>, read: &Path, write: &Path) {
        self.add_column(label, open_optional(read), open_optional(write));
    }

    /// Column groups for every thread count of a layout
    pub fn for_layout(layout: &ExceedanceLayout, details_dir: &Path, drive_base: &str) -> Self {
        let mut combiner = Self::new();
        for &threads in &layout.threads {
            let run = RunConfig {
                pattern: layout.pattern,
                write_pct: layout.write_pct,
                block_size: layout.block_size,
                threads,
                iodepth: layout.iodepth,
            };
            combiner.add_files(
                threads.to_string(),
                &run.exceedance_path(details_dir, drive_base, "read"),
                &run.exceedance_path(details_dir, drive_base, "write"),
            );
        }
        combiner
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consume every stream and build the table
    pub fn combine(mut self) -> Result<ExceedanceTable> {
        let mut rows = Vec::new();
        loop {
            let mut all_empty = true;
            let mut row = String::new();
            for column in &mut self.columns {
                for stream in [&mut column.read, &mut column.write] {
                    let line = next_line(stream)
                        .with_context(|| format!("Failed to read exceedance stream for {}", column.label))?;
                    if line.is_empty() {
                        row.push_str(",,");
                    } else {
                        all_empty = false;
                        row.push_str(&line);
                        row.push(',');
                    }
                }
                row.push(',');
            }
            if all_empty {
                break;
            }
            rows.push(row);
        }

        debug!(columns = self.columns.len(), rows = rows.len(), "exceedance streams combined");
        Ok(ExceedanceTable {
            labels: self.columns.into_iter().map(|c| c.label).collect(),
            rows,
        })
    }
}

fn open_optional(path: &Path) -> Option<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Some(BufReader::new(file)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "exceedance file unavailable");
            None
        }
    }
}

/// Next trimmed line, or an empty string once the stream is exhausted
fn next_line(stream: &mut Option<Box<dyn BufRead>>) -> std::io::Result<String> {
    let Some(reader) = stream.as_mut() else {
        return Ok(String::new());
    };
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        *stream = None;
    }
    Ok(line.trim().to_string())
}

/// Combined exceedance table, ready to be written as CSV
#[derive(Debug, Clone, PartialEq)]
pub struct ExceedanceTable {
    labels: Vec<String>,
    rows: Vec<String>,
}

impl ExceedanceTable {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Data rows, without the two header lines
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The two column header lines
    pub fn header_lines(&self) -> (String, String) {
        let mut titles = String::new();
        let mut units = String::new();
        for label in &self.labels {
            titles.push_str(&format!("QD{0} Read Exceedance,,QD{0} Write Exceedance,,,", label));
            units.push_str("rdusec,rdpct,wrusec,wrpct,,");
        }
        (titles, units)
    }

    pub fn write_to<W: Write>(&self, out: &mut W, device: &DeviceInfo) -> std::io::Result<()> {
        write_info_header(out, device)?;
        let (titles, units) = self.header_lines();
        writeln!(out, "{}", titles)?;
        writeln!(out, "{}", units)?;
        for row in &self.rows {
            writeln!(out, "{}", row)?;
        }
        Ok(())
    }

    /// Write the table, replacing any existing file
    pub fn write_csv(&self, path: &Path, device: &DeviceInfo) -> Result<PathBuf> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create exceedance table: {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out, device)
            .and_then(|_| out.flush())
            .with_context(|| format!("Failed to write exceedance table: {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}
