//! Latency exceedance (survival) curves
//!
//! An exceedance curve answers "what fraction of IOs took longer than X?" for
//! every latency X present in the histogram. Each point is emitted after its own
//! bucket has been counted, so the slowest bucket always ends the curve at 0.0.
//! This rule is the same for the sparse and legacy encodings.

use crate::error::SkippedArtifact;
use crate::stats::histogram::HistogramShape;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One point of an exceedance curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExceedancePoint {
    /// Latency in microseconds
    pub latency_us: f64,
    /// Fraction of IOs slower than `latency_us`, in [0, 1]
    pub survival: f64,
}

/// Survival curve for one direction of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceedanceCurve {
    points: Vec<ExceedancePoint>,
}

impl ExceedanceCurve {
    pub fn points(&self) -> &[ExceedancePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(latency, fraction)` pairs, mostly for tests and logging
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.latency_us, p.survival)).collect()
    }

    /// Write one `latency,fraction` line per point
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for p in &self.points {
            writeln!(out, "{},{}", p.latency_us, p.survival)?;
        }
        Ok(())
    }

    /// Write the curve as a two-column CSV, replacing any existing file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create exceedance file: {}", path.display()))?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out)
            .and_then(|_| out.flush())
            .with_context(|| format!("Failed to write exceedance file: {}", path.display()))
    }
}

/// Build the exceedance curve for one direction
///
/// # Arguments
///
/// * `shape` - The direction's histogram as parsed from fio output
/// * `total_ios` - fio's `total_ios` for the same direction
///
/// # Returns
///
/// * `Ok(curve)` - possibly empty when `total_ios` is zero
/// * `Err(SkippedArtifact)` - no usable histogram; the caller omits this
///   run's exceedance output and carries on
pub fn build_exceedance(shape: &HistogramShape, total_ios: u64) -> std::result::Result<ExceedanceCurve, SkippedArtifact> {
    let buckets = shape.buckets_us()?;
    curve_from_buckets(buckets, total_ios)
}

/// Build a curve from `(latency_us, count)` buckets in increasing latency order
pub fn curve_from_buckets<I>(buckets: I, total_ios: u64) -> std::result::Result<ExceedanceCurve, SkippedArtifact>
where
    I: IntoIterator<Item = (f64, u64)>,
{
    if total_ios == 0 {
        return Ok(ExceedanceCurve::default());
    }

    let mut points = Vec::new();
    let mut running: u64 = 0;
    let mut last_latency = f64::NEG_INFINITY;

    for (latency_us, count) in buckets {
        if count == 0 {
            continue;
        }
        if latency_us <= last_latency {
            return Err(SkippedArtifact::Malformed(format!(
                "bucket {} not above previous bucket {}",
                latency_us, last_latency
            )));
        }
        running = running.saturating_add(count);
        if running > total_ios {
            return Err(SkippedArtifact::Malformed(format!(
                "bucket counts exceed total_ios {}",
                total_ios
            )));
        }

        points.push(ExceedancePoint {
            latency_us,
            survival: (total_ios - running) as f64 / total_ios as f64,
        });
        last_latency = latency_us;
    }

    Ok(ExceedanceCurve { points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::histogram::{LatencyHistogram, LegacyBins};
    use tempfile::TempDir;

    #[test]
    fn test_survival_includes_terminal_bucket() {
        let curve = curve_from_buckets([(10.0, 5), (20.0, 3), (30.0, 2)], 10).unwrap();
        assert_eq!(curve.pairs(), vec![(10.0, 0.5), (20.0, 0.2), (30.0, 0.0)]);
    }

    #[test]
    fn test_zero_total_is_empty_curve() {
        let curve = curve_from_buckets([(10.0, 0), (20.0, 0)], 0).unwrap();
        assert!(curve.is_empty());

        let shape = HistogramShape::Sparse(LatencyHistogram::new());
        assert!(build_exceedance(&shape, 0).unwrap().is_empty());
    }

    #[test]
    fn test_zero_count_buckets_skipped() {
        let curve = curve_from_buckets([(1.0, 0), (2.0, 4), (3.0, 0), (4.0, 4)], 8).unwrap();
        assert_eq!(curve.pairs(), vec![(2.0, 0.5), (4.0, 0.0)]);
    }

    #[test]
    fn test_counts_above_total_are_malformed() {
        let err = curve_from_buckets([(1.0, 6), (2.0, 6)], 10).unwrap_err();
        assert!(matches!(err, SkippedArtifact::Malformed(_)));
    }

    #[test]
    fn test_sparse_shape_converts_ns_to_us() {
        let shape = HistogramShape::Sparse(LatencyHistogram::from_pairs([(10_000, 5), (20_000, 3), (30_000, 2)]));
        let curve = build_exceedance(&shape, 10).unwrap();
        assert_eq!(curve.pairs(), vec![(10.0, 0.5), (20.0, 0.2), (30.0, 0.0)]);
    }

    #[test]
    fn test_legacy_shape_decodes_indexes() {
        let mut counts = vec![0u64; 200];
        counts[50] = 2;
        counts[129] = 2;
        let shape = HistogramShape::Legacy(LegacyBins::new(6, 64, counts).unwrap());
        let curve = build_exceedance(&shape, 4).unwrap();
        assert_eq!(curve.pairs(), vec![(50.0, 0.5), (131.0, 0.0)]);
    }

    #[test]
    fn test_absent_shape_is_skipped() {
        assert_eq!(build_exceedance(&HistogramShape::Absent, 100), Err(SkippedArtifact::NoHistogram));
    }

    #[test]
    fn test_survival_is_non_increasing() {
        let buckets: Vec<(f64, u64)> = (1..=50).map(|i| (i as f64 * 1.5, (i % 7) as u64)).collect();
        let total: u64 = buckets.iter().map(|b| b.1).sum();
        let curve = curve_from_buckets(buckets, total).unwrap();
        for w in curve.points().windows(2) {
            assert!(w[0].latency_us < w[1].latency_us);
            assert!(w[0].survival >= w[1].survival);
        }
        assert!(curve.points().iter().all(|p| (0.0..=1.0).contains(&p.survival)));
    }

    #[test]
    fn test_write_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.exc.read.csv");
        let curve = curve_from_buckets([(10.0, 5), (20.5, 5)], 10).unwrap();
        curve.write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10,0.5\n20.5,0\n");
    }
}
