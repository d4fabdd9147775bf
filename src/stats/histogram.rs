//! Latency histograms reported by fio
//!
//! fio emits completion-latency histograms in one of two encodings depending on
//! its version and output format:
//!
//! - **Sparse** (fio >= 2.99, `json+`): `clat_ns.bins` maps a nanosecond latency
//!   to the number of IOs that completed with it. Only nonzero buckets appear.
//! - **Legacy** (older `json+`): `clat.bins` holds a fixed array of
//!   `FIO_IO_U_PLAT_NR` log-scale buckets, described by `FIO_IO_U_PLAT_BITS` and
//!   `FIO_IO_U_PLAT_VAL`. Bucket indexes must be decoded back into microseconds
//!   with [`decode_plat_index`].
//!
//! Both encodings are normalized into [`HistogramShape`] once, at the input
//! boundary, so nothing downstream has to look at raw JSON again.
//!
//! # Example
//!
//! ```
//! use fioreport::stats::histogram::{decode_plat_index, LatencyHistogram};
//!
//! // Linear region: the index is the value
//! assert_eq!(decode_plat_index(50, 6, 64), 50.0);
//!
//! let hist = LatencyHistogram::from_pairs([(10_000, 5), (20_000, 3), (30_000, 2)]);
//! assert_eq!(hist.total_count(), 10);
//! ```

use crate::error::SkippedArtifact;
use crate::Result;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default `FIO_IO_U_PLAT_BITS` used by fio
pub const DEFAULT_PLAT_BITS: u32 = 6;

/// Default `FIO_IO_U_PLAT_VAL` used by fio
pub const DEFAULT_PLAT_VAL: u64 = 64;

/// Largest latency tracked for percentile queries (1 hour in nanoseconds)
const MAX_TRACKABLE_NS: u64 = 3_600_000_000_000;

/// Percentiles reported per direction
pub const REPORTED_PERCENTILES: [f64; 5] = [50.0, 90.0, 99.0, 99.9, 99.99];

/// Decode a legacy fio latency bucket index into the latency it represents
///
/// Indexes below `values_per_group * 2` are stored exactly and returned as-is.
/// Above that, each group of `values_per_group` buckets covers a range twice as
/// wide as the previous group, and the midpoint of the bucket's range is
/// returned.
///
/// # Arguments
///
/// * `index` - Bucket index within `clat.bins`
/// * `bits_per_group` - `FIO_IO_U_PLAT_BITS`
/// * `values_per_group` - `FIO_IO_U_PLAT_VAL` (normally `1 << bits_per_group`)
///
/// # Returns
///
/// The representative latency, in the unit the histogram was recorded in
/// (microseconds for legacy fio).
///
/// # Example
///
/// ```
/// use fioreport::stats::histogram::decode_plat_index;
///
/// assert_eq!(decode_plat_index(127, 6, 64), 127.0);
/// // First bucket of the first doubled group: range [128, 130), midpoint 129
/// assert_eq!(decode_plat_index(128, 6, 64), 129.0);
/// ```
pub fn decode_plat_index(index: u64, bits_per_group: u32, values_per_group: u64) -> f64 {
    if values_per_group == 0 || index < values_per_group.saturating_mul(2) {
        return index as f64;
    }

    // Group number, minus one for the linear region
    let error_bits = index.checked_shr(bits_per_group).unwrap_or(0).saturating_sub(1);
    let base = 2f64.powi((error_bits + bits_per_group as u64) as i32);
    let k = index % values_per_group;

    base + (k as f64 + 0.5) * 2f64.powi(error_bits as i32)
}

/// Sparse latency histogram: latency in nanoseconds -> IO count
///
/// Keys are kept in a `BTreeMap`, so iteration is always in strictly
/// increasing latency order. Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyHistogram {
    buckets: BTreeMap<u64, u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a histogram from `(latency_ns, count)` pairs
    ///
    /// Duplicate keys are summed.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let mut hist = Self::new();
        for (latency_ns, count) in pairs {
            hist.record_n(latency_ns, count);
        }
        hist
    }

    /// Add `count` IOs at `latency_ns`
    pub fn record_n(&mut self, latency_ns: u64, count: u64) {
        if count == 0 {
            return;
        }
        *self.buckets.entry(latency_ns).or_insert(0) += count;
    }

    /// Iterate `(latency_ns, count)` in increasing latency order
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.buckets.iter().map(|(&k, &v)| (k, v))
    }

    /// Number of distinct buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all bucket counts
    pub fn total_count(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Load the buckets into an HdrHistogram for percentile queries
    ///
    /// Values are clamped to 1ns..1h, matching the tracking range.
    pub fn to_hdr(&self) -> Result<Histogram<u64>> {
        let mut hdr = Histogram::<u64>::new_with_bounds(1, MAX_TRACKABLE_NS, 3)
            .map_err(|e| anyhow::anyhow!("Failed to create histogram: {}", e))?;

        for (latency_ns, count) in self.iter() {
            let value = latency_ns.clamp(1, MAX_TRACKABLE_NS);
            hdr.record_n(value, count)
                .map_err(|e| anyhow::anyhow!("Failed to record {}ns x{}: {}", value, count, e))?;
        }

        Ok(hdr)
    }

    /// Latency at the given percentile (0.0 - 100.0)
    ///
    /// Returns `None` for an empty histogram.
    pub fn percentile(&self, percentile: f64) -> Result<Option<Duration>> {
        if self.is_empty() {
            return Ok(None);
        }
        let hdr = self.to_hdr()?;
        Ok(Some(Duration::from_nanos(hdr.value_at_percentile(percentile))))
    }

    /// Latencies at each of [`REPORTED_PERCENTILES`]
    pub fn percentiles(&self) -> Result<Vec<PercentileValue>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let hdr = self.to_hdr()?;
        Ok(REPORTED_PERCENTILES
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                latency_us: hdr.value_at_percentile(p) as f64 / 1000.0,
            })
            .collect())
    }
}

/// One percentile of a latency distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub latency_us: f64,
}

/// Legacy fixed-width log-scale bins (`clat.bins` before fio 2.99)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyBins {
    bits_per_group: u32,
    values_per_group: u64,
    counts: Vec<u64>,
}

impl LegacyBins {
    /// Validate and wrap a legacy bin array
    ///
    /// Rejects parameter combinations whose decoded values would not fit in
    /// the float range used for latency math.
    pub fn new(bits_per_group: u32, values_per_group: u64, counts: Vec<u64>) -> std::result::Result<Self, String> {
        if bits_per_group == 0 || bits_per_group > 16 {
            return Err(format!("FIO_IO_U_PLAT_BITS {} out of range", bits_per_group));
        }
        if values_per_group == 0 {
            return Err("FIO_IO_U_PLAT_VAL is zero".to_string());
        }
        let top_group = (counts.len() as u64) >> bits_per_group;
        if top_group + bits_per_group as u64 > 62 {
            return Err(format!("{} bins too many for {} bits per group", counts.len(), bits_per_group));
        }

        Ok(Self { bits_per_group, values_per_group, counts })
    }

    pub fn bits_per_group(&self) -> u32 {
        self.bits_per_group
    }

    pub fn values_per_group(&self) -> u64 {
        self.values_per_group
    }

    /// Number of bins (`FIO_IO_U_PLAT_NR`)
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(latency_us, count)` in bin order, zero counts included
    pub fn buckets_us(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.counts.iter().enumerate().map(move |(idx, &count)| {
            (decode_plat_index(idx as u64, self.bits_per_group, self.values_per_group), count)
        })
    }
}

/// Completion-latency histogram for one direction of one run
#[derive(Debug, Clone, PartialEq)]
pub enum HistogramShape {
    /// `clat_ns.bins`, nanosecond keys
    Sparse(LatencyHistogram),
    /// `clat.bins`, log-scale buckets in microseconds
    Legacy(LegacyBins),
    /// Plain `json` output, no bucket detail
    Absent,
    /// Bins were present but could not be interpreted
    Unsupported(String),
}

impl HistogramShape {
    /// Buckets as `(latency_us, count)` in increasing latency order
    ///
    /// Zero-count buckets may be included for the legacy encoding.
    pub fn buckets_us(&self) -> std::result::Result<Vec<(f64, u64)>, SkippedArtifact> {
        match self {
            HistogramShape::Sparse(hist) => Ok(hist
                .iter()
                .map(|(ns, count)| (ns as f64 / 1000.0, count))
                .collect()),
            HistogramShape::Legacy(bins) => Ok(bins.buckets_us().collect()),
            HistogramShape::Absent => Err(SkippedArtifact::NoHistogram),
            HistogramShape::Unsupported(reason) => Err(SkippedArtifact::UnsupportedShape(reason.clone())),
        }
    }

    /// Nanosecond histogram for percentile queries, if any bucket detail exists
    pub fn to_latency_histogram(&self) -> Option<LatencyHistogram> {
        match self {
            HistogramShape::Sparse(hist) => Some(hist.clone()),
            HistogramShape::Legacy(bins) => Some(LatencyHistogram::from_pairs(
                bins.buckets_us().map(|(us, count)| ((us * 1000.0).round() as u64, count)),
            )),
            HistogramShape::Absent | HistogramShape::Unsupported(_) => None,
        }
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            HistogramShape::Sparse(_) => "sparse",
            HistogramShape::Legacy(_) => "legacy",
            HistogramShape::Absent => "absent",
            HistogramShape::Unsupported(_) => "unsupported",
        }
    }
}
