//! Statistics derived from fio result artifacts
//!
//! - **histogram**: both fio histogram encodings, legacy bucket decoding, and
//!   HdrHistogram-backed percentiles
//! - **exceedance**: survival curves built from a histogram
//! - **timeseries**: per-second series merged from per-thread logs
//!
//! # Example
//!
//! ```
//! use fioreport::stats::histogram::{HistogramShape, LatencyHistogram};
//! use fioreport::stats::exceedance::build_exceedance;
//!
//! let shape = HistogramShape::Sparse(LatencyHistogram::from_pairs([(10_000, 5), (20_000, 5)]));
//! let curve = build_exceedance(&shape, 10).unwrap();
//! assert_eq!(curve.pairs(), vec![(10.0, 0.5), (20.0, 0.0)]);
//! ```

pub mod exceedance;
pub mod histogram;
pub mod timeseries;

pub use exceedance::{build_exceedance, ExceedanceCurve, ExceedancePoint};
pub use histogram::{decode_plat_index, HistogramShape, LatencyHistogram, LegacyBins, PercentileValue};
pub use timeseries::{Direction, MergedSeries, SeriesKind, ThreadLogSample, TimeSeriesMerger};
