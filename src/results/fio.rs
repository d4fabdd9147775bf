//! fio JSON / JSON+ result schema
//!
//! Only the fields the report needs are modeled. The histogram is decoded here,
//! once, into a [`HistogramShape`]; nothing past this module sees raw JSON.
//!
//! Units differ between fio generations:
//!
//! | fio       | mean latency       | histogram                       |
//! |-----------|--------------------|---------------------------------|
//! | >= 2.99   | `lat_ns.mean` (ns) | `clat_ns.bins`, ns keys         |
//! | older     | `lat.mean` (us)    | `clat.bins`, `FIO_IO_U_PLAT_*`  |

use crate::stats::histogram::{HistogramShape, LatencyHistogram, LegacyBins};
use crate::Result;
use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(rename = "fio version", default)]
    fio_version: Option<String>,
    #[serde(default)]
    jobs: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(default)]
    jobname: String,
    read: RawDirection,
    write: RawDirection,
}

#[derive(Debug, Default, Deserialize)]
struct RawDirection {
    #[serde(default)]
    iops: f64,
    #[serde(default)]
    total_ios: u64,
    lat_ns: Option<RawLatency>,
    lat: Option<RawLatency>,
    clat_ns: Option<RawCompletion>,
    clat: Option<RawCompletion>,
}

#[derive(Debug, Deserialize)]
struct RawLatency {
    #[serde(default)]
    mean: f64,
}

#[derive(Debug, Deserialize)]
struct RawCompletion {
    bins: Option<Map<String, Value>>,
}

/// Parsed result of one fio run (first job; ezfio runs use group_reporting)
#[derive(Debug, Clone, PartialEq)]
pub struct FioResult {
    pub fio_version: Option<String>,
    pub job_name: String,
    pub read: DirectionResult,
    pub write: DirectionResult,
}

/// Statistics for one IO direction
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionResult {
    pub iops: f64,
    pub total_ios: u64,
    /// Mean total latency in microseconds
    pub mean_latency_us: f64,
    pub histogram: HistogramShape,
}

impl DirectionResult {
    fn from_raw(raw: RawDirection) -> Self {
        let mean_latency_us = match (&raw.lat_ns, &raw.lat) {
            (Some(ns), _) => ns.mean / 1000.0,
            (None, Some(us)) => us.mean,
            (None, None) => 0.0,
        };
        let histogram = histogram_shape(&raw);

        Self {
            iops: raw.iops,
            total_ios: raw.total_ios,
            mean_latency_us,
            histogram,
        }
    }
}

fn histogram_shape(raw: &RawDirection) -> HistogramShape {
    if let Some(bins) = raw.clat_ns.as_ref().and_then(|c| c.bins.as_ref()) {
        return sparse_shape(bins);
    }
    if let Some(bins) = raw.clat.as_ref().and_then(|c| c.bins.as_ref()) {
        return legacy_shape(bins);
    }
    HistogramShape::Absent
}

fn sparse_shape(bins: &Map<String, Value>) -> HistogramShape {
    let mut hist = LatencyHistogram::new();
    for (key, value) in bins {
        let Ok(latency_ns) = key.parse::<u64>() else {
            return HistogramShape::Unsupported(format!("non-numeric bucket key '{}'", key));
        };
        let Some(count) = value.as_u64() else {
            return HistogramShape::Unsupported(format!("bucket {} has count {}", key, value));
        };
        hist.record_n(latency_ns, count);
    }
    HistogramShape::Sparse(hist)
}

fn legacy_shape(bins: &Map<String, Value>) -> HistogramShape {
    let param = |name: &str| bins.get(name).and_then(Value::as_u64);

    let (Some(bits), Some(values), Some(nr)) = (
        param("FIO_IO_U_PLAT_BITS"),
        param("FIO_IO_U_PLAT_VAL"),
        param("FIO_IO_U_PLAT_NR"),
    ) else {
        return HistogramShape::Unsupported("clat.bins without FIO_IO_U_PLAT_* parameters".to_string());
    };

    // every bucket is its own key, so a larger count cannot be satisfied
    if usize::try_from(nr).map_or(true, |n| n > bins.len()) {
        return HistogramShape::Unsupported(format!("FIO_IO_U_PLAT_NR {} exceeds the {} bins present", nr, bins.len()));
    }

    let mut counts = Vec::new();
    for idx in 0..nr {
        match bins.get(&idx.to_string()).and_then(Value::as_u64) {
            Some(count) => counts.push(count),
            None => return HistogramShape::Unsupported(format!("legacy bucket {} missing", idx)),
        }
    }

    match u32::try_from(bits).map_err(|e| e.to_string()).and_then(|b| LegacyBins::new(b, values, counts)) {
        Ok(legacy) => HistogramShape::Legacy(legacy),
        Err(reason) => HistogramShape::Unsupported(reason),
    }
}

/// Parse fio's JSON output
///
/// fio sometimes prints warnings before the JSON document, so anything before
/// the first `{` is ignored.
pub fn parse_fio_output(text: &str) -> Result<FioResult> {
    let start = text.find('{').context("No JSON object in fio output")?;
    let raw: RawOutput = serde_json::from_str(&text[start..])
        .context("Failed to parse fio JSON output")?;

    let job = raw.jobs.into_iter().next().context("fio output contains no jobs")?;
    let read = DirectionResult::from_raw(job.read);
    let write = DirectionResult::from_raw(job.write);

    debug!(
        job = %job.jobname,
        read_hist = read.histogram.kind(),
        write_hist = write.histogram.kind(),
        "parsed fio result"
    );

    Ok(FioResult {
        fio_version: raw.fio_version,
        job_name: job.jobname,
        read,
        write,
    })
}

/// Read and parse a fio output file
pub fn read_fio_output(path: &Path) -> Result<FioResult> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fio output: {}", path.display()))?;
    parse_fio_output(&text)
        .with_context(|| format!("Failed to parse fio output: {}", path.display()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// fio 3.x json+ output trimmed to the fields used here
    pub(crate) const JSON_PLUS: &str = r#"{
  "fio version" : "fio-3.36",
  "jobs" : [
    {
      "jobname" : "test",
      "read" : {
        "iops" : 7000.25,
        "total_ios" : 10,
        "lat_ns" : { "min" : 9000, "max" : 31000, "mean" : 15500.0 },
        "clat_ns" : {
          "mean" : 15000.0,
          "bins" : { "20000" : 3, "10000" : 5, "30000" : 2 }
        }
      },
      "write" : {
        "iops" : 3000.0,
        "total_ios" : 4,
        "lat_ns" : { "mean" : 42000.0 },
        "clat_ns" : { "bins" : { "40000" : 4 } }
      }
    }
  ]
}"#;

    #[test]
    fn test_parse_json_plus() {
        let result = parse_fio_output(JSON_PLUS).unwrap();
        assert_eq!(result.fio_version.as_deref(), Some("fio-3.36"));
        assert_eq!(result.job_name, "test");
        assert_eq!(result.read.iops, 7000.25);
        assert_eq!(result.read.total_ios, 10);
        assert_eq!(result.read.mean_latency_us, 15.5);
        assert_eq!(result.write.mean_latency_us, 42.0);

        match &result.read.histogram {
            HistogramShape::Sparse(hist) => {
                assert_eq!(hist.iter().collect::<Vec<_>>(), vec![(10_000, 5), (20_000, 3), (30_000, 2)]);
            }
            other => panic!("expected sparse histogram, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_legacy_json_plus() {
        let mut bins = serde_json::Map::new();
        bins.insert("FIO_IO_U_PLAT_BITS".into(), 6.into());
        bins.insert("FIO_IO_U_PLAT_VAL".into(), 64.into());
        bins.insert("FIO_IO_U_PLAT_NR".into(), 200.into());
        for idx in 0..200u64 {
            let count = if idx == 50 || idx == 129 { 2 } else { 0 };
            bins.insert(idx.to_string(), count.into());
        }
        let doc = serde_json::json!({
            "fio version": "fio-2.2.10",
            "jobs": [{
                "jobname": "test",
                "read": { "iops": 100, "total_ios": 4, "lat": { "mean": 88.5 }, "clat": { "bins": bins } },
                "write": { "iops": 0, "total_ios": 0, "lat": { "mean": 0.0 } }
            }]
        });

        let result = parse_fio_output(&doc.to_string()).unwrap();
        assert_eq!(result.read.iops, 100.0);
        assert_eq!(result.read.mean_latency_us, 88.5);
        match &result.read.histogram {
            HistogramShape::Legacy(legacy) => assert_eq!(legacy.len(), 200),
            other => panic!("expected legacy histogram, got {:?}", other),
        }
        assert_eq!(result.write.histogram, HistogramShape::Absent);
    }

    #[test]
    fn test_plain_json_has_no_histogram() {
        let text = r#"{"fio version":"fio-3.1","jobs":[{"jobname":"t",
            "read":{"iops":1.0,"total_ios":5,"lat_ns":{"mean":1000.0}},
            "write":{"iops":0.0,"total_ios":0,"lat_ns":{"mean":0.0}}}]}"#;
        let result = parse_fio_output(text).unwrap();
        assert_eq!(result.read.histogram, HistogramShape::Absent);
        assert_eq!(result.read.mean_latency_us, 1.0);
    }

    #[test]
    fn test_leading_warnings_ignored() {
        let text = format!("fio: note: both iodepth >= 1 and synchronous I/O engine\n{}", JSON_PLUS);
        assert!(parse_fio_output(&text).is_ok());
    }

    #[test]
    fn test_unsupported_bins() {
        let text = r#"{"jobs":[{"read":{"total_ios":1,"clat_ns":{"bins":{"fast":1}}},
            "write":{"total_ios":1,"clat":{"bins":{"0":1}}}}]}"#;
        let result = parse_fio_output(text).unwrap();
        assert!(matches!(result.read.histogram, HistogramShape::Unsupported(_)));
        assert!(matches!(result.write.histogram, HistogramShape::Unsupported(_)));
    }

    #[test]
    fn test_legacy_missing_bucket() {
        let text = r#"{"jobs":[{"read":{"total_ios":1,"clat":{"bins":{
            "FIO_IO_U_PLAT_BITS":6,"FIO_IO_U_PLAT_VAL":64,"FIO_IO_U_PLAT_NR":3,"0":1,"2":0}}},
            "write":{}}]}"#;
        let result = parse_fio_output(text).unwrap();
        match result.read.histogram {
            HistogramShape::Unsupported(reason) => assert!(reason.contains("bucket 1")),
            other => panic!("expected unsupported histogram, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_bucket_count_beyond_bins() {
        let text = r#"{"jobs":[{"read":{"total_ios":1,"clat":{"bins":{
            "FIO_IO_U_PLAT_BITS":6,"FIO_IO_U_PLAT_VAL":64,"FIO_IO_U_PLAT_NR":1000000000000000000,"0":1}}},
            "write":{}}]}"#;
        let result = parse_fio_output(text).unwrap();
        match result.read.histogram {
            HistogramShape::Unsupported(reason) => assert!(reason.contains("FIO_IO_U_PLAT_NR")),
            other => panic!("expected unsupported histogram, got {:?}", other),
        }
    }

    #[test]
    fn test_not_json() {
        assert!(parse_fio_output("fio: failed to open /dev/sdz").is_err());
        assert!(parse_fio_output(r#"{"jobs": []}"#).is_err());
    }
}
