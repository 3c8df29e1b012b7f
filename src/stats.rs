//! Statistics tracking for the relay pipeline.
//!
//! Counts datagrams through each pipeline stage, accepted QSOs broken down
//! by band and mode, and submission outcomes with a latency histogram.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::record::QsoRecord;

/// Thread-safe statistics collector for the relay.
#[derive(Debug)]
pub struct RelayStats {
    /// Total datagrams received on the socket
    pub datagrams_received: AtomicU64,

    /// Datagrams that were empty or whitespace-only
    pub empty_datagrams: AtomicU64,

    /// Datagrams that decoded under neither interpretation
    pub parse_failures: AtomicU64,

    /// Records missing a required field
    pub validation_failures: AtomicU64,

    /// Records with a band or mode outside the supported enumerations
    pub mapping_failures: AtomicU64,

    /// QSOs that passed the whole pipeline and were handed to the submitter
    pub qsos_accepted: AtomicU64,

    /// Submissions LdA confirmed
    pub submissions_ok: AtomicU64,

    /// Submissions rejected or failed in transport
    pub submissions_failed: AtomicU64,

    /// Socket bind failures (each one schedules a retry)
    pub bind_failures: AtomicU64,

    /// Total bytes of raw input processed
    pub bytes_received: AtomicU64,

    /// Histogram of submission round-trip latency in milliseconds
    latency_histogram: RwLock<Histogram<u64>>,

    /// Accepted QSOs per band
    qsos_by_band: RwLock<HashMap<String, u64>>,

    /// Accepted QSOs per mode
    qsos_by_mode: RwLock<HashMap<String, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl RelayStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            empty_datagrams: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            mapping_failures: AtomicU64::new(0),
            qsos_accepted: AtomicU64::new(0),
            submissions_ok: AtomicU64::new(0),
            submissions_failed: AtomicU64::new(0),
            bind_failures: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            // Latency histogram: 1 ms to 60 s, matching the submit timeout
            latency_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 60_000, 3)
                    .expect("Failed to create latency histogram"),
            ),
            qsos_by_band: RwLock::new(HashMap::new()),
            qsos_by_mode: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one received datagram of the given size.
    pub fn record_datagram(&self, bytes: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an empty datagram dropped before parsing.
    pub fn record_empty(&self) {
        self.empty_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram that failed to parse.
    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record dropped for a missing required field.
    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record dropped for an unsupported band or mode.
    pub fn record_mapping_failure(&self) {
        self.mapping_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bind failure.
    pub fn record_bind_failure(&self) {
        self.bind_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a QSO accepted by the pipeline.
    pub fn record_qso(&self, qso: &QsoRecord) {
        self.qsos_accepted.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut map) = self.qsos_by_band.write() {
            *map.entry(qso.band.clone()).or_insert(0) += 1;
        }
        if let Ok(mut map) = self.qsos_by_mode.write() {
            *map.entry(qso.mode.clone()).or_insert(0) += 1;
        }
    }

    /// Record a confirmed submission and its round-trip latency.
    pub fn record_submission_ok(&self, latency: Duration) {
        self.submissions_ok.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    /// Record a failed submission and its round-trip latency.
    pub fn record_submission_failed(&self, latency: Duration) {
        self.submissions_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut hist) = self.latency_histogram.write() {
            let millis = (latency.as_millis() as u64).clamp(1, 59_999);
            let _ = hist.record(millis);
        }
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generate a summary report.
    pub fn summary(&self) -> RelaySummary {
        let latency_percentiles = self
            .latency_histogram
            .read()
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        let qsos_by_band = self
            .qsos_by_band
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        let qsos_by_mode = self
            .qsos_by_mode
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();

        RelaySummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            empty_datagrams: self.empty_datagrams.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            mapping_failures: self.mapping_failures.load(Ordering::Relaxed),
            qsos_accepted: self.qsos_accepted.load(Ordering::Relaxed),
            submissions_ok: self.submissions_ok.load(Ordering::Relaxed),
            submissions_failed: self.submissions_failed.load(Ordering::Relaxed),
            bind_failures: self.bind_failures.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            latency_percentiles,
            qsos_by_band,
            qsos_by_mode,
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RelaySummary {
    pub elapsed_secs: f64,
    pub datagrams_received: u64,
    pub empty_datagrams: u64,
    pub parse_failures: u64,
    pub validation_failures: u64,
    pub mapping_failures: u64,
    pub qsos_accepted: u64,
    pub submissions_ok: u64,
    pub submissions_failed: u64,
    pub bind_failures: u64,
    pub bytes_received: u64,
    pub latency_percentiles: Option<HistogramPercentiles>,
    pub qsos_by_band: HashMap<String, u64>,
    pub qsos_by_mode: HashMap<String, u64>,
}

impl std::fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                 LDA RELAY STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Datagrams received: {}", self.datagrams_received)?;
        writeln!(f, "Empty datagrams: {}", self.empty_datagrams)?;
        writeln!(f, "Parse failures: {}", self.parse_failures)?;
        writeln!(f, "Validation failures: {}", self.validation_failures)?;
        writeln!(f, "Mapping failures: {}", self.mapping_failures)?;
        writeln!(f, "QSOs accepted: {}", self.qsos_accepted)?;
        writeln!(
            f,
            "Submissions: {} ok, {} failed",
            self.submissions_ok, self.submissions_failed
        )?;
        writeln!(f, "Bind failures: {}", self.bind_failures)?;
        writeln!(f, "Bytes received: {}", self.bytes_received)?;
        writeln!(f)?;

        if let Some(ref p) = self.latency_percentiles {
            writeln!(f, "Submission Latency (ms):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if !self.qsos_by_band.is_empty() {
            writeln!(f, "QSOs by Band:")?;
            let mut bands: Vec<_> = self.qsos_by_band.iter().collect();
            bands.sort_by(|a, b| b.1.cmp(a.1));
            for (band, count) in bands {
                writeln!(f, "  {}: {}", band, count)?;
            }
            writeln!(f)?;
        }

        if !self.qsos_by_mode.is_empty() {
            writeln!(f, "QSOs by Mode:")?;
            let mut modes: Vec<_> = self.qsos_by_mode.iter().collect();
            modes.sort_by(|a, b| b.1.cmp(a.1));
            for (mode, count) in modes {
                writeln!(f, "  {}: {}", mode, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_qso() -> QsoRecord {
        QsoRecord {
            call: "LU5WSO".to_string(),
            band: "40m".to_string(),
            mode: "CW".to_string(),
            date: "15/01/2024".to_string(),
            time: "1430".to_string(),
            rst_sent: "59".to_string(),
            comment: String::new(),
            station_callsign: "LU9XYZ".to_string(),
            prop_mode: None,
        }
    }

    #[test]
    fn test_record_qso() {
        let stats = RelayStats::new();
        stats.record_qso(&make_test_qso());

        assert_eq!(stats.qsos_accepted.load(Ordering::Relaxed), 1);

        let summary = stats.summary();
        assert_eq!(summary.qsos_by_band.get("40m"), Some(&1));
        assert_eq!(summary.qsos_by_mode.get("CW"), Some(&1));
    }

    #[test]
    fn test_summary_counters() {
        let stats = RelayStats::new();

        stats.record_datagram(120);
        stats.record_datagram(80);
        stats.record_empty();
        stats.record_parse_failure();
        stats.record_validation_failure();
        stats.record_mapping_failure();
        stats.record_bind_failure();
        stats.record_qso(&make_test_qso());
        stats.record_submission_ok(Duration::from_millis(250));
        stats.record_submission_failed(Duration::from_millis(900));

        let summary = stats.summary();
        assert_eq!(summary.datagrams_received, 2);
        assert_eq!(summary.bytes_received, 200);
        assert_eq!(summary.empty_datagrams, 1);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.validation_failures, 1);
        assert_eq!(summary.mapping_failures, 1);
        assert_eq!(summary.bind_failures, 1);
        assert_eq!(summary.qsos_accepted, 1);
        assert_eq!(summary.submissions_ok, 1);
        assert_eq!(summary.submissions_failed, 1);
    }

    #[test]
    fn test_latency_percentiles() {
        let stats = RelayStats::new();
        assert!(stats.summary().latency_percentiles.is_none());

        for millis in [100u64, 200, 300, 400] {
            stats.record_submission_ok(Duration::from_millis(millis));
        }

        let percentiles = stats.summary().latency_percentiles.unwrap();
        assert!(percentiles.min >= 100 && percentiles.min <= 101);
        assert!(percentiles.max >= 400 && percentiles.max <= 401);
    }

    #[test]
    fn test_display_summary() {
        let stats = RelayStats::new();
        stats.record_qso(&make_test_qso());

        let rendered = stats.summary().to_string();
        assert!(rendered.contains("QSOs accepted: 1"));
        assert!(rendered.contains("40m: 1"));
    }
}
