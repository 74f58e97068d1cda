//! Run statistics for trace extraction.
//!
//! Counts what the capture reader saw across every archive of a run:
//! - Archives and records read
//! - Records filtered out (not IPv4)
//! - Packets extracted into the locality sequence, and their bytes
//! - Distinct flows
//! - Timing information
//!
//! # Thread Safety
//!
//! `TraceStats` is updated by a single reader; it has no interior locking.

use crate::log::Logger;
use std::time::{Duration, Instant};

/// Statistics for one extraction run.
#[derive(Debug, Clone)]
pub struct TraceStats {
    // === Timing ===
    /// When the run started
    pub start_time: Instant,

    /// When the run ended (set on completion)
    pub end_time: Option<Instant>,

    // === Input ===
    /// Archives fully read
    pub archives_read: u64,

    /// Records read from all archives
    pub records_read: u64,

    /// Records skipped because they were not IPv4
    pub records_filtered: u64,

    // === Output ===
    /// Packets added to the locality sequence
    pub packets_extracted: u64,

    /// Sum of original wire lengths of extracted packets
    pub bytes: u64,

    /// Distinct 5-tuples seen
    pub distinct_flows: u64,
}

impl TraceStats {
    /// Create statistics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            archives_read: 0,
            records_read: 0,
            records_filtered: 0,
            packets_extracted: 0,
            bytes: 0,
            distinct_flows: 0,
        }
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Fraction of records that were filtered out.
    pub fn filter_rate(&self) -> f64 {
        if self.records_read == 0 {
            0.0
        } else {
            self.records_filtered as f64 / self.records_read as f64
        }
    }

    /// Mean number of packets per flow.
    pub fn packets_per_flow(&self) -> f64 {
        if self.distinct_flows == 0 {
            0.0
        } else {
            self.packets_extracted as f64 / self.distinct_flows as f64
        }
    }

    /// Extracted packets per second.
    pub fn throughput_pps(&self) -> f64 {
        let duration_secs = self.duration().as_secs_f64();
        if duration_secs == 0.0 {
            0.0
        } else {
            self.packets_extracted as f64 / duration_secs
        }
    }

    /// Write a human-readable summary to the operator log.
    pub fn print_summary(&self, log: &mut Logger) {
        log.line("=== Trace Summary ===");
        log.line(format!("Duration: {} ms", self.duration().as_millis()));
        log.line(format!("Archives: {}", self.archives_read));
        log.line(format!(
            "Records: {} ({} filtered, {:.2}%)",
            self.records_read,
            self.records_filtered,
            self.filter_rate() * 100.0
        ));
        log.line(format!(
            "Packets: {} ({:.2} MiB)",
            self.packets_extracted,
            self.bytes as f64 / 1024.0 / 1024.0
        ));
        log.line(format!(
            "Flows: {} ({:.1} packets/flow)",
            self.distinct_flows,
            self.packets_per_flow()
        ));
        log.line(format!("Throughput: {:.0} packets/s", self.throughput_pps()));
    }

    /// Export statistics as key=value lines (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             archives_read={}\n\
             records_read={}\n\
             records_filtered={}\n\
             packets_extracted={}\n\
             bytes={}\n\
             distinct_flows={}\n",
            self.duration().as_millis(),
            self.archives_read,
            self.records_read,
            self.records_filtered,
            self.packets_extracted,
            self.bytes,
            self.distinct_flows,
        )
    }
}

impl Default for TraceStats {
    fn default() -> Self {
        Self::new()
    }
}
