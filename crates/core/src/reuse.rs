//! Reuse-distance analysis over a locality sequence.
//!
//! Two analyses share the idea of a fixed-size history of recent references:
//!
//! - [`StackDistance`] keeps the last `W` references in most-recently-used
//!   order and histograms how far back each reference is found. Bucket 0
//!   counts references absent from the window; bucket `d` counts hits at
//!   position `d` (1 = most recent). The CDF over buckets `0..=W` reaches 1.
//! - [`ReuseRatio`] slides a ring of the last `window` references over a
//!   (possibly file-streamed) sequence and, every `step` references, emits
//!   the number of references that were already in the ring divided by
//!   `window`.
//!
//! Both windows start filled with empty slots that never match a value.

use crate::error::{Error, Result};
use crate::log::Logger;
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;

/// Most-recently-used window with a stack-distance histogram.
///
/// Each reference costs O(W): the window is scanned front to back and only
/// an exact match counts as a hit.
#[derive(Debug, Clone)]
pub struct StackDistance {
    /// Front is the most recently used value
    window: VecDeque<Option<u64>>,

    /// `histogram[0]` misses, `histogram[d]` hits at distance d
    histogram: Vec<u64>,

    total: u64,
}

impl StackDistance {
    /// Create an analyzer with a window of `window_size` slots.
    ///
    /// # Errors
    /// `Error::Config` if `window_size` is zero.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::Config("stack-distance window must be positive".to_string()));
        }
        Ok(Self {
            window: std::iter::repeat(None).take(window_size).collect(),
            histogram: vec![0; window_size + 1],
            total: 0,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Record a reference. Returns its 1-based distance, or `None` on a miss.
    pub fn push(&mut self, value: u64) -> Option<usize> {
        let found = self.window.iter().position(|slot| *slot == Some(value));
        match found {
            Some(idx) => {
                self.window.remove(idx);
                self.histogram[idx + 1] += 1;
            }
            None => {
                self.window.pop_back();
                self.histogram[0] += 1;
            }
        }
        self.window.push_front(Some(value));
        self.total += 1;
        found.map(|idx| idx + 1)
    }

    /// Counts per bucket, `window_size + 1` entries.
    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Number of references processed.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Cumulative distribution over the buckets.
    ///
    /// All zero when no reference has been processed.
    pub fn cdf(&self) -> Cdf {
        let mut running = 0u64;
        let values = self
            .histogram
            .iter()
            .map(|&count| {
                running += count;
                if self.total == 0 {
                    0.0
                } else {
                    running as f64 / self.total as f64
                }
            })
            .collect();
        Cdf { values }
    }
}

/// Stack-distance CDF, indexed by bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Cdf {
    values: Vec<f64>,
}

impl Cdf {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Write `<index> <cumulative probability>` lines, index ascending.
    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for (index, value) in self.values.iter().enumerate() {
            writeln!(out, "{} {}", index, value)?;
        }
        Ok(())
    }
}

/// Run the stack-distance analysis over a whole sequence.
pub fn stack_distance_cdf(sequence: &[u64], window_size: usize, log: &mut Logger) -> Result<Cdf> {
    let mut analyzer = StackDistance::new(window_size)?;
    for (i, &value) in sequence.iter().enumerate() {
        analyzer.push(value);
        log.progress("Computing stack distances", i, sequence.len());
    }
    log.done("Computing stack distances");
    tracing::debug!(references = analyzer.total(), window_size, "stack-distance analysis finished");
    Ok(analyzer.cdf())
}

/// Sliding-window reuse ratio.
///
/// Membership and updates go through a counted multiset, O(log window)
/// per reference.
#[derive(Debug, Clone)]
pub struct ReuseRatio {
    ring: Vec<Option<u64>>,

    /// Value -> number of ring slots holding it
    live: BTreeMap<u64, usize>,

    cursor: usize,
    step: usize,
    since_emit: usize,
    reuse: u64,
}

impl ReuseRatio {
    /// Create an analyzer over the last `window` references, emitting every `step`.
    ///
    /// # Errors
    /// `Error::Config` unless `0 < step <= window`.
    pub fn new(window: usize, step: usize) -> Result<Self> {
        if window == 0 || step == 0 {
            return Err(Error::Config("window and step must be positive".to_string()));
        }
        if step > window {
            return Err(Error::Config(format!(
                "step {} exceeds window {}; ratios would leave [0, 1]",
                step, window
            )));
        }
        Ok(Self {
            ring: vec![None; window],
            live: BTreeMap::new(),
            cursor: 0,
            step,
            since_emit: 0,
            reuse: 0,
        })
    }

    pub fn window(&self) -> usize {
        self.ring.len()
    }

    /// Record a reference. Returns a ratio in `[0, 1]` every `step` references.
    pub fn push(&mut self, value: u64) -> Option<f64> {
        if self.live.contains_key(&value) {
            self.reuse += 1;
        }

        if let Some(leaving) = self.ring[self.cursor].replace(value) {
            self.remove_one(leaving);
        }
        *self.live.entry(value).or_insert(0) += 1;
        self.cursor = (self.cursor + 1) % self.ring.len();

        self.since_emit += 1;
        if self.since_emit == self.step {
            let ratio = self.reuse as f64 / self.ring.len() as f64;
            self.since_emit = 0;
            self.reuse = 0;
            Some(ratio)
        } else {
            None
        }
    }

    fn remove_one(&mut self, value: u64) {
        if let Some(count) = self.live.get_mut(&value) {
            *count -= 1;
            if *count == 0 {
                self.live.remove(&value);
            }
        }
    }
}

/// Stream `values` through a [`ReuseRatio`], writing one ratio per line.
///
/// Returns the number of ratios written. The first failing value aborts.
/// A running count of references goes to `log` every `log.interval()`.
pub fn write_reuse_ratios<I, W>(
    values: I,
    window: usize,
    step: usize,
    mut out: W,
    log: &mut Logger,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<u64>>,
    W: Write,
{
    let mut analyzer = ReuseRatio::new(window, step)?;
    let mut emitted = 0;
    let mut references = 0;
    for value in values {
        if let Some(ratio) = analyzer.push(value?) {
            writeln!(out, "{}", ratio)?;
            emitted += 1;
        }
        references += 1;
        log.tick("Analyzing locality", references);
    }
    out.flush()?;
    log.done("Analyzing locality");
    tracing::debug!(references, emitted, window, step, "reuse-ratio analysis finished");
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_distance_scenario() {
        let mut analyzer = StackDistance::new(2).unwrap();
        let distances: Vec<Option<usize>> = [1, 2, 1, 3, 1].iter().map(|&v| analyzer.push(v)).collect();

        // The window holds [3, 1] when the last 1 arrives
        assert_eq!(distances, vec![None, None, Some(2), None, Some(2)]);
        assert_eq!(analyzer.histogram(), &[3, 0, 2]);
        assert_eq!(analyzer.total(), 5);

        let cdf = analyzer.cdf();
        let expected = [0.6, 0.6, 1.0];
        for (got, want) in cdf.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_stack_distance_mru_hit() {
        let mut analyzer = StackDistance::new(3).unwrap();
        analyzer.push(7);
        assert_eq!(analyzer.push(7), Some(1));
        analyzer.push(8);
        analyzer.push(9);
        // Window is [9, 8, 7]
        assert_eq!(analyzer.push(7), Some(3));
        // Window is [7, 9, 8]
        assert_eq!(analyzer.push(8), Some(3));
    }

    #[test]
    fn test_stack_distance_eviction() {
        let mut analyzer = StackDistance::new(2).unwrap();
        analyzer.push(1);
        analyzer.push(2);
        analyzer.push(3);
        assert_eq!(analyzer.push(1), None);
    }

    #[test]
    fn test_histogram_sums_to_total() {
        let mut analyzer = StackDistance::new(4).unwrap();
        for v in [0, 1, 0, 2, 3, 4, 0, 5, 5, 1] {
            analyzer.push(v);
        }
        assert_eq!(analyzer.histogram().iter().sum::<u64>(), analyzer.total());
        assert_eq!(analyzer.cdf().values().last().copied(), Some(1.0));
    }

    #[test]
    fn test_empty_cdf() {
        let analyzer = StackDistance::new(3).unwrap();
        assert_eq!(analyzer.cdf().values(), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(StackDistance::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_cdf_output_format() {
        let mut analyzer = StackDistance::new(2).unwrap();
        for v in [1, 2, 1, 3, 1] {
            analyzer.push(v);
        }
        let mut out = Vec::new();
        analyzer.cdf().write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0 0.6\n1 0.6\n2 1\n");
    }

    #[test]
    fn test_stack_distance_cdf_logs_progress() {
        let (mut log, sink) = Logger::memory();
        let cdf = stack_distance_cdf(&[1, 1, 1], 1, &mut log).unwrap();
        assert_eq!(cdf.values().len(), 2);
        assert!(sink.contents().ends_with("Done   \n"));
    }

    #[test]
    fn test_reuse_ratio_repeated_value() {
        let mut analyzer = ReuseRatio::new(2, 2).unwrap();
        let ratios: Vec<f64> = [1, 1, 1, 1].iter().filter_map(|&v| analyzer.push(v)).collect();
        assert_eq!(ratios, vec![0.5, 1.0]);
    }

    #[test]
    fn test_reuse_ratio_removes_single_instance() {
        let mut analyzer = ReuseRatio::new(3, 3).unwrap();
        let ratios: Vec<f64> = [5, 5, 7, 9, 5, 8].iter().filter_map(|&v| analyzer.push(v)).collect();
        // When 9 evicts one 5, the other copy stays in the window
        assert_eq!(ratios.len(), 2);
        assert!((ratios[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((ratios[1] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_reuse_ratio_no_reuse() {
        let mut analyzer = ReuseRatio::new(4, 2).unwrap();
        let ratios: Vec<f64> = (0..8).filter_map(|v| analyzer.push(v)).collect();
        assert_eq!(ratios, vec![0.0; 4]);
    }

    #[test]
    fn test_reuse_ratio_rejects_bad_parameters() {
        assert!(matches!(ReuseRatio::new(0, 1), Err(Error::Config(_))));
        assert!(matches!(ReuseRatio::new(4, 0), Err(Error::Config(_))));
        assert!(matches!(ReuseRatio::new(4, 5), Err(Error::Config(_))));
    }

    #[test]
    fn test_write_reuse_ratios() {
        let values = [1u64, 1, 1, 1, 2].into_iter().map(Ok);
        let (mut log, _) = Logger::memory();
        let mut out = Vec::new();
        let emitted = write_reuse_ratios(values, 2, 2, &mut out, &mut log).unwrap();
        assert_eq!(emitted, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "0.5\n1\n");
    }

    #[test]
    fn test_write_reuse_ratios_reports_progress() {
        let (log, sink) = Logger::memory();
        let mut log = log.with_interval(4);
        let values = (0..10u64).map(Ok);
        write_reuse_ratios(values, 4, 2, Vec::new(), &mut log).unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                "\rAnalyzing locality... (4)".to_string(),
                "\rAnalyzing locality... (8)".to_string(),
                "\rAnalyzing locality... Done   \n".to_string(),
            ]
        );
    }

    #[test]
    fn test_write_reuse_ratios_propagates_errors() {
        let values = vec![Ok(1), Err(Error::Config("bad".to_string())), Ok(2)];
        let (mut log, _) = Logger::memory();
        let result = write_reuse_ratios(values, 2, 1, Vec::new(), &mut log);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
