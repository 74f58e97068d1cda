//! Synthetic locality from a Zipf distribution.
//!
//! Values are drawn from Zipf(N, alpha) over `[1, N]` using a seeded
//! ChaCha8 RNG, so a given seed always yields the same sequence.

use crate::error::{Error, Result};
use crate::log::Logger;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Zipf};

/// Share of the value range treated as "most popular" by [`head_mass`].
pub const HEAD_FRACTION: f64 = 0.03;

/// Seeded Zipf(N, alpha) sampler.
#[derive(Debug, Clone)]
pub struct ZipfSource {
    rng: ChaCha8Rng,
    distribution: Zipf<f64>,
    n: u64,
    alpha: f64,
}

impl ZipfSource {
    /// Create a sampler over `[1, n]` with exponent `alpha`.
    ///
    /// # Errors
    /// `Error::Config` if `n` is zero or `alpha` is negative or not finite.
    pub fn new(n: u64, alpha: f64, seed: u64) -> Result<Self> {
        if !alpha.is_finite() {
            return Err(Error::Config(format!("invalid zipf alpha {}", alpha)));
        }
        let distribution = Zipf::new(n, alpha)
            .map_err(|err| Error::Config(format!("invalid zipf parameters (N={}, alpha={}): {}", n, alpha, err)))?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            distribution,
            n,
            alpha,
        })
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Draw one value in `[1, N]`.
    pub fn sample(&mut self) -> u64 {
        self.distribution.sample(&mut self.rng) as u64
    }

    /// Draw `count` independent values, reporting progress.
    pub fn generate(&mut self, count: usize, log: &mut Logger) -> Vec<u64> {
        log.line(format!(
            "Generating Zipf locality with N={} and alpha={}",
            self.n, self.alpha
        ));
        let mut output = Vec::with_capacity(count);
        for i in 0..count {
            output.push(self.sample());
            log.progress("Generating zipf distribution", i, count);
        }
        log.done("Generating zipf distribution");
        output
    }
}

/// Fraction of `sequence` that falls in `[1, floor(HEAD_FRACTION * n)]`.
///
/// A frequency-mass sanity check for a Zipf sequence, not a locality measure.
/// Returns 0 for an empty sequence.
pub fn head_mass(sequence: &[u64], n: u64) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    let bound = (n as f64 * HEAD_FRACTION) as u64;
    let hits = sequence.iter().filter(|&&x| x <= bound).count();
    hits as f64 / sequence.len() as f64
}

/// Log the head-mass check in operator form.
pub fn report_head_mass(sequence: &[u64], n: u64, log: &mut Logger) -> f64 {
    let mass = head_mass(sequence, n);
    log.line(format!(
        "{:.0}% most frequent flows hold {:.0}% of the traffic ({} available flows, {} traffic size)",
        HEAD_FRACTION * 100.0,
        mass * 100.0,
        n,
        sequence.len()
    ));
    mass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_in_range() {
        let mut source = ZipfSource::new(100, 0.99, 7).unwrap();
        for _ in 0..10_000 {
            let v = source.sample();
            assert!((1..=100).contains(&v));
        }
    }

    #[test]
    fn test_determinism() {
        let (mut log, _) = Logger::memory();
        let a = ZipfSource::new(1000, 1.2, 42).unwrap().generate(5000, &mut log);
        let b = ZipfSource::new(1000, 1.2, 42).unwrap().generate(5000, &mut log);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds() {
        let (mut log, _) = Logger::memory();
        let a = ZipfSource::new(1000, 0.99, 1).unwrap().generate(1000, &mut log);
        let b = ZipfSource::new(1000, 0.99, 2).unwrap().generate(1000, &mut log);
        assert_ne!(a, b);
    }

    #[test]
    fn test_skew() {
        let (mut log, _) = Logger::memory();
        let seq = ZipfSource::new(10_000, 0.99, 3).unwrap().generate(50_000, &mut log);
        // The top 3% of a Zipf(0.99) range carries far more than 3% of the mass
        let mass = head_mass(&seq, 10_000);
        assert!(mass > 0.4, "head mass {}", mass);
        assert!(mass < 1.0);
    }

    #[test]
    fn test_head_mass_exact() {
        // bound = floor(100 * 0.03) = 3
        assert_eq!(head_mass(&[1, 2, 3, 4, 50, 100], 100), 0.5);
        assert_eq!(head_mass(&[], 100), 0.0);
    }

    #[test]
    fn test_report_head_mass() {
        let (mut log, sink) = Logger::memory();
        report_head_mass(&[1, 2, 3, 4], 100, &mut log);
        assert_eq!(
            sink.contents(),
            "3% most frequent flows hold 75% of the traffic (100 available flows, 4 traffic size)\n"
        );
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(ZipfSource::new(0, 0.99, 1), Err(Error::Config(_))));
        assert!(matches!(ZipfSource::new(10, -1.0, 1), Err(Error::Config(_))));
        assert!(matches!(ZipfSource::new(10, f64::NAN, 1), Err(Error::Config(_))));
    }
}
