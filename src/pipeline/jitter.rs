//! Online jitter accumulator.
//!
//! Keeps sufficient statistics (count, sum, sum of squares) of the timing
//! error between each scheduled and realized wake. Variance uses the
//! `E[x²] − E[x]²` identity, which loses precision for very long runs or
//! large-magnitude samples; samples here are small wake deltas in
//! microseconds, so this is acceptable.

use serde::{Deserialize, Serialize};

/// Running mean / population variance of timing error samples.
#[derive(Debug, Clone, Default)]
pub struct JitterMonitor {
    count: u64,
    sum: f64,
    sum_of_squares: f64,
    min: f64,
    max: f64,
}

/// Serializable snapshot of a [`JitterMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterStats {
    pub samples: u64,
    pub mean_us: f64,
    pub variance_us2: f64,
    pub std_dev_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

impl JitterMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn record(&mut self, sample: f64) {
        if self.count == 0 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        self.count += 1;
        self.sum += sample;
        self.sum_of_squares += sample * sample;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of all samples, `None` when no sample has been recorded.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }

    /// Population variance, `None` when no sample has been recorded.
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self.sum_of_squares / self.count as f64 - mean * mean;
        // Rounding can push an all-equal series slightly below zero.
        Some(var.max(0.0))
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Snapshot of the statistics, `None` when empty.
    pub fn snapshot(&self) -> Option<JitterStats> {
        Some(JitterStats {
            samples: self.count,
            mean_us: self.mean()?,
            variance_us2: self.variance()?,
            std_dev_us: self.std_dev()?,
            min_us: self.min,
            max_us: self.max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_reports_no_data() {
        let jitter = JitterMonitor::new();
        assert_eq!(jitter.count(), 0);
        assert!(jitter.mean().is_none());
        assert!(jitter.variance().is_none());
        assert!(jitter.std_dev().is_none());
        assert!(jitter.snapshot().is_none());
    }

    #[test]
    fn test_mean_and_variance() {
        let mut jitter = JitterMonitor::new();
        for s in [0.0, 2.0, 4.0] {
            jitter.record(s);
        }
        assert_eq!(jitter.mean(), Some(2.0));
        let var = jitter.variance().unwrap();
        assert!((var - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(jitter.min(), Some(0.0));
        assert_eq!(jitter.max(), Some(4.0));
    }

    #[test]
    fn test_constant_series_has_zero_variance() {
        let mut jitter = JitterMonitor::new();
        for _ in 0..1000 {
            jitter.record(0.1);
        }
        assert!(jitter.variance().unwrap() >= 0.0);
        assert!(jitter.std_dev().unwrap() < 1e-6);
    }

    proptest! {
        #[test]
        fn test_matches_two_pass_variance(
            samples in prop::collection::vec(-1_000.0f64..1_000.0, 1..200)
        ) {
            let mut jitter = JitterMonitor::new();
            for &s in &samples {
                jitter.record(s);
            }

            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

            prop_assert!((jitter.mean().unwrap() - mean).abs() < 1e-6);
            prop_assert!((jitter.variance().unwrap() - var).abs() < 1e-3);
        }
    }
}
