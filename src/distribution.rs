//! Fixed-bucket histogram with running moments over local coverage rates.
//!
//! The bucket layout comes from a [`CoverageWindow`], parsed once from the
//! `<window size>:<scale factor>:<index limit>` option and shared by
//! reference with every accumulator built from it.
use crate::errors::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Shape of every [`WindowedDistribution`] in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageWindow {
    window_size: usize,
    scale_factor: u32,
    index_limit: usize,
}

impl CoverageWindow {
    pub fn new(window_size: i64, scale_factor: i64, index_limit: i64) -> Result<Self> {
        if window_size < 0 {
            return Err(Error::Configuration {
                msg: format!("window size must not be negative: {window_size}"),
            });
        }
        if scale_factor <= 0 {
            return Err(Error::Configuration {
                msg: format!("scale factor must be greater than 0: {scale_factor}"),
            });
        }
        if index_limit <= 0 {
            return Err(Error::Configuration {
                msg: format!("index limit must be greater than 0: {index_limit}"),
            });
        }
        let scale_factor = u32::try_from(scale_factor).map_err(|_| Error::Configuration {
            msg: format!("scale factor is too large: {scale_factor}"),
        })?;
        Ok(Self {
            window_size: window_size as usize,
            scale_factor,
            index_limit: index_limit as usize,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    pub fn index_limit(&self) -> usize {
        self.index_limit
    }

    /// Fragment diagnostics are produced only for a non-zero window.
    pub fn is_enabled(&self) -> bool {
        self.window_size > 0
    }
}

impl Default for CoverageWindow {
    fn default() -> Self {
        Self {
            window_size: 0,
            scale_factor: 100,
            index_limit: 100,
        }
    }
}

impl FromStr for CoverageWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let usage = || Error::Configuration {
            msg: format!(
                "specify <window size>:<scale factor>:<index limit> for the coverage window, got '{s}'"
            ),
        };
        let fields: Vec<&str> = s.split(':').collect();
        let [window, scale, limit] = fields[..] else {
            return Err(usage());
        };
        let parse = |v: &str| v.trim().parse::<i64>().map_err(|_| usage());
        CoverageWindow::new(parse(window)?, parse(scale)?, parse(limit)?)
    }
}

impl fmt::Display for CoverageWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.window_size, self.scale_factor, self.index_limit
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowedDistribution {
    scale_factor: f64,
    buckets: Vec<i32>,
    sum: f64,
    sum_squared: f64,
    n_values: i32,
    n_overflow: i32,
}

impl WindowedDistribution {
    pub fn new(window: &CoverageWindow) -> Self {
        Self {
            scale_factor: window.scale_factor() as f64,
            buckets: vec![0; window.index_limit()],
            sum: 0.0,
            sum_squared: 0.0,
            n_values: 0,
            n_overflow: 0,
        }
    }

    /// Zero all counters, keeping the bucket layout.
    pub fn reset(&mut self) {
        self.buckets.iter_mut().for_each(|b| *b = 0);
        self.sum = 0.0;
        self.sum_squared = 0.0;
        self.n_values = 0;
        self.n_overflow = 0;
    }

    pub fn increment(&mut self, value: f64) {
        self.sum += value;
        self.sum_squared += value * value;
        self.n_values += 1;
        let limit = self.buckets.len();
        let scaled = (value * self.scale_factor).floor().max(0.0);
        let index = if scaled >= limit as f64 {
            self.n_overflow += 1;
            limit - 1
        } else {
            scaled as usize
        };
        self.buckets[index] += 1;
    }

    /// Mean of the samples; NaN when nothing has been added.
    pub fn average(&self) -> f64 {
        self.sum / self.n_values as f64
    }

    /// Population variance (no Bessel correction).
    pub fn variance(&self) -> f64 {
        let a = self.average();
        self.sum_squared / self.n_values as f64 - a * a
    }

    pub fn n_values(&self) -> i32 {
        self.n_values
    }

    pub fn n_overflow(&self) -> i32 {
        self.n_overflow
    }

    pub fn buckets(&self) -> &[i32] {
        &self.buckets
    }
}

impl fmt::Display for WindowedDistribution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let variance = self.variance();
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t",
            self.average(),
            variance,
            variance.sqrt(),
            self.n_values,
            self.n_overflow
        )?;
        let buckets: Vec<String> = self.buckets.iter().map(|b| b.to_string()).collect();
        write!(f, "{}", buckets.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(scale: i64, limit: i64) -> CoverageWindow {
        CoverageWindow::new(10, scale, limit).unwrap()
    }

    #[test]
    fn parse_coverage_window() {
        let w: CoverageWindow = "20:10:50".parse().unwrap();
        assert_eq!(w.window_size(), 20);
        assert_eq!(w.scale_factor(), 10);
        assert_eq!(w.index_limit(), 50);
        assert!(w.is_enabled());
        assert_eq!(w.to_string(), "20:10:50");

        let default = CoverageWindow::default();
        assert_eq!(default.to_string(), "0:100:100");
        assert!(!default.is_enabled());
    }

    #[test]
    fn parse_rejects_malformed_window() {
        for bad in ["", "10", "10:2", "10:2:3:4", "a:2:3", "10:x:3"] {
            let err = bad.parse::<CoverageWindow>().unwrap_err();
            assert!(
                matches!(err, Error::Configuration { .. }),
                "expected configuration error for '{bad}'"
            );
        }
    }

    #[test]
    fn new_rejects_non_positive_shape() {
        assert!(CoverageWindow::new(0, 0, 10).is_err());
        assert!(CoverageWindow::new(0, -1, 10).is_err());
        assert!(CoverageWindow::new(0, 1, 0).is_err());
        assert!(CoverageWindow::new(-1, 1, 1).is_err());
        let err = "0:0:10".parse::<CoverageWindow>().unwrap_err();
        assert!(err.to_string().contains("scale factor must be greater than 0"));
    }

    #[test]
    fn constant_samples_have_zero_variance() {
        let mut dist = WindowedDistribution::new(&window(1, 10));
        for _ in 0..4 {
            dist.increment(2.5);
        }
        assert_eq!(dist.average(), 2.5);
        assert_eq!(dist.variance(), 0.0);
        assert_eq!(dist.n_values(), 4);
        assert_eq!(dist.buckets()[2], 4);
    }

    #[test]
    fn variance_is_population_variance() {
        let mut dist = WindowedDistribution::new(&window(1, 10));
        dist.increment(1.0);
        dist.increment(3.0);
        assert_eq!(dist.average(), 2.0);
        assert_eq!(dist.variance(), 1.0);
    }

    #[test]
    fn overflowing_sample_goes_to_last_bucket() {
        let mut dist = WindowedDistribution::new(&window(10, 5));
        dist.increment(0.25);
        assert_eq!(dist.n_overflow(), 0);
        dist.increment(0.5);
        assert_eq!(dist.n_overflow(), 1);
        assert_eq!(dist.buckets(), &[0, 0, 1, 0, 1]);
        dist.increment(100.0);
        assert_eq!(dist.n_overflow(), 2);
        assert_eq!(dist.buckets()[4], 2);
    }

    #[test]
    fn empty_distribution_average_is_nan() {
        let dist = WindowedDistribution::new(&window(1, 3));
        assert!(dist.average().is_nan());
    }

    #[test]
    fn reset_keeps_shape() {
        let mut dist = WindowedDistribution::new(&window(1, 3));
        dist.increment(1.0);
        dist.increment(9.0);
        dist.reset();
        assert_eq!(dist.buckets(), &[0, 0, 0]);
        assert_eq!(dist.n_values(), 0);
        assert_eq!(dist.n_overflow(), 0);
    }

    #[test]
    fn display_serialises_moments_and_buckets() {
        let mut dist = WindowedDistribution::new(&window(1, 4));
        dist.increment(1.0);
        dist.increment(3.0);
        assert_eq!(dist.to_string(), "2\t1\t1\t2\t0\t0,1,0,1");
    }
}
