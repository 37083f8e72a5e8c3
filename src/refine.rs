//! # Refine Module
//!
//! Boundary refinement of a candidate region against a finished
//! [`GenomeCoverageArray`].
//!
//! Two families of algorithms are provided:
//!
//! - **Threshold split**: every maximal run of bases below the coverage
//!   threshold inside the region becomes one refined interval.
//! - **Edge trim**: the region is shrunk from both edges. High-coverage
//!   flanks are dropped first, then each side walks inward one
//!   gap-plus-run fragment at a time until it reaches the opposite side or
//!   meets a fragment too thin to be real coverage.
//!
//! Intervals are reported as `(open, close)` pairs. For threshold split the
//! close is the first base back at or above the threshold (or one past the
//! region); for edge trim it is the last low-coverage base of the walk.
use crate::config::{RefineConfig, Strategy};
use crate::coverage::GenomeCoverageArray;
use crate::distribution::WindowedDistribution;
use crate::errors::{Error, Result};
use log::{debug, info};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub open: i64,
    pub close: i64,
}

impl Interval {
    pub fn new(open: i64, close: i64) -> Self {
        Self { open, close }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.open, self.close)
    }
}

/// Zero or more disjoint intervals inside a candidate region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefinedRegion {
    intervals: Vec<Interval>,
}

impl RefinedRegion {
    pub fn new(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }

    /// The region left as it was.
    pub fn unrefined(start: i64, end: i64) -> Self {
        Self::new(vec![Interval::new(start, end)])
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Flattened `open, close, open, close, ...` list.
    pub fn boundaries(&self) -> Vec<i64> {
        self.intervals
            .iter()
            .flat_map(|iv| [iv.open, iv.close])
            .collect()
    }

    /// First open and last close, if any interval exists.
    pub fn envelope(&self) -> Option<Interval> {
        let first = self.intervals.first()?;
        let last = self.intervals.last()?;
        Some(Interval::new(first.open, last.close))
    }
}

impl fmt::Display for RefinedRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self.intervals.iter().map(|iv| iv.to_string()).collect();
        write!(f, "{}", pairs.join(" "))
    }
}

/// One gap-plus-run step taken while walking a side.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSample {
    /// First base of the fragment, in walk order.
    pub begin: i64,
    /// Last base of the fragment, in walk order.
    pub end: i64,
    pub width: i64,
    /// Mean depth over the fragment.
    pub rate: f64,
    /// Distribution of fragment rates seen on this side so far, when
    /// diagnostics are enabled.
    pub distribution: Option<WindowedDistribution>,
}

impl fmt::Display for FragmentSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "C\t{}\t{}\t{}\t{}",
            self.begin, self.end, self.width, self.rate
        )?;
        if let Some(dist) = &self.distribution {
            write!(f, "\t{dist}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SideRefinement {
    pub boundary: i64,
    /// Threshold the walk compared against.
    pub threshold: f64,
    pub samples: Vec<FragmentSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub region: RefinedRegion,
    pub samples: Vec<FragmentSample>,
}

pub struct RegionRefiner<'a> {
    array: &'a GenomeCoverageArray,
    config: &'a RefineConfig,
}

impl<'a> RegionRefiner<'a> {
    pub fn new(array: &'a GenomeCoverageArray, config: &'a RefineConfig) -> Self {
        Self { array, config }
    }

    fn check_bounds(&self, front: i64, back: i64) -> Result<()> {
        if front > back {
            return Err(Error::DegenerateRegion {
                start: front,
                end: back,
            });
        }
        for pos in [front, back] {
            if self.array.get(pos).is_none() {
                return Err(Error::InvalidPosition {
                    pos,
                    genome_size: self.array.genome_size(),
                });
            }
        }
        Ok(())
    }

    fn is_low(&self, pos: i64, threshold: f64) -> bool {
        (self.array.coverage_at(pos) as f64) < threshold
    }

    /// Refine `[front, back]` with the configured strategy.
    pub fn refine(&self, front: i64, back: i64) -> Result<Refinement> {
        self.check_bounds(front, back)?;
        match self.config.strategy {
            Strategy::ThresholdSplit => Ok(Refinement {
                region: self.threshold_split(front, back),
                samples: Vec::new(),
            }),
            Strategy::EdgeTrim | Strategy::FragmentedEdge => self.edge_trim(front, back),
        }
    }

    /// Every below-threshold run in `[front, back]`.
    ///
    /// A run still open at `back` is closed at `back + 1`.
    pub fn threshold_split(&self, front: i64, back: i64) -> RefinedRegion {
        let threshold = self.config.coverage_threshold as f64;
        let mut intervals = Vec::new();
        let mut open = None;
        for pos in front..=back {
            let low = self.is_low(pos, threshold);
            match open {
                None if low => open = Some(pos),
                Some(start) if !low => {
                    intervals.push(Interval::new(start, pos));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            intervals.push(Interval::new(start, back + 1));
        }
        RefinedRegion::new(intervals)
    }

    /// Shrink `[front, back]` from both edges.
    ///
    /// Falls back to the original bounds when the trimmed edges cross.
    pub fn edge_trim(&self, front: i64, back: i64) -> Result<Refinement> {
        let threshold = self.config.coverage_threshold as f64;
        let mut b = front;
        let mut e = back;
        while b <= back && !self.is_low(b, threshold) {
            b += 1;
        }
        while e >= front && !self.is_low(e, threshold) {
            e -= 1;
        }

        let mut samples = Vec::new();
        if b < e {
            if self.config.margin_size > 0 {
                debug!("margin size ignored when clipping the flanks of [{front},{back}]");
            }
            let forward = self.refine_one_side(b, e)?;
            b = forward.boundary;
            samples.extend(forward.samples);
            // When the forward walk ran past `e`, this walk heads forward too.
            let backward = self.refine_one_side(e, b)?;
            e = backward.boundary;
            samples.extend(backward.samples);

            let max_chop = self.config.max_chop_length as i64;
            if max_chop > 0 {
                if b - front > max_chop {
                    info!("Canceling [{b},*], return to [{front},*]");
                    b = front;
                }
                if back - e > max_chop {
                    info!("Canceling [*,{e}], return to [*,{back}]");
                    e = back;
                }
            }
        }

        let region = if front <= b && b < e && e <= back {
            RefinedRegion::unrefined(b, e)
        } else {
            RefinedRegion::unrefined(front, back)
        };
        Ok(Refinement { region, samples })
    }

    /// Threshold for a walk starting at `front`: the global threshold, or
    /// the mean depth of the `margin_size` bases just outside `front`
    /// scaled by the margin parameter.
    fn effective_threshold(&self, front: i64, direction: i64) -> f64 {
        let global = self.config.coverage_threshold as f64;
        let margin = self.config.margin_size as i64;
        if margin == 0 {
            return global;
        }
        let near = front - direction;
        let far = front - direction * margin;
        let lo = near.min(far).max(1);
        let hi = near.max(far).min(self.array.genome_size());
        if lo > hi {
            return global;
        }
        self.array
            .average_coverage(lo, hi)
            .map(|avg| avg * self.config.margin_parameter)
            .unwrap_or(global)
    }

    /// Walk from `front` toward `back` and return where the walk stopped.
    ///
    /// The walk direction follows the order of the arguments. A leading
    /// high-coverage run is skipped, then fragments (a low run followed by
    /// a high run) are consumed while their mean depth stays at or above
    /// `fragment_threshold * threshold`. A fragment below that rate is
    /// discarded and the walk stops at its first base.
    pub fn refine_one_side(&self, front: i64, back: i64) -> Result<SideRefinement> {
        let direction = if front > back { -1 } else { 1 };
        let (lower, upper) = if direction > 0 {
            (front, back)
        } else {
            (back, front)
        };
        let upper = upper.min(self.array.genome_size());
        let within = |x: i64| lower <= x && x <= upper;
        let threshold = self.effective_threshold(front, direction);
        let min_rate = self.config.fragment_threshold * threshold;
        let mut distribution = self
            .config
            .coverage_window
            .is_enabled()
            .then(|| WindowedDistribution::new(&self.config.coverage_window));

        let mut x = front;
        while x != back && !self.is_low(x, threshold) {
            x += direction;
        }

        let mut samples = Vec::new();
        while (back - x) * direction >= 0 {
            if x == back {
                break;
            }
            let fragment_begin = x;
            let mut c = 0u64;
            while within(x) && self.is_low(x, threshold) {
                c += self.array.coverage_at(x) as u64;
                x += direction;
            }
            if x == back {
                break;
            }
            while within(x) && !self.is_low(x, threshold) {
                c += self.array.coverage_at(x) as u64;
                x += direction;
            }
            let w = (x - fragment_begin) * direction;
            if w == 0 {
                return Err(Error::Internal {
                    msg: format!("no progress walking from {fragment_begin} toward {back}"),
                });
            }
            let rate = c as f64 / w as f64;
            if let Some(dist) = distribution.as_mut() {
                dist.increment(rate);
            }
            samples.push(FragmentSample {
                begin: fragment_begin,
                end: x - direction,
                width: w,
                rate,
                distribution: distribution.clone(),
            });
            if rate < min_rate {
                debug!("discarding thin fragment at {fragment_begin}: rate {rate} < {min_rate}");
                x = fragment_begin;
                break;
            }
        }

        Ok(SideRefinement {
            boundary: x,
            threshold,
            samples,
        })
    }
}
