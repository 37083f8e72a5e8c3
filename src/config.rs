//! Run-wide refinement settings.
//!
//! A [`RefineConfig`] is assembled once from the command line, validated,
//! and then shared by reference with the refiner and the analyzer.
use crate::distribution::CoverageWindow;
use crate::errors::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// How a candidate region is narrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Report every below-threshold run inside the region.
    ThresholdSplit,
    /// Walk inward from both edges, rejecting thin fragments.
    EdgeTrim,
    /// Same walk as `EdgeTrim`; kept as a separate name for callers that
    /// ask for fragmented-edge refinement.
    FragmentedEdge,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Strategy::ThresholdSplit => "coverage",
            Strategy::EdgeTrim => "edge",
            Strategy::FragmentedEdge => "fragmented-edge",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `V` lines listing every refined boundary pair.
    #[default]
    Verbose,
    /// One BED line per region, refined bounds in the thick columns.
    Bed,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(OutputFormat::Verbose),
            "bed" => Ok(OutputFormat::Bed),
            other => Err(Error::Configuration {
                msg: format!("unknown output format: '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineConfig {
    /// Depth below which a base counts as low coverage.
    pub coverage_threshold: u32,
    /// Regions with mean depth above this are left alone; `<= 0` disables.
    pub refinement_threshold: f64,
    /// Width of the flank used for a local threshold; 0 uses the global one.
    pub margin_size: u64,
    /// Multiplier applied to the flank's mean depth.
    pub margin_parameter: f64,
    /// Fraction of the threshold a fragment's mean depth must reach.
    pub fragment_threshold: f64,
    /// Largest trim accepted on either side; 0 disables the guard.
    pub max_chop_length: u64,
    pub coverage_window: CoverageWindow,
    pub output_format: OutputFormat,
    pub strategy: Strategy,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 1,
            refinement_threshold: -1.0,
            margin_size: 0,
            margin_parameter: 0.0,
            fragment_threshold: 0.0,
            max_chop_length: 200,
            coverage_window: CoverageWindow::default(),
            output_format: OutputFormat::Verbose,
            strategy: Strategy::FragmentedEdge,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fragment_threshold) {
            return Err(Error::Configuration {
                msg: format!(
                    "fragment threshold must be within [0, 1]: {}",
                    self.fragment_threshold
                ),
            });
        }
        if !self.margin_parameter.is_finite() || self.margin_parameter < 0.0 {
            return Err(Error::Configuration {
                msg: format!(
                    "margin parameter must be a non-negative number: {}",
                    self.margin_parameter
                ),
            });
        }
        if self.refinement_threshold.is_nan() {
            return Err(Error::Configuration {
                msg: "refinement threshold is not a number".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_output_format() {
        assert_eq!("".parse::<OutputFormat>().unwrap(), OutputFormat::Verbose);
        assert_eq!("bed".parse::<OutputFormat>().unwrap(), OutputFormat::Bed);
        let err = "gff".parse::<OutputFormat>().unwrap_err();
        assert!(err.to_string().contains("unknown output format: 'gff'"));
    }

    #[test]
    fn default_config_is_valid() {
        let config = RefineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, Strategy::FragmentedEdge);
        assert_eq!(config.max_chop_length, 200);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = RefineConfig {
            fragment_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        let config = RefineConfig {
            margin_parameter: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RefineConfig {
            refinement_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn display_strategy() {
        assert_eq!(Strategy::ThresholdSplit.to_string(), "coverage");
        assert_eq!(Strategy::EdgeTrim.to_string(), "edge");
        assert_eq!(Strategy::FragmentedEdge.to_string(), "fragmented-edge");
    }
}
