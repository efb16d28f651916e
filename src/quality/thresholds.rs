//! Per-parameter water quality threshold checking.
//!
//! Every parameter has an inclusive "excellent" band nested inside an
//! inclusive "acceptable" band. Values inside the excellent band are
//! `Excellent`, values outside it but inside the acceptable band are
//! `Marginal`, everything else is `Unsafe`. Non-finite values cannot be
//! classified and yield `Unknown`.
//!
//! Human-readable rationale for each tier lives in `quality::reference`;
//! nothing here formats text for display.

use crate::model::{Parameter, Tier};

/// Closed interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    const fn new(low: f64, high: f64) -> Self {
        Band { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// The two nested bands for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub excellent: Band,
    pub acceptable: Band,
}

/// Drinking water thresholds per parameter.
///
/// Conductivity between 50 and 100 μS/cm sits in the acceptable band, so it
/// classifies as `Marginal`, continuous with the 400–800 marginal range.
pub const fn thresholds(parameter: Parameter) -> Thresholds {
    match parameter {
        Parameter::Ph => Thresholds {
            excellent: Band::new(6.5, 8.0),
            acceptable: Band::new(6.0, 9.0),
        },
        Parameter::Turbidity => Thresholds {
            excellent: Band::new(0.0, 1.0),
            acceptable: Band::new(0.0, 4.0),
        },
        Parameter::Tds => Thresholds {
            excellent: Band::new(80.0, 300.0),
            acceptable: Band::new(50.0, 500.0),
        },
        Parameter::Conductivity => Thresholds {
            excellent: Band::new(100.0, 400.0),
            acceptable: Band::new(50.0, 800.0),
        },
        Parameter::Temperature => Thresholds {
            excellent: Band::new(5.0, 25.0),
            acceptable: Band::new(0.0, 35.0),
        },
    }
}

/// Classifies one value of a known parameter.
pub fn classify(parameter: Parameter, value: f64) -> Tier {
    if !value.is_finite() {
        return Tier::Unknown;
    }
    let t = thresholds(parameter);
    if t.excellent.contains(value) {
        Tier::Excellent
    } else if t.acceptable.contains(value) {
        Tier::Marginal
    } else {
        Tier::Unsafe
    }
}

impl Parameter {
    pub fn classify(self, value: f64) -> Tier {
        classify(self, value)
    }
}

/// Classifies a value by parameter name.
///
/// Unrecognised names classify as `Excellent`. Callers that aggregate over
/// arbitrary keys rely on this permissive default, so it is kept as is.
pub fn classify_parameter(name: &str, value: f64) -> Tier {
    match Parameter::from_name(name) {
        Some(parameter) => classify(parameter, value),
        None => Tier::Excellent,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiers(name: &str, cases: &[(f64, Tier)]) {
        for &(value, expected) in cases {
            assert_eq!(
                classify_parameter(name, value),
                expected,
                "{} = {} should be {:?}",
                name,
                value,
                expected
            );
        }
    }

    // --- pH -----------------------------------------------------------------

    #[test]
    fn test_ph_boundaries() {
        assert_tiers(
            "ph",
            &[
                (6.5, Tier::Excellent),
                (7.2, Tier::Excellent),
                (8.0, Tier::Excellent),
                (6.0, Tier::Marginal),
                (6.49, Tier::Marginal),
                (8.01, Tier::Marginal),
                (9.0, Tier::Marginal),
                (5.99, Tier::Unsafe),
                (9.01, Tier::Unsafe),
                (0.0, Tier::Unsafe),
                (14.0, Tier::Unsafe),
            ],
        );
    }

    #[test]
    fn test_ph_excellent_across_whole_band() {
        let mut v = 6.5;
        while v <= 8.0 {
            assert_eq!(classify(Parameter::Ph, v), Tier::Excellent, "pH {}", v);
            v += 0.05;
        }
    }

    // --- Turbidity ----------------------------------------------------------

    #[test]
    fn test_turbidity_boundaries() {
        assert_tiers(
            "turbidity",
            &[
                (0.0, Tier::Excellent),
                (1.0, Tier::Excellent),
                (1.01, Tier::Marginal),
                (4.0, Tier::Marginal),
                (4.01, Tier::Unsafe),
                (50.0, Tier::Unsafe),
            ],
        );
    }

    #[test]
    fn test_negative_turbidity_is_outside_every_band() {
        assert_eq!(classify(Parameter::Turbidity, -0.1), Tier::Unsafe);
    }

    // --- TDS ----------------------------------------------------------------

    #[test]
    fn test_tds_boundaries() {
        assert_tiers(
            "tds",
            &[
                (80.0, Tier::Excellent),
                (300.0, Tier::Excellent),
                (50.0, Tier::Marginal),
                (79.9, Tier::Marginal),
                (300.1, Tier::Marginal),
                (500.0, Tier::Marginal),
                (49.9, Tier::Unsafe),
                (500.1, Tier::Unsafe),
            ],
        );
    }

    // --- Conductivity -------------------------------------------------------

    #[test]
    fn test_conductivity_boundaries() {
        assert_tiers(
            "conductivity",
            &[
                (100.0, Tier::Excellent),
                (400.0, Tier::Excellent),
                (400.1, Tier::Marginal),
                (800.0, Tier::Marginal),
                (800.1, Tier::Unsafe),
                (49.9, Tier::Unsafe),
            ],
        );
    }

    #[test]
    fn test_conductivity_gap_between_50_and_100_is_marginal() {
        for v in [50.0, 75.0, 99.9] {
            assert_eq!(classify(Parameter::Conductivity, v), Tier::Marginal, "{} μS/cm", v);
        }
    }

    // --- Temperature --------------------------------------------------------

    #[test]
    fn test_temperature_boundaries() {
        assert_tiers(
            "temperature",
            &[
                (5.0, Tier::Excellent),
                (25.0, Tier::Excellent),
                (0.0, Tier::Marginal),
                (4.9, Tier::Marginal),
                (25.1, Tier::Marginal),
                (35.0, Tier::Marginal),
                (-0.1, Tier::Unsafe),
                (35.1, Tier::Unsafe),
            ],
        );
    }

    // --- Names and unclassifiable input -------------------------------------

    #[test]
    fn test_unknown_parameter_name_is_excellent() {
        assert_eq!(classify_parameter("salinity", 9999.0), Tier::Excellent);
        assert_eq!(classify_parameter("", -1.0), Tier::Excellent);
    }

    #[test]
    fn test_parameter_names_are_case_insensitive() {
        assert_eq!(classify_parameter("PH", 9.5), Tier::Unsafe);
        assert_eq!(classify_parameter("Turbidity", 2.0), Tier::Marginal);
    }

    #[test]
    fn test_non_finite_values_are_unknown() {
        for p in Parameter::ALL {
            assert_eq!(classify(p, f64::NAN), Tier::Unknown);
            assert_eq!(classify(p, f64::INFINITY), Tier::Unknown);
        }
    }

    #[test]
    fn test_excellent_band_nested_inside_acceptable_band() {
        // A violated nesting would make some excellent values unreachable.
        for p in Parameter::ALL {
            let t = thresholds(p);
            assert!(t.acceptable.low <= t.excellent.low, "{}", p);
            assert!(t.excellent.low <= t.excellent.high, "{}", p);
            assert!(t.excellent.high <= t.acceptable.high, "{}", p);
        }
    }
}
