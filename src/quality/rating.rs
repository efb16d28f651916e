//! Overall sample rating.
//!
//! The overall tier is a penalty score, not the worst parameter tier: one
//! marginal deviation keeps a sample `Marginal`, but two unsafe parameters,
//! or an unsafe one plus a marginal one, push it to `Unsafe`.
//!
//! Temperature is classified for display only and never contributes.

use serde::Serialize;

use crate::model::{Parameter, Reading, Tier};
use crate::quality::thresholds::classify;

/// Score at or above which a sample is `Unsafe`.
pub const UNSAFE_SCORE: u8 = 3;
/// Score at or above which a sample is `Marginal`.
pub const MARGINAL_SCORE: u8 = 1;

/// Parameters that contribute to the overall score.
pub const SCORED_PARAMETERS: [Parameter; 4] = [
    Parameter::Ph,
    Parameter::Turbidity,
    Parameter::Tds,
    Parameter::Conductivity,
];

fn penalty(tier: Tier) -> u8 {
    match tier {
        Tier::Unsafe => 2,
        Tier::Marginal => 1,
        Tier::Excellent | Tier::Unknown => 0,
    }
}

/// Sum of per-parameter penalties for the four scored parameters.
pub fn penalty_score(ph: f64, turbidity: f64, tds: f64, conductivity: f64) -> u8 {
    penalty(classify(Parameter::Ph, ph))
        + penalty(classify(Parameter::Turbidity, turbidity))
        + penalty(classify(Parameter::Tds, tds))
        + penalty(classify(Parameter::Conductivity, conductivity))
}

fn tier_for_score(score: u8) -> Tier {
    if score >= UNSAFE_SCORE {
        Tier::Unsafe
    } else if score >= MARGINAL_SCORE {
        Tier::Marginal
    } else {
        Tier::Excellent
    }
}

/// Overall tier for a sample from its four scored parameters.
pub fn aggregate(ph: f64, turbidity: f64, tds: f64, conductivity: f64) -> Tier {
    tier_for_score(penalty_score(ph, turbidity, tds, conductivity))
}

/// Overall tier of a stored or incoming reading.
pub fn overall_tier(reading: &Reading) -> Tier {
    aggregate(reading.ph, reading.turbidity, reading.tds, reading.conductivity)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Per-parameter tiers of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterTiers {
    pub temperature: Tier,
    pub ph: Tier,
    pub turbidity: Tier,
    pub conductivity: Tier,
    pub tds: Tier,
}

impl ParameterTiers {
    pub fn get(&self, parameter: Parameter) -> Tier {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Conductivity => self.conductivity,
            Parameter::Tds => self.tds,
        }
    }
}

/// Derived classification of a reading. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub overall: Tier,
    pub score: u8,
    pub parameters: ParameterTiers,
}

impl Classification {
    pub fn of(reading: &Reading) -> Self {
        let score = penalty_score(reading.ph, reading.turbidity, reading.tds, reading.conductivity);
        Classification {
            overall: tier_for_score(score),
            score,
            parameters: ParameterTiers {
                temperature: classify(Parameter::Temperature, reading.temperature),
                ph: classify(Parameter::Ph, reading.ph),
                turbidity: classify(Parameter::Turbidity, reading.turbidity),
                conductivity: classify(Parameter::Conductivity, reading.conductivity),
                tds: classify(Parameter::Tds, reading.tds),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
