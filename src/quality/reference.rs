//! Static display texts for the dashboard.
//!
//! Kept apart from `thresholds` so the numeric rules can change without
//! touching copy, and copy can change without touching tests of the rules.

use crate::model::{Parameter, Tier};

/// Why a parameter landed in its tier.
///
/// `value` only matters for unsafe TDS and conductivity, where too low and
/// too high read differently. `Unknown` has no rationale.
pub fn rationale(parameter: Parameter, tier: Tier, value: f64) -> &'static str {
    match (tier, parameter) {
        (Tier::Excellent, Parameter::Ph) => "Ideal drinking water pH range",
        (Tier::Excellent, Parameter::Turbidity) => "Crystal clear water",
        (Tier::Excellent, Parameter::Tds) => "Ideal mineral content for health",
        (Tier::Excellent, Parameter::Conductivity) => "Good drinking water quality",
        (Tier::Excellent, Parameter::Temperature) => "Optimal temperature",

        (Tier::Marginal, Parameter::Ph) => "Acceptable but not ideal pH level",
        (Tier::Marginal, Parameter::Turbidity) => "Good clarity",
        (Tier::Marginal, Parameter::Tds) => "Acceptable mineral content",
        (Tier::Marginal, Parameter::Conductivity) => "Acceptable conductivity level",
        (Tier::Marginal, Parameter::Temperature) => "Acceptable temperature range",

        (Tier::Unsafe, Parameter::Ph) => "pH level unsafe for drinking",
        (Tier::Unsafe, Parameter::Turbidity) => "High turbidity",
        (Tier::Unsafe, Parameter::Tds) if value < 50.0 => "Too low - Lacks minerals",
        (Tier::Unsafe, Parameter::Tds) => "Too high - Excessive dissolved solids",
        (Tier::Unsafe, Parameter::Conductivity) if value < 50.0 => "Too pure - Lacks minerals",
        (Tier::Unsafe, Parameter::Conductivity) => "Too high - Excessive salts",
        (Tier::Unsafe, Parameter::Temperature) => "Temperature outside safe range",

        (Tier::Unknown, _) => "Status unknown",
    }
}

/// Reference ranges shown on each parameter card, one line per tier.
pub fn reference_ranges(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::Ph => "🟢 6.5-8.0\n🟡 6.0-6.4, 8.1-9.0\n🔴 <6.0, >9.0",
        Parameter::Turbidity => "🟢 0-1.0 NTU\n🟡 1.1-4.0 NTU\n🔴 >4.0 NTU",
        Parameter::Tds => "🟢 80-300 ppm\n🟡 50-79, 300-500 ppm\n🔴 <50, >500 ppm",
        Parameter::Conductivity => "🟢 100-400 μS/cm\n🟡 50-99, 400-800 μS/cm\n🔴 <50, >800 μS/cm",
        Parameter::Temperature => "🟢 5-25°C\n🟡 0-35°C\n🔴 <0, >35°C",
    }
}

/// One-sentence explanation of what a parameter measures.
pub fn tooltip(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::Ph => "pH measures the acidity or alkalinity of water, affecting taste and safety.",
        Parameter::Turbidity => {
            "Turbidity indicates the cloudiness of water caused by suspended particles."
        }
        Parameter::Conductivity => {
            "Conductivity reflects the total amount of ions in water, related to mineral content."
        }
        Parameter::Tds => {
            "Total Dissolved Solids (TDS) represents the concentration of dissolved minerals in water."
        }
        Parameter::Temperature => "Temperature affects the taste and biological activity in water.",
    }
}

/// Summary sentence for an overall rating.
pub fn overall_description(tier: Tier) -> &'static str {
    match tier {
        Tier::Excellent => "All parameters are within ideal ranges.",
        Tier::Marginal => {
            "Water quality is acceptable but not ideal. Some parameters need attention."
        }
        Tier::Unsafe => {
            "Water quality is unsafe for drinking. Multiple parameters exceed safe limits."
        }
        Tier::Unknown => "Water quality status is unknown. Please check sensor connection.",
    }
}

pub fn status_text(tier: Tier) -> &'static str {
    match tier {
        Tier::Excellent => "Excellent",
        Tier::Marginal => "Marginal",
        Tier::Unsafe => "Unsafe",
        Tier::Unknown => "Unknown",
    }
}

/// Badge colour per tier, as CSS rgba.
pub fn status_color(tier: Tier) -> &'static str {
    match tier {
        Tier::Excellent => "rgba(16, 185, 129, 0.8)",
        Tier::Marginal => "rgba(245, 158, 11, 0.8)",
        Tier::Unsafe => "rgba(239, 68, 68, 0.8)",
        Tier::Unknown => "rgba(107, 114, 128, 0.8)",
    }
}
