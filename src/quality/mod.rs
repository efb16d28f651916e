/// Water quality classification.
///
/// Submodules:
/// - `thresholds`: per-parameter tier rules.
/// - `rating`:     overall penalty-score rating and on-demand classification.
/// - `freshness`:  reading age, staleness and the freshness badge.
/// - `reference`:  static display texts keyed by parameter and tier.

pub mod freshness;
pub mod rating;
pub mod reference;
pub mod thresholds;

pub use rating::{aggregate, Classification, ParameterTiers};
pub use thresholds::classify_parameter;
