/// Disaggregation matching.
///
/// Turns a precomputed mean disaggregation result into a concrete set of
/// stochastic events: one representative per occupied bin, carrying that
/// bin's probability of exceedance.
///
/// Submodules:
/// - `precision` — infers bin widths from the grid values.
/// - `binning`   — snaps event coordinates to bin centers.
/// - `sampler`   — picks one event per occupied bin with a seeded generator.

pub mod binning;
pub mod precision;
pub mod sampler;

pub use binning::{bin_events, BinnedEvent};
pub use precision::infer_precision;
pub use sampler::{seed_for_bin, DeaggregationSampler, SampleOutcome, DEFAULT_SEED, MATCH_TOLERANCE};
