/// Seeded selection of one representative event per occupied bin.
///
/// # Determinism
/// Every bin gets its own generator, seeded from `seed_for_bin(seed, index)`
/// where `index` counts occupied bins in result order. No generator state
/// is shared between bins, sampler instances, or queries, so the same
/// events, bins, and seed always produce the same selection.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::deagg::binning::{bin_events, BinnedEvent};
use crate::model::{DisaggregationBin, Event, Precision};

/// Seed used by the command line when none is configured.
pub const DEFAULT_SEED: u64 = 42;

/// Absolute tolerance on each axis when comparing a binned event with a bin
/// center. Absorbs floating-point noise left by `snap`.
pub const MATCH_TOLERANCE: f64 = 1e-5;

/// Seed of the generator used for the `bin_index`-th occupied bin.
pub fn seed_for_bin(base_seed: u64, bin_index: usize) -> u64 {
    base_seed.wrapping_add(bin_index as u64)
}

/// Result of a sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    /// Copies of the selected (un-binned) events in bin order, each with
    /// `probability` set to its bin's `poe`.
    pub representatives: Vec<Event>,
    /// Number of bins with `poe > 0`.
    pub occupied_bins: usize,
}

impl SampleOutcome {
    /// Occupied bins that had no candidate event and were dropped.
    pub fn unmatched_bins(&self) -> usize {
        self.occupied_bins - self.representatives.len()
    }
}

pub struct DeaggregationSampler<'a> {
    occupied: Vec<&'a DisaggregationBin>,
    precision: Precision,
    seed: u64,
}

impl<'a> DeaggregationSampler<'a> {
    /// Builds a sampler over the bins of one (site, poe50y) result.
    /// Bins with `poe <= 0` are unoccupied and never matched.
    pub fn new(bins: &'a [DisaggregationBin], precision: Precision) -> Self {
        Self {
            occupied: bins.iter().filter(|b| b.poe > 0.0).collect(),
            precision,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Picks at most one candidate per occupied bin.
    ///
    /// A bin without matching candidates contributes nothing, so the result
    /// can be shorter than the number of occupied bins.
    pub fn sample(&self, candidates: &[Event]) -> SampleOutcome {
        let binned = bin_events(candidates, &self.precision);
        let mut representatives = Vec::new();

        for (index, bin) in self.occupied.iter().enumerate() {
            let matches: Vec<&BinnedEvent> = binned.iter().filter(|b| in_bin(b, bin)).collect();
            if matches.is_empty() {
                continue;
            }

            let mut rng = ChaCha8Rng::seed_from_u64(seed_for_bin(self.seed, index));
            let pick = matches[rng.gen_range(0..matches.len())];

            let mut event = candidates[pick.row].clone();
            event.probability = Some(bin.poe);
            representatives.push(event);
        }

        SampleOutcome {
            representatives,
            occupied_bins: self.occupied.len(),
        }
    }
}

/// True if the binned coordinates equal the bin center within tolerance.
pub fn in_bin(binned: &BinnedEvent, bin: &DisaggregationBin) -> bool {
    (binned.longitude - bin.lon).abs() < MATCH_TOLERANCE
        && (binned.latitude - bin.lat).abs() < MATCH_TOLERANCE
        && (binned.magnitude - bin.mag).abs() < MATCH_TOLERANCE
}
