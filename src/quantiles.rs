//! The shared quantile permutation.
//!
//! Both contributions draw their Monte Carlo samples through the inverse CDF
//! of their own fitted distribution, but they share one seeded assignment of
//! sample index to quantile. Sample `i` therefore sits at the same
//! probability level in the thermal-expansion and ocean-dynamics
//! distributions, which induces the intended correlation between the two
//! contributions without an explicit joint draw. Re-drawing independent
//! quantiles per contribution would destroy that structure.

use crate::errors::{SterodynError, SterodynResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// An ordered bijection between sample index and a quantile in the open
/// interval (0, 1), generated deterministically from a seed.
///
/// Immutable once generated; one assignment is produced per pipeline run and
/// shared read-only across both contributions and all location chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileAssignment {
    quantiles: Vec<f64>,
    seed: u64,
}

impl QuantileAssignment {
    /// Generate `nsamps` quantiles evenly spaced in (0, 1), then permute
    /// their order with an RNG seeded by `seed`.
    ///
    /// The endpoints 0 and 1 are excluded so that inverse-CDF evaluation
    /// never produces an infinite tail value. The same `(seed, nsamps)` pair
    /// always reproduces the identical permutation.
    pub fn generate(nsamps: usize, seed: u64) -> SterodynResult<Self> {
        if nsamps == 0 {
            return Err(SterodynError::Configuration(
                "sample count must be positive".to_string(),
            ));
        }

        // linspace over (0, 1) with nsamps + 2 points, endpoints dropped.
        let step = 1.0 / (nsamps + 1) as f64;
        let mut quantiles: Vec<f64> = (1..=nsamps).map(|i| i as f64 * step).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        quantiles.shuffle(&mut rng);

        Ok(Self { quantiles, seed })
    }

    /// The quantile assigned to each sample index.
    pub fn values(&self) -> &[f64] {
        &self.quantiles
    }

    /// Number of samples in the assignment.
    pub fn nsamps(&self) -> usize {
        self.quantiles.len()
    }

    /// The seed the permutation was generated from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
