use anyhow::{Context, Result, ensure};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

/// A discrete distribution over arbitrary f64 variate values.
///
/// Built once from a pseudo-distribution (weights need not be normalized);
/// sampling inverts the discrete CDF via [`WeightedIndex`]. The distribution
/// itself is immutable and cheap to share; only the generator passed to
/// [`ProbabilityDistribution::sample`] carries mutable state, so concurrent
/// callers must synchronize on the generator, not on the distribution.
#[derive(Debug, Clone)]
pub struct ProbabilityDistribution {
    values: Vec<f64>,
    sampler: WeightedIndex<f64>,
}

impl ProbabilityDistribution {
    /// Creates a distribution from (value, weight) pairs.
    ///
    /// Weights must be non-negative with a positive sum.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self> {
        ensure!(!pairs.is_empty(), "distribution needs at least one variate");
        let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
        let weights: Vec<f64> = pairs.iter().map(|(_, w)| *w).collect();
        let sampler = WeightedIndex::new(&weights)
            .context("invalid pseudo-distribution weights")?;
        Ok(Self { values, sampler })
    }

    /// Draws one variate value using the supplied generator.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        self.values[self.sampler.sample(rng)]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
