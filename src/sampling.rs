use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses which member ids of a collection get probed during detection.
pub trait SampleSelector {
    /// Returns `min(count, ids.len())` distinct entries of `ids`.
    fn pick<'a>(&mut self, ids: &'a [String], count: usize) -> Vec<&'a str>;
}

/// Uniform selection without replacement.
pub struct RandomSampler<R: Rng> {
    rng: R,
}

impl RandomSampler<StdRng> {
    /// Reproducible sampler; the same seed and input give the same picks.
    pub fn seeded(seed: u64) -> Self {
        RandomSampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        RandomSampler {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> SampleSelector for RandomSampler<R> {
    fn pick<'a>(&mut self, ids: &'a [String], count: usize) -> Vec<&'a str> {
        let amount = count.min(ids.len());
        rand::seq::index::sample(&mut self.rng, ids.len(), amount)
            .into_iter()
            .map(|i| ids[i].as_str())
            .collect()
    }
}
