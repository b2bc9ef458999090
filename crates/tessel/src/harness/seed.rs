//! Explicit per-backend RNG seed registry.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed every backend generator starts from before the first
/// [`SeedRegistry::set_seed`].
pub const DEFAULT_SEED: u64 = 0;

#[derive(Debug)]
struct BackendGenerator {
    seed: u64,
    rng: StdRng,
}

impl BackendGenerator {
    fn from_seed(seed: u64) -> Self {
        BackendGenerator {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// One seeded generator per backend name.
///
/// Deliberately a value the test code passes around rather than
/// process-global state: two tests with their own registries cannot disturb
/// each other's random streams, and the seed that produced any tensor is one
/// lookup away when a failure needs reproducing.
#[derive(Debug, Default)]
pub struct SeedRegistry {
    generators: HashMap<String, BackendGenerator>,
}

impl SeedRegistry {
    pub fn new() -> Self {
        SeedRegistry::default()
    }

    /// Reseeds (or creates) the generator for `backend`, restarting its
    /// stream.
    pub fn set_seed(&mut self, backend: &str, seed: u64) {
        self.generators
            .insert(backend.to_string(), BackendGenerator::from_seed(seed));
    }

    /// The seed last set for `backend`, or [`DEFAULT_SEED`] when untouched.
    pub fn seed(&self, backend: &str) -> u64 {
        self.generators
            .get(backend)
            .map(|generator| generator.seed)
            .unwrap_or(DEFAULT_SEED)
    }

    /// Stateful generator for `backend`; draws advance the stream until the
    /// next [`set_seed`](SeedRegistry::set_seed).
    pub fn rng_mut(&mut self, backend: &str) -> &mut StdRng {
        &mut self
            .generators
            .entry(backend.to_string())
            .or_insert_with(|| BackendGenerator::from_seed(DEFAULT_SEED))
            .rng
    }
}
