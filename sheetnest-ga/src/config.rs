use serde::{Deserialize, Serialize};

/// Configuration of the genetic search.
/// Population size, number of generations and mutation rate are part of every request instead.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GAConfig {
    /// Seed for the PRNG. If undefined, the algorithm will run in non-deterministic mode using entropy
    pub prng_seed: Option<u64>,
    /// Number of best individuals copied unchanged into the next generation
    pub elite_count: usize,
    /// Number of individuals competing in every tournament selection
    pub tournament_size: usize,
    /// Probability that a child is produced by crossover rather than by cloning a parent
    pub crossover_rate: f64,
}

impl Default for GAConfig {
    fn default() -> Self {
        Self {
            prng_seed: Some(0),
            elite_count: 2,
            tournament_size: 3,
            crossover_rate: 0.85,
        }
    }
}
