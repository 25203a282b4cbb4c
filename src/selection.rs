use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks which of a topic's templates is used for a reply.
pub trait ResponseSelector: Send {
    /// Returns an index in `0..count`. `count` is always at least 2.
    fn choose(&mut self, count: usize) -> usize;
}

/// Uniform choice driven by a `StdRng`, reproducible when seeded.
pub struct SeededSelector {
    rng: StdRng,
}

impl SeededSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl ResponseSelector for SeededSelector {
    fn choose(&mut self, count: usize) -> usize {
        self.rng.gen_range(0..count)
    }
}

/// Always the primary template.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstVariant;

impl ResponseSelector for FirstVariant {
    fn choose(&mut self, _count: usize) -> usize {
        0
    }
}
