use crate::graph::term::StringStore;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Process-scoped state that call sites borrow explicitly: the random source used to build
/// permuted test inputs and the string store behind term labels.
pub struct Context {
    seed: u64,
    pub rng: StdRng,
    pub strings: StringStore,
}

impl Context {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            strings: StringStore::new(),
        }
    }

    /// Reseed the generator and drop all interned strings.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.strings.clear();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(0)
    }
}
