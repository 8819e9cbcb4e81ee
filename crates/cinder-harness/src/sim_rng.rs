//! Seeded randomness for deterministic simulation.

use std::{cell::RefCell, rc::Rc};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Seeded RNG shared between clones.
///
/// Every clone draws from the same ChaCha20 stream, so a simulation that
/// hands the RNG to several participants still replays identically for a
/// given seed.
#[derive(Clone)]
pub struct SimRng {
    rng: Rc<RefCell<ChaCha20Rng>>,
}

impl SimRng {
    /// RNG with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// RNG with a specific seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Rc::new(RefCell::new(ChaCha20Rng::seed_from_u64(seed))) }
    }

    /// Fill `buffer` with random bytes.
    pub fn fill(&self, buffer: &mut [u8]) {
        self.rng.borrow_mut().fill_bytes(buffer);
    }

    /// `len` random bytes.
    pub fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.fill(&mut bytes);
        bytes
    }

    /// Fixed-size random array.
    pub fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.fill(&mut bytes);
        bytes
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRng").finish_non_exhaustive()
    }
}
