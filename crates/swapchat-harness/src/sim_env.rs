//! Seeded environment for deterministic simulation.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use swapchat_core::env::Environment;

/// Virtual clock start: 2023-11-14T22:13:20Z.
pub const SIM_EPOCH_MILLIS: i64 = 1_700_000_000_000;

const STREAM_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Deterministic environment.
///
/// Every [`Environment::rng`] call hands out a fresh ChaCha stream derived
/// from the seed and a call counter, so two runs with the same seed and the
/// same call order produce identical keys and ciphertext. Clones share the
/// counter and the clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    seed: u64,
    streams: Arc<AtomicU64>,
    clock: Arc<AtomicI64>,
}

impl SimEnv {
    /// Environment for `seed` with the clock at [`SIM_EPOCH_MILLIS`].
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, streams: Arc::new(AtomicU64::new(0)), clock: Arc::new(AtomicI64::new(SIM_EPOCH_MILLIS)) }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    /// Number of RNG streams handed out so far.
    pub fn streams_issued(&self) -> u64 {
        self.streams.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    type Rng = ChaCha20Rng;

    fn rng(&self) -> Self::Rng {
        let stream = self.streams.fetch_add(1, Ordering::SeqCst);
        ChaCha20Rng::seed_from_u64(self.seed ^ stream.wrapping_mul(STREAM_STRIDE))
    }

    /// Advances the virtual clock, then waits on the tokio timer so
    /// timeouts still race real work.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        tokio::time::sleep(duration)
    }

    fn now_millis(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }
}
