//! Environment abstraction.
//!
//! Production uses the operating system RNG and the tokio clock; simulation
//! supplies seeded RNGs so key pairs and ciphertext are reproducible.

use std::{future::Future, time::Duration};

use chrono::Utc;
use rand::{CryptoRng, RngCore, rngs::OsRng};

/// Source of randomness and time for sessions and runtimes.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Cryptographically secure RNG handed to key generation and OAEP.
    type Rng: CryptoRng + RngCore + Send + 'static;

    /// A fresh RNG handle.
    ///
    /// Simulated environments return a distinct deterministic stream per
    /// call so concurrent key generation does not share state.
    fn rng(&self) -> Self::Rng;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Production environment backed by the OS RNG and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Rng = OsRng;

    fn rng(&self) -> Self::Rng {
        OsRng
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
