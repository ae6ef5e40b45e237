//! Simulation world wiring.
//!
//! A [`Simulation`] bundles one seeded environment, one relay and one
//! backend, and builds application runtimes on top of them.
//!
//! # Example
//!
//! ```no_run
//! use swapchat_harness::{Simulation, Step};
//! use swapchat_app::{AppAction, SessionSelection};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let sim = Simulation::new(7)?;
//! sim.account("alice", "tok-a");
//! sim.account("bob", "tok-b");
//! sim.backend.log_in_as("alice");
//!
//! let mut runtime = sim.runtime(vec![
//!     Step::Act(AppAction::OpenSession(SessionSelection::DirectLink { uuid: "bob".into() })),
//!     Step::wait_until("active", |app| app.session().is_some_and(|s| s.can_send())),
//! ]);
//! runtime.run().await?;
//! # Ok(())
//! # }
//! ```

use swapchat_app::{Runtime, RuntimeConfig};
use swapchat_crypto::CryptoError;

use crate::{
    SimBackend, SimEnv,
    sim_driver::{ScriptedDriver, Step},
    sim_relay::{SharedSimRelay, create_shared_relay},
    sim_transport::SimConnector,
};

/// Relay address handed to runtimes; the simulated connector ignores it.
pub const SIM_RELAY_URL: &str = "ws://relay.sim.invalid/socket.io/";

/// Runtime type driven by the harness.
pub type SimRuntime = Runtime<ScriptedDriver, SimBackend, SimEnv>;

/// One simulated deployment.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Shared seeded environment
    pub env: SimEnv,
    /// In-memory relay
    pub relay: SharedSimRelay,
    /// In-memory backend
    pub backend: SimBackend,
}

impl Simulation {
    /// World for `seed`. Generates the relay key pair.
    pub fn new(seed: u64) -> Result<Self, CryptoError> {
        let env = SimEnv::with_seed(seed);
        let relay = create_shared_relay(env.clone())?;
        Ok(Self { env, relay, backend: SimBackend::new() })
    }

    /// Register `uuid` with the backend and the relay. Username, email and
    /// password are derived from the id.
    pub fn account(&self, uuid: &str, token: &str) {
        self.backend.add_account(uuid, uuid, &format!("{uuid}@sim.invalid"), "password", token);
        self.relay.lock().register_token(token, uuid);
    }

    /// Default runtime settings for simulation.
    pub fn config(&self) -> RuntimeConfig {
        RuntimeConfig::new(SIM_RELAY_URL)
    }

    /// Runtime executing `steps` with default settings.
    pub fn runtime(&self, steps: impl IntoIterator<Item = Step>) -> SimRuntime {
        self.runtime_with(steps, self.config())
    }

    /// Runtime executing `steps` with `config`.
    pub fn runtime_with(&self, steps: impl IntoIterator<Item = Step>, config: RuntimeConfig) -> SimRuntime {
        let driver = ScriptedDriver::new(SimConnector::new(self.relay.clone()), steps);
        Runtime::new(driver, self.backend.clone(), self.env.clone(), config)
    }
}
