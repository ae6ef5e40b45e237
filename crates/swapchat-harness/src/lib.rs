//! Deterministic simulation harness for Swapchat session testing.
//!
//! In-memory implementations of the environment, relay transport, backend
//! and driver seams, so the production runtime and session state machine
//! run end to end with real RSA key exchange and no network.

#![forbid(unsafe_code)]

pub mod scenario;
pub mod sim_backend;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod sim_transport;

pub use scenario::{SIM_RELAY_URL, SimRuntime, Simulation};
pub use sim_backend::SimBackend;
pub use sim_driver::{ScriptedDriver, SimError, Step};
pub use sim_env::SimEnv;
pub use sim_relay::{ConnectionId, Received, SharedSimRelay, SimRelay, StoredBody, StoredMessage, create_shared_relay};
pub use sim_transport::{SimConnection, SimConnector};
