//! Deterministic core of the gossip simulator.
//!
//! The simulation advances in integer-millisecond steps on a single
//! thread. Within one tick the phases are strictly ordered: inject,
//! propagate, prepare a block proposal if none is live, then evaluate
//! the publish quorum. Each component is the sole mutator of its own
//! state, so no synchronization is needed:
//!
//! - [`PropagationEngine`] owns the in-flight set and attempt timers;
//! - [`KnownStore`] owns the per-peer known bitmaps and the global
//!   published bitmap;
//! - [`Publisher`] owns the proposed block and drives removals from the
//!   pool and the in-flight set at publish time;
//! - [`ExperimentRunner`] owns simulated time.
//!
//! Every random draw flows through one seeded `ChaCha8Rng`, so a run is
//! fully reproducible from its configuration.

mod config;
mod known;
mod network;
mod pool;
mod propagation;
mod publisher;
mod runner;

pub use config::{ConfigError, SimConfig};
pub use known::KnownStore;
pub use network::Network;
pub use pool::TxPool;
pub use propagation::{BroadcastStats, DeliveryAttempt, InFlightTx, PropagationEngine};
pub use publisher::{ProposedBlock, PublishOutcome, Publisher};
pub use runner::{ExperimentResult, ExperimentRunner, ProgressSample, RunStats};
