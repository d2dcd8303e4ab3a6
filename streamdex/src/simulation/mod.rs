//! Deterministic simulation infrastructure.
//!
//! Remote reads go through the `ObjectStore` trait, so tests can swap the
//! network for an in-memory store that:
//! - records every request it serves
//! - injects request failures and short bodies
//! - given the same seed, behaves identically

mod object_store;

pub use object_store::{FaultConfig, SimulatedObjectStore, SimulatedObjectStoreStats};
