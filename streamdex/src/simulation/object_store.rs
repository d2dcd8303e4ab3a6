//! Simulated in-memory object store for deterministic testing.
//!
//! Supports fault injection at the request level:
//! - Request errors (the client sees a transport failure)
//! - Short bodies (the store returns fewer bytes than asked for)

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::object_store::{ObjectStore, ObjectStoreError, slice_range};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a failed request (0.0 - 1.0).
    pub request_error_rate: f64,
    /// Probability that a range response is truncated (0.0 - 1.0).
    pub short_body_rate: f64,
}

impl FaultConfig {
    /// Create a fault config with no faults (for baseline testing).
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Create a fault config with high fault rates (for extreme testing).
    #[must_use]
    pub const fn high_faults() -> Self {
        Self {
            request_error_rate: 0.05,
            short_body_rate: 0.05,
        }
    }
}

/// Statistics about simulated requests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulatedObjectStoreStats {
    /// Number of `head` requests.
    pub heads: u64,
    /// Number of `get_range` requests.
    pub range_requests: u64,
    /// Total bytes returned by range requests.
    pub bytes_served: u64,
    /// Inclusive bounds of every range request, in order.
    pub ranges: Vec<(u64, u64)>,
    /// Number of injected request errors.
    pub injected_errors: u64,
    /// Number of truncated responses.
    pub short_bodies: u64,
}

struct Inner {
    objects: HashMap<(String, String), Vec<u8>>,
    fault_config: FaultConfig,
    rng: StdRng,
    stats: SimulatedObjectStoreStats,
}

impl Inner {
    fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    fn maybe_fail(&mut self, what: &str) -> Result<(), ObjectStoreError> {
        if self.should_inject_fault(self.fault_config.request_error_rate) {
            self.stats.injected_errors += 1;
            return Err(ObjectStoreError::InjectedFault(format!(
                "simulated {what} failure"
            )));
        }
        Ok(())
    }

    fn object(&self, bucket: &str, key: &str) -> Result<&Vec<u8>, ObjectStoreError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

/// In-memory object store for deterministic testing.
///
/// Given the same seed and the same request sequence, the same faults are
/// injected. Interior mutability lets it serve `&self` requests like a real
/// client; the lock is never held across calls into other code.
pub struct SimulatedObjectStore {
    inner: Mutex<Inner>,
}

impl SimulatedObjectStore {
    /// Create an empty store with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, FaultConfig::no_faults())
    }

    /// Create an empty store with custom fault configuration.
    #[must_use]
    pub fn with_config(seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: HashMap::new(),
                fault_config,
                rng: StdRng::seed_from_u64(seed),
                stats: SimulatedObjectStoreStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store (or replace) an object.
    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
    }

    /// Get a snapshot of the current statistics.
    #[must_use]
    pub fn stats(&self) -> SimulatedObjectStoreStats {
        self.lock().stats.clone()
    }

    /// Reset statistics.
    pub fn reset_stats(&self) {
        self.lock().stats = SimulatedObjectStoreStats::default();
    }

    /// Update the fault configuration.
    pub fn set_fault_config(&self, config: FaultConfig) {
        self.lock().fault_config = config;
    }
}

impl ObjectStore for SimulatedObjectStore {
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError> {
        let mut inner = self.lock();
        inner.stats.heads += 1;
        inner.maybe_fail("head")?;
        Ok(inner.object(bucket, key)?.len() as u64)
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        let mut inner = self.lock();
        inner.stats.range_requests += 1;
        inner.stats.ranges.push((start, end));
        inner.maybe_fail("range request")?;

        let mut body = slice_range(inner.object(bucket, key)?, start, end)?;
        let short_body_rate = inner.fault_config.short_body_rate;
        if !body.is_empty() && inner.should_inject_fault(short_body_rate) {
            inner.stats.short_bodies += 1;
            let cutoff = inner.rng.random_range(0..body.len());
            body.truncate(cutoff);
        }
        inner.stats.bytes_served += body.len() as u64;
        drop(inner);
        Ok(body)
    }
}
