//! Name-keyed circuit breakers.
//!
//! Every client that names the same command through the same registry shares
//! one [`CircuitBreaker`]. The first registration of a name fixes its
//! configuration; later callers passing a different configuration get the
//! existing breaker.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::clock::{Clock, SystemClock};
use super::error::ConfigResult;

static GLOBAL: Lazy<Arc<BreakerRegistry>> = Lazy::new(|| Arc::new(BreakerRegistry::new()));

/// Registry of circuit breakers keyed by command name.
pub struct BreakerRegistry<C: Clock + Clone = SystemClock> {
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
    clock: C,
}

impl BreakerRegistry<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Process-wide registry used when a client is not given its own.
    pub fn global() -> Arc<BreakerRegistry> {
        Arc::clone(&GLOBAL)
    }
}

impl Default for BreakerRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> BreakerRegistry<C> {
    /// Registry whose breakers all read time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self { breakers: DashMap::new(), clock }
    }

    /// Breaker for `name`, created with `config` on first use.
    ///
    /// The configuration is validated only when a new breaker is created.
    pub fn get_or_create(
        &self,
        name: &str,
        config: &CircuitBreakerConfig,
    ) -> ConfigResult<Arc<CircuitBreaker<C>>> {
        if let Some(existing) = self.breakers.get(name) {
            if existing.config() != config {
                debug!(command = name, "breaker already registered with a different config");
            }
            return Ok(Arc::clone(existing.value()));
        }

        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let breaker =
                    Arc::new(CircuitBreaker::with_clock(name, config.clone(), self.clock.clone())?);
                debug!(command = name, "registered circuit breaker");
                Ok(Arc::clone(entry.insert(breaker).value()))
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker<C>>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the breaker for `name`; clients already holding it keep using it.
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker<C>>> {
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl<C: Clock + Clone> fmt::Debug for BreakerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry").field("commands", &self.names()).finish()
    }
}
