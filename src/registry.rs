//! Named pools and the requeue scheduler they share.

use crate::config::{PoolConfig, RegistryConfig};
use crate::error::{Error, Result};
use crate::executor::ManagedPool;
use crate::scheduler::RequeueScheduler;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    pools: HashMap<String, Arc<ManagedPool>>,
    // started with the first pool, stopped when the registry drops
    scheduler: Option<RequeueScheduler>,
}

/// A set of uniquely named pools.
///
/// Registries are independent: each has its own pools and its own requeue
/// scheduler thread. Dropping a registry destroys every pool still in it.
pub struct Registry {
    config: RegistryConfig,
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Returns the pool registered as `name`, creating it from `config` if
    /// there is none.
    ///
    /// `config` is validated either way. An existing pool is returned as is,
    /// even if it was built from a different config.
    pub fn create_or_get(&self, name: &str, config: PoolConfig) -> Result<Arc<ManagedPool>> {
        validate_name(name)?;
        config.validate()?;

        if let Some(pool) = self.get(name) {
            return Ok(pool);
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let stale = match inner.pools.get(name) {
            Some(pool) if !pool.is_destroyed() => {
                tracing::debug!(pool = name, "pool already registered");
                return Ok(pool.clone());
            }
            Some(_) => true,
            None => false,
        };
        // shut down through its own handle; the name is free again
        if stale {
            inner.pools.remove(name);
            tracing::debug!(pool = name, "replacing destroyed pool");
        }

        let pool = ManagedPool::new(name, config)?;
        if inner.scheduler.is_none() {
            match RequeueScheduler::start(&self.config) {
                Ok(scheduler) => inner.scheduler = Some(scheduler),
                Err(err) => {
                    pool.shutdown();
                    return Err(err);
                }
            }
        }
        if let Some(scheduler) = inner.scheduler.as_ref() {
            scheduler.track(&pool);
        }
        inner.pools.insert(name.to_string(), pool.clone());

        let config = pool.config();
        tracing::info!(
            pool = name,
            core = config.core_threads,
            max = config.max_threads,
            capacity = config.queue_capacity,
            order = ?config.order,
            "pool created"
        );

        Ok(pool)
    }

    /// [`Registry::create_or_get`] with [`PoolConfig::default`].
    pub fn create_or_get_default(&self, name: &str) -> Result<Arc<ManagedPool>> {
        self.create_or_get(name, PoolConfig::default())
    }

    /// Looks `name` up. Never creates a pool, and never returns one that has
    /// been shut down.
    pub fn get(&self, name: &str) -> Option<Arc<ManagedPool>> {
        self.inner
            .read()
            .pools
            .get(name)
            .filter(|pool| !pool.is_destroyed())
            .cloned()
    }

    /// Removes and shuts down the pool, discarding its queued and spilled
    /// tasks. Returns `false` if no such pool was registered.
    pub fn destroy(&self, name: &str) -> bool {
        let (removed, remaining) = {
            let mut inner = self.inner.write();
            let removed = inner.pools.remove(name);
            let mut remaining: Vec<String> = inner.pools.keys().cloned().collect();
            remaining.sort();
            (removed, remaining)
        };

        match removed {
            Some(pool) => {
                pool.shutdown();
                tracing::debug!(pool = name, ?remaining, "pool removed from registry");
                true
            }
            None => false,
        }
    }

    /// Destroys every registered pool.
    pub fn destroy_all(&self) {
        let pools: Vec<_> = self.inner.write().pools.drain().collect();
        for (_, pool) in pools {
            pool.shutdown();
        }
    }

    /// Runs a requeue tick right away instead of waiting for the timer.
    /// Returns the number of tasks resubmitted.
    pub fn requeue_now(&self) -> usize {
        self.inner
            .read()
            .scheduler
            .as_ref()
            .map_or(0, RequeueScheduler::tick_now)
    }

    /// Names of the live pools, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .pools
            .iter()
            .filter(|(_, pool)| !pool.is_destroyed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .pools
            .values()
            .filter(|pool| !pool.is_destroyed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("pools", &self.names())
            .field("requeue_interval", &self.config.requeue_interval)
            .finish()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::config("pool name must not be empty"));
    }
    if name.contains('\0') {
        return Err(Error::config("pool name must not contain NUL"));
    }
    Ok(())
}
