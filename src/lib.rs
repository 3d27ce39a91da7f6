//! Spillway - named bounded worker pools that never drop a task on the floor.
//!
//! A [`Registry`] hands out named pools. Each pool runs between `core` and
//! `max` worker threads behind a bounded admission queue (FIFO or priority
//! ordered). When a pool is saturated, submissions are not refused: they are
//! moved to the pool's spillover buffer, and a requeue scheduler shared by all
//! pools of the registry resubmits one spilled task per pool on every tick.
//!
//! # Quick Start
//!
//! ```no_run
//! use spillway::prelude::*;
//!
//! let registry = Registry::new();
//!
//! let config = PoolConfig::builder()
//!     .core_threads(1)
//!     .max_threads(1)
//!     .priority_mode(true)
//!     .build()
//!     .unwrap();
//! let pool = registry.create_or_get("downloads", config).unwrap();
//!
//! let id = pool
//!     .execute_with_priority(|| println!("urgent"), Priority::HIGH)
//!     .unwrap();
//!
//! // best effort: only succeeds while the task is still waiting
//! let _ = pool.cancel(id);
//!
//! registry.destroy("downloads");
//! ```
//!
//! # Guarantees
//!
//! - a task accepted by a running pool runs at most once, and runs unless it is
//!   cancelled or the pool is destroyed first
//! - the admission queue never holds more than its capacity
//! - submitting to a destroyed pool fails with [`Error::PoolDestroyed`]
//! - destroying a pool discards its queued and spilled tasks immediately

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{PoolConfig, PoolConfigBuilder, QueueOrder, RegistryConfig, RegistryConfigBuilder};
pub use error::{Error, Result};
pub use executor::{interrupted, ManagedPool, PanicStrategy, Priority, Task, TaskId};
pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_basic_submit() {
        let registry = Registry::new();
        let pool = registry.create_or_get_default("basic").unwrap();

        let (tx, rx) = unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            pool.execute(move || tx.send(i).unwrap()).unwrap();
        }

        let mut seen: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = Registry::new();
        let b = Registry::new();

        let pa = a.create_or_get_default("shared-name").unwrap();
        let pb = b.create_or_get_default("shared-name").unwrap();
        assert!(!std::sync::Arc::ptr_eq(&pa, &pb));

        a.destroy("shared-name");
        assert!(pa.is_destroyed());
        assert!(!pb.is_destroyed());
        assert!(b.get("shared-name").is_some());
    }
}
