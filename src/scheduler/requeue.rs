//! Shared periodic resubmission of spilled tasks.
//!
//! One thread per registry. Every tick it takes exactly one task from the
//! spillover of each live pool and sends it back through admission. Taking a
//! single task per pool keeps recovery from re-flooding a queue that is still
//! saturated; the price is that a backlog of `n` spilled tasks needs at least
//! `n` ticks to clear. A resubmitted task can spill again, so under sustained
//! overload a task may cycle for as long as the overload lasts.

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::executor::ManagedPool;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Command {
    Track(Weak<ManagedPool>),
    /// Run a tick immediately and report how many tasks were resubmitted.
    TickNow(Sender<usize>),
    Stop,
}

pub struct RequeueScheduler {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    interval: Duration,
}

impl RequeueScheduler {
    pub fn start(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;

        let (commands, inbox) = unbounded();
        let interval = config.requeue_interval;

        let thread = thread::Builder::new()
            .name(config.scheduler_thread_name.clone())
            .spawn(move || requeue_loop(inbox, interval))?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "requeue scheduler started");

        Ok(Self {
            commands,
            thread: Some(thread),
            interval,
        })
    }

    /// Starts servicing `pool` from the next tick on. Returns `false` if the
    /// scheduler thread has already stopped.
    pub fn track(&self, pool: &Arc<ManagedPool>) -> bool {
        if self.commands.send(Command::Track(Arc::downgrade(pool))).is_err() {
            tracing::warn!(
                pool = pool.name(),
                "requeue scheduler is gone, spilled tasks will not be resubmitted"
            );
            return false;
        }
        true
    }

    /// Runs one tick now and waits for it. Returns the number of tasks resubmitted.
    pub fn tick_now(&self) -> usize {
        let (reply, result) = bounded(1);
        if self.commands.send(Command::TickNow(reply)).is_err() {
            return 0;
        }
        result.recv().unwrap_or(0)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for RequeueScheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for RequeueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequeueScheduler")
            .field("interval", &self.interval)
            .finish()
    }
}

fn requeue_loop(inbox: Receiver<Command>, interval: Duration) {
    let ticker = tick(interval);
    let mut pools: Vec<Weak<ManagedPool>> = Vec::new();

    loop {
        select! {
            recv(inbox) -> command => match command {
                Ok(Command::Track(pool)) => pools.push(pool),
                Ok(Command::TickNow(reply)) => {
                    let _ = reply.send(requeue_tick(&mut pools));
                }
                Ok(Command::Stop) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                requeue_tick(&mut pools);
            }
        }
    }

    tracing::debug!("requeue scheduler stopped");
}

/// One task per pool; destroyed or dropped pools are forgotten.
fn requeue_tick(pools: &mut Vec<Weak<ManagedPool>>) -> usize {
    let mut resubmitted = 0;

    pools.retain(|weak| match weak.upgrade() {
        Some(pool) if !pool.is_destroyed() => {
            if pool.requeue_one() {
                resubmitted += 1;
            }
            true
        }
        _ => false,
    });

    if resubmitted > 0 {
        tracing::debug!(resubmitted, pools = pools.len(), "requeue tick");
    }
    resubmitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use std::time::Instant;

    fn scheduler(interval: Duration) -> RequeueScheduler {
        let config = RegistryConfig::builder()
            .requeue_interval(interval)
            .build()
            .unwrap();
        RequeueScheduler::start(&config).unwrap()
    }

    fn saturated_pool(name: &str) -> (Arc<ManagedPool>, crossbeam_channel::Sender<()>) {
        let config = PoolConfig::builder()
            .fixed_threads(1)
            .queue_capacity(1)
            .build()
            .unwrap();
        let pool = ManagedPool::new(name, config).unwrap();

        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        pool.execute(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        (pool, release_tx)
    }

    fn wait_drained(pool: &ManagedPool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.queued_len() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_one_task_per_pool_per_tick() {
        let scheduler = scheduler(Duration::from_secs(3600));
        let (a, release_a) = saturated_pool("a");
        let (b, release_b) = saturated_pool("b");
        scheduler.track(&a);
        scheduler.track(&b);

        // one queued + three spilled in each
        for pool in [&a, &b] {
            for _ in 0..4 {
                pool.execute(|| {}).unwrap();
            }
            assert_eq!(pool.spillover_len(), 3);
        }

        drop(release_a);
        drop(release_b);
        wait_drained(&a);
        wait_drained(&b);

        assert_eq!(scheduler.tick_now(), 2);
        assert_eq!(a.spillover_len(), 2);
        assert_eq!(b.spillover_len(), 2);

        a.shutdown();
        wait_drained(&b);
        assert_eq!(scheduler.tick_now(), 1);
        assert_eq!(b.spillover_len(), 1);
        b.shutdown();
    }

    #[test]
    fn test_periodic_tick_drains_spillover() {
        let scheduler = scheduler(Duration::from_millis(10));
        let (pool, release) = saturated_pool("periodic");

        let (done_tx, done_rx) = unbounded();
        for _ in 0..5 {
            let done_tx = done_tx.clone();
            pool.execute(move || done_tx.send(()).unwrap()).unwrap();
        }
        assert_eq!(pool.spillover_len(), 4);
        scheduler.track(&pool);

        drop(release);
        for _ in 0..5 {
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(pool.spillover_len(), 0);
        assert!(pool.metrics_snapshot().requeued >= 4);
        pool.shutdown();
    }

    #[test]
    fn test_dropped_pools_are_forgotten() {
        let scheduler = scheduler(Duration::from_secs(3600));
        assert_eq!(scheduler.interval(), Duration::from_secs(3600));
        let config = PoolConfig::builder().fixed_threads(1).build().unwrap();
        let pool = ManagedPool::new("gone", config).unwrap();
        scheduler.track(&pool);
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        drop(pool);

        assert_eq!(scheduler.tick_now(), 0);
    }

    #[test]
    fn test_track_after_stop_reports_failure() {
        let mut scheduler = scheduler(Duration::from_secs(3600));
        let config = PoolConfig::builder().fixed_threads(1).build().unwrap();
        let pool = ManagedPool::new("orphan", config).unwrap();

        scheduler.commands.send(Command::Stop).unwrap();
        scheduler.thread.take().unwrap().join().unwrap();

        assert!(!scheduler.track(&pool));
        assert_eq!(scheduler.tick_now(), 0);
        pool.shutdown();
    }
}
