//! A named, bounded worker pool with a spillover buffer.
//!
//! Worker count floats between `core_threads` and `max_threads`:
//!
//! 1. below core, a submitted task starts a new worker directly;
//! 2. otherwise it is offered to the bounded admission queue;
//! 3. if the queue is full and the pool is below max, an extra worker starts
//!    with the task;
//! 4. otherwise the task goes to the spillover buffer, to be resubmitted later
//!    by the registry's requeue scheduler.
//!
//! Workers above the core size retire after `keep_alive` without work.

use super::panic_handler::PanicHandler;
use super::task::{Priority, Task, TaskId};
use super::worker::{Worker, WorkerExit};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::scheduler::{Admission, AdmissionQueue, Spillover};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Destroyed,
}

enum AddWorker {
    Started,
    AtLimit(Option<Task>),
    Failed(Option<Task>, io::Error),
}

pub struct ManagedPool {
    name: String,
    config: PoolConfig,
    // Held shared by every submission and exclusively by shutdown, so no
    // submission can straddle the switch to Destroyed.
    lifecycle: RwLock<RunState>,
    queue: AdmissionQueue,
    spillover: Spillover,
    live_workers: Mutex<usize>,
    all_exited: Condvar,
    spawned: AtomicUsize,
    interrupt: Arc<AtomicBool>,
    panic_handler: PanicHandler,
    metrics: Metrics,
}

impl ManagedPool {
    /// Builds the pool and starts its core workers.
    pub(crate) fn new(name: &str, config: PoolConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let pool = Arc::new(Self {
            name: name.to_string(),
            queue: AdmissionQueue::new(config.order, config.queue_capacity),
            spillover: Spillover::new(),
            lifecycle: RwLock::new(RunState::Running),
            live_workers: Mutex::new(0),
            all_exited: Condvar::new(),
            spawned: AtomicUsize::new(0),
            interrupt: Arc::new(AtomicBool::new(false)),
            panic_handler: PanicHandler::new(config.panic_strategy),
            metrics: Metrics::new(),
            config,
        });

        for _ in 0..pool.config.core_threads {
            if let AddWorker::Failed(_, err) = pool.add_worker(None, pool.config.core_threads) {
                pool.shutdown();
                return Err(Error::Io(err));
            }
        }

        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Submits a task. A full pool parks it in spillover; the caller only
    /// hears about it if the pool has been destroyed.
    pub fn submit(self: &Arc<Self>, task: Task) -> Result<TaskId> {
        let id = task.id;
        let state = self.lifecycle.read();
        if *state == RunState::Destroyed {
            return Err(Error::destroyed(&self.name));
        }

        self.metrics.record_submitted();
        self.admit(task);
        Ok(id)
    }

    pub fn execute<F>(self: &Arc<Self>, f: F) -> Result<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(f))
    }

    pub fn execute_with_priority<F, P>(self: &Arc<Self>, f: F, priority: P) -> Result<TaskId>
    where
        F: FnOnce() + Send + 'static,
        P: Into<Priority>,
    {
        self.submit(Task::with_priority(f, priority))
    }

    /// Removes a task that has not been handed to a worker yet.
    ///
    /// Checks spillover first, then the admission queue. Returns `false` when
    /// the task is running, finished, or unknown; a worker may still win the
    /// race for a queued task.
    pub fn cancel(&self, id: TaskId) -> bool {
        let removed = self
            .spillover
            .remove(id)
            .or_else(|| self.queue.remove(id));

        match removed {
            Some(task) => {
                self.metrics.record_cancelled();
                tracing::debug!(pool = %self.name, task = %id, "task cancelled");
                drop(task);
                true
            }
            None => false,
        }
    }

    /// Stops accepting work and discards everything queued or spilled.
    ///
    /// Running tasks cannot be preempted: they see [`crate::interrupted`]
    /// turn `true` and their workers exit once they return. Does not wait;
    /// see [`ManagedPool::await_termination`].
    pub fn shutdown(&self) {
        let (queued, spilled) = {
            let mut state = self.lifecycle.write();
            if *state == RunState::Destroyed {
                return;
            }
            *state = RunState::Destroyed;
            self.interrupt.store(true, Ordering::Release);
            (self.queue.close(), self.spillover.close())
        };

        self.metrics.record_discarded(queued.len() + spilled.len());
        tracing::info!(
            pool = %self.name,
            queued = queued.len(),
            spilled = spilled.len(),
            "pool destroyed"
        );
    }

    /// Waits until every worker thread has exited. Only meaningful after
    /// [`ManagedPool::shutdown`]; returns `false` on timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut live = self.live_workers.lock();
        while *live > 0 {
            match deadline {
                Some(deadline) => {
                    if self.all_exited.wait_until(&mut live, deadline).timed_out() {
                        return *live == 0;
                    }
                }
                None => self.all_exited.wait(&mut live),
            }
        }
        true
    }

    pub fn is_destroyed(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        *self.live_workers.lock()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn spillover_len(&self) -> usize {
        self.spillover.len()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Moves the oldest spilled task back through admission. Returns whether
    /// a task was resubmitted; it may land in spillover again.
    pub(crate) fn requeue_one(self: &Arc<Self>) -> bool {
        let state = self.lifecycle.read();
        if *state == RunState::Destroyed {
            return false;
        }

        match self.spillover.pop() {
            Some(task) => {
                tracing::trace!(pool = %self.name, task = %task.id, "requeueing spilled task");
                self.metrics.record_requeued();
                self.admit(task);
                true
            }
            None => false,
        }
    }

    // Caller holds the lifecycle read lock.
    fn admit(self: &Arc<Self>, task: Task) {
        let Some(task) = self.start_with(task, self.config.core_threads) else {
            self.metrics.record_admitted();
            return;
        };

        match self.queue.offer(task) {
            Admission::Accepted => {
                self.metrics.record_admitted();
                if self.worker_count() == 0 {
                    self.ensure_worker();
                }
            }
            Admission::Full(task) => {
                let Some(task) = self.start_with(task, self.config.max_threads) else {
                    self.metrics.record_admitted();
                    return;
                };
                self.spill(task);
            }
            Admission::Closed(task) => {
                self.metrics.record_discarded(1);
                drop(task);
            }
        }
    }

    // the rejection path
    fn spill(&self, task: Task) {
        let id = task.id;
        match self.spillover.push(task) {
            Ok(()) => {
                self.metrics.record_spilled();
                tracing::debug!(
                    pool = %self.name,
                    task = %id,
                    spilled = self.spillover.len(),
                    "admission queue full, task moved to spillover"
                );
            }
            Err(task) => {
                self.metrics.record_discarded(1);
                drop(task);
            }
        }
    }

    /// Tries to start a worker running `task`; hands the task back if not.
    fn start_with(self: &Arc<Self>, task: Task, limit: usize) -> Option<Task> {
        match self.add_worker(Some(task), limit) {
            AddWorker::Started => None,
            AddWorker::AtLimit(task) => task,
            AddWorker::Failed(task, err) => {
                tracing::warn!(pool = %self.name, error = %err, "failed to start worker");
                task
            }
        }
    }

    fn ensure_worker(self: &Arc<Self>) {
        if let AddWorker::Failed(_, err) = self.add_worker(None, self.config.max_threads) {
            tracing::warn!(pool = %self.name, error = %err, "failed to start worker");
        }
    }

    fn add_worker(self: &Arc<Self>, first: Option<Task>, limit: usize) -> AddWorker {
        {
            let mut live = self.live_workers.lock();
            if *live >= limit {
                return AddWorker::AtLimit(first);
            }
            *live += 1;
        }

        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!(
            "{}-{}-{}",
            self.config.thread_name_prefix, self.name, id
        ));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // Kept outside the closure so a failed spawn can hand the task back.
        let slot = Arc::new(Mutex::new(first));
        let handoff = slot.clone();
        let pool = self.clone();

        match builder.spawn(move || {
            let first = handoff.lock().take();
            Worker::new(id, pool).run(first);
        }) {
            Ok(_) => AddWorker::Started,
            Err(err) => {
                self.release_worker();
                let task = slot.lock().take();
                AddWorker::Failed(task, err)
            }
        }
    }

    /// Blocks a worker until it has something to run.
    pub(crate) fn next_task(&self) -> std::result::Result<Task, WorkerExit> {
        loop {
            if self.is_destroyed() {
                return Err(WorkerExit::Shutdown);
            }

            let timed = self.worker_count() > self.config.core_threads;
            let timeout = timed.then_some(self.config.keep_alive);

            if let Some(task) = self.queue.take(timeout) {
                return Ok(task);
            }
            if self.queue.is_closed() {
                return Err(WorkerExit::Shutdown);
            }

            let mut live = self.live_workers.lock();
            if *live > self.config.core_threads {
                *live -= 1;
                return Err(WorkerExit::Retired);
            }
        }
    }

    pub(crate) fn release_worker(&self) {
        let mut live = self.live_workers.lock();
        *live -= 1;
        if *live == 0 {
            self.all_exited.notify_all();
        }
    }

    /// Replaces the last worker if it left work behind.
    pub(crate) fn after_worker_exit(self: &Arc<Self>) {
        if self.worker_count() == 0 {
            self.all_exited.notify_all();
        }

        if self.is_destroyed() || self.queue.is_empty() {
            return;
        }

        let state = self.lifecycle.read();
        if *state == RunState::Running && self.worker_count() == 0 {
            self.ensure_worker();
        }
    }

    pub(crate) fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub(crate) fn panic_handler(&self) -> &PanicHandler {
        &self.panic_handler
    }
}

impl std::fmt::Debug for ManagedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedPool")
            .field("name", &self.name)
            .field("state", &*self.lifecycle.read())
            .field("workers", &self.worker_count())
            .field("queued", &self.queue.len())
            .field("spilled", &self.spillover.len())
            .finish()
    }
}
