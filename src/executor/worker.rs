// worker thread stuff
use super::pool::ManagedPool;
use super::task::Task;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

thread_local! {
    // interruption flag of the pool owning the current worker thread
    static INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = RefCell::new(None);
}

/// Returns `true` when called from a task whose pool has been destroyed.
///
/// Destroying a pool cannot preempt a running closure; long tasks can poll
/// this to stop early. Always `false` outside worker threads.
pub fn interrupted() -> bool {
    INTERRUPT.with(|flag| {
        flag.borrow()
            .as_ref()
            .map_or(false, |f| f.load(Ordering::Acquire))
    })
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pool: Arc<ManagedPool>,
    tasks_executed: u64,
}

/// Gives the worker's slot back to the pool however the loop ends.
struct ExitGuard {
    pool: Arc<ManagedPool>,
    retired: bool,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !self.retired {
            self.pool.release_worker();
        }
        self.pool.after_worker_exit();
    }
}

impl Worker {
    pub fn new(id: WorkerId, pool: Arc<ManagedPool>) -> Self {
        Self {
            id,
            pool,
            tasks_executed: 0,
        }
    }

    // main loop
    pub fn run(mut self, first: Option<Task>) {
        INTERRUPT.with(|flag| *flag.borrow_mut() = Some(self.pool.interrupt_flag()));

        let mut guard = ExitGuard {
            pool: self.pool.clone(),
            retired: false,
        };

        tracing::trace!(pool = self.pool.name(), worker = self.id, "worker started");

        let mut next = first;
        loop {
            let task = match next.take() {
                Some(task) => task,
                None => match self.pool.next_task() {
                    Ok(task) => task,
                    Err(WorkerExit::Retired) => {
                        guard.retired = true;
                        break;
                    }
                    Err(WorkerExit::Shutdown) => break,
                },
            };

            if self.pool.is_destroyed() {
                // handed over but never started
                self.pool.metrics().record_discarded(1);
                break;
            }

            self.execute_task(task);
        }

        tracing::trace!(
            pool = self.pool.name(),
            worker = self.id,
            executed = self.tasks_executed,
            "worker exiting"
        );
    }

    fn execute_task(&mut self, task: Task) {
        let tid = task.id;
        let start = Instant::now();

        let result = self
            .pool
            .panic_handler()
            .execute(self.pool.name(), tid, || task.execute());

        self.pool
            .metrics()
            .record_execution(start.elapsed(), result.is_err());
        self.tasks_executed += 1;
    }
}

/// Why a worker stopped asking for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Idle past keep-alive while above the core size; slot already released.
    Retired,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_interrupted_outside_workers() {
        assert!(!interrupted());
    }
}
