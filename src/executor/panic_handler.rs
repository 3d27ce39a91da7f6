use super::task::TaskId;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when a task panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStrategy {
    Abort,
    Isolate,
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Runs `f`, containing any panic according to the strategy.
    pub fn execute<F, R>(&self, pool: &str, task: TaskId, f: F) -> Result<R, TaskPanic>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic = TaskPanic::from_payload(task, payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(pool, %task, message = %panic.message, "task panicked, aborting");
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(pool, %task, message = %panic.message, "task panicked");
                    }
                }

                Err(panic)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct TaskPanic {
    pub task: TaskId,
    pub message: String,
}

impl TaskPanic {
    fn from_payload(task: TaskId, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { task, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Task;

    fn some_id() -> TaskId {
        Task::new(|| {}).id()
    }

    #[test]
    fn test_panic_handler_isolate() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        assert_eq!(handler.strategy(), PanicStrategy::Isolate);

        let id = some_id();
        let result = handler.execute("test", id, || {
            panic!("test panic");
        });

        let panic = result.unwrap_err();
        assert_eq!(panic.task, id);
        assert_eq!(panic.message, "test panic");
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_panic_handler_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute("test", some_id(), || 42);

        assert_eq!(result.unwrap(), 42);
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_formatted_payload() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for i in 0..5 {
            let err = handler
                .execute("test", some_id(), || panic!("failure {}", i))
                .unwrap_err();
            assert_eq!(err.message, format!("failure {}", i));
        }

        assert_eq!(handler.panic_count(), 5);
    }
}
