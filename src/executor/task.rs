//! Task representation and execution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task, used to cancel it while it is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Scheduling priority of a task. Higher values are more urgent.
///
/// Only consulted by pools running in priority mode; FIFO pools ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    /// Rank of a task submitted without an explicit priority.
    pub const UNSET: Priority = Priority(0);
    pub const LOW: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);

    pub fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

/// A unit of work submitted to a pool.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) priority: Option<Priority>,
}

impl Task {
    /// Create a task without a priority
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            priority: None,
        }
    }

    /// Create a task with specific priority
    pub fn with_priority<F, P>(f: F, priority: P) -> Self
    where
        F: FnOnce() + Send + 'static,
        P: Into<Priority>,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            priority: Some(priority.into()),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// The key used by priority queues; unprioritised tasks rank as [`Priority::UNSET`].
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::UNSET)
    }

    /// Execute the task
    pub(crate) fn execute(self) {
        (self.func)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique() {
        let a = Task::new(|| {});
        let b = Task::new(|| {});
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::UNSET < Priority::LOW);
        assert!(Priority::LOW < Priority::HIGH);
        assert_eq!(Priority::from(7).value(), 7);
    }

    #[test]
    fn test_effective_priority() {
        let plain = Task::new(|| {});
        assert_eq!(plain.priority(), None);
        assert_eq!(plain.effective_priority(), Priority::UNSET);

        let urgent = Task::with_priority(|| {}, Priority::HIGH);
        assert_eq!(urgent.effective_priority(), Priority::HIGH);
    }

    #[test]
    fn test_execute_runs_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        Task::new(move || flag.store(true, Ordering::SeqCst)).execute();
        assert!(ran.load(Ordering::SeqCst));
    }
}
