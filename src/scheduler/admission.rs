//! Bounded admission queue feeding a pool's workers.

use crate::config::{PriorityComparator, QueueOrder};
use crate::executor::{Task, TaskId};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::time::{Duration, Instant};

/// Outcome of offering a task to an [`AdmissionQueue`].
#[derive(Debug)]
#[must_use]
pub enum Admission {
    Accepted,
    /// The queue is at capacity; the task is handed back to the caller.
    Full(Task),
    /// The queue was closed by shutdown; the task is handed back to the caller.
    Closed(Task),
}

/// Heap entry for priority mode.
struct PriorityTask {
    task: Task,
    seq: u64,
    compare: PriorityComparator,
}

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        let priority_cmp = (self.compare)(self.task.effective_priority(), other.task.effective_priority());
        if priority_cmp != CmpOrdering::Equal {
            return priority_cmp;
        }

        // earlier insertion wins on ties
        other.seq.cmp(&self.seq)
    }
}

enum Pending {
    Fifo(VecDeque<Task>),
    Priority {
        heap: BinaryHeap<PriorityTask>,
        compare: PriorityComparator,
        next_seq: u64,
    },
}

impl Pending {
    fn len(&self) -> usize {
        match self {
            Pending::Fifo(queue) => queue.len(),
            Pending::Priority { heap, .. } => heap.len(),
        }
    }

    fn push(&mut self, task: Task) {
        match self {
            Pending::Fifo(queue) => queue.push_back(task),
            Pending::Priority {
                heap,
                compare,
                next_seq,
            } => {
                let seq = *next_seq;
                *next_seq += 1;
                heap.push(PriorityTask {
                    task,
                    seq,
                    compare: *compare,
                });
            }
        }
    }

    fn pop(&mut self) -> Option<Task> {
        match self {
            Pending::Fifo(queue) => queue.pop_front(),
            Pending::Priority { heap, .. } => heap.pop().map(|pt| pt.task),
        }
    }

    fn remove(&mut self, id: TaskId) -> Option<Task> {
        match self {
            Pending::Fifo(queue) => {
                let index = queue.iter().position(|t| t.id == id)?;
                queue.remove(index)
            }
            Pending::Priority { heap, .. } => {
                if !heap.iter().any(|pt| pt.task.id == id) {
                    return None;
                }
                let mut found = None;
                let rest: Vec<PriorityTask> = std::mem::take(heap)
                    .into_vec()
                    .into_iter()
                    .filter_map(|pt| {
                        if pt.task.id == id {
                            found = Some(pt.task);
                            None
                        } else {
                            Some(pt)
                        }
                    })
                    .collect();
                *heap = BinaryHeap::from(rest);
                found
            }
        }
    }

    fn drain(&mut self) -> Vec<Task> {
        match self {
            Pending::Fifo(queue) => queue.drain(..).collect(),
            Pending::Priority { heap, .. } => heap.drain().map(|pt| pt.task).collect(),
        }
    }
}

struct State {
    pending: Pending,
    closed: bool,
}

/// Bounded FIFO or priority queue with its own lock and wakeups.
pub struct AdmissionQueue {
    state: Mutex<State>,
    available: Condvar,
    capacity: usize,
}

impl AdmissionQueue {
    pub fn new(order: QueueOrder, capacity: usize) -> Self {
        let pending = match order {
            QueueOrder::Fifo => Pending::Fifo(VecDeque::with_capacity(capacity)),
            QueueOrder::Priority(compare) => Pending::Priority {
                heap: BinaryHeap::with_capacity(capacity),
                compare,
                next_seq: 0,
            },
        };

        Self {
            state: Mutex::new(State {
                pending,
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Non-blocking insert.
    pub fn offer(&self, task: Task) -> Admission {
        let mut state = self.state.lock();
        if state.closed {
            return Admission::Closed(task);
        }
        if state.pending.len() >= self.capacity {
            return Admission::Full(task);
        }

        state.pending.push(task);
        drop(state);

        self.available.notify_one();
        Admission::Accepted
    }

    /// Waits for a task. `None` means the queue closed, or `timeout` elapsed
    /// without work when one is given.
    pub fn take(&self, timeout: Option<Duration>) -> Option<Task> {
        // a timeout too large to represent waits forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();

        loop {
            if state.closed {
                return None;
            }
            if let Some(task) = state.pending.pop() {
                return Some(task);
            }

            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        return if state.closed { None } else { state.pending.pop() };
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Removes a pending task by id; races with workers taking it.
    pub fn remove(&self, id: TaskId) -> Option<Task> {
        self.state.lock().pending.remove(id)
    }

    /// Rejects all further offers, wakes every waiter and returns what was pending.
    pub fn close(&self) -> Vec<Task> {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            state.pending.drain()
        };
        self.available.notify_all();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AdmissionQueue")
            .field("len", &state.pending.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
