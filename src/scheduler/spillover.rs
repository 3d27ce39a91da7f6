//! Per-pool recovery buffer for tasks the admission queue turned away.
//!
//! Always FIFO, whatever the pool's ordering mode: it is a recovery path and
//! the requeue scheduler takes from the front.

use crate::executor::{Task, TaskId};
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct State {
    tasks: VecDeque<Task>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct Spillover {
    state: Mutex<State>,
}

impl Spillover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rejected task. Hands it back if the buffer was closed.
    pub fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(task);
        }
        state.tasks.push_back(task);
        Ok(())
    }

    /// Oldest spilled task, if any.
    pub fn pop(&self) -> Option<Task> {
        self.state.lock().tasks.pop_front()
    }

    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut state = self.state.lock();
        let index = state.tasks.iter().position(|t| t.id == id)?;
        state.tasks.remove(index)
    }

    /// Refuses further pushes and returns everything still buffered.
    pub fn close(&self) -> Vec<Task> {
        let mut state = self.state.lock();
        state.closed = true;
        state.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_regardless_of_priority() {
        let spill = Spillover::new();
        let low = Task::with_priority(|| {}, 1);
        let high = Task::with_priority(|| {}, 9);
        let (low_id, high_id) = (low.id(), high.id());

        spill.push(low).unwrap();
        spill.push(high).unwrap();

        assert_eq!(spill.pop().unwrap().id(), low_id);
        assert_eq!(spill.pop().unwrap().id(), high_id);
        assert!(spill.pop().is_none());
    }

    #[test]
    fn test_remove_and_close() {
        let spill = Spillover::new();
        let a = Task::new(|| {});
        let b = Task::new(|| {});
        let a_id = a.id();
        spill.push(a).unwrap();
        spill.push(b).unwrap();

        assert!(spill.remove(a_id).is_some());
        assert!(spill.remove(a_id).is_none());
        assert_eq!(spill.len(), 1);

        assert_eq!(spill.close().len(), 1);
        assert!(spill.is_empty());
        assert!(spill.push(Task::new(|| {})).is_err());
    }
}
