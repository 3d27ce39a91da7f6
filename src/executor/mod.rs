//! Task execution infrastructure.
//!
//! This module provides the task type, the worker threads and the managed
//! pool that owns them.

pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy, TaskPanic};
pub use pool::{ManagedPool, RunState};
pub use task::{Priority, Task, TaskId};
pub use worker::interrupted;
