//! Admission and recovery.
//!
//! The admission queue decides whether a pool can take a task now; the
//! spillover buffer holds what it could not take; the requeue scheduler
//! periodically feeds spilled tasks back through admission.

pub mod admission;
pub mod requeue;
pub mod spillover;

pub use admission::{Admission, AdmissionQueue};
pub use requeue::RequeueScheduler;
pub use spillover::Spillover;
