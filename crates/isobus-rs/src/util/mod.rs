//! Scheduler/timer utilities shared by the network manager and address-claim
//! machinery (§2's "scheduler/timer utilities" line item).

mod scheduler;
mod timer;

pub use scheduler::{PeriodicTask, Scheduler};
pub use timer::{Timeout, Timer};
