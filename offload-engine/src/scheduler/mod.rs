//! Scheduling primitives: the completion poller and the worker pool

mod poller;
mod pool;

pub use poller::{Interrupt, Polled, WaitOutcome, poll_until};
pub use pool::WorkerPool;
