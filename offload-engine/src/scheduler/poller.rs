//! Completion poller
//!
//! Polls a job until it finishes, the deadline passes, or the caller raises
//! an [`Interrupt`]. The deadline is fixed from the clock at entry, so slow
//! polls eat into the budget instead of extending it. Interrupts are only
//! observed between polls, never in the middle of a request.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::{self, Duration, Instant};
use tracing::debug;

use offload_core::{JobHandle, JobOutcome};

/// Cooperative cancellation signal for a blocking wait
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<InterruptState>,
}

#[derive(Debug, Default)]
struct InterruptState {
    raised: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal; waiters wake at their next poll boundary
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is raised
    pub async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

/// How a blocking wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The job reached `Done` or `Exit`
    Completed(JobOutcome),
    /// The deadline passed; the job was cancelled
    TimedOut(JobHandle),
    /// The caller interrupted; the job was cancelled
    Interrupted(JobHandle),
}

impl WaitOutcome {
    pub fn outcome(&self) -> Option<&JobOutcome> {
        match self {
            WaitOutcome::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Handle to re-query later, if the wait gave up
    pub fn abandoned_handle(&self) -> Option<JobHandle> {
        match self {
            WaitOutcome::TimedOut(handle) | WaitOutcome::Interrupted(handle) => Some(*handle),
            WaitOutcome::Completed(_) => None,
        }
    }
}

/// Result of [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled<T> {
    Ready(T),
    TimedOut,
    Interrupted,
}

/// Calls `poll` until it yields a value
///
/// The first poll runs immediately; later polls run every `interval` until
/// `timeout` has elapsed since entry. The last sleep is shortened so one
/// final poll happens at the deadline. Errors from `poll` end the loop.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Duration,
    interrupt: Option<&Interrupt>,
    mut poll: F,
) -> Result<Polled<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        if interrupt.is_some_and(Interrupt::is_raised) {
            return Ok(Polled::Interrupted);
        }

        attempt += 1;
        debug!("Poll attempt {}", attempt);
        if let Some(value) = poll().await? {
            return Ok(Polled::Ready(value));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(Polled::TimedOut);
        }
        let nap = interval.min(remaining);

        match interrupt {
            Some(interrupt) => {
                tokio::select! {
                    _ = time::sleep(nap) => {}
                    _ = interrupt.raised() => return Ok(Polled::Interrupted),
                }
            }
            None => time::sleep(nap).await,
        }
    }
}
