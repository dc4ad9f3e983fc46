//! Background worker pool
//!
//! Runs asynchronous uploads and downloads on tokio tasks, at most `size`
//! at a time. The pool is owned by the engine and drained on shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Bounded pool of background tasks
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool running at most `size` tasks concurrently
    pub fn new(size: usize) -> Self {
        Self {
            size,
            semaphore: Arc::new(Semaphore::new(size)),
            tasks: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of tasks queued or running
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Queues `task`; it starts once a slot is free
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, name: &str, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(EngineError::PoolClosed);
        }

        let semaphore = Arc::clone(&self.semaphore);
        let name = name.to_string();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                warn!("Background task panicked: {}", e);
            }
        }

        tasks.spawn(async move {
            // Permit is released when dropped
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            debug!("Running background task {}", name);
            task.await;
        });
        Ok(())
    }

    /// Stops accepting work and waits for queued tasks to finish
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        if !tasks.is_empty() {
            info!("Waiting for {} background task(s)", tasks.len());
        }
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!("Background task panicked: {}", e);
            }
        }
    }
}
