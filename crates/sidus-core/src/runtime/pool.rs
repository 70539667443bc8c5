//! Bounded worker pool for task and loop bodies.
//!
//! Bodies are synchronous, so each one runs on tokio's blocking thread pool.
//! A semaphore caps how many run at once and a counter caps how many may
//! wait for a permit; a dispatch beyond that is refused immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::Instrument;

use crate::error::InvocationError;

pub(crate) struct WorkerPool {
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    max_queued: usize,
}

impl WorkerPool {
    pub(crate) fn new(max_concurrent: usize, max_queued: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            queued: Arc::new(AtomicUsize::new(0)),
            max_queued: max_queued.max(1),
        }
    }

    /// Run `job` on a worker once a permit is free.
    ///
    /// Must be called from within a tokio runtime. Fails without running the
    /// job when the wait queue is full.
    pub(crate) fn dispatch<F>(&self, label: &str, job: F) -> Result<(), InvocationError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime =
            Handle::try_current().map_err(|_| InvocationError::NoRuntime(label.to_string()))?;

        // A free permit is taken now; only a dispatch that has to wait
        // counts against the queue.
        let ready = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(TryAcquireError::NoPermits) => {
                let queued = self.queued.fetch_add(1, Ordering::AcqRel);
                if queued >= self.max_queued {
                    self.queued.fetch_sub(1, Ordering::AcqRel);
                    return Err(InvocationError::WorkerPoolSaturated(label.to_string()));
                }
                None
            }
            Err(TryAcquireError::Closed) => {
                return Err(InvocationError::WorkerPoolSaturated(label.to_string()));
            }
        };

        let permits = Arc::clone(&self.permits);
        let waiting = Arc::clone(&self.queued);
        let label = label.to_string();
        let span = tracing::Span::current();
        runtime.spawn(
            async move {
                let _permit = match ready {
                    Some(permit) => permit,
                    None => {
                        let permit = permits.acquire_owned().await;
                        waiting.fetch_sub(1, Ordering::AcqRel);
                        let Ok(permit) = permit else {
                            return;
                        };
                        permit
                    }
                };
                let job_span = tracing::Span::current();
                let result = tokio::task::spawn_blocking(move || job_span.in_scope(job)).await;
                if let Err(err) = result {
                    tracing::error!(worker = %label, error = %err, "worker panicked");
                }
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Dispatches waiting for a permit.
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
