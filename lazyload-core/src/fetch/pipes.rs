//! Bounded pool of fetch pipes.
//!
//! A pipe is one open fetch. The pool caps how many are open at once with a
//! single semaphore; waiters are released in order as pipes close. Capacity
//! `0` means unlimited. Resizing adjusts the permits of that same semaphore,
//! so waiters and newcomers always share one ceiling.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

use super::transport::{FetchRequest, Transport, TransportError};
use crate::error::{LoadError, Result};

#[derive(Debug)]
struct Limit {
    /// Configured ceiling; `0` is unlimited.
    capacity: usize,
    /// Permits the semaphore should own in total, free or held.
    permits: usize,
    /// Held permits to retire as their pipes close, left over from a
    /// shrink that found too few free permits.
    debt: usize,
}

pub struct PipePool {
    semaphore: Arc<Semaphore>,
    limit: Arc<Mutex<Limit>>,
    open: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
}

impl fmt::Debug for PipePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipePool")
            .field("capacity", &self.capacity())
            .field("open", &self.open_pipes())
            .finish()
    }
}

/// An open pipe. Closing (dropping) it frees the slot.
#[derive(Debug)]
pub struct Pipe {
    permit: Option<OwnedSemaphorePermit>,
    limit: Arc<Mutex<Limit>>,
    open: Arc<AtomicUsize>,
}

impl Drop for Pipe {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            let mut limit = self.limit.lock();
            if limit.debt > 0 {
                limit.debt -= 1;
                permit.forget();
            }
        }
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Counts an acquire parked on the semaphore, including cancelled ones.
struct Waiting(Arc<AtomicUsize>);

impl Waiting {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for Waiting {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Slot {
    Ready(OwnedSemaphorePermit),
    Queued(Waiting),
}

impl PipePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            limit: Arc::new(Mutex::new(Limit {
                capacity,
                permits: capacity,
                debt: 0,
            })),
            open: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.limit.lock().capacity
    }

    pub fn open_pipes(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Changes the ceiling. Growing releases waiters right away; shrinking
    /// retires free permits first and the rest as open pipes close.
    pub fn resize(&self, capacity: usize) {
        let mut limit = self.limit.lock();
        if limit.capacity == capacity {
            return;
        }
        trace!(from = limit.capacity, to = capacity, "resizing pipe pool");

        if capacity == 0 {
            let parked = self.waiting.load(Ordering::Acquire);
            self.semaphore.add_permits(parked);
            limit.permits += parked;
        } else {
            self.set_permits(&mut limit, capacity);
        }
        limit.capacity = capacity;
    }

    fn set_permits(&self, limit: &mut Limit, target: usize) {
        if target >= limit.permits {
            let grow = target - limit.permits;
            let repaid = grow.min(limit.debt);
            limit.debt -= repaid;
            self.semaphore.add_permits(grow - repaid);
        } else {
            let shrink = limit.permits - target;
            let retired = self.semaphore.forget_permits(shrink);
            limit.debt += shrink - retired;
        }
        limit.permits = target;
    }

    /// Waits for a free slot and opens a pipe.
    pub async fn acquire(&self) -> Result<Pipe> {
        let permit = match self.reserve()? {
            Slot::Ready(permit) => permit,
            Slot::Queued(_parked) => Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| LoadError::Closed)?,
        };
        self.open.fetch_add(1, Ordering::AcqRel);

        Ok(Pipe {
            permit: Some(permit),
            limit: Arc::clone(&self.limit),
            open: Arc::clone(&self.open),
        })
    }

    /// Without a ceiling a pipe never waits: the pool grows by one permit
    /// when none is free. With one, the caller is counted as parked before
    /// the lock is released so a switch to unlimited can wake it.
    fn reserve(&self) -> Result<Slot> {
        let mut limit = self.limit.lock();
        if limit.capacity != 0 {
            return Ok(Slot::Queued(Waiting::enter(&self.waiting)));
        }
        loop {
            match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => return Ok(Slot::Ready(permit)),
                Err(TryAcquireError::NoPermits) => {
                    self.semaphore.add_permits(1);
                    limit.permits += 1;
                }
                Err(TryAcquireError::Closed) => return Err(LoadError::Closed),
            }
        }
    }

    /// Runs one fetch through a pipe.
    ///
    /// Emits exactly one outcome: the body on a 2xx answer, otherwise a
    /// [`LoadError::FetchFailure`], or [`LoadError::Timeout`] when the
    /// request outlives its timeout. The pipe closes on every path.
    pub async fn fetch(
        &self,
        transport: &dyn Transport,
        name: &str,
        request: &FetchRequest,
    ) -> Result<Arc<str>> {
        let _pipe = self.acquire().await?;

        let exchange = transport.fetch(request);
        let outcome = match request.timeout {
            Some(after) => tokio::time::timeout(after, exchange)
                .await
                .map_err(|_| timeout_error(name, after))?,
            None => exchange.await,
        };

        let response = outcome.map_err(|err| match err {
            TransportError::TimedOut(_) => {
                timeout_error(name, request.timeout.unwrap_or_default())
            }
            err => LoadError::FetchFailure {
                name: name.to_string(),
                reason: err.to_string(),
            },
        })?;

        if !response.is_success() {
            return Err(LoadError::FetchFailure {
                name: name.to_string(),
                reason: format!("unexpected status {}", response.status),
            });
        }

        Ok(Arc::from(response.body))
    }
}

fn timeout_error(name: &str, after: Duration) -> LoadError {
    LoadError::Timeout {
        name: name.to_string(),
        after,
    }
}
