//! Bounded worker pool for blocking callables
//!
//! Work items are queued in arrival order on an unbounded channel. A single dispatcher task
//! pops them one at a time, waits for a free slot and hands the item to tokio's blocking thread
//! pool. The number of executing items therefore never exceeds the pool size, and queued items
//! start in FIFO order.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce(SlotGuard) + Send + 'static>;

/// Pool sizing options
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of slots (parallel executions)
    pub size: usize,
    /// Maximum number of items allowed to wait for a slot. `None` keeps the queue unbounded.
    pub max_queue: Option<usize>,
}

impl PoolOptions {
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            max_queue: None,
        }
    }

    pub fn max_queue(mut self, limit: usize) -> Self {
        self.max_queue = Some(limit);
        self
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::with_size(default_pool_size(None))
    }
}

/// Resolve the pool size: `GLITCH_POOL_SIZE`, then the configured value, then the number of
/// available CPUs.
pub fn default_pool_size(configured: Option<usize>) -> usize {
    std::env::var("GLITCH_POOL_SIZE")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .or(configured.filter(|n| *n > 0))
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
}

/// Pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Worker pool queue is full ({limit} items waiting)")]
    QueueFull { limit: usize },

    #[error(transparent)]
    Failed(anyhow::Error),

    #[error("Work item panicked: {0}")]
    Panicked(String),

    #[error("Work item was dropped before it produced a result")]
    Abandoned,
}

/// Snapshot of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    /// Items currently executing on a slot
    pub active: usize,
    /// Items waiting for a slot
    pub queued: usize,
    /// Items that ever occupied a slot
    pub started: u64,
    pub completed: u64,
    pub closed: bool,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    queued: AtomicUsize,
    started: AtomicU64,
    completed: AtomicU64,
}

struct Shared {
    size: usize,
    max_queue: Option<usize>,
    slots: Arc<Semaphore>,
    counters: Counters,
    closed: AtomicBool,
}

/// Held by an executing item; releases the slot on drop.
struct SlotGuard {
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.shared.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.shared.counters.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool of execution slots for blocking work.
pub struct WorkerPool {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and start its dispatcher. Must be called inside a tokio runtime.
    pub fn new(options: PoolOptions) -> Self {
        let size = options.size.max(1);
        let shared = Arc::new(Shared {
            size,
            max_queue: options.max_queue,
            slots: Arc::new(Semaphore::new(size)),
            counters: Counters::default(),
            closed: AtomicBool::new(false),
        });

        let (sender, queue) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(shared.clone(), queue));

        info!(size, max_queue = ?options.max_queue, "Worker pool started");

        Self {
            shared,
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Enqueue a blocking callable. Returns immediately; the handle resolves once a slot has
    /// run the callable.
    pub fn submit<F, T>(&self, work: F) -> Result<WorkHandle<T>, PoolError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let started = Arc::new(AtomicBool::new(false));
        let started_flag = started.clone();

        let job: Job = Box::new(move |guard: SlotGuard| {
            started_flag.store(true, Ordering::SeqCst);
            let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(PoolError::Failed(e)),
                Err(payload) => Err(PoolError::Panicked(panic_message(payload.as_ref()))),
            };
            // Release the slot before waking the submitter.
            drop(guard);
            let _ = tx.send(outcome);
        });

        let guard = self.sender.lock().map_err(|_| PoolError::Closed)?;
        let sender = guard.as_ref().ok_or(PoolError::Closed)?;

        let counters = &self.shared.counters;
        if let Some(limit) = self.shared.max_queue {
            if counters.queued.load(Ordering::SeqCst) >= limit {
                return Err(PoolError::QueueFull { limit });
            }
        }

        counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Closed);
        }

        Ok(WorkHandle { rx, started })
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            size: self.shared.size,
            active: counters.active.load(Ordering::SeqCst),
            queued: counters.queued.load(Ordering::SeqCst),
            started: counters.started.load(Ordering::SeqCst),
            completed: counters.completed.load(Ordering::SeqCst),
            closed: self.shared.closed.load(Ordering::SeqCst),
        }
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting work, run every item already accepted, then wait for all slots to be
    /// released. Safe to call more than once.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        self.shared.closed.store(true, Ordering::SeqCst);
        drop(sender);

        let dispatcher = self.dispatcher.lock().ok().and_then(|mut d| d.take());
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                warn!("Worker pool dispatcher ended abnormally: {}", e);
            }
        }

        // Every accepted item holds or held a slot by now; taking all of them waits for the
        // last executing item to finish.
        if let Ok(_all) = self.shared.slots.acquire_many(self.shared.size as u32).await {
            self.shared.slots.close();
            info!(
                completed = self.shared.counters.completed.load(Ordering::SeqCst),
                "Worker pool shut down"
            );
        }
    }
}

async fn dispatch(shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = queue.recv().await {
        let permit = match shared.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let counters = &shared.counters;
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        counters.active.fetch_add(1, Ordering::SeqCst);
        counters.started.fetch_add(1, Ordering::SeqCst);

        let guard = SlotGuard {
            shared: shared.clone(),
            _permit: permit,
        };
        tokio::task::spawn_blocking(move || job(guard));
    }

    debug!("Worker pool dispatcher drained");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pending result of a submitted work item
pub struct WorkHandle<T> {
    rx: oneshot::Receiver<Result<T, PoolError>>,
    started: Arc<AtomicBool>,
}

impl<T> WorkHandle<T> {
    /// Whether a slot has picked this item up
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl<T> Future for WorkHandle<T> {
    type Output = Result<T, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
