//! Single-flight, rate-limited request queue.
//!
//! Tasks run one at a time in submission order, with at least
//! `min_interval` between two dispatches. A queue is cheap to clone; clones
//! share the same state, which is how several providers share one upstream
//! host.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use chatwire_core::GatewayError;

/// Why a queued task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Cancelled before or during execution.
    #[error("Queued task cancelled")]
    Cancelled,

    /// The task panicked.
    #[error("Queued task panicked: {0}")]
    Panicked(String),
}

impl From<QueueError> for GatewayError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => GatewayError::Cancelled,
            QueueError::Panicked(message) => GatewayError::Queue(message),
        }
    }
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct QueuedTask {
    job: Job,
    cancel: Option<CancellationToken>,
}

impl QueuedTask {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<QueuedTask>,
    // At most one worker loop exists while this is set.
    processing: bool,
    last_dispatch: Option<Instant>,
}

struct Inner {
    min_interval: Duration,
    state: Mutex<QueueState>,
}

/// FIFO dispatcher with a minimum interval between dispatches.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestQueue")
            .field("min_interval", &self.inner.min_interval)
            .field("pending", &state.tasks.len())
            .field("processing", &state.processing)
            .finish()
    }
}

impl RequestQueue {
    /// Create a queue.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                min_interval,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Minimum spacing between dispatches.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Number of tasks waiting for dispatch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Whether two handles share the same queue.
    #[must_use]
    pub fn same_queue(&self, other: &RequestQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append a task. Never rejects; must be called within a tokio runtime.
    pub fn submit<F, Fut, T>(&self, task: F) -> QueueHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(None, task)
    }

    /// Append a task that is skipped if `cancel` fires before dispatch, and
    /// abandoned if it fires while running.
    pub fn submit_with_cancel<F, Fut, T>(&self, cancel: CancellationToken, task: F) -> QueueHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(Some(cancel), task)
    }

    fn enqueue<F, Fut, T>(&self, cancel: Option<CancellationToken>, task: F) -> QueueHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let token = cancel.clone();

        let job: Job = Box::new(move || {
            async move {
                let run = AssertUnwindSafe(async move { task().await }).catch_unwind();
                let outcome = match token {
                    Some(token) => tokio::select! {
                        biased;
                        () = token.cancelled() => Err(QueueError::Cancelled),
                        outcome = run => outcome.map_err(panic_message),
                    },
                    None => run.await.map_err(panic_message),
                };
                if let Err(QueueError::Panicked(message)) = &outcome {
                    warn!(panic = %message, "Queued task panicked");
                }
                let _ = tx.send(outcome);
            }
            .boxed()
        });

        let spawn_worker = {
            let mut state = self.inner.state.lock();
            state.tasks.push_back(QueuedTask { job, cancel });
            !std::mem::replace(&mut state.processing, true)
        };

        if spawn_worker {
            tokio::spawn(run_worker(Arc::clone(&self.inner)));
        }

        QueueHandle { rx }
    }
}

async fn run_worker(inner: Arc<Inner>) {
    loop {
        let (task, wait) = {
            let mut state = inner.state.lock();
            let Some(task) = state.tasks.pop_front() else {
                state.processing = false;
                return;
            };
            let wait = state
                .last_dispatch
                .map(|last| inner.min_interval.saturating_sub(last.elapsed()))
                .unwrap_or_default();
            (task, wait)
        };

        if task.is_cancelled() {
            trace!("Skipping cancelled task");
            continue;
        }

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiting dispatch");
            tokio::time::sleep(wait).await;
            if task.is_cancelled() {
                trace!("Skipping task cancelled while rate limited");
                continue;
            }
        }

        inner.state.lock().last_dispatch = Some(Instant::now());
        (task.job)().await;
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> QueueError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    QueueError::Panicked(message)
}

/// Completion handle for a queued task.
#[derive(Debug)]
#[must_use = "dropping the handle discards the task result"]
pub struct QueueHandle<T> {
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> Future for QueueHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender is only dropped unsent when the task was skipped.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::Cancelled)))
    }
}
