//! Runs blocking work on a bounded worker pool and hands results back through
//! non-blocking handles.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_warn};
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;

/// Lower bound on blocking workers so a rename never waits behind a labeling run.
pub const MIN_WORKERS: usize = 2;

pub type TaskId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task result is no longer available")]
    Disconnected,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TaskPoll<T, E> {
    Pending,
    Done(Result<T, TaskError<E>>),
}

/// Receiving end of a submitted task. The result is handed out once.
#[derive(Debug)]
pub struct TaskHandle<T, E> {
    id: TaskId,
    rx: Option<oneshot::Receiver<Result<T, TaskError<E>>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn poll(&mut self) -> TaskPoll<T, E> {
        let Some(rx) = self.rx.as_mut() else {
            return TaskPoll::Done(Err(TaskError::Disconnected));
        };
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                TaskPoll::Done(result)
            }
            Err(oneshot::error::TryRecvError::Empty) => TaskPoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.rx = None;
                TaskPoll::Done(Err(TaskError::Disconnected))
            }
        }
    }

    /// Polls until the task finishes or `timeout` elapses. Meant for tests and
    /// shutdown, never for the control loop.
    pub fn wait(mut self, timeout: Duration) -> TaskPoll<T, E> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.poll() {
                TaskPoll::Pending if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(5))
                }
                other => return other,
            }
        }
    }
}

pub struct TaskOrchestrator {
    runtime: Option<Runtime>,
    handle: Handle,
    next_id: AtomicU64,
    workers: usize,
}

impl TaskOrchestrator {
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(MIN_WORKERS);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("cliptale-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        engine_debug!("Task orchestrator started with {} workers", workers);
        Ok(Self {
            runtime: Some(runtime),
            handle,
            next_id: AtomicU64::new(1),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle for adapters that drive async requests from inside a worker.
    pub fn runtime_handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Queues `work` on the pool. Never blocks the caller.
    pub fn submit<T, E, F>(&self, name: &str, work: F) -> TaskHandle<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let name = name.to_string();
        engine_debug!("Task {} ({}) submitted", id, name);

        self.handle.spawn_blocking(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    engine_warn!("Task {} ({}) panicked: {}", id, name, message);
                    Err(TaskError::Panicked(message))
                }
            };
            engine_debug!("Task {} ({}) finished", id, name);
            // The handle may have been dropped; the result is then discarded.
            let _ = tx.send(result);
        });

        TaskHandle { id, rx: Some(rx) }
    }
}

impl Drop for TaskOrchestrator {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
