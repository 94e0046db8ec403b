//! Named worker threads with join-with-timeout.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use tracing::{warn, Span};

use crate::error::WorkerError;

/// Handle to a running worker. Dropping it detaches the thread.
pub struct WorkerHandle<R> {
    name: String,
    handle: JoinHandle<Result<R, WorkerError>>,
    // Never carries a message; disconnects once the worker body returns or unwinds.
    done: Receiver<()>,
}

/// Starts `work` on a thread called `name`, inside `span`.
pub fn spawn_worker<F, R>(
    name: impl Into<String>,
    span: Span,
    work: F,
) -> Result<WorkerHandle<R>, WorkerError>
where
    F: FnOnce() -> Result<R, WorkerError> + Send + 'static,
    R: Send + 'static,
{
    let name = name.into();
    let (done_tx, done_rx) = bounded::<()>(0);

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _done = done_tx;
            span.in_scope(work)
        })
        .map_err(|source| WorkerError::Spawn {
            worker: name.clone(),
            source,
        })?;

    Ok(WorkerHandle {
        name,
        handle,
        done: done_rx,
    })
}

impl<R> WorkerHandle<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits up to `timeout` for the worker to finish. Returns whether it did.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.done.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    /// Blocks until the worker finishes and returns what it produced.
    pub fn join(self) -> Result<R, WorkerError> {
        let name = self.name;
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Panicked { worker: name }),
        }
    }

    /// Like [`join`](Self::join), but stops waiting after `timeout`. A worker
    /// that is still running is detached and reported as
    /// [`WorkerError::JoinTimeout`].
    pub fn join_timeout(self, timeout: Duration) -> Result<R, WorkerError> {
        if self.wait_timeout(timeout) {
            return self.join();
        }

        warn!(worker = %self.name, ?timeout, "worker still running, detaching");
        Err(WorkerError::JoinTimeout {
            worker: self.name,
            waited: timeout,
        })
    }
}

impl<R> std::fmt::Debug for WorkerHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}
