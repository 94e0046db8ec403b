use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Span};

use crate::error::WorkerError;
use crate::queue::BoundedBlockingQueue;
use crate::worker::{spawn_worker, WorkerHandle};

/// Drains a shared queue into a destination it owns until the queue is
/// closed and empty.
///
/// Closed-and-empty is the normal way out and never surfaces as an error.
pub struct Consumer<T> {
    name: String,
    queue: Arc<BoundedBlockingQueue<T>>,
    destination: Vec<T>,
    span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport<T> {
    pub name: String,
    /// Everything this consumer received, in the order it received it.
    pub items: Vec<T>,
}

impl<T> Consumer<T> {
    pub fn new(queue: Arc<BoundedBlockingQueue<T>>) -> Self {
        Self::with_destination(queue, Vec::new())
    }

    /// Appends to `destination` instead of starting from an empty one.
    pub fn with_destination(queue: Arc<BoundedBlockingQueue<T>>, destination: Vec<T>) -> Self {
        Self {
            name: String::from("consumer"),
            queue,
            destination,
            span: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    fn take_span(&mut self) -> Span {
        self.span
            .take()
            .unwrap_or_else(|| info_span!("consumer", name = %self.name))
    }

    pub fn run(mut self) -> Result<ConsumerReport<T>, WorkerError> {
        let span = self.take_span();
        span.in_scope(|| self.transfer())
    }

    fn transfer(self) -> Result<ConsumerReport<T>, WorkerError> {
        let Consumer {
            name,
            queue,
            mut destination,
            ..
        } = self;

        info!("consumer started");
        let already_held = destination.len();

        let mut drain = queue.drain();
        for item in drain.by_ref() {
            destination.push(item);
            debug!(received = destination.len() - already_held, "item received");
        }

        let received = destination.len() - already_held;
        if let Err(err) = drain.into_result() {
            warn!(received, error = %err, "consumer aborted");
            return Err(err.into());
        }

        info!(received, "consumer exiting, queue closed and drained");
        Ok(ConsumerReport {
            name,
            items: destination,
        })
    }
}

impl<T: Send + 'static> Consumer<T> {
    /// Starts the consumer on its own named thread. The destination comes
    /// back through the handle's `join`.
    pub fn spawn(mut self) -> Result<WorkerHandle<ConsumerReport<T>>, WorkerError> {
        let span = self.take_span();
        let name = self.name.clone();
        spawn_worker(name, span, move || self.transfer())
    }
}
