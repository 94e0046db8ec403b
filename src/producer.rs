use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Span};

use crate::error::WorkerError;
use crate::queue::BoundedBlockingQueue;
use crate::worker::{spawn_worker, WorkerHandle};

/// Moves every item of a finite source into a shared queue, in order, and
/// then closes the queue.
///
/// A put that fails ends the run with that error; the item is not retried.
pub struct Producer<T> {
    name: String,
    source: Vec<T>,
    queue: Arc<BoundedBlockingQueue<T>>,
    span: Option<Span>,
    close_on_finish: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub name: String,
    pub produced: usize,
    /// Whether this producer's `close` was the one that closed the queue.
    pub closed_queue: bool,
}

impl<T> Producer<T> {
    pub fn new(source: Vec<T>, queue: Arc<BoundedBlockingQueue<T>>) -> Self {
        Self {
            name: String::from("producer"),
            source,
            queue,
            span: None,
            close_on_finish: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Span the producer logs under. Defaults to `producer{name=..}`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Leave the queue open when the source is exhausted. Used when several
    /// producers share one queue and whoever joins them closes it.
    pub fn keep_open(mut self) -> Self {
        self.close_on_finish = false;
        self
    }

    fn take_span(&mut self) -> Span {
        self.span
            .take()
            .unwrap_or_else(|| info_span!("producer", name = %self.name))
    }

    /// Runs on the calling thread.
    pub fn run(mut self) -> Result<ProducerReport, WorkerError> {
        let span = self.take_span();
        span.in_scope(|| self.transfer())
    }

    fn transfer(self) -> Result<ProducerReport, WorkerError> {
        let Producer {
            name,
            source,
            queue,
            close_on_finish,
            ..
        } = self;

        info!(items = source.len(), "producer started");

        let mut produced = 0usize;
        for item in source {
            if let Err(err) = queue.put(item) {
                warn!(produced, error = %err, "producer stopped before exhausting its source");
                return Err(err.into());
            }
            produced += 1;
            debug!(produced, queued = queue.size(), "item enqueued");
        }

        let closed_queue = close_on_finish && queue.close();
        info!(produced, closed_queue, "producer finished");

        Ok(ProducerReport {
            name,
            produced,
            closed_queue,
        })
    }
}

impl<T: Send + 'static> Producer<T> {
    /// Starts the producer on its own named thread.
    pub fn spawn(mut self) -> Result<WorkerHandle<ProducerReport>, WorkerError> {
        let span = self.take_span();
        let name = self.name.clone();
        spawn_worker(name, span, move || self.transfer())
    }
}
