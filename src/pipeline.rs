//! Wires producers and consumers around one shared queue and runs a transfer
//! to completion.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::config::TransferConfig;
use crate::consumer::{Consumer, ConsumerReport};
use crate::error::{ConfigError, WorkerError};
use crate::producer::{Producer, ProducerReport};
use crate::queue::BoundedBlockingQueue;
use crate::worker::WorkerHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome<T> {
    pub producers: Vec<ProducerReport>,
    pub consumers: Vec<ConsumerReport<T>>,
}

impl<T> TransferOutcome<T> {
    pub fn produced(&self) -> usize {
        self.producers.iter().map(|report| report.produced).sum()
    }

    pub fn total(&self) -> usize {
        self.consumers.iter().map(|report| report.items.len()).sum()
    }

    /// Each consumer's destination, in consumer order.
    pub fn destinations(&self) -> impl Iterator<Item = &[T]> {
        self.consumers.iter().map(|report| report.items.as_slice())
    }

    /// Union of every destination, sorted.
    pub fn merged_sorted(&self) -> Vec<T>
    where
        T: Ord + Clone,
    {
        let mut merged: Vec<T> = self
            .consumers
            .iter()
            .flat_map(|report| report.items.iter().cloned())
            .collect();
        merged.sort();
        merged
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TransferConfig,
}

impl Pipeline {
    pub fn new(config: TransferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Moves `source` through a fresh queue and returns what every consumer
    /// received.
    ///
    /// Consumers start first, then producers. A lone producer closes the
    /// queue itself; with several producers the queue is closed once all of
    /// them have been joined. If any worker fails, every other worker is
    /// still joined (the queue is closed to release them) and the first
    /// failure is returned.
    ///
    /// `join_timeout`, when set, is a single deadline for all joins counted
    /// from the moment joining starts, not a per-worker allowance.
    pub fn run<T: Send + 'static>(&self, source: Vec<T>) -> Result<TransferOutcome<T>, WorkerError> {
        let config = &self.config;
        let span = info_span!(
            "transfer",
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers
        );
        let _entered = span.enter();

        let queue = Arc::new(BoundedBlockingQueue::new(config.capacity)?);
        let mut failures = Failures::default();
        info!(items = source.len(), "starting transfer");

        let mut consumer_handles = Vec::with_capacity(config.consumers);
        for index in 0..config.consumers {
            let name = format!("consumer-{index}");
            let consumer = Consumer::new(Arc::clone(&queue))
                .span(info_span!(parent: &span, "consumer", name = %name))
                .name(name);
            match consumer.spawn() {
                Ok(handle) => consumer_handles.push(handle),
                Err(err) => {
                    failures.record(err);
                    break;
                }
            }
        }

        let mut producer_handles = Vec::with_capacity(config.producers);
        if failures.is_empty() {
            let shared = config.producers > 1;
            for (index, chunk) in split_source(source, config.producers).into_iter().enumerate() {
                let name = format!("producer-{index}");
                let mut producer = Producer::new(chunk, Arc::clone(&queue))
                    .span(info_span!(parent: &span, "producer", name = %name))
                    .name(name);
                if shared {
                    producer = producer.keep_open();
                }
                match producer.spawn() {
                    Ok(handle) => producer_handles.push(handle),
                    Err(err) => {
                        failures.record(err);
                        break;
                    }
                }
            }
        }

        if !failures.is_empty() {
            queue.close();
        }

        let deadline = self
            .config
            .join_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        let producers = self.join_all(producer_handles, deadline, &*queue, &mut failures);
        if queue.close() {
            info!("all producers joined, queue closed");
        }
        let consumers = self.join_all(consumer_handles, deadline, &*queue, &mut failures);

        if let Some(err) = failures.first {
            warn!(error = %err, "transfer failed");
            return Err(err);
        }

        let outcome = TransferOutcome { producers, consumers };
        info!(
            produced = outcome.produced(),
            received = outcome.total(),
            "transfer complete"
        );
        Ok(outcome)
    }

    fn join_all<R, T>(
        &self,
        handles: Vec<WorkerHandle<R>>,
        deadline: Option<Instant>,
        queue: &BoundedBlockingQueue<T>,
        failures: &mut Failures,
    ) -> Vec<R> {
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let joined = match (deadline, self.config.join_timeout) {
                (Some(deadline), Some(timeout)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if handle.wait_timeout(remaining) {
                        handle.join()
                    } else {
                        warn!(worker = handle.name(), ?timeout, "worker still running, detaching");
                        Err(WorkerError::JoinTimeout {
                            worker: handle.name().to_owned(),
                            waited: timeout,
                        })
                    }
                }
                _ => handle.join(),
            };
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => {
                    // Release anyone still parked on the queue.
                    queue.close();
                    failures.record(err);
                }
            }
        }
        reports
    }
}

#[derive(Default)]
struct Failures {
    first: Option<WorkerError>,
}

impl Failures {
    fn record(&mut self, err: WorkerError) {
        warn!(error = %err, "worker failed");
        if self.first.is_none() {
            self.first = Some(err);
        }
    }

    fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// Splits `source` into `parts` contiguous runs, earlier runs taking the
/// remainder.
fn split_source<T>(source: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let per_part = source.len().div_ceil(parts.max(1));
    let mut items = source.into_iter();
    (0..parts)
        .map(|_| items.by_ref().take(per_part).collect())
        .collect()
}
