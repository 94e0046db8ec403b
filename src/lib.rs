//! Bounded blocking queue and the producer/consumer workers built on it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use handoff::{BoundedBlockingQueue, Consumer, Producer};
//!
//! let queue = Arc::new(BoundedBlockingQueue::new(3)?);
//!
//! let producer = Producer::new((0..10).collect(), Arc::clone(&queue)).spawn()?;
//! let consumer = Consumer::new(Arc::clone(&queue)).spawn()?;
//!
//! producer.join()?;
//! let received = consumer.join()?.items;
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! # Ok::<(), handoff::WorkerError>(())
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod queue;
pub mod worker;

pub use config::TransferConfig;
pub use consumer::{Consumer, ConsumerReport};
pub use error::{ConfigError, QueueError, RejectedItem, WorkerError};
pub use pipeline::{Pipeline, TransferOutcome};
pub use producer::{Producer, ProducerReport};
pub use queue::{BoundedBlockingQueue, Drain, QueueState};
pub use worker::{spawn_worker, WorkerHandle};
