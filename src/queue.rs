//! Bounded blocking FIFO shared between producer and consumer threads.
//!
//! One mutex guards the buffer and the closed flag. Two condition variables
//! park the waiters: putters on `not_full`, getters on `not_empty`. Every
//! wait sits in a loop that re-checks its predicate after waking, so spurious
//! wakeups and broadcast wakeups are harmless.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{QueueError, RejectedItem};

// =============================================================================
// Shared state
// =============================================================================

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

/// Observable lifecycle of a queue. Transitions only move forward:
/// `Open` -> `ClosedNonEmpty` -> `ClosedEmpty`, or straight from `Open` to
/// `ClosedEmpty` when nothing is buffered at close time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Open,
    ClosedNonEmpty,
    ClosedEmpty,
}

pub struct BoundedBlockingQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedBlockingQueue<T> {
    /// Creates an open, empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity { capacity });
        }

        Ok(Self {
            state: Mutex::new(State {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<T>>, QueueError> {
        self.state.lock().map_err(|_| QueueError::Poisoned)
    }

    // Snapshots and `close` only read or set a flag, so a poisoned lock
    // cannot leave them looking at half-written data.
    fn lock_recovering(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Producer side
    // =========================================================================

    /// Appends `item` at the tail, blocking while the queue is full.
    ///
    /// Fails with [`QueueError::Closed`] if the queue is closed at call time
    /// or gets closed while this call is waiting for space. A failed put
    /// never enqueues.
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        self.put_inner(item, None).map_err(QueueError::from)
    }

    /// Like [`put`](Self::put) but gives up after `timeout`, handing the item
    /// back inside the [`RejectedItem`].
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), RejectedItem<T>> {
        self.put_inner(item, Some(timeout))
    }

    /// Non-blocking put. A full queue reports a zero-length timeout.
    pub fn try_put(&self, item: T) -> Result<(), RejectedItem<T>> {
        self.put_inner(item, Some(Duration::ZERO))
    }

    fn put_inner(&self, item: T, timeout: Option<Duration>) -> Result<(), RejectedItem<T>> {
        let deadline = deadline_after(timeout);

        let mut state = match self.lock() {
            Ok(state) => state,
            Err(err) => return Err(RejectedItem::new(item, err)),
        };

        loop {
            if state.closed {
                return Err(RejectedItem::new(item, QueueError::Closed));
            }
            if state.buffer.len() < self.capacity {
                break;
            }

            let woken = match deadline {
                None => self.not_full.wait(state).ok(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited = timeout.unwrap_or_default();
                        return Err(RejectedItem::new(item, QueueError::Timeout { waited }));
                    }
                    self.not_full
                        .wait_timeout(state, deadline - now)
                        .ok()
                        .map(|(guard, _)| guard)
                }
            };
            state = match woken {
                Some(guard) => guard,
                None => return Err(RejectedItem::new(item, QueueError::Poisoned)),
            };
        }

        state.buffer.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    // =========================================================================
    // Consumer side
    // =========================================================================

    /// Removes and returns the oldest item, blocking while the queue is empty
    /// and still open.
    ///
    /// Buffered items are always handed out before
    /// [`QueueError::ClosedEmpty`] is reported, even after `close`.
    pub fn get(&self) -> Result<T, QueueError> {
        self.get_inner(None)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        self.get_inner(Some(timeout))
    }

    /// Non-blocking get. An empty open queue reports a zero-length timeout.
    pub fn try_get(&self) -> Result<T, QueueError> {
        self.get_inner(Some(Duration::ZERO))
    }

    fn get_inner(&self, timeout: Option<Duration>) -> Result<T, QueueError> {
        let deadline = deadline_after(timeout);
        let mut state = self.lock()?;

        loop {
            if let Some(item) = state.buffer.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(item);
            }
            if state.closed {
                return Err(QueueError::ClosedEmpty);
            }

            state = match deadline {
                None => self.not_empty.wait(state).map_err(|_| QueueError::Poisoned)?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::Timeout {
                            waited: timeout.unwrap_or_default(),
                        });
                    }
                    self.not_empty
                        .wait_timeout(state, deadline - now)
                        .map(|(guard, _)| guard)
                        .map_err(|_| QueueError::Poisoned)?
                }
            };
        }
    }

    /// Blocking iterator over items until the queue is closed and drained.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain {
            queue: self,
            error: None,
            finished: false,
        }
    }

    // =========================================================================
    // Shutdown and snapshots
    // =========================================================================

    /// Closes the queue and wakes every blocked putter and getter.
    ///
    /// Returns `true` for the call that actually closed it; later calls are
    /// no-ops that return `false`. Buffered items stay retrievable.
    pub fn close(&self) -> bool {
        let mut state = self.lock_recovering();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
        true
    }

    /// Number of buffered items at the time of the call. May be stale as soon
    /// as it returns.
    pub fn size(&self) -> usize {
        self.lock_recovering().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock_recovering().closed
    }

    pub fn state(&self) -> QueueState {
        let state = self.lock_recovering();
        match (state.closed, state.buffer.is_empty()) {
            (false, _) => QueueState::Open,
            (true, false) => QueueState::ClosedNonEmpty,
            (true, true) => QueueState::ClosedEmpty,
        }
    }
}

// A deadline too far out to represent means "no deadline".
fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_recovering();
        f.debug_struct("BoundedBlockingQueue")
            .field("capacity", &self.capacity)
            .field("size", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}

// =============================================================================
// Draining iterator
// =============================================================================

/// Iterator returned by [`BoundedBlockingQueue::drain`].
///
/// Ends normally on closed-and-empty. Any other failure also ends iteration
/// and is kept for inspection through [`Drain::error`].
pub struct Drain<'a, T> {
    queue: &'a BoundedBlockingQueue<T>,
    error: Option<QueueError>,
    finished: bool,
}

impl<T> Drain<'_, T> {
    pub fn error(&self) -> Option<&QueueError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<(), QueueError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        match self.queue.get() {
            Ok(item) => Some(item),
            Err(err) => {
                self.finished = true;
                if !err.is_terminal() {
                    self.error = Some(err);
                }
                None
            }
        }
    }
}

impl<T> std::iter::FusedIterator for Drain<'_, T> {}
