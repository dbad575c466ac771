use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};

/// Thread-safe FIFO of received bytes.
///
/// One side pushes whatever arrives from the medium; the other side drains
/// it, optionally blocking on a condition variable until data shows up.
#[derive(Debug, Default)]
pub struct ReceiveQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl ReceiveQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and wake any waiting reader.
    ///
    /// Bytes pushed after [`close`](Self::close) are dropped.
    pub fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.bytes.extend(data);
        drop(state);
        self.ready.notify_all();
    }

    /// Move up to `buf.len()` pending bytes into `buf` without blocking.
    ///
    /// Returns `Ok(0)` when nothing is pending, or `Err(Closed)` when the
    /// queue is closed and drained.
    pub fn pop_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.bytes.is_empty() && state.closed {
            return Err(TransportError::Closed);
        }
        Ok(drain_into(&mut state, buf))
    }

    /// Block until bytes are pending or `timeout` elapses, then move up to
    /// `buf.len()` of them into `buf`.
    ///
    /// Returns `Ok(0)` on timeout. `None` waits without a deadline.
    pub fn wait_pop_into(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock();
        loop {
            if !state.bytes.is_empty() {
                return Ok(drain_into(&mut state, buf));
            }
            if state.closed {
                return Err(TransportError::Closed);
            }

            state = match deadline {
                None => self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(0);
                    }
                    self.ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Drop every pending byte. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.bytes.len();
        state.bytes.clear();
        discarded
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    /// Returns true if no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the producer as gone and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn drain_into(state: &mut QueueState, buf: &mut [u8]) -> usize {
    let n = state.bytes.len().min(buf.len());
    for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
        *slot = byte;
    }
    n
}
