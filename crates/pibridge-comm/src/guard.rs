//! Exclusive access to the shared medium.
//!
//! [`BusGuard`] owns the medium and hands it out one caller at a time.
//! Waiters are served strictly in arrival order: each caller draws a ticket
//! and sleeps on a condition variable until its number comes up.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// FIFO lock around a bus medium `T`.
#[derive(Debug)]
pub struct BusGuard<T> {
    tickets: Mutex<Tickets>,
    turn: Condvar,
    medium: Mutex<T>,
}

impl<T> BusGuard<T> {
    /// Wrap `medium`.
    pub fn new(medium: T) -> Self {
        Self {
            tickets: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            medium: Mutex::new(medium),
        }
    }

    /// Block until every earlier caller has released the medium, then take it.
    pub fn acquire(&self) -> BusPermit<'_, T> {
        let mut tickets = self.lock_tickets();
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(tickets);

        let medium = self.medium.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovered bus medium after a panicking holder");
            poisoned.into_inner()
        });
        tracing::trace!(ticket, "bus acquired");
        BusPermit {
            guard: self,
            medium,
        }
    }

    /// Number of callers waiting for the medium, not counting the holder.
    pub fn queue_len(&self) -> usize {
        let tickets = self.lock_tickets();
        (tickets.next - tickets.serving).saturating_sub(1) as usize
    }

    /// Returns true if some caller holds the medium.
    pub fn is_busy(&self) -> bool {
        let tickets = self.lock_tickets();
        tickets.next != tickets.serving
    }

    /// Consume the guard and return the medium.
    pub fn into_inner(self) -> T {
        self.medium
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovered bus ticket lock after a panicking holder");
            poisoned.into_inner()
        })
    }

    fn advance(&self) {
        let mut tickets = self.lock_tickets();
        tickets.serving += 1;
        drop(tickets);
        self.turn.notify_all();
    }
}

/// Exclusive access to the medium. Released on drop.
#[derive(Debug)]
pub struct BusPermit<'a, T> {
    guard: &'a BusGuard<T>,
    medium: MutexGuard<'a, T>,
}

impl<T> BusPermit<'_, T> {
    /// Give the medium back to the next waiter.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for BusPermit<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.medium
    }
}

impl<T> DerefMut for BusPermit<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.medium
    }
}

impl<T> Drop for BusPermit<'_, T> {
    fn drop(&mut self) {
        // The medium mutex is unlocked right after this body; the next
        // ticket holder may briefly block on it, nobody else can get there.
        self.guard.advance();
        tracing::trace!("bus released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for_queue<T>(guard: &BusGuard<T>, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while guard.queue_len() < len {
            assert!(Instant::now() < deadline, "waiters never queued");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn permit_gives_mutable_access() {
        let guard = BusGuard::new(Vec::<u8>::new());
        {
            let mut permit = guard.acquire();
            permit.push(1);
            assert!(guard.is_busy());
        }
        assert!(!guard.is_busy());
        guard.acquire().push(2);
        assert_eq!(guard.into_inner(), vec![1, 2]);
    }

    #[test]
    fn release_is_explicit_or_on_drop() {
        let guard = BusGuard::new(0u32);
        let permit = guard.acquire();
        permit.release();
        assert!(!guard.is_busy());
        drop(guard.acquire());
        assert!(!guard.is_busy());
        assert_eq!(guard.queue_len(), 0);
    }

    #[test]
    fn waiters_served_in_arrival_order() {
        let guard = Arc::new(BusGuard::new(Vec::<usize>::new()));
        let holder = guard.acquire();

        let mut handles = Vec::new();
        for id in 0..5 {
            let waiter = Arc::clone(&guard);
            handles.push(thread::spawn(move || {
                waiter.acquire().push(id);
            }));
            // Make arrival order deterministic.
            wait_for_queue(&*guard, id + 1);
        }

        assert_eq!(guard.queue_len(), 5);
        drop(holder);
        for handle in handles {
            handle.join().unwrap();
        }

        let guard = Arc::try_unwrap(guard).unwrap();
        assert_eq!(guard.into_inner(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn waiter_blocks_until_release() {
        let guard = Arc::new(BusGuard::new(()));
        let holder = guard.acquire();
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let guard = Arc::clone(&guard);
            thread::spawn(move || {
                let _permit = guard.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        holder.release();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn survives_panicking_holder() {
        let guard = Arc::new(BusGuard::new(0u32));
        let panicker = {
            let guard = Arc::clone(&guard);
            thread::spawn(move || {
                let mut permit = guard.acquire();
                *permit += 1;
                panic!("holder panics");
            })
        };
        assert!(panicker.join().is_err());

        let mut permit = guard.acquire();
        *permit += 1;
        assert_eq!(*permit, 2);
    }
}
