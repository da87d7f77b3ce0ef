//! Receive queue with a single-slot waiter.
//!
//! The queue holds inbound calls until the pump drains them. A consumer
//! that finds the queue empty parks on the waiter slot; the next push
//! (or close) resolves the slot once and clears it. Awaiters arriving
//! while the slot is outstanding share the same cell.
//!
//! Queue and slot live under one lock in the connection, so checking for
//! data and registering as a waiter is atomic with respect to pushes.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use futures_util::FutureExt;
use futures_util::future::Shared;
use tokio::sync::oneshot;

// ============================================================================
// Types
// ============================================================================

/// Shared completion for "data available" (`true`) or "closed" (`false`).
pub(crate) type WaitCell = Shared<oneshot::Receiver<bool>>;

/// Outcome of registering interest in the next item.
pub(crate) enum Wait {
    /// Resolved without waiting.
    Ready(bool),
    /// Await the cell.
    Pending(WaitCell),
}

/// The outstanding waiter: sending half plus the shareable receiver.
struct Waiter {
    tx: oneshot::Sender<bool>,
    cell: WaitCell,
}

// ============================================================================
// Inbox
// ============================================================================

/// FIFO of undelivered items plus the single waiter slot.
pub(crate) struct Inbox<T> {
    queue: VecDeque<T>,
    waiter: Option<Waiter>,
    closed: bool,
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            waiter: None,
            closed: false,
        }
    }
}

impl<T> Inbox<T> {
    /// Appends an item and wakes the waiter, if any.
    pub(crate) fn push(&mut self, item: T) {
        self.queue.push_back(item);
        self.wake(true);
    }

    /// Pops the oldest item.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Number of queued items.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[inline]
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the inbox closed and resolves the waiter with `false`.
    ///
    /// Items still queued remain available to [`pop`](Self::pop).
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.wake(false);
    }

    /// Registers interest in the next item.
    ///
    /// Resolves immediately if items are queued or the inbox is closed,
    /// otherwise returns the (possibly shared) waiter cell.
    pub(crate) fn wait(&mut self) -> Wait {
        if !self.queue.is_empty() {
            return Wait::Ready(true);
        }
        if self.closed {
            return Wait::Ready(false);
        }

        let waiter = self.waiter.get_or_insert_with(|| {
            let (tx, rx) = oneshot::channel();
            Waiter {
                tx,
                cell: rx.shared(),
            }
        });

        Wait::Pending(waiter.cell.clone())
    }

    /// Returns `true` if a waiter is parked.
    #[cfg(test)]
    pub(crate) fn has_waiter(&self) -> bool {
        self.waiter.is_some()
    }

    /// Resolves and clears the waiter slot.
    fn wake(&mut self, available: bool) {
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.tx.send(available);
        }
    }
}

impl Wait {
    /// Waits for the outcome. A dropped cell counts as closed.
    pub(crate) async fn resolve(self) -> bool {
        match self {
            Self::Ready(available) => available,
            Self::Pending(cell) => cell.await.unwrap_or(false),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo() {
        let mut inbox = Inbox::default();
        inbox.push(1);
        inbox.push(2);
        inbox.push(3);

        assert_eq!(inbox.len(), 3);
        assert_eq!(inbox.pop(), Some(1));
        assert_eq!(inbox.pop(), Some(2));
        assert_eq!(inbox.pop(), Some(3));
        assert_eq!(inbox.pop(), None);
    }

    #[tokio::test]
    async fn test_wait_ready_when_queued() {
        let mut inbox = Inbox::default();
        inbox.push("a");

        assert!(inbox.wait().resolve().await);
        assert!(!inbox.has_waiter());
    }

    #[tokio::test]
    async fn test_push_wakes_waiter_once() {
        let mut inbox = Inbox::default();

        let wait = inbox.wait();
        assert!(inbox.has_waiter());

        inbox.push(1);
        assert!(!inbox.has_waiter());
        assert!(wait.resolve().await);

        // Slot was cleared: a second push has nobody to wake.
        inbox.push(2);
        assert!(!inbox.has_waiter());
    }

    #[tokio::test]
    async fn test_awaiters_share_cell() {
        let mut inbox = Inbox::<u8>::default();

        let first = inbox.wait();
        let second = inbox.wait();
        inbox.push(7);

        assert!(first.resolve().await);
        assert!(second.resolve().await);
    }

    #[tokio::test]
    async fn test_fresh_cell_after_resolution() {
        let mut inbox = Inbox::default();

        let first = inbox.wait();
        inbox.push(1);
        assert!(first.resolve().await);
        assert_eq!(inbox.pop(), Some(1));

        let second = inbox.wait();
        assert!(inbox.has_waiter());
        inbox.close();
        assert!(!second.resolve().await);
    }

    #[tokio::test]
    async fn test_close_resolves_false() {
        let mut inbox = Inbox::<u8>::default();

        let wait = inbox.wait();
        inbox.close();

        assert!(!wait.resolve().await);
        assert!(inbox.is_closed());
        assert!(!inbox.wait().resolve().await);
    }

    #[tokio::test]
    async fn test_queued_items_survive_close() {
        let mut inbox = Inbox::default();
        inbox.push(5);
        inbox.close();

        assert!(inbox.wait().resolve().await);
        assert_eq!(inbox.pop(), Some(5));
        assert!(!inbox.wait().resolve().await);
    }
}
