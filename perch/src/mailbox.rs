//! Minimal FIFO inbox used by local actors.
//!
//! Ordering and filtering policies belong to the scheduler layer; this inbox
//! only provides what the control block needs from a mailbox: a push that
//! never blocks and reports whether the reader has to be woken up, and a
//! close that makes later pushes fail.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{hint, thread};

use crossbeam_queue::SegQueue;
use perch_api::message::MessageId;
use perch_api::types::BoxedMessage;

use crate::handle::StrongActorPtr;

/// Outcome of pushing into a mailbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueResult {
    /// The element was stored and the reader is already active.
    Success,
    /// The element was stored and the reader was blocked; it must be scheduled.
    UnblockedReader,
    /// The mailbox is closed; the element was dropped.
    QueueClosed,
}

/// One message in transit.
pub struct MailboxElement {
    pub sender: Option<StrongActorPtr>,
    pub mid: MessageId,
    pub content: BoxedMessage,
}

impl MailboxElement {
    pub fn new(sender: Option<StrongActorPtr>, mid: MessageId, content: BoxedMessage) -> Self {
        Self {
            sender,
            mid,
            content,
        }
    }

    /// Returns the content if it has type `M`, consuming the element.
    pub fn into_content<M: 'static>(self) -> Option<M> {
        self.content.downcast::<M>().ok().map(|boxed| *boxed)
    }
}

impl fmt::Debug for MailboxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxElement")
            .field("sender", &self.sender)
            .field("mid", &self.mid)
            .field("content", &"<boxed-message>")
            .finish()
    }
}

/// Set in `Mailbox::state` once the mailbox is closed. The remaining bits
/// count pushes in flight.
const CLOSED: usize = 1 << (usize::BITS - 1);

/// Lock-free inbox with a blocked-reader flag.
///
/// Pushes and close share one state word: a push registers itself before
/// touching the queue, and close waits for registered pushes before draining.
/// Every push reported as stored is therefore either read or returned by
/// [`Mailbox::close`], never left behind in a closed mailbox.
pub struct Mailbox {
    queue: SegQueue<MailboxElement>,
    reader_blocked: AtomicBool,
    state: AtomicUsize,
}

impl Mailbox {
    /// Creates an empty mailbox whose reader starts out blocked, so the first
    /// push schedules the owner.
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            reader_blocked: AtomicBool::new(true),
            state: AtomicUsize::new(0),
        }
    }

    /// Stores `element` unless the mailbox is closed. Never blocks.
    pub fn push(&self, element: MailboxElement) -> EnqueueResult {
        if self.state.fetch_add(1, Ordering::Acquire) & CLOSED != 0 {
            self.state.fetch_sub(1, Ordering::Release);
            return EnqueueResult::QueueClosed;
        }
        self.queue.push(element);
        let result = if self.reader_blocked.swap(false, Ordering::SeqCst) {
            EnqueueResult::UnblockedReader
        } else {
            EnqueueResult::Success
        };
        self.state.fetch_sub(1, Ordering::Release);
        result
    }

    pub fn pop(&self) -> Option<MailboxElement> {
        self.queue.pop()
    }

    /// Marks the reader as blocked if there is nothing to read.
    ///
    /// Returns `false` when the mailbox has elements and the reader must keep
    /// going. Returns `true` when the reader may go idle; the next push
    /// reports [`EnqueueResult::UnblockedReader`].
    pub fn try_block(&self) -> bool {
        if !self.queue.is_empty() {
            return false;
        }
        self.reader_blocked.store(true, Ordering::SeqCst);
        if self.queue.is_empty() {
            return true;
        }
        // A writer raced us. If it did not see the flag, take it back and
        // keep reading; otherwise the writer is already rescheduling us.
        !self.reader_blocked.swap(false, Ordering::SeqCst)
    }

    /// Closes the mailbox and returns the elements that were not read.
    ///
    /// Waits for pushes that started before the close to finish, so their
    /// elements are part of the returned batch.
    pub fn close(&self) -> Vec<MailboxElement> {
        self.state.fetch_or(CLOSED, Ordering::AcqRel);
        let mut spins = 0u32;
        while self.state.load(Ordering::Acquire) != CLOSED {
            if spins < 64 {
                hint::spin_loop();
                spins += 1;
            } else {
                thread::yield_now();
            }
        }
        let mut remaining = Vec::with_capacity(self.queue.len());
        while let Some(element) = self.queue.pop() {
            remaining.push(element);
        }
        remaining
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSED != 0
    }

    pub fn is_blocked(&self) -> bool {
        self.reader_blocked.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.queue.len())
            .field("reader_blocked", &self.is_blocked())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(value: u32) -> MailboxElement {
        MailboxElement::new(None, MessageId::async_(), Box::new(value))
    }

    #[test]
    fn test_first_push_unblocks_reader() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.push(element(1)), EnqueueResult::UnblockedReader);
        assert_eq!(mailbox.push(element(2)), EnqueueResult::Success);
        assert_eq!(mailbox.len(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new();
        for i in 0..5 {
            mailbox.push(element(i));
        }
        let values: Vec<u32> = std::iter::from_fn(|| mailbox.pop())
            .filter_map(MailboxElement::into_content::<u32>)
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_try_block_then_push_unblocks_again() {
        let mailbox = Mailbox::new();
        mailbox.push(element(1));
        assert!(!mailbox.try_block());
        mailbox.pop();
        assert!(mailbox.try_block());
        assert_eq!(mailbox.push(element(2)), EnqueueResult::UnblockedReader);
    }

    #[test]
    fn test_closed_mailbox_rejects_pushes() {
        let mailbox = Mailbox::new();
        mailbox.push(element(1));
        let remaining = mailbox.close();
        assert_eq!(remaining.len(), 1);
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.push(element(2)), EnqueueResult::QueueClosed);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_close_racing_pushes_strands_nothing() {
        const ROUNDS: usize = 500;
        const PUSHES: u32 = 200;

        for _ in 0..ROUNDS {
            let mailbox = Mailbox::new();
            let (accepted, drained) = thread::scope(|scope| {
                let writer = scope.spawn(|| {
                    (0..PUSHES)
                        .filter(|&i| mailbox.push(element(i)) != EnqueueResult::QueueClosed)
                        .count()
                });
                thread::yield_now();
                let drained = mailbox.close().len();
                (writer.join().unwrap(), drained)
            });

            assert_eq!(accepted, drained);
            assert!(mailbox.is_empty());
            assert!(mailbox.is_closed());
        }
    }
}
