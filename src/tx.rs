//! Transmission session state shared between the application and the
//! byte-sent interrupt.
//!
//! Exactly two fields cross the context boundary: the `busy` flag and the
//! in-flight buffer. The initiating call owns the session until it enables
//! the interrupt; from then on the interrupt owns it until it clears
//! `busy`. The access windows are disjoint by construction; no lock is
//! taken on this path.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::vec::Vec;

/// A buffer handed to the transmission engine, tagged with its ownership.
///
/// `Owned` transfers the allocation to the engine, which releases it when
/// the last byte has been clocked out. `Borrowed` leaves the caller's
/// storage alone: the engine makes a private copy and the original is
/// never touched again, let alone freed.
pub enum TxPayload<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl<'a> TxPayload<'a> {
    /// Length of the data to transmit.
    pub fn len(&self) -> usize {
        match self {
            Self::Owned(buf) => buf.len(),
            Self::Borrowed(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for TxPayload<'static> {
    fn from(buf: Vec<u8>) -> Self {
        Self::Owned(buf)
    }
}

impl<'a> From<&'a [u8]> for TxPayload<'a> {
    fn from(buf: &'a [u8]) -> Self {
        Self::Borrowed(buf)
    }
}

/// Mutable state of one in-flight send.
///
/// # Safety
///
/// `buf` and `cursor` live in `UnsafeCell`s guarded by the `busy` handoff:
/// the application side writes them only between a successful claim and
/// the interrupt enable; the interrupt side touches them only while `busy`
/// is observed true. `claim` uses compare-exchange so two application-side
/// callers cannot both win.
pub(crate) struct TxSession {
    /// True from send acceptance until the last byte is clocked out.
    busy: AtomicBool,

    /// Bytes being transmitted. Empty while idle.
    buf: UnsafeCell<Vec<u8>>,

    /// Index of the next byte to transmit. Advanced only by the interrupt.
    cursor: UnsafeCell<usize>,
}

// SAFETY: disjoint access windows coordinated by `busy`; see above.
unsafe impl Sync for TxSession {}
unsafe impl Send for TxSession {}

impl TxSession {
    pub(crate) const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            buf: UnsafeCell::new(Vec::new()),
            cursor: UnsafeCell::new(0),
        }
    }

    /// Whether a send is in flight.
    #[inline]
    pub(crate) fn busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Try to move Idle → Sending. Fails if already sending.
    #[inline]
    pub(crate) fn claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Undo a claim that could not be completed (e.g. the private copy
    /// failed to allocate). Only valid before the interrupt was enabled.
    #[inline]
    pub(crate) fn release_claim(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Install the buffer for a freshly claimed session and reset the
    /// cursor. Caller must hold the claim with the interrupt still masked.
    #[inline]
    pub(crate) fn load(&self, buf: Vec<u8>) {
        // SAFETY: claim held, interrupt masked: no other party can touch
        // the session fields.
        unsafe {
            *self.buf.get() = buf;
            *self.cursor.get() = 0;
        }
    }

    /// Advance the session by one interrupt occurrence.
    ///
    /// Returns the byte to clock out, or `None` when the buffer is
    /// exhausted. Exhaustion does not release the session: the caller
    /// masks its interrupt source first and then calls [`Self::finish`],
    /// so a waiter never observes Idle while the completion is still
    /// touching the source.
    ///
    /// Must only be called from the interrupt context while `busy` is
    /// true; same-source interrupts cannot nest, so there is no
    /// reentrancy.
    #[inline]
    pub(crate) fn advance(&self) -> Option<u8> {
        // SAFETY: interrupt side owns the session while busy.
        unsafe {
            let buf = &*self.buf.get();
            let cursor = &mut *self.cursor.get();

            if *cursor < buf.len() {
                let byte = buf[*cursor];
                *cursor += 1;
                return Some(byte);
            }
        }
        None
    }

    /// Complete an exhausted session: release the buffer exactly once,
    /// then publish Idle. The busy store is the final action.
    #[inline]
    pub(crate) fn finish(&self) {
        // SAFETY: interrupt side still owns the session until the busy
        // store below.
        unsafe {
            *self.buf.get() = Vec::new();
        }
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let session = TxSession::new();
        assert!(session.claim());
        assert!(!session.claim());
        session.release_claim();
        assert!(session.claim());
    }

    #[test]
    fn test_advance_walks_buffer_then_finish_idles() {
        let session = TxSession::new();
        assert!(session.claim());
        session.load(alloc::vec![1, 2, 3]);

        assert_eq!(session.advance(), Some(1));
        assert_eq!(session.advance(), Some(2));
        assert_eq!(session.advance(), Some(3));
        // Exhaustion alone does not publish Idle.
        assert_eq!(session.advance(), None);
        assert!(session.busy());
        session.finish();
        assert!(!session.busy());
    }

    #[test]
    fn test_empty_buffer_exhausts_on_first_advance() {
        let session = TxSession::new();
        assert!(session.claim());
        session.load(Vec::new());
        assert_eq!(session.advance(), None);
        assert!(session.busy());
        session.finish();
        assert!(!session.busy());
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(TxPayload::Borrowed(b"AT").len(), 2);
        assert_eq!(TxPayload::Owned(alloc::vec![0; 5]).len(), 5);
        assert!(TxPayload::Borrowed(b"").is_empty());
    }
}
