//! Fixed-capacity receive ring for one line.
//!
//! Single producer (the byte-received interrupt), single consumer (the
//! application). Coordination is two atomic indices with acquire/release
//! ordering; no locks, push and pop are O(1) and never allocate.
//!
//! # Overflow policy
//!
//! When the ring is full the incoming byte is dropped and counted. The
//! producer runs in interrupt context and must not block or touch the
//! consumer index, so drop-newest is the only policy that keeps the two
//! sides disjoint.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

/// Default per-line receive capacity in bytes. Must be a power of 2.
pub const DEFAULT_RX_CAPACITY: usize = 128;

/// Lock-free SPSC byte ring.
///
/// # Safety
///
/// Uses `UnsafeCell` internally but is safe to share because each slot is
/// written exactly once by the producer before the write index release
/// that publishes it, and read only after the consumer observes that
/// index. Producer and consumer never touch the same slot concurrently.
pub struct RxQueue<const N: usize = DEFAULT_RX_CAPACITY> {
    slots: UnsafeCell<[u8; N]>,

    /// Next write position (free-running, wraps via mask).
    write_idx: AtomicU32,

    /// Next read position (free-running, wraps via mask).
    read_idx: AtomicU32,

    /// Bytes dropped because the ring was full.
    dropped: AtomicU32,
}

// SAFETY: single producer, single consumer, atomic index handoff; see the
// type-level safety note.
unsafe impl<const N: usize> Sync for RxQueue<N> {}
unsafe impl<const N: usize> Send for RxQueue<N> {}

impl<const N: usize> RxQueue<N> {
    const MASK: usize = N - 1;

    /// Create an empty ring.
    ///
    /// # Panics
    ///
    /// Panics at compile time if N is not a power of 2.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "RX capacity must be power of 2");

        Self {
            slots: UnsafeCell::new([0; N]),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push one received byte (interrupt side).
    ///
    /// Returns `false` if the ring was full and the byte was dropped.
    #[inline]
    pub fn push(&self, byte: u8) -> bool {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: slot not yet published, consumer cannot read it.
        unsafe {
            (*self.slots.get())[(write as usize) & Self::MASK] = byte;
        }
        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pop the oldest byte (application side). `None` when empty.
    #[inline]
    pub fn pop(&self) -> Option<u8> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: slot was published by the write index load above and the
        // producer will not reuse it until read_idx advances past it.
        let byte = unsafe { (*self.slots.get())[(read as usize) & Self::MASK] };
        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Number of bytes currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes dropped on overflow since construction.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for RxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
