//! Terminal fault reporting.
//!
//! Unrecoverable conditions are latched rather than halting in place: the
//! offending call returns [`crate::Error::Internal`] and the top level
//! polls the latch to decide what happens next (halt, reset, log and
//! continue degraded).

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Reasons the core gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// A send was dispatched to a line identifier with no registered
    /// line. Continuing would clock bytes onto an absent peripheral.
    UnknownLine = 1,
}

impl FaultCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::UnknownLine,
            _ => FaultCode::None,
        }
    }
}

/// Lock-free fault latch.
///
/// Set from any context (including interrupts), polled by the top level.
/// The count accumulates across clears so fault history survives for
/// diagnostics.
pub struct FaultState {
    active: AtomicBool,
    code: AtomicU8,
    /// Code-specific detail; for `UnknownLine` the line index.
    data: AtomicU32,
    /// Total faults since boot, never cleared.
    count: AtomicU32,
}

impl FaultState {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Latch a fault with its detail word.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Latched code; only meaningful while active.
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear the active flag. The count is preserved.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}
