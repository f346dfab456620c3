//! Hardware seam for a serial line.
//!
//! The core never touches registers; everything a line does to silicon goes
//! through [`LinePort`]. The `stm32f407` feature provides the real binding
//! ([`crate::hal`]); [`SimPort`] is a register-accurate stand-in used by the
//! test suites and for host-side development.
//!
//! Every method takes `&self`: ports are shared between the application
//! context and the interrupt context, and implementations must be safe to
//! call from both (register writes are single-word MMIO on the real part).

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use alloc::vec::Vec;

use crate::line::{cr1, RegisterImage};

/// Register-level operations of one serial line.
pub trait LinePort {
    /// Overwrite the line's configuration registers with `image`, clearing
    /// everything a previous configuration may have left behind. Must write
    /// whole registers, never read-modify-write.
    fn apply(&self, image: &RegisterImage);

    /// Peripheral enable (master on/off). Idempotent.
    fn set_enabled(&self, on: bool);

    /// Transmitter enable. Idempotent.
    fn set_tx_enabled(&self, on: bool);

    /// Receiver enable. Idempotent.
    fn set_rx_enabled(&self, on: bool);

    /// Byte-sent interrupt source enable. Idempotent.
    fn set_tx_irq(&self, on: bool);

    /// Byte-received interrupt source enable. Idempotent.
    fn set_rx_irq(&self, on: bool);

    /// Clock one byte into the output shift register.
    fn write_data(&self, byte: u8);

    /// Force the transmit interrupt pending so the handler runs even if the
    /// shift register already reports ready. Needed to kick off a send.
    fn pend_tx_irq(&self);

    /// Suspend until any interrupt fires. May wake spuriously; callers must
    /// re-check their condition.
    fn wait_for_event(&self);
}

/// Capacity of the simulated wire capture. Tests stay far below this.
const SIM_WIRE_CAPACITY: usize = 1024;

/// Simulated serial line: records register state and captures every byte
/// clocked out, so tests can assert on exactly what reached the wire.
///
/// All state is atomic; the same value may be driven from an application
/// thread and a thread standing in for the interrupt context.
pub struct SimPort {
    enabled: AtomicBool,
    tx_enabled: AtomicBool,
    rx_enabled: AtomicBool,
    tx_irq: AtomicBool,
    rx_irq: AtomicBool,
    /// Number of forced pending interrupts since construction.
    pends: AtomicU32,
    /// Last applied image, packed; `applied` distinguishes "never".
    applied: AtomicBool,
    control1: AtomicU32,
    control2: AtomicU32,
    divisor: AtomicU32,
    /// Captured wire bytes, single producer (the interrupt side).
    wire: crate::rx::RxQueue<SIM_WIRE_CAPACITY>,
}

impl SimPort {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            tx_enabled: AtomicBool::new(false),
            rx_enabled: AtomicBool::new(false),
            tx_irq: AtomicBool::new(false),
            rx_irq: AtomicBool::new(false),
            pends: AtomicU32::new(0),
            applied: AtomicBool::new(false),
            control1: AtomicU32::new(0),
            control2: AtomicU32::new(0),
            divisor: AtomicU32::new(0),
            wire: crate::rx::RxQueue::new(),
        }
    }

    /// Last applied register image, if any configuration happened.
    pub fn applied_image(&self) -> Option<RegisterImage> {
        if !self.applied.load(Ordering::Acquire) {
            return None;
        }
        Some(RegisterImage {
            control1: self.control1.load(Ordering::Acquire),
            control2: self.control2.load(Ordering::Acquire),
            divisor: self.divisor.load(Ordering::Acquire),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn tx_enabled(&self) -> bool {
        self.tx_enabled.load(Ordering::Acquire)
    }

    pub fn rx_enabled(&self) -> bool {
        self.rx_enabled.load(Ordering::Acquire)
    }

    /// Whether the byte-sent interrupt source is currently unmasked. The
    /// test harness gates its interrupt stand-in on this, like the NVIC
    /// gates the real handler.
    pub fn tx_irq_enabled(&self) -> bool {
        self.tx_irq.load(Ordering::Acquire)
    }

    pub fn rx_irq_enabled(&self) -> bool {
        self.rx_irq.load(Ordering::Acquire)
    }

    /// Forced-pending count since construction.
    pub fn pend_count(&self) -> u32 {
        self.pends.load(Ordering::Acquire)
    }

    /// Number of bytes sitting on the captured wire.
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Drain and return everything clocked out so far, in order.
    pub fn take_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(byte) = self.wire.pop() {
            out.push(byte);
        }
        out
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl LinePort for SimPort {
    fn apply(&self, image: &RegisterImage) {
        self.control1.store(image.control1, Ordering::Release);
        self.control2.store(image.control2, Ordering::Release);
        self.divisor.store(image.divisor, Ordering::Release);
        // Applying an image overwrites CR1 wholesale, which also resets the
        // enable and interrupt-mask bits the toggles below model.
        self.enabled.store(image.control1 & cr1::UE != 0, Ordering::Release);
        self.tx_enabled.store(image.control1 & cr1::TE != 0, Ordering::Release);
        self.rx_enabled.store(image.control1 & cr1::RE != 0, Ordering::Release);
        self.tx_irq.store(image.control1 & cr1::TXEIE != 0, Ordering::Release);
        self.rx_irq.store(image.control1 & cr1::RXNEIE != 0, Ordering::Release);
        self.applied.store(true, Ordering::Release);
    }

    fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Release);
    }

    fn set_tx_enabled(&self, on: bool) {
        self.tx_enabled.store(on, Ordering::Release);
    }

    fn set_rx_enabled(&self, on: bool) {
        self.rx_enabled.store(on, Ordering::Release);
    }

    fn set_tx_irq(&self, on: bool) {
        self.tx_irq.store(on, Ordering::Release);
    }

    fn set_rx_irq(&self, on: bool) {
        self.rx_irq.store(on, Ordering::Release);
    }

    fn write_data(&self, byte: u8) {
        // Wire capture full means the test wrote more than it asserts on.
        let _ = self.wire.push(byte);
    }

    fn pend_tx_irq(&self) {
        self.pends.fetch_add(1, Ordering::AcqRel);
    }

    fn wait_for_event(&self) {
        core::hint::spin_loop();
    }
}
