//! # esplink
//!
//! Interrupt-driven USART transport with an AT command encoder for an
//! ESP8266 serial Wi-Fi modem.
//!
//! ## Architecture
//!
//! ```text
//! Modem (AT frames) ──▶ Uart::send ──▶ TxSession ──▶ byte-sent IRQ ──▶ wire
//!                                         │
//! application ◀── RxQueue ◀── byte-received IRQ
//! ```
//!
//! One [`Uart`] value per physical line holds all per-line state. The
//! only state shared between application and interrupt context is the
//! session's busy flag and buffer; their access windows are disjoint, so
//! there are no locks anywhere on the hot paths.
//!
//! The core is hardware-independent and tests on the host against
//! [`port::SimPort`]; enable the `stm32f407` feature for the real
//! register binding.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock;
pub mod error;
pub mod fault;
pub mod hal;
pub mod line;
pub mod logging;
pub mod modem;
pub mod port;
pub mod rx;
pub mod tx;
pub mod uart;

pub use clock::Clocks;
pub use error::{Error, Result};
pub use fault::{FaultCode, FaultState};
pub use line::{Framing, LineId, Oversampling, Parity, StopBits, WordLength};
pub use modem::Modem;
pub use port::{LinePort, SimPort};
pub use tx::TxPayload;
pub use uart::{LineTable, Uart};
