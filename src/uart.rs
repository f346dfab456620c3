//! Per-line serial driver: configuration, the asynchronous send engine,
//! and receive buffering.
//!
//! One [`Uart`] value per physical line holds all per-line state; there
//! are no per-peripheral globals. The interrupt entry points
//! ([`Uart::on_tx_irq`], [`Uart::on_rx_irq`]) are called from the
//! hardware's ISRs with a shared reference.
//!
//! # Concurrency
//!
//! Single application context plus interrupt contexts. Within one line,
//! sends are strictly serialized by the session's busy flag; across lines
//! everything is independent. There are no locks anywhere on these paths.

use alloc::vec::Vec;

use crate::clock::Clocks;
use crate::error::{Error, Result};
use crate::fault::{FaultCode, FaultState};
use crate::line::{register_image, Framing, LineId};
use crate::port::LinePort;
use crate::rx::{RxQueue, DEFAULT_RX_CAPACITY};
use crate::tx::{TxPayload, TxSession};

/// One serial line: identity, hardware port, send session, receive ring.
pub struct Uart<P: LinePort, const RX: usize = DEFAULT_RX_CAPACITY> {
    id: LineId,
    port: P,
    tx: TxSession,
    rx: RxQueue<RX>,
}

impl<P: LinePort, const RX: usize> Uart<P, RX> {
    /// Create the line value. Done once at system init per physical line.
    pub const fn new(id: LineId, port: P) -> Self {
        Self {
            id,
            port,
            tx: TxSession::new(),
            rx: RxQueue::new(),
        }
    }

    pub const fn id(&self) -> LineId {
        self.id
    }

    /// The underlying hardware port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Apply a fresh configuration: framing, baud divisor for this line's
    /// kernel clock, and the receive interrupt enable. The previous
    /// configuration is overwritten completely; nothing leaks across a
    /// reconfigure.
    pub fn configure(
        &self,
        framing: &Framing,
        baud: u32,
        clocks: &Clocks,
        receiver_enabled: bool,
    ) -> Result<()> {
        let clock_hz = clocks.line_clock_hz(self.id);
        let image = register_image(framing, clock_hz, baud, receiver_enabled)?;
        self.port.apply(&image);
        Ok(())
    }

    /// Transmitter enable toggle. Idempotent, no other side effects.
    pub fn enable_transmitter(&self) {
        self.port.set_tx_enabled(true);
    }

    pub fn disable_transmitter(&self) {
        self.port.set_tx_enabled(false);
    }

    /// Receiver enable toggle. Idempotent, no other side effects.
    pub fn enable_receiver(&self) {
        self.port.set_rx_enabled(true);
    }

    pub fn disable_receiver(&self) {
        self.port.set_rx_enabled(false);
    }

    /// Byte-sent interrupt source toggle.
    pub fn enable_tx_interrupt(&self) {
        self.port.set_tx_irq(true);
    }

    pub fn disable_tx_interrupt(&self) {
        self.port.set_tx_irq(false);
    }

    /// Byte-received interrupt source toggle.
    pub fn enable_rx_interrupt(&self) {
        self.port.set_rx_irq(true);
    }

    pub fn disable_rx_interrupt(&self) {
        self.port.set_rx_irq(false);
    }

    /// Whether a transmission is in flight.
    pub fn is_sending(&self) -> bool {
        self.tx.busy()
    }

    /// Start an asynchronous send.
    ///
    /// Fails with `Busy` while a session is in flight; the in-flight
    /// buffer and cursor are left untouched. A `Borrowed` payload is
    /// copied into a private buffer first (`NoMemory` if that allocation
    /// fails, with the caller's storage never touched and the engine
    /// still idle). An `Owned` payload is taken over and released by the
    /// engine after the last byte.
    ///
    /// On acceptance the peripheral, transmitter, and byte-sent interrupt
    /// are enabled and the interrupt is forced pending so the first byte
    /// goes out even if the shift register already reports ready.
    ///
    /// With `wait` set, suspends on a wait-for-event primitive until the
    /// session returns to idle. Wakeups from unrelated interrupts are
    /// harmless; the flag is re-checked. There is no timeout: a line that
    /// never interrupts keeps the caller suspended, which is accepted at
    /// this layer.
    pub fn send(&self, payload: TxPayload<'_>, wait: bool) -> Result<()> {
        if !self.tx.claim() {
            return Err(Error::Busy);
        }

        let buf = match payload {
            TxPayload::Owned(buf) => buf,
            TxPayload::Borrowed(data) => {
                let mut copy = Vec::new();
                if copy.try_reserve_exact(data.len()).is_err() {
                    self.tx.release_claim();
                    return Err(Error::NoMemory);
                }
                copy.extend_from_slice(data);
                copy
            }
        };

        self.tx.load(buf);

        self.port.set_enabled(true);
        self.port.set_tx_enabled(true);
        self.port.set_tx_irq(true);
        self.port.pend_tx_irq();

        if wait {
            while self.tx.busy() {
                self.port.wait_for_event();
            }
        }

        Ok(())
    }

    /// Byte-sent interrupt entry point: clocks out one byte per
    /// invocation; on exhaustion masks the interrupt source, releases the
    /// buffer, and publishes idle, strictly in that order. A spurious
    /// invocation while idle just masks the source.
    pub fn on_tx_irq(&self) {
        if !self.tx.busy() {
            self.port.set_tx_irq(false);
            return;
        }

        match self.tx.advance() {
            Some(byte) => self.port.write_data(byte),
            None => {
                // Idle must be published last: a waiter that observes it
                // may immediately start the next send and re-enable the
                // source, which this completion must not touch afterwards.
                self.port.set_tx_irq(false);
                self.tx.finish();
            }
        }
    }

    /// Byte-received interrupt entry point. Overflow drops the byte and
    /// counts it; see [`RxQueue`] for the policy.
    pub fn on_rx_irq(&self, byte: u8) {
        let _ = self.rx.push(byte);
    }

    /// Pop the oldest received byte. `None` when the queue is empty.
    pub fn read_byte(&self) -> Option<u8> {
        self.rx.pop()
    }

    /// Number of received bytes waiting.
    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// Received bytes dropped on overflow since init.
    pub fn rx_dropped(&self) -> u32 {
        self.rx.dropped()
    }
}

/// Runtime-indexed line registry.
///
/// Maps a [`LineId`] to its registered line. Dispatch on an unregistered
/// id latches [`FaultCode::UnknownLine`] and returns `Internal` for the
/// top level to act on rather than parking the CPU.
pub struct LineTable<'a, P: LinePort, const RX: usize = DEFAULT_RX_CAPACITY> {
    lines: [Option<&'a Uart<P, RX>>; LineId::COUNT],
    fault: &'a FaultState,
}

impl<'a, P: LinePort, const RX: usize> LineTable<'a, P, RX> {
    pub const fn new(fault: &'a FaultState) -> Self {
        Self {
            lines: [None; LineId::COUNT],
            fault,
        }
    }

    /// Register a line under its own identifier. Done once at startup.
    pub fn register(&mut self, uart: &'a Uart<P, RX>) {
        self.lines[uart.id().index()] = Some(uart);
    }

    /// Look up a registered line.
    pub fn get(&self, id: LineId) -> Result<&'a Uart<P, RX>> {
        match self.lines[id.index()] {
            Some(uart) => Ok(uart),
            None => {
                self.fault.set(FaultCode::UnknownLine, id.index() as u32);
                Err(Error::Internal)
            }
        }
    }

    /// Send dispatch by line identifier.
    pub fn send(&self, id: LineId, payload: TxPayload<'_>, wait: bool) -> Result<()> {
        self.get(id)?.send(payload, wait)
    }

    /// Dequeue dispatch by line identifier.
    pub fn read_byte(&self, id: LineId) -> Result<Option<u8>> {
        Ok(self.get(id)?.read_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::cr1;
    use crate::port::SimPort;

    fn pump<const RX: usize>(uart: &Uart<SimPort, RX>) {
        // Stand-in for the NVIC: run the handler while its source is
        // unmasked and work remains.
        while uart.port().tx_irq_enabled() && uart.is_sending() {
            uart.on_tx_irq();
        }
    }

    #[test]
    fn test_send_borrowed_clocks_out_copy() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        let data = b"AT+GMR\r\n".to_vec();

        uart.send(TxPayload::Borrowed(&data), false).unwrap();
        assert!(uart.is_sending());
        assert!(uart.port().tx_enabled());
        assert_eq!(uart.port().pend_count(), 1);

        pump(&uart);

        assert!(!uart.is_sending());
        assert!(!uart.port().tx_irq_enabled());
        assert_eq!(uart.port().take_wire(), data);
    }

    #[test]
    fn test_send_owned_clocks_out_buffer() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        uart.send(TxPayload::Owned(b"AT\r\n".to_vec()), false).unwrap();
        pump(&uart);
        assert_eq!(uart.port().take_wire(), b"AT\r\n");
    }

    #[test]
    fn test_send_while_busy_is_rejected() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        uart.send(TxPayload::Borrowed(b"first"), false).unwrap();

        assert_eq!(
            uart.send(TxPayload::Borrowed(b"second"), false),
            Err(Error::Busy)
        );

        // The in-flight buffer is untouched by the rejected call.
        pump(&uart);
        assert_eq!(uart.port().take_wire(), b"first");
    }

    #[test]
    fn test_line_becomes_idle_and_accepts_next_send() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        uart.send(TxPayload::Borrowed(b"one"), false).unwrap();
        pump(&uart);
        uart.send(TxPayload::Borrowed(b"two"), false).unwrap();
        pump(&uart);
        assert_eq!(uart.port().take_wire(), b"onetwo");
    }

    #[test]
    fn test_spurious_tx_irq_masks_source() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        uart.port().set_tx_irq(true);
        uart.on_tx_irq();
        assert!(!uart.port().tx_irq_enabled());
        assert_eq!(uart.port().wire_len(), 0);
    }

    #[test]
    fn test_configure_applies_full_image() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        let clocks = Clocks::from_sysclk(168_000_000);

        uart.configure(&Framing::default_8n1(), 115_200, &clocks, true)
            .unwrap();

        let image = uart.port().applied_image().unwrap();
        // USART2 sits on the slow bus: 42 MHz.
        assert_eq!(image.divisor, 0x16D);
        assert_ne!(image.control1 & cr1::RXNEIE, 0);
    }

    #[test]
    fn test_configure_rejects_zero_baud() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        let clocks = Clocks::from_sysclk(168_000_000);
        assert_eq!(
            uart.configure(&Framing::default_8n1(), 0, &clocks, false),
            Err(Error::WrongArgument)
        );
        assert!(uart.port().applied_image().is_none());
    }

    #[test]
    fn test_rx_path_is_independent_of_tx_state() {
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        uart.send(TxPayload::Borrowed(b"ping"), false).unwrap();

        // Bytes arrive mid-transmission.
        uart.on_rx_irq(b'O');
        uart.on_rx_irq(b'K');

        assert_eq!(uart.read_byte(), Some(b'O'));
        pump(&uart);
        assert_eq!(uart.read_byte(), Some(b'K'));
        assert_eq!(uart.read_byte(), None);
    }

    #[test]
    fn test_table_dispatch_to_registered_line() {
        let fault = FaultState::new();
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        let mut table = LineTable::new(&fault);
        table.register(&uart);

        table
            .send(LineId::Usart2, TxPayload::Borrowed(b"AT"), false)
            .unwrap();
        pump(&uart);
        assert_eq!(uart.port().take_wire(), b"AT");
        assert!(!fault.is_active());
    }

    #[test]
    fn test_table_unknown_line_latches_fault() {
        let fault = FaultState::new();
        let table: LineTable<'_, SimPort> = LineTable::new(&fault);

        assert_eq!(
            table.send(LineId::Uart5, TxPayload::Borrowed(b"AT"), false),
            Err(Error::Internal)
        );
        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::UnknownLine);
        assert_eq!(fault.data(), LineId::Uart5.index() as u32);
    }
}
