//! Interrupt-safe logging.
//!
//! Producers (including interrupt handlers) push formatted entries into a
//! lock-free ring and never block; a drain running in the application
//! context formats entries and ships them out a serial line through the
//! transmission engine. If the ring is full the entry is dropped and
//! counted; a lost log line beats a stalled interrupt.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::port::LinePort;
use crate::tx::TxPayload;
use crate::uart::Uart;

/// Maximum message length per entry.
pub const MAX_MSG_LEN: usize = 96;

/// Default ring size (entries). Must be a power of 2.
pub const LOG_RING_SIZE: usize = 64;

/// Log severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// A single log entry.
#[derive(Clone, Copy)]
pub struct LogEntry {
    /// Timestamp in system ticks; the caller decides the tick source.
    pub ticks: u32,
    pub level: LogLevel,
    /// Message length in `msg`.
    pub len: u8,
    /// Message bytes, not terminated.
    pub msg: [u8; MAX_MSG_LEN],
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            ticks: 0,
            level: LogLevel::Info,
            len: 0,
            msg: [0; MAX_MSG_LEN],
        }
    }
}

/// Lock-free log ring: any context pushes, one drain consumes.
pub struct LogRing<const N: usize = LOG_RING_SIZE> {
    entries: UnsafeCell<[LogEntry; N]>,
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: pushes happen in the single application context or in interrupts
// that preempt it, never concurrently with each other; the single drain
// owns read_idx. Slots are published by the release store on write_idx.
unsafe impl<const N: usize> Sync for LogRing<N> {}
unsafe impl<const N: usize> Send for LogRing<N> {}

impl<const N: usize> LogRing<N> {
    const MASK: usize = N - 1;

    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log ring size must be power of 2");

        Self {
            entries: UnsafeCell::new(
                [LogEntry {
                    ticks: 0,
                    level: LogLevel::Info,
                    len: 0,
                    msg: [0; MAX_MSG_LEN],
                }; N],
            ),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push an entry. Never blocks; returns `false` if the ring was full
    /// and the entry was dropped.
    #[inline]
    pub fn push(&self, ticks: u32, level: LogLevel, msg: &[u8]) -> bool {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let idx = (write as usize) & Self::MASK;
        let len = msg.len().min(MAX_MSG_LEN);

        // SAFETY: slot is unpublished until the index store below.
        unsafe {
            let entry = &mut (*self.entries.get())[idx];
            entry.ticks = ticks;
            entry.level = level;
            entry.len = len as u8;
            entry.msg[..len].copy_from_slice(&msg[..len]);
        }

        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Take the next entry, oldest first. `None` when drained.
    #[inline]
    pub fn drain(&self) -> Option<LogEntry> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: entry was published by the producer's index store.
        let entry = unsafe { (*self.entries.get())[(read as usize) & Self::MASK] };
        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Entries waiting to be drained.
    #[inline]
    pub fn pending(&self) -> u32 {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Entries dropped because the ring was full.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for LogRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Format arguments into a byte buffer, truncating on overflow. Returns
/// the number of bytes written.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    use core::fmt::Write;

    struct BufWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }

    impl Write for BufWriter<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let remaining = self.buf.len() - self.pos;
            let to_write = bytes.len().min(remaining);
            self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
            Ok(())
        }
    }

    let mut writer = BufWriter { buf, pos: 0 };
    let _ = core::fmt::write(&mut writer, args);
    writer.pos
}

/// Buffer size that fits any formatted entry.
pub const FORMATTED_LEN: usize = MAX_MSG_LEN + 32;

/// Render an entry as `[ticks] LEVEL message\r\n` into `out`. Returns the
/// rendered length; `out` must be at least [`FORMATTED_LEN`] bytes.
pub fn format_entry(entry: &LogEntry, out: &mut [u8]) -> usize {
    let mut pos = format_to_buffer(
        out,
        format_args!("[{}] {} ", entry.ticks, entry.level.as_str()),
    );
    let msg = &entry.msg[..entry.len as usize];
    let to_copy = msg.len().min(out.len().saturating_sub(pos + 2));
    out[pos..pos + to_copy].copy_from_slice(&msg[..to_copy]);
    pos += to_copy;
    out[pos] = b'\r';
    out[pos + 1] = b'\n';
    pos + 2
}

/// Drain every pending entry out the given line, blocking per entry until
/// it is on the wire.
///
/// Refuses with `Busy`, consuming nothing, if the line already has a send
/// in flight; the entries stay in the ring for the next drain. Run from
/// the application context only; under that rule the per-entry send
/// cannot itself hit `Busy`, so an entry is only lost if its transmission
/// fails outright (`NoMemory`).
pub fn drain_to_line<P: LinePort, const RN: usize, const RX: usize>(
    ring: &LogRing<RN>,
    uart: &Uart<P, RX>,
) -> Result<()> {
    if uart.is_sending() {
        return Err(Error::Busy);
    }
    while let Some(entry) = ring.drain() {
        let mut out = [0u8; FORMATTED_LEN];
        let len = format_entry(&entry, &mut out);
        uart.send(TxPayload::Borrowed(&out[..len]), true)?;
    }
    Ok(())
}

/// Push a formatted entry onto a ring. Safe in interrupt context.
#[macro_export]
macro_rules! log_at_level {
    ($ring:expr, $ticks:expr, $level:expr, $($arg:tt)*) => {{
        let mut buf = [0u8; $crate::logging::MAX_MSG_LEN];
        let len = $crate::logging::format_to_buffer(&mut buf, format_args!($($arg)*));
        $ring.push($ticks, $level, &buf[..len]);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($ring:expr, $ticks:expr, $($arg:tt)*) => {
        $crate::log_at_level!($ring, $ticks, $crate::logging::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($ring:expr, $ticks:expr, $($arg:tt)*) => {
        $crate::log_at_level!($ring, $ticks, $crate::logging::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($ring:expr, $ticks:expr, $($arg:tt)*) => {
        $crate::log_at_level!($ring, $ticks, $crate::logging::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($ring:expr, $ticks:expr, $($arg:tt)*) => {
        $crate::log_at_level!($ring, $ticks, $crate::logging::LogLevel::Debug, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_push_and_drain() {
        let ring = LogRing::<8>::new();
        assert!(ring.push(10, LogLevel::Info, b"configured"));
        assert_eq!(ring.pending(), 1);

        let entry = ring.drain().unwrap();
        assert_eq!(entry.ticks, 10);
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(&entry.msg[..entry.len as usize], b"configured");
        assert!(ring.drain().is_none());
    }

    #[test]
    fn test_ring_full_drops_and_counts() {
        let ring = LogRing::<4>::new();
        for i in 0..4 {
            assert!(ring.push(i, LogLevel::Debug, b"x"));
        }
        assert!(!ring.push(99, LogLevel::Debug, b"dropped"));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.pending(), 4);
    }

    #[test]
    fn test_long_message_is_truncated() {
        let ring = LogRing::<4>::new();
        let long = [b'a'; MAX_MSG_LEN + 50];
        assert!(ring.push(0, LogLevel::Warn, &long));
        let entry = ring.drain().unwrap();
        assert_eq!(entry.len as usize, MAX_MSG_LEN);
    }

    #[test]
    fn test_macro_formats_into_ring() {
        let ring = LogRing::<4>::new();
        log_info!(&ring, 42, "line {} up at {} baud", 2, 115200);
        let entry = ring.drain().unwrap();
        assert_eq!(
            &entry.msg[..entry.len as usize],
            b"line 2 up at 115200 baud"
        );
    }

    #[test]
    fn test_format_entry_frames_message() {
        let mut entry = LogEntry::default();
        entry.ticks = 7;
        entry.level = LogLevel::Error;
        entry.len = 4;
        entry.msg[..4].copy_from_slice(b"oops");

        let mut out = [0u8; FORMATTED_LEN];
        let len = format_entry(&entry, &mut out);
        assert_eq!(&out[..len], b"[7] ERROR oops\r\n");
    }

    #[test]
    fn test_drain_refuses_busy_line_without_losing_entries() {
        use crate::line::LineId;
        use crate::port::SimPort;

        let ring = LogRing::<4>::new();
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        log_info!(&ring, 3, "boot");

        // Occupy the line, then try to drain: the refusal must leave the
        // entry in the ring rather than popping it and failing the send.
        uart.send(TxPayload::Borrowed(b"hold"), false).unwrap();
        assert_eq!(drain_to_line(&ring, &uart), Err(Error::Busy));
        assert_eq!(ring.pending(), 1);

        while uart.port().tx_irq_enabled() && uart.is_sending() {
            uart.on_tx_irq();
        }

        // Once the line is idle the held entry still ships.
        let done = core::sync::atomic::AtomicBool::new(false);
        std::thread::scope(|scope| {
            let worker = scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    if uart.port().tx_irq_enabled() {
                        uart.on_tx_irq();
                    }
                    std::thread::yield_now();
                }
            });
            drain_to_line(&ring, &uart).unwrap();
            done.store(true, Ordering::Release);
            worker.join().unwrap();
        });

        assert_eq!(ring.pending(), 0);
        assert_eq!(uart.port().take_wire(), b"hold[3] INFO boot\r\n");
    }

    #[test]
    fn test_drain_to_line_ships_entries() {
        use crate::line::LineId;
        use crate::port::SimPort;

        let ring = LogRing::<4>::new();
        let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
        log_warn!(&ring, 1, "rx overflow");

        // Interrupt stand-in so the blocking send completes.
        let done = core::sync::atomic::AtomicBool::new(false);
        std::thread::scope(|scope| {
            let worker = scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    if uart.port().tx_irq_enabled() {
                        uart.on_tx_irq();
                    }
                    std::thread::yield_now();
                }
            });
            drain_to_line(&ring, &uart).unwrap();
            done.store(true, Ordering::Release);
            worker.join().unwrap();
        });

        assert_eq!(uart.port().take_wire(), b"[1] WARN rx overflow\r\n");
    }
}
