//! Allocation-failure injection: every fallible allocation in the frame
//! builders and the send path must surface `NoMemory` and leave the line
//! idle with nothing on the wire.
//!
//! A switchable global allocator stands in for a heap under pressure. The
//! phases share one `#[test]` because the failure switch is process-wide
//! and the default harness runs tests in parallel.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, Ordering};

use esplink::line::LineId;
use esplink::modem::{bare_frame, param_frame, Modem, Param, CMD_RESET, CMD_SLEEP};
use esplink::port::SimPort;
use esplink::tx::TxPayload;
use esplink::uart::Uart;
use esplink::Error;

static FAIL: AtomicBool = AtomicBool::new(false);

struct SwitchableAlloc;

unsafe impl GlobalAlloc for SwitchableAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if FAIL.load(Ordering::Acquire) {
            core::ptr::null_mut()
        } else {
            System.alloc(layout)
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOC: SwitchableAlloc = SwitchableAlloc;

/// Run `body` with every allocation failing. The switch is cleared before
/// returning so assertion formatting can allocate again.
fn with_failing_heap<R>(body: impl FnOnce() -> R) -> R {
    FAIL.store(true, Ordering::Release);
    let result = body();
    FAIL.store(false, Ordering::Release);
    result
}

fn pump(uart: &Uart<SimPort>) {
    while uart.port().tx_irq_enabled() && uart.is_sending() {
        uart.on_tx_irq();
    }
}

#[test]
fn test_no_memory_paths_leave_engine_idle() {
    let uart: Uart<SimPort> = Uart::new(LineId::Usart2, SimPort::new());
    let modem = Modem::new(&uart);

    // Builders fail cleanly before any frame bytes exist.
    let bare = with_failing_heap(|| bare_frame(CMD_RESET));
    assert_eq!(bare, Err(Error::NoMemory));
    let with_params = with_failing_heap(|| param_frame(CMD_SLEEP, &[Param::Char(b'0')]));
    assert_eq!(with_params, Err(Error::NoMemory));

    // A command whose frame cannot be built transmits nothing and never
    // touches the engine.
    let command = with_failing_heap(|| modem.reset());
    assert_eq!(command, Err(Error::NoMemory));
    assert!(!uart.is_sending());
    assert_eq!(uart.port().wire_len(), 0);

    // A borrowed send that cannot take its private copy reports failure
    // with the caller's storage untouched and the line still idle.
    let data = b"AT+GMR\r\n".to_vec();
    let send = with_failing_heap(|| uart.send(TxPayload::Borrowed(&data), false));
    assert_eq!(send, Err(Error::NoMemory));
    assert_eq!(data, b"AT+GMR\r\n");
    assert!(!uart.is_sending());
    assert_eq!(uart.port().wire_len(), 0);

    // An owned payload needs no allocation on the send path, so it goes
    // through even under pressure.
    let frame = bare_frame(CMD_RESET).unwrap();
    let owned = with_failing_heap(|| uart.send(TxPayload::Owned(frame), false));
    assert_eq!(owned, Ok(()));
    pump(&uart);
    assert_eq!(uart.port().take_wire(), b"AT+RST\r\n");

    // Once the heap recovers the rejected paths work again.
    uart.send(TxPayload::Borrowed(&data), false).unwrap();
    pump(&uart);
    assert_eq!(uart.port().take_wire(), b"AT+GMR\r\n");
}
