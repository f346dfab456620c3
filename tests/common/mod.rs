//! Shared harness: a thread standing in for the byte-sent interrupt.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use esplink::port::SimPort;
use esplink::uart::Uart;

/// Run `body` while a worker thread plays the interrupt controller:
/// whenever the simulated line has its byte-sent source unmasked, the
/// handler runs. This is what lets `wait = true` sends complete on the
/// host exactly as they do against the NVIC.
pub fn with_tx_isr<R>(uart: &Uart<SimPort>, body: impl FnOnce() -> R) -> R {
    let done = AtomicBool::new(false);
    std::thread::scope(|scope| {
        let worker = scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                if uart.port().tx_irq_enabled() {
                    uart.on_tx_irq();
                }
                std::thread::yield_now();
            }
        });
        let result = body();
        done.store(true, Ordering::Release);
        worker.join().unwrap();
        result
    })
}

/// Drive the handler synchronously until the line goes idle. For tests
/// that start sends with `wait = false` and want full control over when
/// "interrupts" happen.
pub fn pump_until_idle(uart: &Uart<SimPort>) {
    while uart.port().tx_irq_enabled() && uart.is_sending() {
        uart.on_tx_irq();
    }
}
