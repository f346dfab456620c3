//! STM32F407 U(S)ART binding.
//!
//! All six U(S)ARTs on this part share one register layout (SR, DR, BRR,
//! CR1, CR2, CR3, GTPR at the same offsets), so every port is driven
//! through the `usart1` register block; the constructors consume the PAC
//! singleton for their peripheral, keeping exclusive ownership of the
//! registers in the type system.
//!
//! The interrupt service routines stay with the application, which owns
//! the static line values:
//!
//! ```ignore
//! #[interrupt]
//! fn USART2() {
//!     let usart2 = unsafe { &*pac::USART2::ptr() };
//!     if usart2.sr.read().rxne().bit_is_set() {
//!         UART2.on_rx_irq(usart2.dr.read().bits() as u8);
//!     }
//!     if usart2.sr.read().txe().bit_is_set() {
//!         UART2.on_tx_irq();
//!     }
//! }
//! ```

use stm32f4::stm32f407 as pac;

use crate::line::{cr1, LineId, RegisterImage};
use crate::port::LinePort;

/// One hardware U(S)ART, driven at the register level.
pub struct UsartPort {
    regs: *const pac::usart1::RegisterBlock,
    irq: pac::Interrupt,
}

// SAFETY: the pointer targets memory-mapped registers that are valid for
// the life of the system; every access is a single volatile word
// operation, safe from any context.
unsafe impl Send for UsartPort {}
unsafe impl Sync for UsartPort {}

macro_rules! usart_ports {
    ($($fn_name:ident, $id:ident, $peripheral:ident, $irq:ident;)+) => {
        impl UsartPort {
            $(
                /// Bind this port to its peripheral, consuming the PAC
                /// singleton so nothing else can touch the registers.
                pub fn $fn_name(peripheral: pac::$peripheral) -> (LineId, Self) {
                    let _ = peripheral;
                    (
                        LineId::$id,
                        Self {
                            regs: pac::$peripheral::ptr() as *const pac::usart1::RegisterBlock,
                            irq: pac::Interrupt::$irq,
                        },
                    )
                }
            )+
        }
    };
}

usart_ports! {
    usart1, Usart1, USART1, USART1;
    usart2, Usart2, USART2, USART2;
    usart3, Usart3, USART3, USART3;
    uart4, Uart4, UART4, UART4;
    uart5, Uart5, UART5, UART5;
    usart6, Usart6, USART6, USART6;
}

impl UsartPort {
    #[inline]
    fn regs(&self) -> &pac::usart1::RegisterBlock {
        // SAFETY: see the Send/Sync note; MMIO valid for 'static.
        unsafe { &*self.regs }
    }

    #[inline]
    fn modify_cr1(&self, set: u32, clear: u32) {
        let regs = self.regs();
        regs.cr1
            .modify(|r, w| unsafe { w.bits((r.bits() & !clear) | set) });
    }
}

impl LinePort for UsartPort {
    fn apply(&self, image: &RegisterImage) {
        let regs = self.regs();
        // Wholesale overwrite: nothing from a previous configuration
        // survives, including the auxiliary control register.
        regs.brr.write(|w| unsafe { w.bits(image.divisor) });
        regs.cr3.write(|w| unsafe { w.bits(0) });
        regs.cr2.write(|w| unsafe { w.bits(image.control2) });
        regs.cr1.write(|w| unsafe { w.bits(image.control1) });
    }

    fn set_enabled(&self, on: bool) {
        if on {
            self.modify_cr1(cr1::UE, 0);
        } else {
            self.modify_cr1(0, cr1::UE);
        }
    }

    fn set_tx_enabled(&self, on: bool) {
        if on {
            self.modify_cr1(cr1::TE, 0);
        } else {
            self.modify_cr1(0, cr1::TE);
        }
    }

    fn set_rx_enabled(&self, on: bool) {
        if on {
            self.modify_cr1(cr1::RE, 0);
        } else {
            self.modify_cr1(0, cr1::RE);
        }
    }

    fn set_tx_irq(&self, on: bool) {
        // Both the register-empty and transmission-complete sources, as
        // one toggle.
        if on {
            self.modify_cr1(cr1::TXEIE | cr1::TCIE, 0);
        } else {
            self.modify_cr1(0, cr1::TXEIE | cr1::TCIE);
        }
    }

    fn set_rx_irq(&self, on: bool) {
        if on {
            self.modify_cr1(cr1::RXNEIE, 0);
        } else {
            self.modify_cr1(0, cr1::RXNEIE);
        }
    }

    fn write_data(&self, byte: u8) {
        self.regs().dr.write(|w| unsafe { w.bits(byte as u32) });
    }

    fn pend_tx_irq(&self) {
        cortex_m::peripheral::NVIC::pend(self.irq);
    }

    fn wait_for_event(&self) {
        cortex_m::asm::wfe();
    }
}
