//! Bus clock facts consumed by line configuration.
//!
//! The clock tree itself is configured elsewhere; this module only carries
//! the "clocks configured, frequencies known" outcome that baud divisor
//! computation needs. Queried once per `configure` call, never cached by
//! the lines.

use crate::line::LineId;

/// Frequencies of the two peripheral buses the U(S)ARTs hang off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clocks {
    /// Slow peripheral bus (USART2/3, UART4/5).
    pub apb1_hz: u32,
    /// Fast peripheral bus (USART1, USART6).
    pub apb2_hz: u32,
}

impl Clocks {
    /// Derive bus frequencies from the system clock using the prescaler
    /// scheme this firmware runs: above 84 MHz the buses run at sysclk/4
    /// and sysclk/2, below that at sysclk/2 and sysclk/1.
    pub const fn from_sysclk(sysclk_hz: u32) -> Self {
        if sysclk_hz > 84_000_000 {
            Self {
                apb1_hz: sysclk_hz / 4,
                apb2_hz: sysclk_hz / 2,
            }
        } else {
            Self {
                apb1_hz: sysclk_hz / 2,
                apb2_hz: sysclk_hz,
            }
        }
    }

    /// Kernel clock feeding the given line.
    pub const fn line_clock_hz(&self, id: LineId) -> u32 {
        if id.on_fast_bus() {
            self.apb2_hz
        } else {
            self.apb1_hz
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescalers_above_84_mhz() {
        let clocks = Clocks::from_sysclk(168_000_000);
        assert_eq!(clocks.apb1_hz, 42_000_000);
        assert_eq!(clocks.apb2_hz, 84_000_000);
    }

    #[test]
    fn test_prescalers_at_or_below_84_mhz() {
        let clocks = Clocks::from_sysclk(84_000_000);
        assert_eq!(clocks.apb1_hz, 42_000_000);
        assert_eq!(clocks.apb2_hz, 84_000_000);
    }

    #[test]
    fn test_line_clock_selects_bus() {
        let clocks = Clocks {
            apb1_hz: 42_000_000,
            apb2_hz: 84_000_000,
        };
        assert_eq!(clocks.line_clock_hz(LineId::Usart1), 84_000_000);
        assert_eq!(clocks.line_clock_hz(LineId::Usart6), 84_000_000);
        assert_eq!(clocks.line_clock_hz(LineId::Usart2), 42_000_000);
        assert_eq!(clocks.line_clock_hz(LineId::Uart5), 42_000_000);
    }
}
