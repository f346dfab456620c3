//! Line identity and configuration: framing parameters and the register
//! values derived from them.
//!
//! Configuration is computed as a whole-register [`RegisterImage`] and
//! applied by overwriting the peripheral registers completely, so no bits
//! from a previous configuration ever survive a reconfigure.

use crate::error::{Error, Result};

/// Control register 1 bit positions, shared by every U(S)ART on this part.
///
/// The hardware binding writes these as whole-register values, never
/// read-modify-write against unknown state.
pub mod cr1 {
    /// Receiver enable.
    pub const RE: u32 = 1 << 2;
    /// Transmitter enable.
    pub const TE: u32 = 1 << 3;
    /// Byte-received interrupt enable.
    pub const RXNEIE: u32 = 1 << 5;
    /// Transmission-complete interrupt enable.
    pub const TCIE: u32 = 1 << 6;
    /// Transmit-register-empty interrupt enable.
    pub const TXEIE: u32 = 1 << 7;
    /// Parity selection: odd when set.
    pub const PS: u32 = 1 << 9;
    /// Parity control enable.
    pub const PCE: u32 = 1 << 10;
    /// Word length: 9 bits when set.
    pub const M: u32 = 1 << 12;
    /// Peripheral enable.
    pub const UE: u32 = 1 << 13;
    /// Oversampling by 8 when set, by 16 when clear.
    pub const OVER8: u32 = 1 << 15;
}

/// Control register 2 bit positions.
pub mod cr2 {
    pub const STOP_SHIFT: u32 = 12;
    pub const STOP_MASK: u32 = 0b11 << STOP_SHIFT;
}

/// One logical serial line. One value per physical peripheral, fixed for
/// the life of the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineId {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl LineId {
    /// Number of lines this part has; sizes [`crate::uart::LineTable`].
    pub const COUNT: usize = 6;

    /// Stable index for table storage.
    pub const fn index(self) -> usize {
        match self {
            Self::Usart1 => 0,
            Self::Usart2 => 1,
            Self::Usart3 => 2,
            Self::Uart4 => 3,
            Self::Uart5 => 4,
            Self::Usart6 => 5,
        }
    }

    /// Whether this line is clocked from the fast peripheral bus.
    pub const fn on_fast_bus(self) -> bool {
        matches!(self, Self::Usart1 | Self::Usart6)
    }
}

/// Data word length per character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordLength {
    Eight,
    Nine,
}

/// Parity mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Stop bit count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    One,
    Half,
    Two,
    OneAndHalf,
}

/// Ratio between the sampling clock and the baud clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Oversampling {
    By16,
    By8,
}

impl Oversampling {
    pub const fn factor(self) -> u32 {
        match self {
            Self::By16 => 16,
            Self::By8 => 8,
        }
    }
}

/// Framing parameters of a serial line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framing {
    pub word_length: WordLength,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub oversampling: Oversampling,
}

impl Framing {
    /// 8 data bits, no parity, 1 stop bit, oversampling by 16.
    pub const fn default_8n1() -> Self {
        Self {
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            oversampling: Oversampling::By16,
        }
    }

    fn cr1_bits(&self) -> u32 {
        let mut bits = 0;
        if matches!(self.word_length, WordLength::Nine) {
            bits |= cr1::M;
        }
        match self.parity {
            Parity::None => {}
            Parity::Even => bits |= cr1::PCE,
            Parity::Odd => bits |= cr1::PCE | cr1::PS,
        }
        if matches!(self.oversampling, Oversampling::By8) {
            bits |= cr1::OVER8;
        }
        bits
    }

    fn cr2_bits(&self) -> u32 {
        let stop = match self.stop_bits {
            StopBits::One => 0b00,
            StopBits::Half => 0b01,
            StopBits::Two => 0b10,
            StopBits::OneAndHalf => 0b11,
        };
        stop << cr2::STOP_SHIFT
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self::default_8n1()
    }
}

/// Complete register-level configuration of a line. Applying an image
/// replaces the previous configuration wholesale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterImage {
    pub control1: u32,
    pub control2: u32,
    pub divisor: u32,
}

/// Compute the baud rate divisor word: 12-bit mantissa in the high bits,
/// 4-bit fraction in the low nibble.
///
/// The fraction is sixteenths of the remainder, rounded to nearest with
/// ties away from zero, regardless of the oversampling mode; a fraction
/// that rounds to 16 carries into the mantissa.
///
/// A baud rate of zero, or a mantissa that is zero or does not fit its
/// 12 bits, is rejected with `WrongArgument`.
pub fn baud_divisor(clock_hz: u32, oversampling: Oversampling, baud: u32) -> Result<u32> {
    if baud == 0 || clock_hz == 0 {
        return Err(Error::WrongArgument);
    }

    let denom = oversampling.factor() as u64 * baud as u64;
    let clock = clock_hz as u64;

    let mut mantissa = clock / denom;
    let remainder = clock % denom;
    let mut fraction = (16 * remainder + denom / 2) / denom;
    if fraction == 16 {
        mantissa += 1;
        fraction = 0;
    }

    if mantissa == 0 || mantissa > 0xFFF {
        return Err(Error::WrongArgument);
    }

    Ok(((mantissa as u32) << 4) | fraction as u32)
}

/// Derive the full register image for a line: framing bits, receive
/// interrupt enable, and the baud divisor for the given kernel clock.
pub fn register_image(
    framing: &Framing,
    clock_hz: u32,
    baud: u32,
    receiver_enabled: bool,
) -> Result<RegisterImage> {
    let mut control1 = framing.cr1_bits();
    if receiver_enabled {
        control1 |= cr1::RXNEIE;
    }
    let divisor = baud_divisor(clock_hz, framing.oversampling, baud)?;

    Ok(RegisterImage {
        control1,
        control2: framing.cr2_bits(),
        divisor,
    })
}
