//! Hardware bindings.
//!
//! Everything the core needs from silicon goes through
//! [`crate::port::LinePort`]; this module provides the real
//! implementations. Only the STM32F407 target this firmware ships on is
//! bound today, behind the `stm32f407` feature so the core stays
//! host-buildable.

#[cfg(feature = "stm32f407")]
pub mod stm32f407;
