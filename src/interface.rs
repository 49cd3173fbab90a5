//! Register interface abstraction
//!
//! This module provides the [`RegisterInterface`] trait and the [`Interface`]
//! struct for talking to a register-addressed display controller through
//! channels.
//!
//! ## Wiring
//!
//! The controller needs:
//! - a data channel (SPI, I2C or a GPIO line) carrying one byte at a time
//! - **RS**: register select GPIO (low = register address, high = value)
//! - **RESET** (optional): active-low reset GPIO
//!
//! A register write is two independent single-byte writes on the data
//! channel bracketing a level change on RS:
//!
//! ```text
//! RS ──┐      ┌───────
//!      └──────┘
//! data   [reg]   [value]
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use boardlink::{ChannelRegistry, Interface, Medium, RegisterInterface, register};
//!
//! # fn main() -> boardlink::Result<()> {
//! let registry = ChannelRegistry::new();
//! let data = registry.resolve(Medium::Spi, 0, 0)?;
//! let rs = registry.resolve(Medium::Gpio, 24, 0)?;
//! let mut interface = Interface::new(data, rs, None);
//!
//! interface.write_register(register::DISP_ON_OFF, 0x01)?;
//! # Ok(())
//! # }
//! ```

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::channel::Channel;
use crate::channel::gpio::{HIGH, LOW};
use crate::error::Result;

/// How long RESET is held low by [`RegisterInterface::hardware_reset`]
pub const RESET_PULSE_MS: u32 = 2;

/// Trait for the byte-level link to a register-addressed controller
///
/// This trait abstracts over how bytes reach the controller, allowing
/// protocol drivers to be tested against recording mocks.
pub trait RegisterInterface {
    /// Send a register address: RS low, address byte, RS high
    ///
    /// Everything written with [`write_data`](Self::write_data) afterwards is
    /// a value for that register.
    fn write_command(&mut self, register: u8) -> Result<()>;

    /// Send value bytes, one channel write per byte
    fn write_data(&mut self, data: &[u8]) -> Result<()>;

    /// Write one register
    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.write_command(register)?;
        self.write_data(&[value])
    }

    /// Whether a RESET line is wired
    fn has_reset(&self) -> bool;

    /// Drive RESET high (inactive), if wired
    fn release_reset(&mut self) -> Result<()>;

    /// Pulse RESET low for [`RESET_PULSE_MS`], if wired
    ///
    /// Returns `false` without touching anything when there is no RESET line.
    fn hardware_reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool>;
}

/// Channel-backed implementation of [`RegisterInterface`]
///
/// ## Type Parameters
///
/// * `D` - Data channel
/// * `P` - GPIO channel type for RS and RESET
#[derive(Debug)]
pub struct Interface<D, P> {
    /// Data channel
    data: D,
    /// Register select (low = address, high = value)
    rs: P,
    /// Reset line (active low)
    reset: Option<P>,
}

impl<D: Channel, P: Channel> Interface<D, P> {
    /// Create a new Interface
    pub fn new(data: D, rs: P, reset: Option<P>) -> Self {
        Self { data, rs, reset }
    }

    /// Release the channels
    pub fn release(self) -> (D, P, Option<P>) {
        (self.data, self.rs, self.reset)
    }
}

impl<D: Channel, P: Channel> RegisterInterface for Interface<D, P> {
    fn write_command(&mut self, register: u8) -> Result<()> {
        trace!("register {register:#04x}");
        self.rs.write_byte(LOW)?;
        self.data.write_byte(register)?;
        self.rs.write_byte(HIGH)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        data.iter().try_for_each(|&byte| self.data.write_byte(byte))
    }

    fn has_reset(&self) -> bool {
        self.reset.is_some()
    }

    fn release_reset(&mut self) -> Result<()> {
        match &mut self.reset {
            Some(reset) => reset.write_byte(HIGH),
            None => Ok(()),
        }
    }

    fn hardware_reset<T: DelayNs>(&mut self, delay: &mut T) -> Result<bool> {
        let Some(reset) = &mut self.reset else {
            return Ok(false);
        };
        reset.write_byte(LOW)?;
        delay.delay_ms(RESET_PULSE_MS);
        reset.write_byte(HIGH)?;
        Ok(true)
    }
}

/// [`DelayNs`] backed by `std::thread::sleep`
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
