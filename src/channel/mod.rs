//! Uniform byte channel over GPIO, I2C and SPI
//!
//! A [`Channel`] is one physical medium instance: a sysfs GPIO pin, an I2C
//! bus plus slave address, or a spidev bus plus chip select. All three expose
//! the same read/write/transfer contract so that protocol drivers can be
//! written once and wired to whatever the board provides.
//!
//! ## Identity
//!
//! Every channel is named by an [`Identity`]: `(medium, instance, device)`.
//!
//! | Medium | instance | device |
//! |--------|----------|--------|
//! | GPIO   | pin number | bank (unused) |
//! | I2C    | bus number (`/dev/i2c-N`) | slave address |
//! | SPI    | bus number | chip select (`/dev/spidevB.C`) |
//!
//! The [`ChannelRegistry`](crate::ChannelRegistry) guarantees that at most
//! one live channel exists per identity.

use core::fmt;
use core::str::FromStr;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};
use crate::registry::DevicePaths;

pub mod gpio;
mod hal;
pub mod i2c;
pub mod monitor;
pub mod spi;
mod sys;

pub use gpio::{Direction, Edge, GpioChannel};
pub use i2c::I2cChannel;
pub use monitor::{DEBOUNCE_WINDOW, Debouncer};
pub use spi::{SpiChannel, SpiMode, SpiSettings};

/// Largest single read issued by buffer reads on I2C and SPI
pub const MAX_CHUNK: usize = 256;

/// Read `MAX_CHUNK`-sized chunks into `buffer` until one comes back short
///
/// Returns the number of bytes appended. A source holding an exact multiple
/// of `MAX_CHUNK` ends on the zero-length read that follows.
pub(crate) fn read_chunks<R: Read>(source: &mut R, buffer: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut chunk = [0u8; MAX_CHUNK];
    let mut total = 0;
    loop {
        let n = source.read(&mut chunk)?;
        buffer.extend_from_slice(&chunk[..n]);
        total += n;
        if n < MAX_CHUNK {
            return Ok(total);
        }
    }
}

/// Physical transport kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    /// sysfs GPIO pin
    Gpio,
    /// i2c-dev bus
    I2c,
    /// spidev bus
    Spi,
}

impl Medium {
    /// Tag used in configuration documents
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpio => "gpio",
            Self::I2c => "i2c",
            Self::Spi => "spi",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Medium {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpio" => Ok(Self::Gpio),
            "i2c" => Ok(Self::I2c),
            "spi" => Ok(Self::Spi),
            other => Err(ConfigError::UnknownMedium(other.to_owned())),
        }
    }
}

/// The `(medium, instance, device)` tuple naming one channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Transport kind
    pub medium: Medium,
    /// Pin or bus number
    pub instance: u32,
    /// Bank, slave address or chip select
    pub device: u32,
}

impl Identity {
    /// Create a new identity
    pub fn new(medium: Medium, instance: u32, device: u32) -> Self {
        Self {
            medium,
            instance,
            device,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.medium, self.instance, self.device)
    }
}

/// Byte-oriented read/write contract shared by every medium
///
/// Implementations own their OS handles exclusively and release them in
/// [`close`](Channel::close), which must be safe to call more than once.
pub trait Channel {
    /// Identity this channel was opened with
    fn identity(&self) -> Identity;

    /// Read a single byte
    fn read_byte(&mut self) -> Result<u8>;

    /// Write a single byte
    fn write_byte(&mut self, value: u8) -> Result<()>;

    /// Read whatever the device has available, appending to `buffer`
    ///
    /// Returns the number of bytes appended.
    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize>;

    /// Write `buffer`, returning the number of bytes accepted
    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize>;

    /// Write `output`, then fill `input`
    ///
    /// The default issues a buffer write followed by one byte read per slot
    /// of `input`. Mediums with a combined or full-duplex request override it.
    /// Returns the total number of bytes moved in both directions.
    fn transfer(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        let written = self.write_buffer(output)?;
        if written == 0 {
            return Ok(0);
        }
        for slot in input.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(written + input.len())
    }

    /// Whether this channel was opened for `instance`/`device`
    fn is_channel(&self, instance: u32, device: u32) -> bool {
        let identity = self.identity();
        identity.instance == instance && identity.device == device
    }

    /// Release OS resources; later calls are no-ops
    fn close(&mut self);
}

/// Closed set of channel implementations
#[derive(Debug)]
pub enum AnyChannel {
    /// sysfs GPIO pin
    Gpio(GpioChannel),
    /// i2c-dev bus + address
    I2c(I2cChannel),
    /// spidev bus + chip select
    Spi(SpiChannel),
}

/// A channel shared between the registry and its owners
pub type SharedChannel = Arc<Mutex<AnyChannel>>;

impl AnyChannel {
    /// Open a channel of the given medium
    ///
    /// Nothing is returned unless the device was fully set up; a failed open
    /// releases whatever it had acquired.
    pub fn open(
        paths: &DevicePaths,
        spi: &SpiSettings,
        medium: Medium,
        instance: u32,
        device: u32,
    ) -> Result<Self> {
        Ok(match medium {
            Medium::Gpio => Self::Gpio(GpioChannel::open(&paths.gpio_root, instance, device)?),
            Medium::I2c => Self::I2c(I2cChannel::open(&paths.dev_root, instance, device)?),
            Medium::Spi => Self::Spi(SpiChannel::open(&paths.dev_root, instance, device, spi)?),
        })
    }

    /// Medium of the wrapped channel
    pub fn medium(&self) -> Medium {
        match self {
            Self::Gpio(_) => Medium::Gpio,
            Self::I2c(_) => Medium::I2c,
            Self::Spi(_) => Medium::Spi,
        }
    }

    /// Borrow the GPIO channel, if this is one
    pub fn as_gpio_mut(&mut self) -> Option<&mut GpioChannel> {
        match self {
            Self::Gpio(gpio) => Some(gpio),
            _ => None,
        }
    }

    fn inner(&mut self) -> &mut dyn Channel {
        match self {
            Self::Gpio(c) => c,
            Self::I2c(c) => c,
            Self::Spi(c) => c,
        }
    }
}

impl Channel for AnyChannel {
    fn identity(&self) -> Identity {
        match self {
            Self::Gpio(c) => c.identity(),
            Self::I2c(c) => c.identity(),
            Self::Spi(c) => c.identity(),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.inner().read_byte()
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.inner().write_byte(value)
    }

    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        self.inner().read_buffer(buffer)
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize> {
        self.inner().write_buffer(buffer)
    }

    fn transfer(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        self.inner().transfer(output, input)
    }

    fn close(&mut self) {
        self.inner().close();
    }
}

fn lock<C: ?Sized>(shared: &Mutex<C>) -> Result<MutexGuard<'_, C>> {
    shared.lock().map_err(|_| Error::Poisoned)
}

/// Shared channels forward to the wrapped channel under its lock
impl<C: Channel + ?Sized> Channel for Arc<Mutex<C>> {
    fn identity(&self) -> Identity {
        // Identity is fixed at open, so a poisoned guard is still accurate.
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .identity()
    }

    fn read_byte(&mut self) -> Result<u8> {
        lock(self)?.read_byte()
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        lock(self)?.write_byte(value)
    }

    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        lock(self)?.read_buffer(buffer)
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize> {
        lock(self)?.write_buffer(buffer)
    }

    fn transfer(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        lock(self)?.transfer(output, input)
    }

    fn close(&mut self) {
        if let Ok(mut channel) = lock(self) {
            channel.close();
        }
    }
}
