//! spidev channel
//!
//! The node `/dev/spidev<bus>.<cs>` is opened read/write and negotiated in a
//! fixed order: mode, bit order (MSB first), word size, then clock rate. Each
//! setting is written and read back; the values the driver reports are the
//! ones kept on the channel.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use super::sys::{self, SpiIocTransfer};
use super::{Channel, Identity, Medium, read_chunks};
use crate::error::{Error, Result};

/// Clock polarity and phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[repr(u8)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[serde(rename = "0")]
    Mode0 = 0,
    /// CPOL=0, CPHA=1
    #[serde(rename = "1")]
    Mode1 = 1,
    /// CPOL=1, CPHA=0
    #[serde(rename = "2")]
    Mode2 = 2,
    /// CPOL=1, CPHA=1
    #[default]
    #[serde(rename = "3")]
    Mode3 = 3,
}

impl SpiMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Mode0,
            1 => Self::Mode1,
            2 => Self::Mode2,
            _ => Self::Mode3,
        }
    }
}

/// Settings negotiated when a spidev node is opened
///
/// Defaults are mode 3, 8-bit words and 1 MHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpiSettings {
    /// Clock mode
    pub mode: SpiMode,
    /// Word size
    pub bits_per_word: u8,
    /// Maximum clock rate
    pub max_speed_hz: u32,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            mode: SpiMode::Mode3,
            bits_per_word: 8,
            max_speed_hz: 1_000_000,
        }
    }
}

impl SpiSettings {
    /// Set the clock mode
    #[must_use]
    pub fn mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the word size
    #[must_use]
    pub fn bits_per_word(mut self, bits: u8) -> Self {
        self.bits_per_word = bits;
        self
    }

    /// Set the maximum clock rate
    #[must_use]
    pub fn max_speed_hz(mut self, hz: u32) -> Self {
        self.max_speed_hz = hz;
        self
    }
}

/// A spidev chip select
#[derive(Debug)]
pub struct SpiChannel {
    bus: u32,
    chip_select: u32,
    path: PathBuf,
    file: Option<File>,
    settings: SpiSettings,
}

fn control(request: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |source| Error::Control { request, source }
}

fn negotiate(fd: BorrowedFd<'_>, wanted: &SpiSettings) -> Result<SpiSettings> {
    sys::spi_write_u8(fd, sys::SPI_IOC_WR_MODE, wanted.mode as u8)
        .map_err(control("SPI_IOC_WR_MODE"))?;
    let mode = sys::spi_read_u8(fd, sys::SPI_IOC_RD_MODE).map_err(control("SPI_IOC_RD_MODE"))?;

    sys::spi_write_u8(fd, sys::SPI_IOC_WR_LSB_FIRST, 0)
        .map_err(control("SPI_IOC_WR_LSB_FIRST"))?;
    sys::spi_read_u8(fd, sys::SPI_IOC_RD_LSB_FIRST).map_err(control("SPI_IOC_RD_LSB_FIRST"))?;

    sys::spi_write_u8(fd, sys::SPI_IOC_WR_BITS_PER_WORD, wanted.bits_per_word)
        .map_err(control("SPI_IOC_WR_BITS_PER_WORD"))?;
    let bits_per_word = sys::spi_read_u8(fd, sys::SPI_IOC_RD_BITS_PER_WORD)
        .map_err(control("SPI_IOC_RD_BITS_PER_WORD"))?;

    sys::spi_write_u32(fd, sys::SPI_IOC_WR_MAX_SPEED_HZ, wanted.max_speed_hz)
        .map_err(control("SPI_IOC_WR_MAX_SPEED_HZ"))?;
    let max_speed_hz = sys::spi_read_u32(fd, sys::SPI_IOC_RD_MAX_SPEED_HZ)
        .map_err(control("SPI_IOC_RD_MAX_SPEED_HZ"))?;

    Ok(SpiSettings {
        mode: SpiMode::from_bits(mode),
        bits_per_word,
        max_speed_hz,
    })
}

impl SpiChannel {
    /// Open `<dev_root>/spidev<bus>.<chip_select>` and negotiate `wanted`
    pub fn open(
        dev_root: &Path,
        bus: u32,
        chip_select: u32,
        wanted: &SpiSettings,
    ) -> Result<Self> {
        let path = dev_root.join(format!("spidev{bus}.{chip_select}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::DeviceUnavailable {
                path: path.clone(),
                source,
            })?;

        // The handle is dropped on failure
        let settings = negotiate(file.as_fd(), wanted)?;
        info!(
            "SPI: {} mode {} {}-bit {} Hz",
            path.display(),
            settings.mode as u8,
            settings.bits_per_word,
            settings.max_speed_hz
        );

        Ok(Self {
            bus,
            chip_select,
            path,
            file: Some(file),
            settings,
        })
    }

    /// Settings as reported by the driver
    pub fn settings(&self) -> &SpiSettings {
        &self.settings
    }

    pub(crate) fn handle(&mut self) -> Result<&mut File> {
        let identity = self.identity();
        self.file.as_mut().ok_or(Error::Closed(identity))
    }

    /// Build a transfer descriptor carrying this channel's settings
    pub(crate) fn descriptor(&self, tx: *const u8, rx: *mut u8, len: usize) -> SpiIocTransfer {
        SpiIocTransfer {
            tx_buf: tx as u64,
            rx_buf: rx as u64,
            len: len as u32,
            speed_hz: self.settings.max_speed_hz,
            bits_per_word: self.settings.bits_per_word,
            ..SpiIocTransfer::default()
        }
    }
}

/// Run one full-duplex exchange of `max(output, input)` bytes through `clock`
///
/// `clock` gets a zero-padded copy of `output` and a receive buffer of the
/// same length. Only the first `input.len()` received bytes are kept.
fn exchange<F>(output: &[u8], input: &mut [u8], clock: F) -> Result<usize>
where
    F: FnOnce(&[u8], &mut [u8]) -> Result<()>,
{
    let len = output.len().max(input.len());
    if len == 0 {
        return Ok(0);
    }
    let mut tx = vec![0u8; len];
    tx[..output.len()].copy_from_slice(output);
    let mut rx = vec![0u8; len];

    clock(&tx, &mut rx)?;

    input.copy_from_slice(&rx[..input.len()]);
    Ok(len)
}

impl Channel for SpiChannel {
    fn identity(&self) -> Identity {
        Identity::new(Medium::Spi, self.bus, self.chip_select)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let file = self.handle()?;
        let mut byte = [0u8; 1];
        let n = file.read(&mut byte)?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "spi read",
                expected: 1,
                actual: n,
            });
        }
        Ok(byte[0])
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        let file = self.handle()?;
        let n = file.write(&[value])?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "spi write",
                expected: 1,
                actual: n,
            });
        }
        Ok(())
    }

    /// Reads in chunks until the driver returns a short chunk
    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        let file = self.handle()?;
        Ok(read_chunks(file, buffer)?)
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize> {
        let file = self.handle()?;
        Ok(file.write(buffer)?)
    }

    /// Full duplex: clocks `max(output, input)` bytes under one chip select
    ///
    /// `output` is padded with zeros; received bytes beyond `input` are dropped.
    fn transfer(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        exchange(output, input, |tx, rx| {
            let mut message = [self.descriptor(tx.as_ptr(), rx.as_mut_ptr(), tx.len())];
            let file = self.handle()?;
            sys::spi_message(file.as_fd(), &mut message).map_err(control("SPI_IOC_MESSAGE"))?;
            Ok(())
        })
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("SPI: closed {}", self.path.display());
        }
    }
}
