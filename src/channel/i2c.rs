//! i2c-dev channel
//!
//! One [`I2cChannel`] is a bus node (`/dev/i2c-N`) paired with a slave
//! address. The address is selected before every operation because several
//! channels may share the same bus through separate handles.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use log::debug;

use super::sys::{self, I2C_M_RD, I2cMsg};
use super::{Channel, Identity, Medium, read_chunks};
use crate::error::{Error, Result};

/// An I2C slave on one bus
#[derive(Debug)]
pub struct I2cChannel {
    bus: u32,
    address: u16,
    path: PathBuf,
    file: Option<File>,
}

impl I2cChannel {
    /// Open `<dev_root>/i2c-<bus>` for the slave at `address`
    pub fn open(dev_root: &Path, bus: u32, address: u32) -> Result<Self> {
        let path = dev_root.join(format!("i2c-{bus}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::DeviceUnavailable {
                path: path.clone(),
                source,
            })?;
        debug!("I2C: opened {} for address {address:#04x}", path.display());
        Ok(Self {
            bus,
            // 7- and 10-bit addresses both fit
            address: address as u16,
            path,
            file: Some(file),
        })
    }

    /// Slave address
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn handle(&mut self) -> Result<&mut File> {
        let identity = self.identity();
        self.file.as_mut().ok_or(Error::Closed(identity))
    }

    /// Borrow the bus handle with the slave address selected
    fn select(&mut self) -> Result<&mut File> {
        let address = self.address;
        let file = self.handle()?;
        sys::i2c_set_slave(file.as_fd(), address)
            .map_err(|source| Error::AddressSelect { address, source })?;
        Ok(file)
    }
}

/// One `i2c_msg` over `buf`
///
/// The kernel length field is 16 bits, so longer buffers are refused rather
/// than truncated.
pub(crate) fn message(address: u16, flags: u16, buf: &mut [u8]) -> Result<I2cMsg> {
    let len = u16::try_from(buf.len()).map_err(|_| Error::Unsupported {
        medium: Medium::I2c,
        operation: "messages longer than 65535 bytes",
    })?;
    Ok(I2cMsg {
        addr: address,
        flags,
        len,
        buf: buf.as_mut_ptr(),
    })
}

/// A write message followed by a read message, skipping either when empty
fn write_read_messages(address: u16, write: &mut [u8], read: &mut [u8]) -> Result<Vec<I2cMsg>> {
    let mut msgs = Vec::with_capacity(2);
    if !write.is_empty() {
        msgs.push(message(address, 0, write)?);
    }
    if !read.is_empty() {
        msgs.push(message(address, I2C_M_RD, read)?);
    }
    Ok(msgs)
}

impl Channel for I2cChannel {
    fn identity(&self) -> Identity {
        Identity::new(Medium::I2c, self.bus, u32::from(self.address))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let file = self.select()?;
        let mut byte = [0u8; 1];
        let n = file.read(&mut byte)?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "i2c read",
                expected: 1,
                actual: n,
            });
        }
        Ok(byte[0])
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        let file = self.select()?;
        let n = file.write(&[value])?;
        if n != 1 {
            return Err(Error::TransferIncomplete {
                operation: "i2c write",
                expected: 1,
                actual: n,
            });
        }
        Ok(())
    }

    /// Reads in chunks until the slave returns a short chunk
    fn read_buffer(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        let file = self.select()?;
        Ok(read_chunks(file, buffer)?)
    }

    fn write_buffer(&mut self, buffer: &[u8]) -> Result<usize> {
        let file = self.select()?;
        Ok(file.write(buffer)?)
    }

    /// Write then read under one combined request, without a stop in between
    fn transfer(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        let address = self.address;
        let mut write = output.to_vec();
        let mut msgs = write_read_messages(address, &mut write, input)?;
        if msgs.is_empty() {
            return Ok(0);
        }

        let file = self.select()?;
        sys::i2c_rdwr(file.as_fd(), &mut msgs).map_err(|source| Error::Control {
            request: "I2C_RDWR",
            source,
        })?;
        Ok(output.len() + input.len())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("I2C: closed {}", self.path.display());
        }
    }
}
