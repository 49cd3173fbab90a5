//! Raw kernel requests for i2c-dev, spidev and sysfs polling
//!
//! This is the only module permitted to use `unsafe`. Every function takes a
//! borrowed descriptor, so none of them can outlive the handle they act on.

#![allow(unsafe_code)]

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

// <linux/i2c-dev.h>
const I2C_SLAVE: u64 = 0x0703;
const I2C_RDWR: u64 = 0x0707;
/// Read flag for [`I2cMsg::flags`]
pub(crate) const I2C_M_RD: u16 = 0x0001;

// <linux/spi/spidev.h>, generic _IOC encoding
const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;
const SPI_IOC_MAGIC: u64 = b'k' as u64;

const fn ioc(dir: u64, nr: u64, size: u64) -> u64 {
    (dir << 30) | (size << 16) | (SPI_IOC_MAGIC << 8) | nr
}

pub(crate) const SPI_IOC_WR_MODE: u64 = ioc(IOC_WRITE, 1, 1);
pub(crate) const SPI_IOC_RD_MODE: u64 = ioc(IOC_READ, 1, 1);
pub(crate) const SPI_IOC_WR_LSB_FIRST: u64 = ioc(IOC_WRITE, 2, 1);
pub(crate) const SPI_IOC_RD_LSB_FIRST: u64 = ioc(IOC_READ, 2, 1);
pub(crate) const SPI_IOC_WR_BITS_PER_WORD: u64 = ioc(IOC_WRITE, 3, 1);
pub(crate) const SPI_IOC_RD_BITS_PER_WORD: u64 = ioc(IOC_READ, 3, 1);
pub(crate) const SPI_IOC_WR_MAX_SPEED_HZ: u64 = ioc(IOC_WRITE, 4, 4);
pub(crate) const SPI_IOC_RD_MAX_SPEED_HZ: u64 = ioc(IOC_READ, 4, 4);

const fn spi_ioc_message(count: usize) -> u64 {
    ioc(
        IOC_WRITE,
        0,
        (count * core::mem::size_of::<SpiIocTransfer>()) as u64,
    )
}

/// `struct i2c_msg`
#[repr(C)]
#[derive(Debug)]
pub(crate) struct I2cMsg {
    pub addr: u16,
    pub flags: u16,
    pub len: u16,
    pub buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// `struct spi_ioc_transfer`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SpiIocTransfer {
    pub tx_buf: u64,
    pub rx_buf: u64,
    pub len: u32,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    pub cs_change: u8,
    pub tx_nbits: u8,
    pub rx_nbits: u8,
    pub word_delay_usecs: u8,
    pub pad: u8,
}

const _: () = assert!(core::mem::size_of::<SpiIocTransfer>() == 32);

fn check(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Select the slave address for subsequent plain reads and writes
pub(crate) fn i2c_set_slave(fd: BorrowedFd<'_>, address: u16) -> io::Result<()> {
    // SAFETY: I2C_SLAVE takes the address by value.
    let rc = unsafe {
        libc::ioctl(
            fd.as_raw_fd(),
            I2C_SLAVE as _,
            libc::c_ulong::from(address),
        )
    };
    check(rc).map(drop)
}

/// Submit `msgs` as one combined transaction with repeated starts
///
/// Every message's `buf` must point at `len` valid bytes for the duration
/// of the call; the caller guarantees this by building them from live slices.
pub(crate) fn i2c_rdwr(fd: BorrowedFd<'_>, msgs: &mut [I2cMsg]) -> io::Result<usize> {
    let mut data = I2cRdwrIoctlData {
        msgs: msgs.as_mut_ptr(),
        nmsgs: msgs.len() as u32,
    };
    // SAFETY: `data` points at `msgs`, which outlives the call.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), I2C_RDWR as _, &raw mut data) };
    check(rc).map(|n| n as usize)
}

/// Write a one-byte spidev setting
pub(crate) fn spi_write_u8(fd: BorrowedFd<'_>, request: u64, value: u8) -> io::Result<()> {
    // SAFETY: the request reads one byte through the pointer.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &raw const value) };
    check(rc).map(drop)
}

/// Read back a one-byte spidev setting
pub(crate) fn spi_read_u8(fd: BorrowedFd<'_>, request: u64) -> io::Result<u8> {
    let mut value = 0u8;
    // SAFETY: the request writes one byte through the pointer.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &raw mut value) };
    check(rc).map(|_| value)
}

/// Write a four-byte spidev setting
pub(crate) fn spi_write_u32(fd: BorrowedFd<'_>, request: u64, value: u32) -> io::Result<()> {
    // SAFETY: the request reads four bytes through the pointer.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &raw const value) };
    check(rc).map(drop)
}

/// Read back a four-byte spidev setting
pub(crate) fn spi_read_u32(fd: BorrowedFd<'_>, request: u64) -> io::Result<u32> {
    let mut value = 0u32;
    // SAFETY: the request writes four bytes through the pointer.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, &raw mut value) };
    check(rc).map(|_| value)
}

/// Run `transfers` back to back with chip select held
///
/// Each transfer's `tx_buf`/`rx_buf` must be zero or point at `len` valid
/// bytes for the duration of the call.
pub(crate) fn spi_message(fd: BorrowedFd<'_>, transfers: &mut [SpiIocTransfer]) -> io::Result<usize> {
    if transfers.is_empty() {
        return Ok(0);
    }
    // SAFETY: the array length is encoded in the request number.
    let rc = unsafe {
        libc::ioctl(
            fd.as_raw_fd(),
            spi_ioc_message(transfers.len()) as _,
            transfers.as_mut_ptr(),
        )
    };
    check(rc).map(|n| n as usize)
}

/// Wait for a sysfs priority event on `fd`
///
/// Returns `Ok(false)` on timeout or when interrupted by a signal.
pub(crate) fn wait_priority(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLPRI | libc::POLLERR,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: one valid pollfd.
    let rc = unsafe { libc::poll(&raw mut pollfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::Interrupted {
            Ok(false)
        } else {
            Err(err)
        };
    }
    if pollfd.revents & libc::POLLNVAL != 0 {
        return Err(io::Error::from_raw_os_error(libc::EBADF));
    }
    Ok(rc > 0 && pollfd.revents & (libc::POLLPRI | libc::POLLERR) != 0)
}
