//! `embedded-hal` 1.0 trait implementations
//!
//! These let the channels drive any driver written against embedded-hal:
//! a [`GpioChannel`] is an `OutputPin`/`InputPin`, an [`SpiChannel`] is an
//! `SpiDevice` and an [`I2cChannel`] is an `I2c` bus. Transactions map onto a
//! single `SPI_IOC_MESSAGE` or `I2C_RDWR` request so chip select is held and
//! no stop condition is issued between operations.

use std::os::fd::AsFd;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::i2c::{self, I2c, NoAcknowledgeSource, SevenBitAddress};
use embedded_hal::spi::{self, Operation, SpiDevice};

use super::gpio::{HIGH, LOW};
use super::i2c::message;
use super::sys::{self, I2C_M_RD, I2cMsg};
use super::{Channel, GpioChannel, I2cChannel, SpiChannel};
use crate::error::Error;

impl digital::Error for Error {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl spi::Error for Error {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl i2c::Error for Error {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            Self::AddressSelect { .. } => i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            _ => i2c::ErrorKind::Other,
        }
    }
}

impl digital::ErrorType for GpioChannel {
    type Error = Error;
}

impl OutputPin for GpioChannel {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_byte(LOW)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_byte(HIGH)
    }
}

impl InputPin for GpioChannel {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_byte()? == HIGH)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_byte()? == LOW)
    }
}

/// Owned buffers for one data operation of an SPI transaction
#[derive(Debug, Default)]
struct Segment {
    tx: Vec<u8>,
    rx: Vec<u8>,
    delay_ns: u32,
}

/// Buffers and delays for a whole transaction, in operation order
#[derive(Debug, Default)]
struct Plan {
    lead_delay_ns: u32,
    segments: Vec<Segment>,
}

impl Plan {
    fn new(operations: &[Operation<'_, u8>]) -> Self {
        let mut plan = Self::default();
        for operation in operations {
            let segment = match operation {
                Operation::Read(read) => Segment {
                    tx: vec![0; read.len()],
                    rx: vec![0; read.len()],
                    delay_ns: 0,
                },
                Operation::Write(write) => Segment {
                    tx: write.to_vec(),
                    rx: vec![0; write.len()],
                    delay_ns: 0,
                },
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    let mut tx = vec![0; len];
                    tx[..write.len()].copy_from_slice(write);
                    Segment {
                        tx,
                        rx: vec![0; len],
                        delay_ns: 0,
                    }
                }
                Operation::TransferInPlace(words) => Segment {
                    tx: words.to_vec(),
                    rx: vec![0; words.len()],
                    delay_ns: 0,
                },
                Operation::DelayNs(ns) => {
                    // Delays ride on the preceding transfer
                    match plan.segments.last_mut() {
                        Some(last) => last.delay_ns = last.delay_ns.saturating_add(*ns),
                        None => plan.lead_delay_ns = plan.lead_delay_ns.saturating_add(*ns),
                    }
                    continue;
                }
            };
            plan.segments.push(segment);
        }
        plan
    }

    /// Copy received bytes back into the caller's read buffers
    fn scatter(&self, operations: &mut [Operation<'_, u8>]) {
        let mut segments = self.segments.iter();
        for operation in operations.iter_mut() {
            let rx = match operation {
                Operation::DelayNs(_) => continue,
                _ => match segments.next() {
                    Some(segment) => &segment.rx,
                    None => return,
                },
            };
            match operation {
                Operation::Read(read) => read.copy_from_slice(&rx[..read.len()]),
                Operation::Transfer(read, _) => read.copy_from_slice(&rx[..read.len()]),
                Operation::TransferInPlace(words) => words.copy_from_slice(rx),
                Operation::Write(_) | Operation::DelayNs(_) => {}
            }
        }
    }
}

fn delay_usecs(ns: u32) -> u16 {
    u16::try_from(ns.div_ceil(1_000)).unwrap_or(u16::MAX)
}

impl spi::ErrorType for SpiChannel {
    type Error = Error;
}

impl SpiDevice for SpiChannel {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut plan = Plan::new(operations);
        let mut transfers: Vec<_> = plan
            .segments
            .iter_mut()
            .map(|segment| {
                let mut transfer =
                    self.descriptor(segment.tx.as_ptr(), segment.rx.as_mut_ptr(), segment.tx.len());
                transfer.delay_usecs = delay_usecs(segment.delay_ns);
                transfer
            })
            .collect();

        if plan.lead_delay_ns > 0 {
            thread::sleep(Duration::from_nanos(u64::from(plan.lead_delay_ns)));
        }
        let file = self.handle()?;
        sys::spi_message(file.as_fd(), &mut transfers).map_err(|source| Error::Control {
            request: "SPI_IOC_MESSAGE",
            source,
        })?;

        plan.scatter(operations);
        Ok(())
    }
}

impl i2c::ErrorType for I2cChannel {
    type Error = Error;
}

impl I2c<SevenBitAddress> for I2cChannel {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        // Write payloads are copied so every message owns a mutable buffer
        let mut writes: Vec<Vec<u8>> = operations
            .iter()
            .map(|operation| match operation {
                i2c::Operation::Write(bytes) => bytes.to_vec(),
                i2c::Operation::Read(_) => Vec::new(),
            })
            .collect();

        let address = u16::from(address);
        let mut msgs: Vec<I2cMsg> = operations
            .iter_mut()
            .zip(writes.iter_mut())
            .map(|(operation, write)| match operation {
                i2c::Operation::Read(read) => message(address, I2C_M_RD, read),
                i2c::Operation::Write(_) => message(address, 0, write),
            })
            .collect::<Result<_, _>>()?;
        if msgs.is_empty() {
            return Ok(());
        }

        let file = self.handle()?;
        sys::i2c_rdwr(file.as_fd(), &mut msgs).map_err(|source| Error::Control {
            request: "I2C_RDWR",
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_gpio_pin_traits_drive_value_node() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("gpio21");
        fs::create_dir(&base).unwrap();
        fs::write(base.join("direction"), "in").unwrap();
        fs::write(base.join("value"), "0").unwrap();

        let mut pin = GpioChannel::open(root.path(), 21, 0).unwrap();
        pin.set_high().unwrap();
        assert!(pin.is_high().unwrap());
        pin.set_low().unwrap();
        assert!(pin.is_low().unwrap());
    }

    #[test]
    fn test_i2c_transaction_on_plain_file_is_control_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("i2c-2"), b"").unwrap();
        let mut bus = I2cChannel::open(root.path(), 2, 0x48).unwrap();

        let mut read = [0u8; 2];
        let result = bus.write_read(0x48, &[0x00], &mut read);
        assert!(matches!(
            result,
            Err(Error::Control {
                request: "I2C_RDWR",
                ..
            })
        ));
    }

    #[test]
    fn test_i2c_transaction_refuses_oversized_write() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("i2c-3"), b"").unwrap();
        let mut bus = I2cChannel::open(root.path(), 3, 0x48).unwrap();

        let payload = vec![0u8; 70_000];
        assert!(matches!(
            bus.write(0x48, &payload),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn test_address_select_maps_to_address_nack() {
        let err = Error::AddressSelect {
            address: 0x50,
            source: std::io::Error::from_raw_os_error(libc::ENXIO),
        };
        assert_eq!(
            i2c::Error::kind(&err),
            i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(spi::Error::kind(&err), spi::ErrorKind::Other);
    }

    #[test]
    fn test_spi_plan_pads_transfers_and_attaches_delays() {
        let mut read = [0u8; 3];
        let mut in_place = [7u8, 8];
        let mut operations = [
            Operation::DelayNs(500),
            Operation::Write(&[0xA0, 0xA1]),
            Operation::DelayNs(1_500),
            Operation::Transfer(&mut read, &[0x01]),
            Operation::TransferInPlace(&mut in_place),
        ];

        let mut plan = Plan::new(&operations);
        assert_eq!(plan.lead_delay_ns, 500);
        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.segments[0].tx, [0xA0, 0xA1]);
        assert_eq!(delay_usecs(plan.segments[0].delay_ns), 2);
        assert_eq!(plan.segments[1].tx, [0x01, 0x00, 0x00]);
        assert_eq!(plan.segments[2].tx, [7, 8]);

        // Pretend the device echoed inverted bytes
        for segment in &mut plan.segments {
            segment.rx = segment.tx.iter().map(|b| !b).collect();
        }
        plan.scatter(&mut operations);
        assert_eq!(read, [0xFE, 0xFF, 0xFF]);
        assert_eq!(in_place, [0xF8, 0xF7]);
    }
}
