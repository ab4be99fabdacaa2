//! The serial link on USART3, routed to the ST-LINK virtual COM port.
use embedded_hal_02::serial::{Read, Write};

use super::hal::{self, serial};

#[derive(Debug)]
pub struct Error;

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

/// The link transmitter. Writes block until the bytes are handed to the peripheral.
pub struct SerialTx {
    tx: serial::Tx<hal::stm32::USART3>,
}

impl SerialTx {
    pub fn new(tx: serial::Tx<hal::stm32::USART3>) -> Self {
        Self { tx }
    }
}

impl embedded_io::ErrorType for SerialTx {
    type Error = Error;
}

impl embedded_io::Write for SerialTx {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            nb::block!(self.tx.write(byte)).map_err(|_| Error)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        nb::block!(self.tx.flush()).map_err(|_| Error)
    }
}

/// The command receiver. Read from the receive interrupt.
pub struct SerialRx {
    rx: serial::Rx<hal::stm32::USART3>,
}

impl SerialRx {
    pub fn new(rx: serial::Rx<hal::stm32::USART3>) -> Self {
        Self { rx }
    }

    /// Take the next received byte without waiting.
    ///
    /// # Returns
    /// `Ok(None)` once the receive register is empty.
    pub fn read(&mut self) -> Result<Option<u8>, serial::Error> {
        match self.rx.read() {
            Ok(byte) => Ok(Some(byte)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(error)) => Err(error),
        }
    }
}
