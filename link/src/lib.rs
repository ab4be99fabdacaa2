//! Acquisition serial link protocol
//!
//! # Design
//! The device and the host share a single byte-oriented serial link. The host drives the device
//! with single-character commands, the device answers configuration requests with a text line and
//! then streams sample frames for as long as acquisition is active.
//!
//! ## Host to device
//! * **Reset** `R`: stop acquisition, accepted at any time.
//! * **Configure** `T` followed by exactly 14 ASCII bytes: 10 decimal digits of epoch seconds, an
//!   `F`, and 3 zero-padded decimal digits of sampling frequency in Hz. E.g. `T1234567890F100`.
//!
//! ## Device to host
//! * **Acknowledgment**: `<epoch> <frequency> <output_size>\n`, sent once per accepted
//!   configuration. `output_size` is the number of samples in every following frame.
//! * **Rejection**: `E <code>\n`, sent when a configuration is refused. See [Rejection].
//! * **Frame**: the 4-byte header `FF FF FF FF`, then `output_size` samples as 16-bit
//!   little-endian words. No length field is transmitted.
//!
//! # Limitations
//! Frame boundaries are only unambiguous while every sample fits in 15 bits ([SAMPLE_MAX]). A
//! 15-bit sample never has a `0xFF` high byte, so at most one `0xFF` byte can occur in a row
//! inside a frame body, while the header is four of them.
#![no_std]

mod command;
mod frame;
mod reply;

pub use command::*;
pub use frame::*;
pub use reply::*;

/// A single channel sample as carried on the link.
pub type Sample = u16;

/// The number of significant bits a [Sample] may use.
pub const SAMPLE_BITS: u32 = 15;

/// The largest sample value that keeps frame boundaries unambiguous.
pub const SAMPLE_MAX: Sample = (1 << SAMPLE_BITS) - 1;

/// Errors on either side of the link.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A configuration payload byte is not where the format expects it.
    #[error("Malformed configuration payload at byte {0}")]
    Malformed(usize),
    /// The requested sampling frequency is zero or has more than 3 digits.
    #[error("Invalid sampling frequency")]
    Frequency,
    /// A text reply from the device could not be parsed.
    #[error("Malformed reply")]
    Reply,
    /// The device refused the configuration.
    #[error("Configuration rejected: {0}")]
    Rejected(Rejection),
    /// The device echoed a configuration other than the one requested.
    #[error("Configuration mismatch")]
    Mismatch,
    /// The frame size does not fit the decoder.
    #[error("Frame of {0} samples exceeds decoder capacity")]
    Capacity(usize),
    /// The stream did not continue with a header after a complete frame.
    #[error("Missing frame header")]
    MissingHeader,
}
