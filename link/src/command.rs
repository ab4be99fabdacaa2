use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::Error;

/// The number of bytes following the [Marker::Configure] byte.
pub const PAYLOAD_LEN: usize = 14;

/// The raw configuration payload as received after [Marker::Configure].
pub type Payload = [u8; PAYLOAD_LEN];

// Payload layout: `<epoch:10>F<frequency:3>`
const EPOCH_DIGITS: usize = 10;
const FREQUENCY_SEPARATOR: u8 = b'F';
const FREQUENCY_DIGITS: usize = 3;

/// Single-byte command markers sent by the host.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Marker {
    /// Abort acquisition and return to idle.
    Reset = b'R',
    /// Start of a configuration payload.
    Configure = b'T',
}

/// A parsed configuration request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Configure {
    /// Host wall-clock time in seconds since the Unix epoch.
    pub epoch: u64,
    /// Sampling frequency in Hz.
    pub frequency: u16,
}

fn parse_digits(digits: &[u8], offset: usize) -> Result<u64, Error> {
    digits.iter().enumerate().try_fold(0u64, |value, (i, &digit)| {
        if digit.is_ascii_digit() {
            Ok(value * 10 + (digit - b'0') as u64)
        } else {
            Err(Error::Malformed(offset + i))
        }
    })
}

fn write_digits(mut value: u64, digits: &mut [u8]) {
    for digit in digits.iter_mut().rev() {
        *digit = b'0' + (value % 10) as u8;
        value /= 10;
    }
}

impl Configure {
    /// The largest frequency the 3-digit field can carry.
    pub const MAX_FREQUENCY: u16 = 999;

    /// The largest epoch the 10-digit field can carry.
    pub const MAX_EPOCH: u64 = 9_999_999_999;

    /// Parse a configuration payload.
    ///
    /// # Args
    /// * `payload` - The 14 bytes following the configure marker.
    ///
    /// # Returns
    /// The request, or the position of the first offending byte. A frequency of zero is refused
    /// since it has no sampling period.
    pub fn parse(payload: &Payload) -> Result<Self, Error> {
        let (epoch, rest) = payload.split_at(EPOCH_DIGITS);
        let epoch = parse_digits(epoch, 0)?;

        if rest[0] != FREQUENCY_SEPARATOR {
            return Err(Error::Malformed(EPOCH_DIGITS));
        }

        let frequency = parse_digits(&rest[1..], EPOCH_DIGITS + 1)? as u16;
        if frequency == 0 {
            return Err(Error::Frequency);
        }

        Ok(Self { epoch, frequency })
    }

    /// Serialize the request into its payload form.
    pub fn payload(&self) -> Result<Payload, Error> {
        if self.frequency == 0 || self.frequency > Self::MAX_FREQUENCY {
            return Err(Error::Frequency);
        }
        if self.epoch > Self::MAX_EPOCH {
            return Err(Error::Malformed(0));
        }

        let mut payload = [0; PAYLOAD_LEN];
        write_digits(self.epoch, &mut payload[..EPOCH_DIGITS]);
        payload[EPOCH_DIGITS] = FREQUENCY_SEPARATOR;
        write_digits(
            self.frequency as u64,
            &mut payload[EPOCH_DIGITS + 1..][..FREQUENCY_DIGITS],
        );
        Ok(payload)
    }
}

/// A complete host command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Reset,
    Configure(Configure),
}

impl Command {
    /// Serialize the command as sent by the host.
    pub fn encode(&self) -> Result<Vec<u8, { PAYLOAD_LEN + 1 }>, Error> {
        let mut bytes = Vec::new();
        match self {
            Self::Reset => {
                // Note(unwrap): The vector has room for a full configuration command.
                bytes.push(Marker::Reset.into()).unwrap();
            }
            Self::Configure(configure) => {
                bytes.push(Marker::Configure.into()).unwrap();
                bytes.extend_from_slice(&configure.payload()?).unwrap();
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload() {
        let request = Configure::parse(b"1234567890F100").unwrap();
        assert_eq!(
            request,
            Configure {
                epoch: 1_234_567_890,
                frequency: 100
            }
        );
        assert_eq!(Configure::parse(b"0000000000F001").unwrap().frequency, 1);
    }

    #[test]
    fn reject_malformed() {
        assert_eq!(
            Configure::parse(b"12345x7890F100"),
            Err(Error::Malformed(5))
        );
        assert_eq!(
            Configure::parse(b"1234567890X100"),
            Err(Error::Malformed(10))
        );
        assert_eq!(
            Configure::parse(b"1234567890F1 0"),
            Err(Error::Malformed(12))
        );
        assert_eq!(
            Configure::parse(b"1234567890F000"),
            Err(Error::Frequency)
        );
    }

    #[test]
    fn encode_commands() {
        assert_eq!(Command::Reset.encode().unwrap().as_slice(), b"R");

        let configure = Command::Configure(Configure {
            epoch: 1_494_345_706,
            frequency: 5,
        });
        assert_eq!(
            configure.encode().unwrap().as_slice(),
            b"T1494345706F005"
        );

        let too_fast = Command::Configure(Configure {
            epoch: 0,
            frequency: 1000,
        });
        assert_eq!(too_fast.encode(), Err(Error::Frequency));
    }

    #[test]
    fn markers() {
        assert_eq!(Marker::try_from(b'R').ok(), Some(Marker::Reset));
        assert_eq!(Marker::try_from(b'T').ok(), Some(Marker::Configure));
        assert!(Marker::try_from(b'F').is_err());
    }
}
