use core::fmt::Write;
use core::str::FromStr;

use heapless::String;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{Configure, Error};

// Longest reply: `<epoch:10> <frequency:3> <output_size:5>\n`
const REPLY_LEN: usize = 32;

const REJECTION_PREFIX: &str = "E";

/// The configuration echo sent by the device once a configuration is accepted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgment {
    pub epoch: u64,
    pub frequency: u16,
    /// The number of samples in every frame that follows.
    pub output_size: u16,
}

impl Acknowledgment {
    /// Check that the device echoed the requested configuration.
    pub fn verify(&self, request: &Configure) -> Result<(), Error> {
        if self.epoch != request.epoch || self.frequency != request.frequency {
            return Err(Error::Mismatch);
        }
        Ok(())
    }
}

/// The reason a configuration request was refused.
#[repr(u8)]
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    thiserror::Error,
)]
pub enum Rejection {
    #[error("malformed payload")]
    Malformed = 1,
    #[error("invalid frequency")]
    Frequency = 2,
    #[error("frame exceeds buffer")]
    Capacity = 3,
    #[error("device halted")]
    Halted = 4,
}

/// A text line sent by the device in response to a configuration request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Acknowledged(Acknowledgment),
    Rejected(Rejection),
}

impl Reply {
    /// Write the reply line, including the line terminator.
    pub fn write<W: embedded_io::Write>(
        &self,
        writer: &mut W,
    ) -> Result<(), W::Error> {
        let mut line: String<REPLY_LEN> = String::new();
        // Note(unwrap): The line buffer fits the longest possible reply.
        match self {
            Self::Acknowledged(ack) => writeln!(
                line,
                "{} {:03} {}",
                ack.epoch, ack.frequency, ack.output_size
            ),
            Self::Rejected(rejection) => {
                writeln!(line, "{REJECTION_PREFIX} {}", u8::from(*rejection))
            }
        }
        .unwrap();

        writer.write_all(line.as_bytes())
    }

    /// Convert the reply into the acknowledgment it carries.
    pub fn acknowledgment(self) -> Result<Acknowledgment, Error> {
        match self {
            Self::Acknowledged(ack) => Ok(ack),
            Self::Rejected(rejection) => Err(Error::Rejected(rejection)),
        }
    }
}

impl FromStr for Reply {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let first = fields.next().ok_or(Error::Reply)?;
        if first == REJECTION_PREFIX {
            let code: u8 = fields
                .next()
                .and_then(|code| code.parse().ok())
                .ok_or(Error::Reply)?;
            let rejection =
                Rejection::try_from(code).map_err(|_| Error::Reply)?;
            return Ok(Self::Rejected(rejection));
        }

        let epoch = first.parse().map_err(|_| Error::Reply)?;
        let mut next = || fields.next().ok_or(Error::Reply);
        let frequency = next()?.parse().map_err(|_| Error::Reply)?;
        let output_size = next()?.parse().map_err(|_| Error::Reply)?;
        if fields.next().is_some() {
            return Err(Error::Reply);
        }

        Ok(Self::Acknowledged(Acknowledgment {
            epoch,
            frequency,
            output_size,
        }))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    struct Sink(Vec<u8>);

    impl embedded_io::ErrorType for Sink {
        type Error = core::convert::Infallible;
    }

    impl embedded_io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn line(reply: Reply) -> std::string::String {
        let mut sink = Sink(Vec::new());
        reply.write(&mut sink).unwrap();
        std::string::String::from_utf8(sink.0).unwrap()
    }

    #[test]
    fn acknowledgment_line() {
        let ack = Acknowledgment {
            epoch: 1_234_567_890,
            frequency: 5,
            output_size: 3,
        };
        let text = line(Reply::Acknowledged(ack));
        assert_eq!(text, "1234567890 005 3\n");
        assert_eq!(text.parse::<Reply>(), Ok(Reply::Acknowledged(ack)));
    }

    #[test]
    fn rejection_line() {
        let text = line(Reply::Rejected(Rejection::Capacity));
        assert_eq!(text, "E 3\n");
        let reply: Reply = text.parse().unwrap();
        assert_eq!(
            reply.acknowledgment(),
            Err(Error::Rejected(Rejection::Capacity))
        );
    }

    #[test]
    fn host_side_checks() {
        assert_eq!("12 100".parse::<Reply>(), Err(Error::Reply));
        assert_eq!("12 100 60 1".parse::<Reply>(), Err(Error::Reply));
        assert_eq!("E 9".parse::<Reply>(), Err(Error::Reply));

        let ack: Reply = "1234567890 100 60".parse().unwrap();
        let ack = ack.acknowledgment().unwrap();
        let request = Configure {
            epoch: 1_234_567_890,
            frequency: 100,
        };
        assert_eq!(ack.verify(&request), Ok(()));
        assert_eq!(
            ack.verify(&Configure {
                frequency: 99,
                ..request
            }),
            Err(Error::Mismatch)
        );
    }
}
