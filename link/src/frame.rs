use heapless::Vec;

use super::{Error, Sample};

/// The sentinel marking the start of every frame.
pub const HEADER: [u8; 4] = [0xFF; 4];

// Bytes serialized per write call. Keeps the number of calls into the writer low without
// requiring a frame-sized staging buffer.
const CHUNK_SIZE: usize = 64;

/// The number of bytes a frame of `output_size` samples occupies on the link.
pub const fn frame_len(output_size: usize) -> usize {
    HEADER.len() + output_size * core::mem::size_of::<Sample>()
}

/// Write a complete frame to the link.
///
/// # Args
/// * `writer` - The link transmitter.
/// * `samples` - The frame contents, channel-interleaved.
///
/// # Note
/// Samples are not range checked. Values above [super::SAMPLE_MAX] make the frame boundaries
/// ambiguous for the host.
pub fn write_frame<W: embedded_io::Write>(
    writer: &mut W,
    samples: &[Sample],
) -> Result<(), W::Error> {
    writer.write_all(&HEADER)?;

    let mut chunk = [0u8; CHUNK_SIZE];
    for group in samples.chunks(CHUNK_SIZE / core::mem::size_of::<Sample>()) {
        let mut len = 0;
        for (sample, bytes) in group.iter().zip(chunk.chunks_exact_mut(2)) {
            bytes.copy_from_slice(&sample.to_le_bytes());
            len += 2;
        }
        writer.write_all(&chunk[..len])?;
    }

    Ok(())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// Scanning for a header, counting consecutive header bytes.
    Search(usize),
    /// Inside a frame body. Holds the low byte of a partially received sample.
    Body(Option<u8>),
    /// A frame just ended and the next header must follow immediately.
    Header(usize),
}

/// Host-side frame decoder.
///
/// # Design
/// Bytes are fed one at a time as they arrive from the device. The decoder first scans for a
/// header, then collects `output_size` samples and hands out the frame. After every frame, the
/// next header is required to follow immediately. If it does not, the decoder reports
/// [Error::MissingHeader] once and falls back to scanning.
pub struct Decoder<const CAP: usize> {
    output_size: usize,
    state: State,
    samples: Vec<Sample, CAP>,
}

impl<const CAP: usize> Decoder<CAP> {
    /// Construct a decoder.
    ///
    /// # Args
    /// * `output_size` - The number of samples per frame, as acknowledged by the device.
    pub fn new(output_size: usize) -> Result<Self, Error> {
        if output_size == 0 || output_size > CAP {
            return Err(Error::Capacity(output_size));
        }

        Ok(Self {
            output_size,
            state: State::Search(0),
            samples: Vec::new(),
        })
    }

    /// The number of samples in every decoded frame.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Check if the decoder is synchronized to the frame boundaries of the stream.
    pub fn is_synchronized(&self) -> bool {
        !matches!(self.state, State::Search(_))
    }

    /// Process a single received byte.
    ///
    /// # Returns
    /// `Some(frame)` once the last byte of a frame was received.
    pub fn push(&mut self, byte: u8) -> Result<Option<&[Sample]>, Error> {
        match self.state {
            State::Search(count) => {
                let count = if byte == HEADER[0] { count + 1 } else { 0 };
                self.state = if count == HEADER.len() {
                    self.samples.clear();
                    State::Body(None)
                } else {
                    State::Search(count)
                };
            }
            State::Header(count) => {
                if byte != HEADER[count] {
                    self.state = State::Search(0);
                    return Err(Error::MissingHeader);
                }
                self.state = if count + 1 == HEADER.len() {
                    self.samples.clear();
                    State::Body(None)
                } else {
                    State::Header(count + 1)
                };
            }
            State::Body(None) => self.state = State::Body(Some(byte)),
            State::Body(Some(low)) => {
                // Note(unwrap): The decoder never collects more than `output_size` samples, which
                // is checked against the capacity on construction.
                self.samples
                    .push(Sample::from_le_bytes([low, byte]))
                    .unwrap();

                if self.samples.len() == self.output_size {
                    self.state = State::Header(0);
                    return Ok(Some(self.samples.as_slice()));
                }
                self.state = State::Body(None);
            }
        }

        Ok(None)
    }
}
