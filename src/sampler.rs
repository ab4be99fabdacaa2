//! Periodic sample capture
//!
//! # Design
//! The sampler runs from the sampling timer interrupt. On every tick it reads one sample group from
//! the [SampleSource] and appends it to the active frame slot. It never blocks and never touches
//! the link: completed frames are picked up by the main loop through the [FrameReader] side of
//! the frame buffer.
//!
//! The sampler also maintains the running acquisition timestamp handed to the source. The
//! timestamp advances by the wall time between frame starts, in milliseconds.
//!
//! [FrameReader]: crate::frame_buffer::FrameReader
use fugit::HertzU32;
use link::Sample;

use crate::configuration::AcquisitionConfig;
use crate::design_parameters::CHANNEL_COUNT;
use crate::frame_buffer::{Error, FrameWriter};
use crate::sample_source::SampleSource;

/// A periodic hardware timer driving the sampler.
pub trait Ticker {
    /// Start (or restart) periodic ticks at the given rate.
    fn start(&mut self, rate: HertzU32);

    /// Stop ticks. No tick may fire after this returns.
    fn stop(&mut self);
}

pub struct Sampler<'a, S, T, const CAP: usize> {
    source: S,
    writer: FrameWriter<'a, CAP>,
    ticker: T,
    running: bool,
    timestamp: u32,
    frame_start: u32,
}

impl<'a, S, T, const CAP: usize> Sampler<'a, S, T, CAP>
where
    S: SampleSource<CHANNEL_COUNT>,
    T: Ticker,
{
    /// Construct a stopped sampler.
    ///
    /// # Args
    /// * `source` - The sample source.
    /// * `writer` - The filling side of the frame buffer.
    /// * `ticker` - The timer driving [Self::sample()].
    pub fn new(source: S, writer: FrameWriter<'a, CAP>, mut ticker: T) -> Self {
        ticker.stop();
        Self {
            source,
            writer,
            ticker,
            running: false,
            timestamp: 0,
            frame_start: 0,
        }
    }

    /// Capture one sample group.
    ///
    /// # Args
    /// * `now` - The current time in milliseconds.
    ///
    /// # Returns
    /// True if the group completed a frame that is now ready for streaming.
    pub fn sample(&mut self, now: u32) -> Result<bool, Error> {
        if self.writer.is_frame_start() {
            self.timestamp = self
                .timestamp
                .wrapping_add(now.wrapping_sub(self.frame_start));
            self.frame_start = now;
        }

        let samples: [Sample; CHANNEL_COUNT] = self.source.read(self.timestamp);
        self.writer.append(&samples)
    }

    /// Start acquisition.
    ///
    /// # Args
    /// * `config` - The accepted acquisition configuration.
    /// * `now` - The current time in milliseconds. The timestamp restarts from zero here.
    pub fn start(&mut self, config: &AcquisitionConfig, now: u32) -> Result<(), Error> {
        self.stop();
        self.writer.set_output_size(config.output_size)?;
        self.timestamp = 0;
        self.frame_start = now;
        self.ticker.start(config.frequency);
        self.running = true;
        Ok(())
    }

    /// Stop acquisition and discard all buffered samples.
    pub fn stop(&mut self) {
        // Ticks must cease before the frame state goes away.
        self.ticker.stop();
        self.writer.reset();
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The number of frames lost because the main loop fell behind.
    pub fn overruns(&self) -> u32 {
        self.writer.overruns()
    }

    pub fn ticker_mut(&mut self) -> &mut T {
        &mut self.ticker
    }
}
