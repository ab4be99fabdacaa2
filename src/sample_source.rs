//! Analog sample sources
//!
//! # Design
//! The sampler pulls one sample per channel on every tick from a [SampleSource]. Reads happen in
//! the sampling interrupt and must complete in bounded time without blocking.
//!
//! Two sources exist. [AdcSource] converts the configured analog channels. [CounterSource] is a
//! diagnostic substitute that carries the frame timestamp instead of measurements, so that the
//! host can check the integrity of frame packing and transport without any signal connected.
//! The source is picked once at startup, see [Source].
use link::{Sample, SAMPLE_BITS, SAMPLE_MAX};

use crate::design_parameters::CHECK_VALUE;
use crate::settings::SourceKind;

/// A provider of one sample per channel, in fixed channel order.
pub trait SampleSource<const N: usize> {
    /// Read the next sample group.
    ///
    /// # Args
    /// * `timestamp` - The running acquisition timestamp in milliseconds at the start of the
    ///   current frame.
    fn read(&mut self, timestamp: u32) -> [Sample; N];
}

/// The analog channels of a converter.
pub trait AnalogInputs<const N: usize> {
    /// The number of significant bits in the raw conversion codes.
    fn resolution(&self) -> u32;

    /// Convert all channels and return their raw codes in channel order.
    fn convert(&mut self) -> [u16; N];
}

/// Sample source backed by analog inputs.
///
/// # Note
/// Codes wider than the link can carry are reduced to their most significant 15 bits.
pub struct AdcSource<I> {
    inputs: I,
    shift: u32,
}

impl<I> AdcSource<I> {
    pub fn new<const N: usize>(inputs: I) -> Self
    where
        I: AnalogInputs<N>,
    {
        let shift = inputs.resolution().saturating_sub(SAMPLE_BITS);
        Self { inputs, shift }
    }
}

impl<I, const N: usize> SampleSource<N> for AdcSource<I>
where
    I: AnalogInputs<N>,
{
    #[inline]
    fn read(&mut self, _timestamp: u32) -> [Sample; N] {
        self.inputs.convert().map(|code| (code >> self.shift) & SAMPLE_MAX)
    }
}

/// Diagnostic source carrying the frame timestamp.
///
/// # Design
/// Channel 0 carries the low 15 bits of the timestamp and channel 1 the next 15 bits. All further
/// channels carry [CHECK_VALUE], which exposes any crosstalk between channels when the host
/// deinterleaves a frame. Channel 0 thus steps once per frame and wraps at [SAMPLE_MAX], at which
/// point channel 1 increments.
#[derive(Copy, Clone, Debug, Default)]
pub struct CounterSource;

impl<const N: usize> SampleSource<N> for CounterSource {
    #[inline]
    fn read(&mut self, timestamp: u32) -> [Sample; N] {
        core::array::from_fn(|channel| match channel {
            0 => (timestamp & SAMPLE_MAX as u32) as Sample,
            1 => ((timestamp >> SAMPLE_BITS) & SAMPLE_MAX as u32) as Sample,
            _ => CHECK_VALUE,
        })
    }
}

/// The sample source selected at startup.
pub enum Source<I> {
    Adc(AdcSource<I>),
    Counter(CounterSource),
}

impl<I> Source<I> {
    /// Construct the source of the given kind.
    ///
    /// # Args
    /// * `kind` - The configured source kind.
    /// * `inputs` - The analog inputs. They stay unused with [SourceKind::Counter].
    pub fn new<const N: usize>(kind: SourceKind, inputs: I) -> Self
    where
        I: AnalogInputs<N>,
    {
        match kind {
            SourceKind::Adc => Self::Adc(AdcSource::new(inputs)),
            SourceKind::Counter => Self::Counter(CounterSource),
        }
    }
}

impl<I, const N: usize> SampleSource<N> for Source<I>
where
    I: AnalogInputs<N>,
{
    #[inline]
    fn read(&mut self, timestamp: u32) -> [Sample; N] {
        match self {
            Self::Adc(adc) => adc.read(timestamp),
            Self::Counter(counter) => counter.read(timestamp),
        }
    }
}
