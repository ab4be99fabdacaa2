//! Acquisition configuration state machine
//!
//! # Design
//! The host drives the device with two commands, see [link]. Command handling is split in two
//! halves:
//! * The [Receiver] runs in the serial receive interrupt. It assembles command bytes into
//!   [Event]s and never blocks waiting for further bytes.
//! * The [Controller] acts on the events from a low-priority context. It parses configuration
//!   payloads, starts and stops the [Sampler] and drives the status indicators. Replies to the
//!   host are queued for the main loop, which is the only context writing to the link.
//!
//! The device is in one of three [Phase]s. It powers up `Idle`, enters `Acquiring` on a valid
//! configuration, and returns to `Idle` on reset. A configuration whose frames would not fit into
//! the frame buffer is fatal: the device enters `Halted`, blinks the error indicator and refuses
//! further configuration until reset.
use embedded_hal_1::digital::{OutputPin, PinState};
use fugit::{HertzU32, MillisDurationU32, RateExtU32};
use heapless::{spsc::Producer, Vec};
use link::{Acknowledgment, Configure, Marker, Payload, Rejection, Reply, PAYLOAD_LEN};

use crate::design_parameters::{CHANNEL_COUNT, REPLY_QUEUE_DEPTH, SEND_PERIOD};
use crate::frame_buffer;
use crate::sample_source::SampleSource;
use crate::sampler::{Sampler, Ticker};

/// Compute the number of samples per frame.
///
/// # Args
/// * `frequency` - The sampling frequency.
/// * `period` - The targeted interval between frames.
/// * `channels` - The number of channels per sample group.
///
/// # Returns
/// The number of whole sample groups acquired within `period`, but at least one, in samples.
pub fn output_size(
    frequency: HertzU32,
    period: MillisDurationU32,
    channels: usize,
) -> usize {
    let groups = frequency.raw() as u64 * period.ticks() as u64 / 1000;
    (groups as usize).max(1) * channels
}

/// An accepted acquisition configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Host wall-clock time in seconds since the Unix epoch.
    pub epoch: u64,
    pub frequency: HertzU32,
    /// The number of samples per frame.
    pub output_size: usize,
}

impl AcquisitionConfig {
    pub fn new(request: &Configure) -> Self {
        let frequency = (request.frequency as u32).Hz();
        Self {
            epoch: request.epoch,
            frequency,
            output_size: output_size(frequency, SEND_PERIOD, CHANNEL_COUNT),
        }
    }

    /// The acknowledgment reported to the host.
    pub fn acknowledgment(&self) -> Acknowledgment {
        Acknowledgment {
            epoch: self.epoch,
            frequency: self.frequency.raw() as u16,
            output_size: self.output_size as u16,
        }
    }
}

/// A complete host command as assembled by the [Receiver].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Reset,
    Configure(Payload),
}

/// Byte-level command assembly.
#[derive(Debug, Default)]
pub struct Receiver {
    payload: Option<Vec<u8, PAYLOAD_LEN>>,
}

impl Receiver {
    /// Process a received byte.
    ///
    /// # Returns
    /// The event completed by the byte, if any.
    ///
    /// # Note
    /// A reset marker is honored at any time and discards a partial payload. A configure marker
    /// always starts a new payload. Bytes outside a payload that are not markers are ignored.
    pub fn handle(&mut self, byte: u8) -> Option<Event> {
        match Marker::try_from(byte) {
            Ok(Marker::Reset) => {
                self.payload = None;
                return Some(Event::Reset);
            }
            Ok(Marker::Configure) => {
                self.payload = Some(Vec::new());
                return None;
            }
            Err(_) => {}
        }

        let payload = self.payload.as_mut()?;
        // Note(unwrap): The payload is taken below as soon as it is full.
        payload.push(byte).unwrap();
        if !payload.is_full() {
            return None;
        }

        self.payload
            .take()
            .and_then(|payload| Payload::try_from(payload.as_slice()).ok())
            .map(Event::Configure)
    }

    /// Check if a payload is partially received.
    pub fn is_collecting(&self) -> bool {
        self.payload.is_some()
    }
}

/// The operating phase of the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::AsRefStr)]
pub enum Phase {
    Idle,
    Acquiring,
    Halted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Link(#[from] link::Error),
    #[error(transparent)]
    Buffer(#[from] frame_buffer::Error),
    #[error("Halted until reset")]
    Halted,
}

impl Error {
    /// The rejection reported to the host.
    pub fn rejection(&self) -> Rejection {
        match self {
            Self::Link(link::Error::Frequency) => Rejection::Frequency,
            Self::Link(_) => Rejection::Malformed,
            Self::Buffer(_) => Rejection::Capacity,
            Self::Halted => Rejection::Halted,
        }
    }

    /// Check if the error is fatal and halts the device.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Buffer(frame_buffer::Error::Capacity(_)))
    }
}

/// The status outputs.
pub struct Indicators<P> {
    /// Lit while idle, waiting for a configuration.
    pub waiting: P,
    /// Blinks while halted.
    pub error: P,
    /// High while not acquiring, low while acquiring.
    pub sync: Option<P>,
}

impl<P: OutputPin> Indicators<P> {
    fn show(&mut self, phase: Phase) {
        let (waiting, sync) = match phase {
            Phase::Idle => (PinState::High, PinState::High),
            Phase::Acquiring => (PinState::Low, PinState::Low),
            Phase::Halted => (PinState::Low, PinState::High),
        };

        // Indicator failures leave nothing to recover.
        self.waiting.set_state(waiting).ok();
        if let Some(pin) = self.sync.as_mut() {
            pin.set_state(sync).ok();
        }
        if phase != Phase::Halted {
            self.error.set_low().ok();
        }
    }
}

pub struct Controller<'a, P> {
    phase: Phase,
    config: Option<AcquisitionConfig>,
    indicators: Indicators<P>,
    error_lit: bool,
    replies: Producer<'a, Reply, REPLY_QUEUE_DEPTH>,
}

impl<'a, P: OutputPin> Controller<'a, P> {
    /// Construct an idle controller.
    ///
    /// # Args
    /// * `indicators` - The status outputs.
    /// * `replies` - The queue of reply lines for the main loop.
    pub fn new(
        mut indicators: Indicators<P>,
        replies: Producer<'a, Reply, REPLY_QUEUE_DEPTH>,
    ) -> Self {
        indicators.show(Phase::Idle);
        Self {
            phase: Phase::Idle,
            config: None,
            indicators,
            error_lit: false,
            replies,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The active configuration while acquiring.
    pub fn config(&self) -> Option<&AcquisitionConfig> {
        self.config.as_ref()
    }

    pub fn indicators(&self) -> &Indicators<P> {
        &self.indicators
    }

    /// Act on an assembled host command.
    ///
    /// # Args
    /// * `event` - The command.
    /// * `sampler` - The sampler to start or stop.
    /// * `now` - The current time in milliseconds.
    pub fn handle<S, T, const CAP: usize>(
        &mut self,
        event: &Event,
        sampler: &mut Sampler<'_, S, T, CAP>,
        now: u32,
    ) -> Result<(), Error>
    where
        S: SampleSource<CHANNEL_COUNT>,
        T: Ticker,
    {
        match event {
            Event::Reset => {
                self.reset(sampler);
                Ok(())
            }
            Event::Configure(payload) => {
                self.configure(payload, sampler, now).map(|_| ())
            }
        }
    }

    /// Stop acquisition and return to idle.
    ///
    /// # Note
    /// This is idempotent. It also leaves the halted phase.
    pub fn reset<S, T, const CAP: usize>(
        &mut self,
        sampler: &mut Sampler<'_, S, T, CAP>,
    ) where
        S: SampleSource<CHANNEL_COUNT>,
        T: Ticker,
    {
        sampler.stop();
        self.config = None;
        self.error_lit = false;
        if self.phase != Phase::Idle {
            log::info!("Reset from {}", self.phase.as_ref());
        }
        self.enter(Phase::Idle);
    }

    /// Apply a configuration payload.
    ///
    /// # Args
    /// * `payload` - The bytes following the configure marker.
    /// * `sampler` - The sampler to start.
    /// * `now` - The current time in milliseconds.
    ///
    /// # Returns
    /// The accepted configuration. Any running acquisition is stopped first, so a refused
    /// configuration leaves the device idle, or halted if the error is fatal. Either way the
    /// outcome is queued as a reply line.
    pub fn configure<S, T, const CAP: usize>(
        &mut self,
        payload: &Payload,
        sampler: &mut Sampler<'_, S, T, CAP>,
        now: u32,
    ) -> Result<AcquisitionConfig, Error>
    where
        S: SampleSource<CHANNEL_COUNT>,
        T: Ticker,
    {
        let result = self.try_configure(payload, sampler, now);

        let reply = match &result {
            Ok(config) => {
                log::info!(
                    "Acquiring at {} Hz with {} samples per frame",
                    config.frequency.raw(),
                    config.output_size
                );
                Reply::Acknowledged(config.acknowledgment())
            }
            Err(error) => {
                log::warn!("Configuration refused: {error}");
                if error.is_fatal() {
                    self.enter(Phase::Halted);
                }
                Reply::Rejected(error.rejection())
            }
        };

        if self.replies.enqueue(reply).is_err() {
            log::warn!("Reply queue full, dropping {reply:?}");
        }

        result
    }

    fn try_configure<S, T, const CAP: usize>(
        &mut self,
        payload: &Payload,
        sampler: &mut Sampler<'_, S, T, CAP>,
        now: u32,
    ) -> Result<AcquisitionConfig, Error>
    where
        S: SampleSource<CHANNEL_COUNT>,
        T: Ticker,
    {
        if self.phase == Phase::Halted {
            return Err(Error::Halted);
        }

        sampler.stop();
        self.config = None;
        self.enter(Phase::Idle);

        let request = Configure::parse(payload)?;
        let config = AcquisitionConfig::new(&request);
        sampler.start(&config, now)?;

        self.config = Some(config);
        self.enter(Phase::Acquiring);
        Ok(config)
    }

    /// Advance the error blink pattern.
    ///
    /// # Returns
    /// True while halted. The pattern ends once this returns false.
    pub fn blink(&mut self) -> bool {
        if self.phase != Phase::Halted {
            return false;
        }

        self.error_lit = !self.error_lit;
        self.indicators
            .error
            .set_state(PinState::from(self.error_lit))
            .ok();
        true
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.indicators.show(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_buffer::FrameBuffer;
    use crate::sample_source::CounterSource;
    use core::convert::Infallible;
    use fugit::ExtU32;
    use heapless::spsc::Queue;

    #[derive(Debug, Default)]
    struct Pin(bool);

    impl embedded_hal_1::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0 = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0 = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Timer(Option<HertzU32>);

    impl Ticker for Timer {
        fn start(&mut self, rate: HertzU32) {
            self.0 = Some(rate);
        }

        fn stop(&mut self) {
            self.0 = None;
        }
    }

    fn indicators() -> Indicators<Pin> {
        Indicators {
            waiting: Pin::default(),
            error: Pin::default(),
            sync: Some(Pin::default()),
        }
    }

    fn feed(receiver: &mut Receiver, bytes: &[u8]) -> std::vec::Vec<Event> {
        bytes.iter().filter_map(|&b| receiver.handle(b)).collect()
    }

    #[test]
    fn frame_sizes() {
        let size = |f: u32| output_size(f.Hz(), 200.millis(), 3);
        assert_eq!(size(1), 3);
        assert_eq!(size(4), 3);
        assert_eq!(size(5), 3);
        assert_eq!(size(10), 6);
        assert_eq!(size(100), 60);
        assert_eq!(size(999), 597);
        assert_eq!(output_size(100.Hz(), 200.millis(), 1), 20);
    }

    #[test]
    fn assemble_commands() {
        let mut receiver = Receiver::default();
        assert_eq!(
            feed(&mut receiver, b"xT1234567890F100R"),
            [
                Event::Configure(*b"1234567890F100"),
                Event::Reset
            ]
        );

        // Reset discards a partial payload.
        assert_eq!(feed(&mut receiver, b"T12345R67890F100"), [Event::Reset]);
        assert!(!receiver.is_collecting());

        // A configure marker restarts the payload.
        assert_eq!(
            feed(&mut receiver, b"T99T0000000001F005"),
            [Event::Configure(*b"0000000001F005")]
        );
    }

    #[test]
    fn configure_and_reset() {
        let mut queue: Queue<Reply, REPLY_QUEUE_DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut buffer = FrameBuffer::<1024>::new();
        let (writer, _reader) = buffer.split();
        let mut sampler = Sampler::new(CounterSource, writer, Timer::default());
        let mut controller = Controller::new(indicators(), producer);

        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.indicators().waiting.0);

        let config = controller
            .configure(b"1234567890F100", &mut sampler, 0)
            .unwrap();
        assert_eq!(config.output_size, 60);
        assert_eq!(controller.phase(), Phase::Acquiring);
        assert!(sampler.is_running());
        assert!(!controller.indicators().waiting.0);
        assert_eq!(controller.indicators().sync.as_ref().map(|p| p.0), Some(false));
        assert_eq!(
            consumer.dequeue(),
            Some(Reply::Acknowledged(Acknowledgment {
                epoch: 1_234_567_890,
                frequency: 100,
                output_size: 60
            }))
        );

        controller.reset(&mut sampler);
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!sampler.is_running());
        assert!(controller.indicators().waiting.0);
        assert_eq!(controller.indicators().sync.as_ref().map(|p| p.0), Some(true));

        // Reset is idempotent.
        controller.reset(&mut sampler);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(consumer.dequeue(), None);
    }

    #[test]
    fn malformed_stays_idle() {
        let mut queue: Queue<Reply, REPLY_QUEUE_DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut buffer = FrameBuffer::<1024>::new();
        let (writer, _reader) = buffer.split();
        let mut sampler = Sampler::new(CounterSource, writer, Timer::default());
        let mut controller = Controller::new(indicators(), producer);

        let result = controller.configure(b"12345678x0F100", &mut sampler, 0);
        assert_eq!(result, Err(Error::Link(link::Error::Malformed(8))));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!sampler.is_running());
        assert_eq!(consumer.dequeue(), Some(Reply::Rejected(Rejection::Malformed)));

        // A bad request while acquiring stops acquisition.
        controller.configure(b"1234567890F001", &mut sampler, 0).unwrap();
        consumer.dequeue();
        let result = controller.configure(b"1234567890F000", &mut sampler, 0);
        assert_eq!(result, Err(Error::Link(link::Error::Frequency)));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!sampler.is_running());
        assert_eq!(consumer.dequeue(), Some(Reply::Rejected(Rejection::Frequency)));
    }

    #[test]
    fn capacity_halts() {
        let mut queue: Queue<Reply, REPLY_QUEUE_DEPTH> = Queue::new();
        let (producer, mut consumer) = queue.split();
        let mut buffer = FrameBuffer::<30>::new();
        let (writer, _reader) = buffer.split();
        let mut sampler = Sampler::new(CounterSource, writer, Timer::default());
        let mut controller = Controller::new(indicators(), producer);

        // 60 samples per frame exceed the 30 sample slots.
        let result = controller.configure(b"1234567890F100", &mut sampler, 0);
        assert_eq!(
            result,
            Err(Error::Buffer(frame_buffer::Error::Capacity(60)))
        );
        assert_eq!(controller.phase(), Phase::Halted);
        assert!(!sampler.is_running());
        assert_eq!(consumer.dequeue(), Some(Reply::Rejected(Rejection::Capacity)));

        assert!(controller.blink());
        assert!(controller.indicators().error.0);
        assert!(controller.blink());
        assert!(!controller.indicators().error.0);

        // Halted refuses configuration, even one that would fit.
        let event = Event::Configure(*b"1234567890F050");
        assert_eq!(
            controller.handle(&event, &mut sampler, 0),
            Err(Error::Halted)
        );
        assert_eq!(consumer.dequeue(), Some(Reply::Rejected(Rejection::Halted)));

        controller.handle(&Event::Reset, &mut sampler, 0).unwrap();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!controller.blink());
        assert!(!controller.indicators().error.0);

        controller.handle(&event, &mut sampler, 0).unwrap();
        assert_eq!(controller.phase(), Phase::Acquiring);
        assert_eq!(controller.config().map(|c| c.output_size), Some(30));
    }
}
