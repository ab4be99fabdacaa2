//! Double-buffered frame storage
//!
//! # Design
//! Samples are collected into one of two statically allocated slots. The sampler owns the
//! [FrameWriter] and fills the active slot. Once the slot holds a complete frame, the roles of the
//! slots swap and the filled slot is handed to the main loop, which owns the [FrameReader] and
//! streams the frame while the sampler continues in the other slot.
//!
//! The handoff is lock-free. The writer runs in the sampling interrupt and always preempts the
//! reader, never the other way around. A slot selector, a ready flag and a reading lease (all
//! atomic) partition the slots between the two sides:
//! * The writer only ever touches the active slot.
//! * The reader only ever touches the inactive slot, and only while it holds the lease.
//! * The writer never swaps slots while the lease is held. A frame completed during that time is
//!   dropped and counted as an overrun.
//!
//! A completed frame that is not taken before the next one completes is overwritten. This is also
//! counted as an overrun.
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use link::Sample;

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The frame size exceeds the slot capacity.
    #[error("Frame of {0} samples exceeds buffer capacity")]
    Capacity(usize),
    /// A frame must hold at least one sample.
    #[error("Empty frame")]
    Empty,
    /// Samples were appended before a frame size was configured.
    #[error("No frame size configured")]
    Unconfigured,
    /// The appended samples pass the end of the frame.
    #[error("Samples overflow the frame")]
    Overflow,
}

/// Two frame slots of `CAP` samples each, with their handoff state.
pub struct FrameBuffer<const CAP: usize> {
    slots: [UnsafeCell<[Sample; CAP]>; 2],
    /// The index of the active slot. `false` is slot 0.
    select: AtomicBool,
    /// The inactive slot holds a frame that has not been taken yet.
    ready: AtomicBool,
    /// The reader holds the inactive slot.
    reading: AtomicBool,
    /// The length of the frame in the inactive slot.
    len: AtomicUsize,
    overruns: AtomicU32,
}

// Slot access is partitioned between the two halves returned by `split()`, see the module
// documentation.
unsafe impl<const CAP: usize> Sync for FrameBuffer<CAP> {}

impl<const CAP: usize> Default for FrameBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> FrameBuffer<CAP> {
    pub const fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new([0; CAP]),
                UnsafeCell::new([0; CAP]),
            ],
            select: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            reading: AtomicBool::new(false),
            len: AtomicUsize::new(0),
            overruns: AtomicU32::new(0),
        }
    }

    /// Split the buffer into its sampler and main loop sides.
    pub fn split(&mut self) -> (FrameWriter<'_, CAP>, FrameReader<'_, CAP>) {
        let buffer = &*self;
        (
            FrameWriter {
                buffer,
                cursor: 0,
                output_size: 0,
            },
            FrameReader { buffer },
        )
    }
}

/// The filling side of a [FrameBuffer].
pub struct FrameWriter<'a, const CAP: usize> {
    buffer: &'a FrameBuffer<CAP>,
    cursor: usize,
    output_size: usize,
}

impl<const CAP: usize> FrameWriter<'_, CAP> {
    /// Configure the number of samples per frame.
    ///
    /// # Note
    /// This discards any partially filled frame.
    pub fn set_output_size(&mut self, output_size: usize) -> Result<(), Error> {
        if output_size == 0 {
            return Err(Error::Empty);
        }
        if output_size > CAP {
            return Err(Error::Capacity(output_size));
        }

        self.reset();
        self.output_size = output_size;
        Ok(())
    }

    /// The configured number of samples per frame, zero if unconfigured.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Check if the next appended sample starts a new frame.
    pub fn is_frame_start(&self) -> bool {
        self.cursor == 0
    }

    /// The number of frames lost so far.
    pub fn overruns(&self) -> u32 {
        self.buffer.overruns.load(Ordering::Relaxed)
    }

    /// Append a group of samples to the active slot.
    ///
    /// # Returns
    /// True if the samples completed a frame and it was handed to the reader.
    pub fn append(&mut self, samples: &[Sample]) -> Result<bool, Error> {
        if self.output_size == 0 {
            return Err(Error::Unconfigured);
        }

        let end = self.cursor + samples.len();
        if end > self.output_size {
            return Err(Error::Overflow);
        }

        let active = self.buffer.select.load(Ordering::Relaxed) as usize;
        // Safety: The reader never accesses the active slot.
        let slot = unsafe { &mut *self.buffer.slots[active].get() };
        slot[self.cursor..end].copy_from_slice(samples);

        if end < self.output_size {
            self.cursor = end;
            return Ok(false);
        }
        self.cursor = 0;

        if self.buffer.reading.load(Ordering::SeqCst) {
            // The inactive slot is still being streamed. Refill the active slot instead.
            self.buffer.overruns.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        if self.buffer.ready.load(Ordering::SeqCst) {
            // The previous frame was never taken and is overwritten next.
            self.buffer.overruns.fetch_add(1, Ordering::Relaxed);
        }

        self.buffer.len.store(self.output_size, Ordering::Relaxed);
        self.buffer.select.store(active == 0, Ordering::SeqCst);
        self.buffer.ready.store(true, Ordering::Release);
        Ok(true)
    }

    /// Discard all frame state and the frame size.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.output_size = 0;
        self.buffer.ready.store(false, Ordering::SeqCst);

        // Keep filling away from a slot that is still being streamed.
        if !self.buffer.reading.load(Ordering::SeqCst) {
            self.buffer.select.store(false, Ordering::SeqCst);
        }
    }
}

/// The streaming side of a [FrameBuffer].
pub struct FrameReader<'a, const CAP: usize> {
    buffer: &'a FrameBuffer<CAP>,
}

impl<const CAP: usize> FrameReader<'_, CAP> {
    /// Check if a completed frame is waiting.
    pub fn is_ready(&self) -> bool {
        self.buffer.ready.load(Ordering::Relaxed)
    }

    /// The number of frames lost so far.
    pub fn overruns(&self) -> u32 {
        self.buffer.overruns.load(Ordering::Relaxed)
    }

    /// Take the waiting frame, if any.
    ///
    /// # Args
    /// * `f` - Called with the frame samples. The sampler keeps running meanwhile, but the slot is
    ///   not reused before `f` returns.
    pub fn take_ready<R>(&mut self, f: impl FnOnce(&[Sample]) -> R) -> Option<R> {
        if !self.is_ready() {
            return None;
        }

        self.buffer.reading.store(true, Ordering::SeqCst);

        let result = if self.buffer.ready.swap(false, Ordering::SeqCst) {
            let inactive = !self.buffer.select.load(Ordering::SeqCst) as usize;
            let len = self.buffer.len.load(Ordering::Relaxed);
            // Safety: The writer does not touch the inactive slot while the lease is held.
            let slot = unsafe { &*self.buffer.slots[inactive].get() };
            Some(f(&slot[..len]))
        } else {
            None
        };

        self.buffer.reading.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames<const CAP: usize>(reader: &mut FrameReader<'_, CAP>) -> Option<Vec<Sample>> {
        reader.take_ready(|samples| samples.to_vec())
    }

    #[test]
    fn swap_on_complete() {
        let mut buffer = FrameBuffer::<8>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(6).unwrap();

        assert_eq!(writer.append(&[1, 2, 3]), Ok(false));
        assert!(!reader.is_ready());
        assert_eq!(frames(&mut reader), None);

        assert_eq!(writer.append(&[4, 5, 6]), Ok(true));
        assert!(writer.is_frame_start());
        assert!(reader.is_ready());

        // Sampling continues in the other slot.
        assert_eq!(writer.append(&[7, 8, 9]), Ok(false));
        assert_eq!(frames(&mut reader), Some(vec![1, 2, 3, 4, 5, 6]));
        assert!(!reader.is_ready());

        assert_eq!(writer.append(&[10, 11, 12]), Ok(true));
        assert_eq!(frames(&mut reader), Some(vec![7, 8, 9, 10, 11, 12]));
        assert_eq!(writer.overruns(), 0);
    }

    #[test]
    fn frame_size_checks() {
        let mut buffer = FrameBuffer::<6>::new();
        let (mut writer, _reader) = buffer.split();

        assert_eq!(writer.append(&[1]), Err(Error::Unconfigured));
        assert_eq!(writer.set_output_size(0), Err(Error::Empty));
        assert_eq!(writer.set_output_size(7), Err(Error::Capacity(7)));
        assert_eq!(writer.output_size(), 0);

        writer.set_output_size(6).unwrap();
        writer.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(writer.append(&[5, 6, 7]), Err(Error::Overflow));
        assert_eq!(writer.append(&[5, 6]), Ok(true));
    }

    #[test]
    fn single_sample_frames() {
        let mut buffer = FrameBuffer::<4>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(1).unwrap();

        for sample in 0..4 {
            assert_eq!(writer.append(&[sample]), Ok(true));
            assert_eq!(frames(&mut reader), Some(vec![sample]));
        }
    }

    #[test]
    fn overwrite_untaken() {
        let mut buffer = FrameBuffer::<4>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(2).unwrap();

        writer.append(&[1, 2]).unwrap();
        writer.append(&[3, 4]).unwrap();
        assert_eq!(writer.overruns(), 1);
        assert_eq!(frames(&mut reader), Some(vec![3, 4]));
        assert_eq!(frames(&mut reader), None);
    }

    #[test]
    fn complete_while_reading() {
        let mut buffer = FrameBuffer::<4>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(2).unwrap();
        writer.append(&[1, 2]).unwrap();

        // The sampler preempts the main loop while it streams.
        let streamed = reader.take_ready(|samples| {
            let before = samples.to_vec();
            assert_eq!(writer.append(&[3, 4]), Ok(false));
            assert_eq!(samples, &before[..]);
            before
        });
        assert_eq!(streamed, Some(vec![1, 2]));
        assert_eq!(reader.overruns(), 1);
        assert!(!reader.is_ready());

        assert_eq!(writer.append(&[5, 6]), Ok(true));
        assert_eq!(frames(&mut reader), Some(vec![5, 6]));
    }

    #[test]
    fn reset_clears_state() {
        let mut buffer = FrameBuffer::<4>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(2).unwrap();
        writer.append(&[1, 2]).unwrap();
        writer.append(&[3]).unwrap();

        writer.reset();
        assert!(!reader.is_ready());
        assert!(writer.is_frame_start());
        assert_eq!(writer.output_size(), 0);
        assert_eq!(writer.append(&[4]), Err(Error::Unconfigured));

        // Reset is idempotent.
        writer.reset();
        writer.set_output_size(2).unwrap();
        writer.append(&[5, 6]).unwrap();
        assert_eq!(frames(&mut reader), Some(vec![5, 6]));
    }

    #[test]
    fn reset_while_reading() {
        let mut buffer = FrameBuffer::<4>::new();
        let (mut writer, mut reader) = buffer.split();
        writer.set_output_size(2).unwrap();
        writer.append(&[1, 2]).unwrap();

        reader.take_ready(|samples| {
            writer.reset();
            writer.set_output_size(2).unwrap();
            assert_eq!(writer.append(&[7, 8]), Ok(false));
            assert_eq!(samples, &[1u16, 2][..]);
        });

        writer.append(&[9, 10]).unwrap();
        assert_eq!(frames(&mut reader), Some(vec![9, 10]));
    }
}
