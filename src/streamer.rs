//! Link output
//!
//! # Design
//! The main loop is the only writer on the link. It forwards queued reply lines and completed
//! frames in the order the host needs them: the acknowledgment of a configuration always precedes
//! the first frame of that configuration. Nothing here waits for a frame to complete.
use heapless::spsc::Consumer;
use link::Reply;

use crate::design_parameters::REPLY_QUEUE_DEPTH;
use crate::frame_buffer::FrameReader;

pub struct Streamer<'a> {
    replies: Consumer<'a, Reply, REPLY_QUEUE_DEPTH>,
    overruns: u32,
}

fn flush_replies<W: embedded_io::Write>(
    replies: &mut Consumer<'_, Reply, REPLY_QUEUE_DEPTH>,
    writer: &mut W,
) -> Result<bool, W::Error> {
    let mut written = false;
    while let Some(reply) = replies.dequeue() {
        reply.write(writer)?;
        written = true;
    }
    Ok(written)
}

impl<'a> Streamer<'a> {
    pub fn new(replies: Consumer<'a, Reply, REPLY_QUEUE_DEPTH>) -> Self {
        Self {
            replies,
            overruns: 0,
        }
    }

    /// Forward pending output to the link.
    ///
    /// # Args
    /// * `reader` - The streaming side of the frame buffer.
    /// * `writer` - The link transmitter.
    ///
    /// # Returns
    /// True if anything was written. At most one frame is written per call.
    pub fn poll<W: embedded_io::Write, const CAP: usize>(
        &mut self,
        reader: &mut FrameReader<'_, CAP>,
        writer: &mut W,
    ) -> Result<bool, W::Error> {
        let mut written = flush_replies(&mut self.replies, writer)?;

        let replies = &mut self.replies;
        let frame = reader.take_ready(|samples| {
            // An acknowledgment queued after the check above still belongs before its frames.
            flush_replies(replies, writer)?;
            link::write_frame(writer, samples)
        });
        if let Some(result) = frame {
            result?;
            written = true;
        }

        let overruns = reader.overruns();
        if overruns != self.overruns {
            log::warn!("Frame overruns: {overruns}");
            self.overruns = overruns;
        }

        Ok(written)
    }
}
