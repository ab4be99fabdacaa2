//! Multi-channel serial data acquisition
//!
//! The host configures a sampling frequency over the serial link. The firmware then samples the
//! analog inputs at that rate and streams frames of interleaved samples until the host resets it.
//! See the `link` crate for the wire protocol.
//!
//! # Tasks
//! * `sample` (TIM2, highest priority): one sample group per timer tick into the frame buffer.
//! * `receive` (USART3): assembles host commands and queues them.
//! * `handle`: applies queued commands in order. Pended from `receive`.
//! * `blink`: error indicator pattern while halted.
//! * `idle`: writes replies and completed frames to the link.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(not(target_os = "none"))]
fn main() {
    let settings = daq::settings::Settings::new(false);
    println!("{}", serde_json::to_string_pretty(&settings).unwrap());
}

#[cfg(target_os = "none")]
#[rtic::app(device = daq::hardware::hal::stm32, peripherals = true, dispatchers=[DCMI, JPEG])]
mod app {
    use heapless::spsc::{Consumer, Producer, Queue};
    use rtic_monotonics::Monotonic;

    use daq::{
        configuration::{Controller, Event, Receiver},
        design_parameters::{
            BUFFER_SIZE, ERROR_BLINK_PERIOD, EVENT_QUEUE_DEPTH,
            REPLY_QUEUE_DEPTH,
        },
        frame_buffer::{FrameBuffer, FrameReader},
        hardware::{
            self, hal, AnalogChannels, SampleTimer, SerialRx, SerialTx,
            StatusPin, Systick,
        },
        sample_source::Source,
        sampler::Sampler,
        streamer::Streamer,
    };
    use link::Reply;

    type DaqSampler =
        Sampler<'static, Source<AnalogChannels>, SampleTimer, BUFFER_SIZE>;

    #[shared]
    struct Shared {
        sampler: DaqSampler,
        controller: Controller<'static, StatusPin>,
    }

    #[local]
    struct Local {
        rx: SerialRx,
        receiver: Receiver,
        events: Producer<'static, Event, EVENT_QUEUE_DEPTH>,
        pending: Consumer<'static, Event, EVENT_QUEUE_DEPTH>,
        tx: SerialTx,
        reader: FrameReader<'static, BUFFER_SIZE>,
        streamer: Streamer<'static>,
    }

    #[init(local = [
        buffer: FrameBuffer<BUFFER_SIZE> = FrameBuffer::new(),
        replies: Queue<Reply, REPLY_QUEUE_DEPTH> = Queue::new(),
        events: Queue<Event, EVENT_QUEUE_DEPTH> = Queue::new(),
    ])]
    fn init(c: init::Context) -> (Shared, Local) {
        let devices = hardware::setup(c.core, c.device);

        let (writer, reader) = c.local.buffer.split();
        let (reply_producer, reply_consumer) = c.local.replies.split();
        let (events, pending) = c.local.events.split();

        let shared = Shared {
            sampler: Sampler::new(devices.source, writer, devices.timer),
            controller: Controller::new(devices.indicators, reply_producer),
        };

        let local = Local {
            rx: devices.rx,
            receiver: Receiver::default(),
            events,
            pending,
            tx: devices.tx,
            reader,
            streamer: Streamer::new(reply_consumer),
        };

        log::info!("Waiting for configuration");

        (shared, local)
    }

    #[idle(local=[reader, streamer, tx])]
    fn idle(c: idle::Context) -> ! {
        loop {
            match c.local.streamer.poll(c.local.reader, c.local.tx) {
                Ok(true) => {}
                Ok(false) => cortex_m::asm::wfi(),
                Err(e) => log::warn!("Link write failed: {e:?}"),
            }
        }
    }

    #[task(binds = TIM2, priority = 3, shared=[sampler])]
    fn sample(mut c: sample::Context) {
        let now = Systick::now().ticks();
        c.shared.sampler.lock(|sampler| {
            sampler.ticker_mut().clear_irq();
            // A tick left pending across a stop finds no frame size and is dropped.
            sampler.sample(now).ok();
        });
    }

    #[task(binds = USART3, priority = 2, local=[rx, receiver, events])]
    fn receive(c: receive::Context) {
        loop {
            let byte = match c.local.rx.read() {
                Ok(Some(byte)) => byte,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Serial receive error: {e:?}");
                    break;
                }
            };

            if let Some(event) = c.local.receiver.handle(byte) {
                if c.local.events.enqueue(event).is_err() {
                    log::warn!("Command queue full, dropping {event:?}");
                }
                rtic::pend(hal::stm32::Interrupt::LTDC);
            }
        }
    }

    #[task(binds = LTDC, priority = 1, local=[pending], shared=[controller, sampler])]
    fn handle(mut c: handle::Context) {
        while let Some(event) = c.local.pending.dequeue() {
            let now = Systick::now().ticks();
            let result = (&mut c.shared.controller, &mut c.shared.sampler)
                .lock(|controller, sampler| {
                    controller.handle(&event, sampler, now)
                });

            if matches!(result, Err(ref e) if e.is_fatal()) {
                blink::spawn().ok();
            }
        }
    }

    #[task(priority = 1, shared=[controller])]
    async fn blink(mut c: blink::Context) {
        while c.shared.controller.lock(|controller| controller.blink()) {
            Systick::delay(ERROR_BLINK_PERIOD).await;
        }
    }
}
