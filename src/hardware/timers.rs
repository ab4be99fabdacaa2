//! The sampling timer generates one interrupt per sample group.
use fugit::HertzU32;

use super::hal::{self, prelude::*, timer};
use crate::sampler::Ticker;

/// TIM2 in periodic update mode.
pub struct SampleTimer {
    timer: timer::Timer<hal::stm32::TIM2>,
}

impl SampleTimer {
    /// Construct a stopped sampling timer.
    pub fn new(mut timer: timer::Timer<hal::stm32::TIM2>) -> Self {
        timer.pause();
        timer.reset_counter();
        timer.clear_irq();
        timer.listen(timer::Event::TimeOut);
        Self { timer }
    }

    /// Acknowledge the update interrupt.
    pub fn clear_irq(&mut self) {
        self.timer.clear_irq();
    }
}

impl Ticker for SampleTimer {
    fn start(&mut self, rate: HertzU32) {
        self.timer.clear_irq();
        self.timer.start(rate);
    }

    fn stop(&mut self) {
        self.timer.pause();
        self.timer.reset_counter();
        self.timer.clear_irq();
    }
}
