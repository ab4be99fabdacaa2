//! Basic blocking delay
//!
//! The ADC needs a delay provider while powering up its regulator during setup. Nothing else
//! blocks on time.
use embedded_hal_02::blocking::delay::{DelayMs, DelayUs};

/// A busy-wait delay counting core cycles.
pub struct AsmDelay {
    cycles_per_us: u32,
}

impl AsmDelay {
    /// Create a new delay.
    ///
    /// # Args
    /// * `core_frequency` - The CPU core frequency in Hz.
    pub fn new(core_frequency: u32) -> AsmDelay {
        AsmDelay {
            cycles_per_us: core_frequency / 1_000_000,
        }
    }
}

impl<U> DelayUs<U> for AsmDelay
where
    U: Into<u32>,
{
    fn delay_us(&mut self, us: U) {
        cortex_m::asm::delay(self.cycles_per_us * us.into())
    }
}

impl<U> DelayMs<U> for AsmDelay
where
    U: Into<u32>,
{
    fn delay_ms(&mut self, ms: U) {
        for _ in 0..ms.into() {
            self.delay_us(1_000u32);
        }
    }
}
