//! Analog inputs on ADC1
//!
//! Channels are converted one after another on every sampling tick, in the order A0, A1, A2 of
//! the Arduino header. Each conversion completes in a fixed number of ADC clock cycles.
use embedded_hal_02::adc::OneShot;

use super::hal::{
    self,
    gpio::{
        gpioa::PA3,
        gpioc::{PC0, PC3},
        Analog,
    },
};
use crate::design_parameters::CHANNEL_COUNT;
use crate::sample_source::AnalogInputs;

pub struct AnalogChannels {
    adc: hal::adc::Adc<hal::stm32::ADC1, hal::adc::Enabled>,
    pins: (PA3<Analog>, PC0<Analog>, PC3<Analog>),
    resolution: u32,
}

impl AnalogChannels {
    /// Construct the analog inputs.
    ///
    /// # Args
    /// * `adc` - The calibrated and enabled ADC.
    /// * `pins` - The A0, A1 and A2 input pins.
    /// * `resolution` - The number of bits the ADC was configured to convert.
    pub fn new(
        adc: hal::adc::Adc<hal::stm32::ADC1, hal::adc::Enabled>,
        pins: (PA3<Analog>, PC0<Analog>, PC3<Analog>),
        resolution: u32,
    ) -> Self {
        Self {
            adc,
            pins,
            resolution,
        }
    }
}

impl AnalogInputs<CHANNEL_COUNT> for AnalogChannels {
    fn resolution(&self) -> u32 {
        self.resolution
    }

    fn convert(&mut self) -> [u16; CHANNEL_COUNT] {
        // Note(unwrap): Single conversions on an enabled ADC cannot fail.
        let a0: u32 = nb::block!(self.adc.read(&mut self.pins.0)).unwrap();
        let a1: u32 = nb::block!(self.adc.read(&mut self.pins.1)).unwrap();
        let a2: u32 = nb::block!(self.adc.read(&mut self.pins.2)).unwrap();
        [a0 as u16, a1 as u16, a2 as u16]
    }
}
