//! The RP2350's own SAR ADC as a channel source.

use adc_sampler::ChannelSource;
use embedded_hal_0_2::adc::OneShot;
use rp235x_hal as hal;

use hal::adc::AdcPin;
use hal::gpio::bank0::{Gpio26, Gpio27, Gpio28};
use hal::gpio::{FunctionNull, Pin, PullDown};

type AnalogPin<I> = AdcPin<Pin<I, FunctionNull, PullDown>>;

/// The conversion could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct AdcFault;

/// ADC inputs 0-2 on GPIO26-28, in pin order.
pub struct OnboardAdc {
    adc: hal::Adc,
    ain0: AnalogPin<Gpio26>,
    ain1: AnalogPin<Gpio27>,
    ain2: AnalogPin<Gpio28>,
}

impl OnboardAdc {
    pub fn new(adc: hal::Adc, ain0: AnalogPin<Gpio26>, ain1: AnalogPin<Gpio27>, ain2: AnalogPin<Gpio28>) -> Self {
        Self { adc, ain0, ain1, ain2 }
    }
}

impl ChannelSource for OnboardAdc {
    type Error = AdcFault;

    fn channel_count(&self) -> usize {
        3
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, AdcFault> {
        let reading: nb::Result<u16, _> = match channel {
            0 => self.adc.read(&mut self.ain0),
            1 => self.adc.read(&mut self.ain1),
            _ => self.adc.read(&mut self.ain2),
        };
        reading.map_err(|e| e.map(|_| AdcFault))
    }
}
