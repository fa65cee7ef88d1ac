//! Raspberry Pi GPIO lines via rppal.
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tensile_traits::{InputLine, OutputLine};

use crate::error::{HwError, Result};

pub struct GpioInput(InputPin);

impl InputLine for GpioInput {
    #[inline]
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

pub struct GpioOutput(OutputPin);

impl OutputLine for GpioOutput {
    #[inline]
    fn set_high(&mut self) {
        self.0.set_high();
    }
    #[inline]
    fn set_low(&mut self) {
        self.0.set_low();
    }
}

/// Open `pin` as a floating input (the HX711 drives DT push-pull).
pub fn open_input(gpio: &Gpio, pin: u8) -> Result<GpioInput> {
    let p = gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("open input pin {pin}: {e}")))?;
    Ok(GpioInput(p.into_input()))
}

/// Open `pin` as an output driven low.
pub fn open_output(gpio: &Gpio, pin: u8) -> Result<GpioOutput> {
    let p = gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("open output pin {pin}: {e}")))?;
    Ok(GpioOutput(p.into_output_low()))
}

pub fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}
