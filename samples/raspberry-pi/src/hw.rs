use embedded_hal::delay::DelayNs as _;
use embedded_hal::spi::{self, ErrorKind, ErrorType as SpiErrorType, Operation, SpiDevice};
use pirate_display::{button::pins, ButtonHw, DisplayHw, Interrupt};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use rppal::hal::Delay;
use rppal::spi::Spi;
use thiserror::Error as ThisError;

use crate::Error;

/// The spidev driver rejects transfers larger than its buffer, 4096 bytes by default.
const SPIDEV_CHUNK: usize = 4096;

#[derive(Debug, ThisError)]
pub enum PanelSpiError {
    #[error(transparent)]
    Spi(#[from] rppal::spi::Error),
    #[error("the panel bus is write-only")]
    Unsupported,
    #[error("SPI wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

impl spi::Error for PanelSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// The display's SPI device. Chip select is handled by spidev, and frames are split to fit its
/// buffer.
pub struct PanelSpi {
    spi: Spi,
    delay: Delay,
}

impl PanelSpi {
    pub fn new(spi: Spi) -> Self {
        Self {
            spi,
            delay: Delay::new(),
        }
    }
}

/// Writes `bytes` in spidev-sized chunks, failing on the first chunk that isn't fully written.
fn write_chunked(
    bytes: &[u8],
    mut write: impl FnMut(&[u8]) -> Result<usize, rppal::spi::Error>,
) -> Result<(), PanelSpiError> {
    for chunk in bytes.chunks(SPIDEV_CHUNK) {
        let written = write(chunk)?;
        if written != chunk.len() {
            return Err(PanelSpiError::ShortWrite {
                written,
                expected: chunk.len(),
            });
        }
    }
    Ok(())
}

impl SpiErrorType for PanelSpi {
    type Error = PanelSpiError;
}

impl SpiDevice for PanelSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), PanelSpiError> {
        for operation in operations.iter() {
            match operation {
                Operation::Write(bytes) => write_chunked(bytes, |chunk| self.spi.write(chunk))?,
                Operation::DelayNs(ns) => self.delay.delay_ns(*ns),
                _ => return Err(PanelSpiError::Unsupported),
            }
        }
        Ok(())
    }
}

/// Defines the hardware to use for connecting to the display.
pub struct PiDisplayHw {
    spi: PanelSpi,
    dc: OutputPin,
    backlight: OutputPin,
    delay: Delay,
}

impl PiDisplayHw {
    pub fn new(gpio: &Gpio, spi: Spi) -> Result<Self, Error> {
        Ok(Self {
            spi: PanelSpi::new(spi),
            dc: gpio.get(pins::DCX)?.into_output_low(),
            backlight: gpio.get(pins::BACKLIGHT)?.into_output_low(),
            delay: Delay::new(),
        })
    }
}

impl DisplayHw for PiDisplayHw {
    type Spi = PanelSpi;

    type Dc = OutputPin;

    type Backlight = OutputPin;

    type Delay = Delay;

    type Error = Error;

    fn spi(&mut self) -> &mut Self::Spi {
        &mut self.spi
    }

    fn dc(&mut self) -> &mut Self::Dc {
        &mut self.dc
    }

    fn backlight(&mut self) -> &mut Self::Backlight {
        &mut self.backlight
    }

    fn delay(&mut self) -> &mut Self::Delay {
        &mut self.delay
    }
}

/// The button inputs, pulled up so a press reads low.
pub struct PiButtons {
    inputs: Vec<(u8, InputPin)>,
}

impl PiButtons {
    pub fn new(gpio: &Gpio, pins: impl IntoIterator<Item = u8>) -> Result<Self, Error> {
        let inputs = pins
            .into_iter()
            .map(|pin| -> Result<_, Error> { Ok((pin, gpio.get(pin)?.into_input_pullup())) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { inputs })
    }
}

impl ButtonHw for PiButtons {
    type Input = InputPin;

    type Error = Error;

    fn inputs(&mut self) -> &mut [(u8, Self::Input)] {
        &mut self.inputs
    }

    fn listen(&mut self, interrupt: Interrupt) -> Result<(), Error> {
        for (_, input) in self.inputs.iter_mut() {
            let interrupt = interrupt.clone();
            input.set_async_interrupt(Trigger::Both, None, move |_| interrupt.set())?;
        }
        Ok(())
    }
}
