//! This crate drives the Pimoroni Pirate Audio board from a Raspberry Pi: its 240x240 ST7789
//! display and its four buttons.
//!
//! It is built on top of `embedded-hal` and `embedded-graphics`, so the driver itself knows
//! nothing about the Pi. A small binding (see `samples/raspberry-pi`) provides the SPI bus and
//! GPIO pins.
//!
//! ## Core traits
//!
//! - [`DisplayHw`]: the SPI device, the D/CX and backlight pins, and a delay used to talk to the
//!   display controller.
//! - [`ButtonHw`]: the button input pins, and the ability to raise an [`Interrupt`] on any edge
//!   of those pins.
//!
//! ## What you get
//!
//! - [`PirateDisplay`]: the facade the application holds. It can show a frame, sleep and wake
//!   the panel, deliver debounced button events, and run one-shot and recurring timers. Button
//!   and timer callbacks all run sequentially on one driver thread.
//! - [`st7789::St7789`]: the display controller on its own, if you don't need buttons.
//! - [`buffer::FrameBuffer`]: an `embedded-graphics` draw target in the controller's pixel format.
//! - [`button`] and [`timer`]: the debouncer and the timer set, usable without the thread.

use std::error::Error as StdError;

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, InputPin, OutputPin},
    spi::{ErrorType as SpiErrorType, SpiDevice},
};

pub mod buffer;
pub mod button;
pub mod config;
pub mod display;
pub mod signal;
pub mod st7789;
pub mod timer;

mod comms;
mod driver;
mod error;
mod log;
#[cfg(test)]
mod testing;

pub use button::{Action, Button, PinMap};
pub use config::Config;
pub use display::{ButtonHandler, PirateDisplay};
pub use error::Error;
pub use signal::Interrupt;
pub use st7789::Rotation;
pub use timer::{TimerId, Timers};

/// Provides access to the hardware needed to control the ST7789 display.
///
/// ```rust,ignore
/// use std::convert::Infallible;
///
/// use pirate_display::DisplayHw;
/// use rppal::gpio::OutputPin;
/// use rppal::hal::Delay;
/// use thiserror::Error as ThisError;
///
/// #[derive(Debug, ThisError)]
/// enum Error {
///     #[error("SPI error: {0}")]
///     Spi(#[from] PanelSpiError),
///     #[error(transparent)]
///     Driver(#[from] pirate_display::Error),
/// }
///
/// impl From<Infallible> for Error {
///     fn from(_: Infallible) -> Self {
///         // rppal output pins can't fail once configured.
///         unreachable!()
///     }
/// }
///
/// struct PiDisplayHw {
///     spi: PanelSpi,
///     dc: OutputPin,
///     backlight: OutputPin,
///     delay: Delay,
/// }
///
/// impl DisplayHw for PiDisplayHw {
///     type Spi = PanelSpi;
///     type Dc = OutputPin;
///     type Backlight = OutputPin;
///     type Delay = Delay;
///     type Error = Error;
///
///     fn spi(&mut self) -> &mut Self::Spi {
///         &mut self.spi
///     }
///
///     fn dc(&mut self) -> &mut Self::Dc {
///         &mut self.dc
///     }
///
///     fn backlight(&mut self) -> &mut Self::Backlight {
///         &mut self.backlight
///     }
///
///     fn delay(&mut self) -> &mut Self::Delay {
///         &mut self.delay
///     }
/// }
/// ```
pub trait DisplayHw {
    type Spi: SpiDevice;
    type Dc: OutputPin;
    type Backlight: OutputPin;
    type Delay: DelayNs;
    type Error: StdError
        + From<<Self::Spi as SpiErrorType>::Error>
        + From<<Self::Dc as PinErrorType>::Error>
        + From<<Self::Backlight as PinErrorType>::Error>
        + From<Error>;

    fn spi(&mut self) -> &mut Self::Spi;
    fn dc(&mut self) -> &mut Self::Dc;
    fn backlight(&mut self) -> &mut Self::Backlight;
    fn delay(&mut self) -> &mut Self::Delay;
}

/// Provides access to the button inputs.
///
/// The inputs are expected to be pulled up, with each button connecting its pin to ground, so a
/// low level means pressed. Each input is paired with its physical pin number, which is looked up
/// in the [PinMap] to find the logical [Button].
///
/// The value is moved onto the driver thread, so any interrupt registrations it holds are
/// released when the driver stops.
pub trait ButtonHw {
    type Input: InputPin;
    type Error: StdError + From<<Self::Input as PinErrorType>::Error> + From<Error>;

    /// The inputs to sample, with their physical pin numbers.
    fn inputs(&mut self) -> &mut [(u8, Self::Input)];

    /// Arranges for `interrupt` to be set on every rising or falling edge of every input.
    fn listen(&mut self, interrupt: Interrupt) -> Result<(), Self::Error>;
}
