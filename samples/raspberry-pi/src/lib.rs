use std::convert::Infallible;

use thiserror::Error as ThisError;

pub mod hw;

pub use hw::{PanelSpiError, PiButtons, PiDisplayHw};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("SPI error: {0}")]
    Spi(#[from] PanelSpiError),
    #[error("failed to open SPI: {0}")]
    SpiOpen(#[from] rppal::spi::Error),
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error(transparent)]
    Driver(#[from] pirate_display::Error),
}

impl From<Infallible> for Error {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}
