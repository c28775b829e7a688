use embedded_hal::{digital::OutputPin as _, spi::SpiDevice as _};

use crate::{log::trace, DisplayHw};

/// Provides the ability to send <command> then <data> style communications.
pub(crate) trait CommandDataSend: DisplayHw {
    /// Sends the command byte with D/CX low, then the data (if any) with D/CX high.
    ///
    /// The controller needs ~10ns of D/CX setup time, which any host is too slow to violate, so
    /// no delay is added.
    fn send(&mut self, command: u8, data: &[u8]) -> Result<(), Self::Error>;
}

impl<HW: DisplayHw> CommandDataSend for HW {
    fn send(&mut self, command: u8, data: &[u8]) -> Result<(), HW::Error> {
        trace!("Sending ST7789 command: {:#04x} ({} data bytes)", command, data.len());

        self.dc().set_low()?;
        self.spi().write(&[command])?;

        if !data.is_empty() {
            self.dc().set_high()?;
            self.spi().write(data)?;
        }

        Ok(())
    }
}
