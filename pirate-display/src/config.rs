use std::time::Duration;

use crate::{button::PinMap, st7789::Rotation, st7789::RECOMMENDED_SPI_HZ};

/// Construction-time settings for [crate::PirateDisplay].
///
/// ```
/// use pirate_display::{Config, Rotation};
///
/// let config = Config::default().with_rotation(Rotation::Deg90).with_repeat_hz(4.0);
/// assert_eq!(config.repeat_delay(), std::time::Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    rotation: Rotation,
    repeat_hz: f32,
    spi_hz: u32,
    /// The unrotated layout. [Config::pin_map] applies the rotation on top.
    pin_map: PinMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rotation: Rotation::default(),
            repeat_hz: 3.0,
            spi_hz: RECOMMENDED_SPI_HZ,
            pin_map: PinMap::pirate_audio(),
        }
    }
}

impl Config {
    /// Sets the rotation. The pin map follows it, whichever order the setters are called in.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// How often a held button repeats, in repeats per second.
    pub fn with_repeat_hz(mut self, repeat_hz: f32) -> Self {
        self.repeat_hz = repeat_hz;
        self
    }

    /// The SPI clock the hardware binding should configure. The driver never changes it.
    pub fn with_spi_hz(mut self, spi_hz: u32) -> Self {
        self.spi_hz = spi_hz;
        self
    }

    /// Uses a custom pin map, given in the unrotated layout.
    pub fn with_pin_map(mut self, pin_map: PinMap) -> Self {
        self.pin_map = pin_map;
        self
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn repeat_hz(&self) -> f32 {
        self.repeat_hz
    }

    pub fn spi_hz(&self) -> u32 {
        self.spi_hz
    }

    /// Pin numbers to logical buttons, permuted for the configured rotation.
    pub fn pin_map(&self) -> PinMap {
        self.pin_map.rotated(self.rotation)
    }

    /// The hold time between repeats. A rate of zero or less disables repeats.
    pub fn repeat_delay(&self) -> Duration {
        if self.repeat_hz <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f32(1.0 / self.repeat_hz).unwrap_or(Duration::MAX)
    }
}
