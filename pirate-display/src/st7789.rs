use std::time::Duration;

use bitflags::bitflags;
use embedded_graphics::prelude::Size;
use embedded_hal::{delay::DelayNs as _, digital::OutputPin as _};

use crate::{
    buffer::FrameBuffer,
    comms::CommandDataSend as _,
    log::debug,
    DisplayHw, Error,
};

/// The width of the panel, in pixels.
pub const DISPLAY_WIDTH: u16 = 240;
/// The height of the panel, in pixels.
pub const DISPLAY_HEIGHT: u16 = 240;
/// Bytes sent per pixel under the 18-bit pixel format: one byte per channel, of which the
/// controller keeps the top 6 bits.
pub const BYTES_PER_PIXEL: usize = 3;
/// The exact length of a frame passed to [St7789::show].
pub const FRAME_LENGTH: usize = DISPLAY_WIDTH as usize * DISPLAY_HEIGHT as usize * BYTES_PER_PIXEL;
/// The minimal serial write cycle is 16ns (62.5MHz); stay a bit under that.
pub const RECOMMENDED_SPI_HZ: u32 = 60_000_000;
/// Time the controller needs after a software reset, when it was asleep.
pub const RESET_DELAY: Duration = Duration::from_millis(120);
/// Time the panel needs after leaving sleep mode.
pub const WAKE_DELAY: Duration = Duration::from_millis(120);
/// Time the supply voltage and clock need to stabilise after entering sleep mode.
pub const SLEEP_DELAY: Duration = Duration::from_millis(5);

/// Interface pixel format: 18 bits per pixel (6 per channel) for both the RGB and the control
/// interface.
const PIXEL_FORMAT_18BIT: u8 = 0x66;

/// Low-level commands for the ST7789. You probably want to use the methods on [St7789], but can
/// send commands directly with [St7789::send] for experimentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resets all registers to their defaults. Needs [RESET_DELAY] before the next command.
    SwReset = 0x01,
    /// Enters minimum power consumption mode. The panel keeps its frame memory.
    SleepIn = 0x10,
    /// Leaves sleep mode. Needs [WAKE_DELAY] before the next command.
    SleepOut = 0x11,
    /// Inverts the pixel data. The Pirate Audio panel needs this for correct colours.
    InversionOn = 0x21,
    /// Stops showing frame memory. The panel keeps its content.
    DisplayOff = 0x28,
    /// Shows frame memory.
    DisplayOn = 0x29,
    /// Sets the start and end column (inclusive) of the window for [Command::MemoryWrite].
    ColumnAddressSet = 0x2A,
    /// Sets the start and end row (inclusive) of the window for [Command::MemoryWrite].
    RowAddressSet = 0x2B,
    /// Writes pixel data into the window, starting from its top left.
    MemoryWrite = 0x2C,
    /// Sets scan direction and RGB order, see [Madctl].
    MemoryDataAccessControl = 0x36,
    /// Sets the pixel format.
    InterfacePixelFormat = 0x3A,
}

impl Command {
    /// Returns the register address for this command.
    pub fn register(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    /// Data for [Command::MemoryDataAccessControl].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Madctl: u8 {
        /// Page (row) address order: bottom to top.
        const MY = 0b1000_0000;
        /// Column address order: right to left.
        const MX = 0b0100_0000;
        /// Exchange rows and columns.
        const MV = 0b0010_0000;
        /// Refresh the panel bottom to top.
        const ML = 0b0001_0000;
        /// BGR rather than RGB subpixel order.
        const BGR = 0b0000_1000;
        /// Latch data right to left.
        const MH = 0b0000_0100;
    }
}

/// The orientation of the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    /// Buttons on the left and right edges, A top left.
    #[default]
    Deg0,
    /// The board turned a quarter counter-clockwise: A ends up bottom left.
    Deg90,
}

impl Rotation {
    /// The scan direction that keeps the image upright in this orientation.
    pub fn madctl(&self) -> Madctl {
        match self {
            Rotation::Deg0 => Madctl::empty(),
            Rotation::Deg90 => Madctl::MV | Madctl::MX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Asleep,
    Awake,
}

/// Creates a buffer matching the panel.
pub fn new_buffer() -> FrameBuffer {
    FrameBuffer::new(Size::new(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32))
}

/// Controls the ST7789 on the Pirate Audio board.
///
/// * [datasheet](https://www.rhydolabz.com/documents/33/ST7789.pdf)
///
/// Power transitions are kept apart from pixel writes, so a caller can write a frame while the
/// panel is asleep and then wake it, without ever showing stale content.
pub struct St7789<HW: DisplayHw> {
    hw: HW,
    rotation: Rotation,
    state: PowerState,
}

impl<HW: DisplayHw> St7789<HW> {
    /// Wraps the hardware without touching it. Call [St7789::reset] before anything else.
    pub fn new(hw: HW, rotation: Rotation) -> Self {
        St7789 {
            hw,
            rotation,
            state: PowerState::Asleep,
        }
    }

    /// Creates the driver and resets the controller.
    pub fn init(hw: HW, rotation: Rotation) -> Result<Self, HW::Error> {
        let mut display = Self::new(hw, rotation);
        display.reset()?;
        Ok(display)
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn power_state(&self) -> PowerState {
        self.state
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == PowerState::Asleep
    }

    /// Resets the controller and programs orientation, pixel format, inversion and the full
    /// panel window. Leaves the display asleep with the backlight off.
    pub fn reset(&mut self) -> Result<(), HW::Error> {
        debug!("Resetting ST7789 ({:?})", self.rotation);
        self.backlight(false)?;
        self.send(Command::SwReset, &[])?;
        self.delay(RESET_DELAY);

        self.send(
            Command::MemoryDataAccessControl,
            &[self.rotation.madctl().bits()],
        )?;
        self.send(Command::InterfacePixelFormat, &[PIXEL_FORMAT_18BIT])?;
        self.send(Command::InversionOn, &[])?;
        self.set_window(0, 0, DISPLAY_WIDTH - 1, DISPLAY_HEIGHT - 1)?;

        self.state = PowerState::Asleep;
        Ok(())
    }

    /// Turns the backlight off and puts the controller to sleep. Does nothing if it's asleep.
    pub fn sleep(&mut self) -> Result<(), HW::Error> {
        if self.state == PowerState::Asleep {
            return Ok(());
        }
        debug!("Sleeping ST7789");
        self.backlight(false)?;
        self.send(Command::DisplayOff, &[])?;
        self.send(Command::SleepIn, &[])?;
        self.delay(SLEEP_DELAY);
        self.state = PowerState::Asleep;
        Ok(())
    }

    /// Wakes the controller and turns the backlight on. Does nothing if it's awake.
    pub fn wake(&mut self) -> Result<(), HW::Error> {
        if self.state == PowerState::Awake {
            return Ok(());
        }
        debug!("Waking ST7789");
        self.send(Command::SleepOut, &[])?;
        self.delay(WAKE_DELAY);
        self.send(Command::DisplayOn, &[])?;
        // Some controller revisions drop inversion across a sleep cycle, and there's no way to
        // read it back.
        self.send(Command::InversionOn, &[])?;
        self.backlight(true)?;
        self.state = PowerState::Awake;
        Ok(())
    }

    /// Drives the backlight directly. This doesn't change the power state.
    pub fn backlight(&mut self, on: bool) -> Result<(), HW::Error> {
        if on {
            self.hw.backlight().set_high()?;
        } else {
            self.hw.backlight().set_low()?;
        }
        Ok(())
    }

    /// Writes a whole frame: [FRAME_LENGTH] bytes, row-major, R, G, B per pixel.
    ///
    /// This doesn't wake the display.
    pub fn show(&mut self, pixels: &[u8]) -> Result<(), HW::Error> {
        if pixels.len() != FRAME_LENGTH {
            return Err(Error::FrameLength {
                expected: FRAME_LENGTH,
                actual: pixels.len(),
            }
            .into());
        }
        self.send(Command::MemoryWrite, pixels)
    }

    /// Writes the buffer's contents, see [St7789::show].
    pub fn show_buffer(&mut self, buffer: &FrameBuffer) -> Result<(), HW::Error> {
        self.show(buffer.data())
    }

    /// Send the following command and data to the display.
    pub fn send(&mut self, command: Command, data: &[u8]) -> Result<(), HW::Error> {
        self.hw.send(command.register(), data)
    }

    /// Sends a raw command byte, for commands not covered by [Command].
    pub fn send_raw(&mut self, command: u8, data: &[u8]) -> Result<(), HW::Error> {
        self.hw.send(command, data)
    }

    /// Sets the inclusive window that [Command::MemoryWrite] fills.
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), HW::Error> {
        let [x0_high, x0_low] = x0.to_be_bytes();
        let [x1_high, x1_low] = x1.to_be_bytes();
        self.send(
            Command::ColumnAddressSet,
            &[x0_high, x0_low, x1_high, x1_low],
        )?;

        let [y0_high, y0_low] = y0.to_be_bytes();
        let [y1_high, y1_low] = y1.to_be_bytes();
        self.send(Command::RowAddressSet, &[y0_high, y0_low, y1_high, y1_low])
    }

    fn delay(&mut self, duration: Duration) {
        self.hw.delay().delay_ms(duration.as_millis() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDisplayHw, Op, TestError};

    fn command(register: u8) -> [Op; 2] {
        [Op::Dc(false), Op::Write(vec![register])]
    }

    fn command_with_data(register: u8, data: &[u8]) -> [Op; 4] {
        [
            Op::Dc(false),
            Op::Write(vec![register]),
            Op::Dc(true),
            Op::Write(data.to_vec()),
        ]
    }

    fn awake_display() -> St7789<FakeDisplayHw> {
        let mut display = St7789::init(FakeDisplayHw::new(), Rotation::Deg0).unwrap();
        display.wake().unwrap();
        display.hw.recorder.take();
        display
    }

    #[test]
    fn test_reset_sequence() {
        let display = St7789::init(FakeDisplayHw::new(), Rotation::Deg0).unwrap();

        let mut expected = vec![Op::Backlight(false)];
        expected.extend(command(0x01));
        expected.push(Op::DelayNs(120_000_000));
        expected.extend(command_with_data(0x36, &[0x00]));
        expected.extend(command_with_data(0x3A, &[0x66]));
        expected.extend(command(0x21));
        expected.extend(command_with_data(0x2A, &[0x00, 0x00, 0x00, 0xEF]));
        expected.extend(command_with_data(0x2B, &[0x00, 0x00, 0x00, 0xEF]));
        assert_eq!(display.hw.recorder.take(), expected);
        assert!(display.is_sleeping());
    }

    #[test]
    fn test_reset_with_rotation_sets_scan_direction() {
        let display = St7789::init(FakeDisplayHw::new(), Rotation::Deg90).unwrap();

        let ops = display.hw.recorder.take();
        let madctl = command_with_data(0x36, &[0x60]);
        assert!(ops.windows(4).any(|window| window == madctl));
    }

    #[test]
    fn test_sleep_is_idempotent() {
        let mut display = awake_display();

        display.sleep().unwrap();
        let mut expected = vec![Op::Backlight(false)];
        expected.extend(command(0x28));
        expected.extend(command(0x10));
        expected.push(Op::DelayNs(5_000_000));
        assert_eq!(display.hw.recorder.take(), expected);

        display.sleep().unwrap();
        assert_eq!(display.hw.recorder.take(), vec![]);
        assert!(display.is_sleeping());
    }

    #[test]
    fn test_wake_reasserts_inversion() {
        let mut display = awake_display();
        display.sleep().unwrap();
        display.hw.recorder.take();

        display.wake().unwrap();
        let mut expected = Vec::new();
        expected.extend(command(0x11));
        expected.push(Op::DelayNs(120_000_000));
        expected.extend(command(0x29));
        expected.extend(command(0x21));
        expected.push(Op::Backlight(true));
        assert_eq!(display.hw.recorder.take(), expected);
        assert_eq!(display.power_state(), PowerState::Awake);

        display.wake().unwrap();
        assert_eq!(display.hw.recorder.take(), vec![]);
    }

    #[test]
    fn test_show_writes_frame_without_waking() {
        let mut display = St7789::init(FakeDisplayHw::new(), Rotation::Deg0).unwrap();
        display.hw.recorder.take();

        let frame = vec![0xAB; FRAME_LENGTH];
        display.show(&frame).unwrap();

        assert_eq!(
            display.hw.recorder.take(),
            command_with_data(0x2C, &frame).to_vec()
        );
        assert!(display.is_sleeping());
    }

    #[test]
    fn test_show_rejects_wrong_length() {
        let mut display = St7789::init(FakeDisplayHw::new(), Rotation::Deg0).unwrap();
        display.hw.recorder.take();

        let result = display.show(&[0; 16]);

        assert!(matches!(
            result,
            Err(TestError::Driver(Error::FrameLength {
                expected: FRAME_LENGTH,
                actual: 16
            }))
        ));
        assert_eq!(display.hw.recorder.take(), vec![]);
    }

    #[test]
    fn test_backlight_does_not_change_power_state() {
        let mut display = St7789::init(FakeDisplayHw::new(), Rotation::Deg0).unwrap();
        display.hw.recorder.take();

        display.backlight(true).unwrap();

        assert_eq!(display.hw.recorder.take(), vec![Op::Backlight(true)]);
        assert!(display.is_sleeping());
    }
}
