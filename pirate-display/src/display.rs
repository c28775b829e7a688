use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{
    buffer::FrameBuffer,
    button::{Action, Button, Debouncer},
    config::Config,
    driver::{Driver, Shared},
    error::Error,
    log::{debug, warn_log},
    st7789::{Rotation, St7789},
    timer::{TimerId, Timers},
    ButtonHw, DisplayHw,
};

/// Receives debounced button events on the driver thread.
pub type ButtonHandler = Arc<dyn Fn(Button, Action) + Send + Sync>;

/// The Pirate Audio board: its display plus a thread that debounces the buttons and runs timers.
///
/// Display calls run on the caller's thread. Button handlers and timer callbacks all run on the
/// driver thread, one at a time, so code reacting to them never races itself.
///
/// Dropping the value stops and joins the driver thread; use [PirateDisplay::close] to see
/// whether it failed.
pub struct PirateDisplay<HW: DisplayHw, B: ButtonHw> {
    panel: St7789<HW>,
    config: Config,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Result<(), B::Error>>>,
}

impl<HW, B> PirateDisplay<HW, B>
where
    HW: DisplayHw,
    B: ButtonHw + Send + 'static,
    B::Error: Send + 'static,
{
    /// Resets the display (leaving it asleep) and starts the driver thread.
    pub fn new(display_hw: HW, buttons: B, config: Config) -> Result<Self, HW::Error> {
        let panel = St7789::init(display_hw, config.rotation())?;

        let shared = Arc::new(Shared::new());
        let debouncer = Debouncer::new(&config.pin_map(), config.repeat_delay());
        let driver = Driver::new(buttons, debouncer, shared.clone());
        let thread = thread::Builder::new()
            .name("pirate-buttons".into())
            .spawn(move || driver.run())
            .map_err(Error::Spawn)?;

        Ok(Self {
            panel,
            config,
            shared,
            thread: Some(thread),
        })
    }
}

impl<HW: DisplayHw, B: ButtonHw> PirateDisplay<HW, B> {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rotation(&self) -> Rotation {
        self.panel.rotation()
    }

    /// Writes a whole frame, see [St7789::show]. This doesn't wake the display.
    pub fn show(&mut self, pixels: &[u8]) -> Result<(), HW::Error> {
        self.panel.show(pixels)
    }

    pub fn show_buffer(&mut self, buffer: &FrameBuffer) -> Result<(), HW::Error> {
        self.panel.show_buffer(buffer)
    }

    pub fn sleep(&mut self) -> Result<(), HW::Error> {
        self.panel.sleep()
    }

    pub fn wake(&mut self) -> Result<(), HW::Error> {
        self.panel.wake()
    }

    pub fn is_sleeping(&self) -> bool {
        self.panel.is_sleeping()
    }

    pub fn backlight(&mut self, on: bool) -> Result<(), HW::Error> {
        self.panel.backlight(on)
    }

    /// Sends a raw controller command.
    pub fn command(&mut self, command: u8, data: &[u8]) -> Result<(), HW::Error> {
        self.panel.send_raw(command, data)
    }

    /// Replaces the button handler. Events already being delivered finish with the old one.
    pub fn set_button_event_handler<F>(&self, handler: F)
    where
        F: Fn(Button, Action) + Send + Sync + 'static,
    {
        debug!("Button handler replaced");
        self.shared.set_handler(Some(Arc::new(handler)));
    }

    pub fn clear_button_event_handler(&self) {
        self.shared.set_handler(None);
    }

    /// A handle for scheduling timers from other threads or from callbacks.
    pub fn timers(&self) -> Timers {
        self.shared.timers.clone()
    }

    /// See [Timers::add_timer].
    pub fn add_timer<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.timers.add_timer(delay, callback)
    }

    /// See [Timers::add_recurrent_timer].
    pub fn add_recurrent_timer<F>(&self, interval: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.timers.add_recurrent_timer(interval, callback)
    }

    pub fn cancel_timer(&self, id: TimerId) {
        self.shared.timers.cancel_timer(id)
    }

    /// See [Timers::reset_timer].
    pub fn reset_timer<F>(&self, id: TimerId, delay: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.timers.reset_timer(id, delay, callback)
    }

    /// See [Timers::reset_recurrent_timer].
    pub fn reset_recurrent_timer<F>(&self, id: TimerId, interval: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.timers.reset_recurrent_timer(id, interval, callback)
    }

    pub fn clear_timers(&self) {
        self.shared.timers.clear_timers()
    }

    /// Whether the driver thread is still running. It stops early only if reading a button fails.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the driver thread and returns the error that ended it, if any.
    ///
    /// The display is left in whatever power state it was in.
    pub fn close(mut self) -> Result<(), B::Error> {
        self.stop_driver()
    }

    fn stop_driver(&mut self) -> Result<(), B::Error> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.shared.request_stop();
        match thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::DriverStopped.into()),
        }
    }
}

impl<HW: DisplayHw, B: ButtonHw> Drop for PirateDisplay<HW, B> {
    fn drop(&mut self) {
        if let Err(error) = self.stop_driver() {
            warn_log!("Button driver failed: {}", error);
        }
    }
}
