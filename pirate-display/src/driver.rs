//! The driver thread: waits for a GPIO edge or the next deadline, fires timers, then debounces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::{
    button::Debouncer,
    display::ButtonHandler,
    log::{debug, trace},
    signal::Interrupt,
    timer::Timers,
    ButtonHw,
};

/// State shared between the facade and the driver thread.
pub(crate) struct Shared {
    pub interrupt: Interrupt,
    pub timers: Timers,
    handler: Mutex<Option<ButtonHandler>>,
    stop: AtomicBool,
}

impl Shared {
    pub fn new() -> Self {
        let interrupt = Interrupt::new();
        Self {
            timers: Timers::new(interrupt.clone()),
            interrupt,
            handler: Mutex::new(None),
            stop: AtomicBool::new(false),
        }
    }

    pub fn set_handler(&self, handler: Option<ButtonHandler>) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// The current handler. Cloned out so it never runs under the lock.
    pub fn handler(&self) -> Option<ButtonHandler> {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.interrupt.set();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

pub(crate) struct Driver<B: ButtonHw> {
    buttons: B,
    debouncer: Debouncer,
    shared: Arc<Shared>,
}

impl<B: ButtonHw> Driver<B> {
    pub fn new(buttons: B, debouncer: Debouncer, shared: Arc<Shared>) -> Self {
        Self {
            buttons,
            debouncer,
            shared,
        }
    }

    /// Runs until a stop is requested or a pin read fails.
    pub fn run(mut self) -> Result<(), B::Error> {
        self.buttons.listen(self.shared.interrupt.clone())?;
        debug!("Button driver started");
        while self.step()? {}
        debug!("Button driver stopped");
        Ok(())
    }

    /// One loop iteration. Returns `false` once a stop has been requested.
    pub fn step(&mut self) -> Result<bool, B::Error> {
        let timeout = self.timeout(Instant::now());
        trace!("Driver waiting {:?}", timeout);
        self.shared.interrupt.wait(timeout);
        // Edges from here on re-set the signal. The pass restarts on them or leaves them set.
        self.shared.interrupt.clear();

        if self.shared.stop_requested() {
            return Ok(false);
        }

        self.shared.timers.fire();

        let shared = &self.shared;
        self.debouncer.pass(&mut self.buttons, &shared.interrupt, |button, action| {
            if let Some(handler) = shared.handler() {
                handler(button, action);
            }
        })?;
        Ok(true)
    }

    /// How long to wait from `now`: until the earlier of the next hold-repeat and the next
    /// timer, or indefinitely if neither is pending.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        let repeat = self.debouncer.next_repeat_deadline();
        let timer = self.shared.timers.next_deadline();
        let deadline = match (repeat, timer) {
            (Some(repeat), Some(timer)) => Some(repeat.min(timer)),
            (deadline, None) | (None, deadline) => deadline,
        };
        deadline.map(|deadline| deadline.saturating_duration_since(now))
    }
}
