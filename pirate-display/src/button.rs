//! Button debouncing.
//!
//! The GPIO edge interrupt only tells the driver that *something* changed. Each debounce pass
//! then samples every pin at [SAMPLE_INTERVAL] until it has read the same level
//! [STABLE_SAMPLES] times in a row, and turns that stable level into press, hold-repeat and
//! release events. An edge while a pass is waiting between samples means a pin is still bouncing,
//! so every pin not yet classified starts counting again.

use std::fmt;
use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin as _;

use crate::{log::trace, signal::Interrupt, st7789::Rotation, ButtonHw};

/// Consecutive identical raw samples needed to classify a pin.
pub const STABLE_SAMPLES: u8 = 4;
/// Time between raw samples of a pin that isn't classified yet.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(5);
/// The most physical pins a [PinMap] holds.
pub const MAX_PINS: usize = 8;

/// BCM pin numbers on the Pirate Audio board.
pub mod pins {
    pub const DCX: u8 = 9;
    pub const BACKLIGHT: u8 = 13;
    pub const BUTTON_A: u8 = 5;
    pub const BUTTON_B: u8 = 6;
    pub const BUTTON_X: u8 = 16;
    pub const BUTTON_Y: u8 = 20;
    /// Y moved here on boards made after 23 January 2020.
    pub const BUTTON_Y2: u8 = 24;
}

/// The logical buttons, named after their labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
}

impl Button {
    pub const fn name(self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
        }
    }

    /// The button found at this button's position once the board is turned to `rotation`.
    ///
    /// A is top left, B bottom left, X top right, Y bottom right. A quarter turn moves each
    /// corner to the next one counter-clockwise.
    pub const fn rotated(self, rotation: Rotation) -> Button {
        match rotation {
            Rotation::Deg0 => self,
            Rotation::Deg90 => match self {
                Button::A => Button::B,
                Button::B => Button::Y,
                Button::Y => Button::X,
                Button::X => Button::A,
            },
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What happened to a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Release = 0,
    Press = 1,
    /// Still held, one repeat delay after the press or the previous repeat.
    Repeat = 2,
}

impl Action {
    /// The numeric event code: 0 release, 1 press, 2 hold-repeat.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Maps physical pins to logical buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    entries: heapless::Vec<(u8, Button), MAX_PINS>,
}

impl PinMap {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// The Pirate Audio wiring, including both pins Y has used.
    pub fn pirate_audio() -> Self {
        let mut map = Self::new();
        for (pin, button) in [
            (pins::BUTTON_A, Button::A),
            (pins::BUTTON_B, Button::B),
            (pins::BUTTON_X, Button::X),
            (pins::BUTTON_Y, Button::Y),
            (pins::BUTTON_Y2, Button::Y),
        ] {
            map = map.with(pin, button);
        }
        map
    }

    /// Maps `pin` to `button`, replacing any previous mapping for `pin`.
    ///
    /// Returns `false` if the map is already full.
    pub fn insert(&mut self, pin: u8, button: Button) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == pin) {
            entry.1 = button;
            return true;
        }
        self.entries.push((pin, button)).is_ok()
    }

    /// Builder-style [PinMap::insert]. Mappings beyond [MAX_PINS] are dropped.
    pub fn with(mut self, pin: u8, button: Button) -> Self {
        self.insert(pin, button);
        self
    }

    pub fn button(&self, pin: u8) -> Option<Button> {
        self.entries
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, button)| *button)
    }

    pub fn pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|(pin, _)| *pin)
    }

    /// The map for a board turned to `rotation`: same pins, permuted buttons.
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let mut entries = self.entries.clone();
        for (_, button) in entries.iter_mut() {
            *button = button.rotated(rotation);
        }
        Self { entries }
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::pirate_audio()
    }
}

/// Raw sample classification for one pin during one debounce pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
    /// Not sampled yet this pass.
    #[default]
    Unknown,
    /// The last `run` samples all read `pressed`, but not enough of them yet.
    Settling { pressed: bool, run: u8 },
    StablyPressed,
    StablyReleased,
}

impl Debounce {
    /// Feeds one raw sample. Classified pins ignore further samples.
    pub fn sample(self, pressed: bool) -> Self {
        let run = match self {
            Debounce::Unknown => 1,
            Debounce::Settling { pressed: previous, run } if previous == pressed => run + 1,
            Debounce::Settling { .. } => 1,
            classified => return classified,
        };
        if run < STABLE_SAMPLES {
            Debounce::Settling { pressed, run }
        } else if pressed {
            Debounce::StablyPressed
        } else {
            Debounce::StablyReleased
        }
    }

    /// `Some(pressed)` once the pin is classified.
    pub fn decision(self) -> Option<bool> {
        match self {
            Debounce::StablyPressed => Some(true),
            Debounce::StablyReleased => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct PinState {
    pin: u8,
    button: Button,
    /// When the current press or its latest repeat was accepted; `None` while released.
    pressed_since: Option<Instant>,
}

/// Turns raw pin levels into button events.
///
/// Only the driver thread touches this, so it needs no locking.
pub struct Debouncer {
    pins: heapless::Vec<PinState, MAX_PINS>,
    repeat_delay: Duration,
    samplers: Vec<Debounce>,
}

impl Debouncer {
    /// Creates a debouncer for the pins in `map`, with all buttons released.
    pub fn new(map: &PinMap, repeat_delay: Duration) -> Self {
        // Same capacity as the map, so this never overflows.
        let pins = map
            .entries
            .iter()
            .map(|&(pin, button)| PinState {
                pin,
                button,
                pressed_since: None,
            })
            .collect();
        Self {
            pins,
            repeat_delay,
            samplers: Vec::new(),
        }
    }

    pub fn repeat_delay(&self) -> Duration {
        self.repeat_delay
    }

    pub fn is_pressed(&self, pin: u8) -> bool {
        self.pins
            .iter()
            .any(|state| state.pin == pin && state.pressed_since.is_some())
    }

    /// Applies a stable classification of `pin` observed at `now`, returning the event it
    /// causes, if any.
    pub fn set(&mut self, pin: u8, pressed: bool, now: Instant) -> Option<(Button, Action)> {
        let repeat_delay = self.repeat_delay;
        let state = self.pins.iter_mut().find(|state| state.pin == pin)?;
        let action = match (pressed, state.pressed_since) {
            (false, None) => return None,
            (false, Some(_)) => {
                state.pressed_since = None;
                Action::Release
            }
            (true, Some(since)) if now.saturating_duration_since(since) < repeat_delay => {
                return None;
            }
            (true, since) => {
                state.pressed_since = Some(now);
                if since.is_some() {
                    Action::Repeat
                } else {
                    Action::Press
                }
            }
        };
        Some((state.button, action))
    }

    /// When the earliest held button is due its next repeat.
    pub fn next_repeat_deadline(&self) -> Option<Instant> {
        self.pins
            .iter()
            .filter_map(|state| state.pressed_since?.checked_add(self.repeat_delay))
            .min()
    }

    /// Runs one debounce pass: samples every input until each is classified, calling `emit` for
    /// every resulting event as soon as its pin is classified.
    ///
    /// Between sampling rounds the pass waits on `interrupt` instead of sleeping. If it fires,
    /// unclassified pins restart their count. The interrupt is left set when the pass returns, so
    /// an edge on a pin classified earlier in the pass still gets a pass of its own.
    pub fn pass<B: ButtonHw>(
        &mut self,
        hw: &mut B,
        interrupt: &Interrupt,
        mut emit: impl FnMut(Button, Action),
    ) -> Result<(), B::Error> {
        let count = hw.inputs().len();
        self.samplers.clear();
        self.samplers.resize(count, Debounce::Unknown);

        let mut edge_seen = false;
        let result = self.sample_until_stable(hw, interrupt, &mut edge_seen, &mut emit);
        if edge_seen {
            interrupt.set();
        }
        result
    }

    fn sample_until_stable<B: ButtonHw>(
        &mut self,
        hw: &mut B,
        interrupt: &Interrupt,
        edge_seen: &mut bool,
        emit: &mut impl FnMut(Button, Action),
    ) -> Result<(), B::Error> {
        loop {
            let mut undecided = 0;
            for (index, (pin, input)) in hw.inputs().iter_mut().enumerate() {
                let sampler = &mut self.samplers[index];
                if sampler.decision().is_some() {
                    continue;
                }
                *sampler = sampler.sample(input.is_low()?);
                match sampler.decision() {
                    Some(pressed) => {
                        if let Some((button, action)) = self.set(*pin, pressed, Instant::now()) {
                            trace!("Button {} on pin {}: {:?}", button, pin, action);
                            emit(button, action);
                        }
                    }
                    None => undecided += 1,
                }
            }
            if undecided == 0 {
                return Ok(());
            }
            if interrupt.wait(Some(SAMPLE_INTERVAL)) {
                interrupt.clear();
                *edge_seen = true;
                trace!("Edge during debounce pass, restarting {} pins", undecided);
                for sampler in self.samplers.iter_mut() {
                    if sampler.decision().is_none() {
                        *sampler = Debounce::Unknown;
                    }
                }
            }
        }
    }
}
