//! Fake hardware for unit tests.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use embedded_hal::{
    delay::DelayNs,
    digital::{self, ErrorKind as PinErrorKind, ErrorType as PinErrorType, InputPin, OutputPin},
    spi::{ErrorType as SpiErrorType, Operation, SpiDevice},
};
use thiserror::Error as ThisError;

use crate::{ButtonHw, DisplayHw, Error, Interrupt};

/// One observable hardware interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Dc(bool),
    Backlight(bool),
    Write(Vec<u8>),
    DelayNs(u64),
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Op>>>);

impl Recorder {
    fn push(&self, op: Op) {
        self.0.lock().unwrap().push(op);
    }

    /// Returns everything recorded so far and starts afresh.
    pub fn take(&self) -> Vec<Op> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    /// Returns only the bytes written with D/CX low.
    pub fn commands(&self) -> Vec<u8> {
        let ops = self.0.lock().unwrap();
        let mut dc_high = true;
        let mut commands = Vec::new();
        for op in ops.iter() {
            match op {
                Op::Dc(level) => dc_high = *level,
                Op::Write(bytes) if !dc_high => commands.extend_from_slice(bytes),
                _ => {}
            }
        }
        commands
    }
}

#[derive(Debug, ThisError)]
pub enum TestError {
    #[error(transparent)]
    Driver(#[from] Error),
    #[error("pin fault")]
    Pin,
}

impl From<Infallible> for TestError {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

impl From<PinFault> for TestError {
    fn from(_: PinFault) -> Self {
        TestError::Pin
    }
}

pub struct FakeSpi(Recorder);

impl SpiErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        for operation in operations.iter() {
            if let Operation::Write(bytes) = operation {
                self.0.push(Op::Write(bytes.to_vec()));
            }
        }
        Ok(())
    }
}

pub struct FakeOutput {
    recorder: Recorder,
    op: fn(bool) -> Op,
}

impl PinErrorType for FakeOutput {
    type Error = Infallible;
}

impl OutputPin for FakeOutput {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.recorder.push((self.op)(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.recorder.push((self.op)(true));
        Ok(())
    }
}

/// Records requested delays without sleeping.
pub struct FakeDelay(Recorder);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms as u64 * 1_000_000);
    }
}

impl FakeDelay {
    fn record(&self, ns: u64) {
        self.0.push(Op::DelayNs(ns));
    }
}

pub struct FakeDisplayHw {
    pub recorder: Recorder,
    spi: FakeSpi,
    dc: FakeOutput,
    backlight: FakeOutput,
    delay: FakeDelay,
}

impl FakeDisplayHw {
    pub fn new() -> Self {
        let recorder = Recorder::default();
        Self {
            spi: FakeSpi(recorder.clone()),
            dc: FakeOutput { recorder: recorder.clone(), op: Op::Dc },
            backlight: FakeOutput { recorder: recorder.clone(), op: Op::Backlight },
            delay: FakeDelay(recorder.clone()),
            recorder,
        }
    }
}

impl DisplayHw for FakeDisplayHw {
    type Spi = FakeSpi;
    type Dc = FakeOutput;
    type Backlight = FakeOutput;
    type Delay = FakeDelay;
    type Error = TestError;

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

#[derive(Debug, Clone, Copy)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> PinErrorKind {
        PinErrorKind::Other
    }
}

#[derive(Debug)]
struct Script {
    queued: VecDeque<bool>,
    high: bool,
    fail: bool,
    reads: usize,
    raise: Option<(usize, Interrupt)>,
}

/// Shared control over a [FakeInput]: queue raw samples, hold a level, or inject a fault.
#[derive(Debug, Clone)]
pub struct InputControl(Arc<Mutex<Script>>);

impl InputControl {
    /// Queues raw readings, `true` being high (released). Once exhausted, reads return the held
    /// level.
    pub fn queue(&self, samples: &[bool]) {
        self.0.lock().unwrap().queued.extend(samples.iter().copied());
    }

    pub fn hold(&self, pressed: bool) {
        self.0.lock().unwrap().high = !pressed;
    }

    pub fn fail(&self) {
        self.0.lock().unwrap().fail = true;
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap().queued.len()
    }

    /// Successful reads so far.
    pub fn reads(&self) -> usize {
        self.0.lock().unwrap().reads
    }

    /// Sets `interrupt` as soon as the pin has been read `reads` times, as an edge would.
    pub fn raise_after(&self, reads: usize, interrupt: Interrupt) {
        self.0.lock().unwrap().raise = Some((reads, interrupt));
    }
}

pub struct FakeInput(InputControl);

impl FakeInput {
    fn read_high(&mut self) -> Result<bool, PinFault> {
        let mut script = (self.0).0.lock().unwrap();
        if script.fail {
            return Err(PinFault);
        }
        let high = script.high;
        let level = script.queued.pop_front().unwrap_or(high);
        script.reads += 1;
        if let Some((after, interrupt)) = &script.raise {
            if *after == script.reads {
                interrupt.set();
            }
        }
        Ok(level)
    }
}

impl PinErrorType for FakeInput {
    type Error = PinFault;
}

impl InputPin for FakeInput {
    fn is_high(&mut self) -> Result<bool, PinFault> {
        self.read_high()
    }

    fn is_low(&mut self) -> Result<bool, PinFault> {
        self.read_high().map(|high| !high)
    }
}

pub struct FakeButtons {
    inputs: Vec<(u8, FakeInput)>,
    pub listening: Arc<Mutex<Option<Interrupt>>>,
}

impl FakeButtons {
    /// Creates released inputs for the given pins, returning a control handle per pin.
    pub fn new(pins: &[u8]) -> (Self, Vec<InputControl>) {
        let mut inputs = Vec::new();
        let mut controls = Vec::new();
        for &pin in pins {
            let control = InputControl(Arc::new(Mutex::new(Script {
                queued: VecDeque::new(),
                high: true,
                fail: false,
                reads: 0,
                raise: None,
            })));
            inputs.push((pin, FakeInput(control.clone())));
            controls.push(control);
        }
        let buttons = Self {
            inputs,
            listening: Arc::new(Mutex::new(None)),
        };
        (buttons, controls)
    }
}

impl ButtonHw for FakeButtons {
    type Input = FakeInput;
    type Error = TestError;

    fn inputs(&mut self) -> &mut [(u8, Self::Input)] {
        &mut self.inputs
    }

    fn listen(&mut self, interrupt: Interrupt) -> Result<(), TestError> {
        *self.listening.lock().unwrap() = Some(interrupt);
        Ok(())
    }
}
