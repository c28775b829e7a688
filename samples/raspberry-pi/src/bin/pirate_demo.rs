//! Draws a test pattern on the Pirate Audio display, logs button presses, animates a progress bar
//! from a recurring timer, and puts the display to sleep after a while without input.

use std::sync::mpsc;
use std::time::Duration;

use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Text};
use log::info;
use pirate_display::{
    buffer::FrameBuffer, st7789, Action, Button, Config, PirateDisplay, Rotation, TimerId,
};
use raspberry_pi_samples::{Error, PiButtons, PiDisplayHw};
use rppal::gpio::Gpio;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const TICK: Duration = Duration::from_millis(250);
const PROGRESS_STEPS: u32 = 20;

enum UiEvent {
    Button(Button, Action),
    Tick,
    Idle,
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rotation = match std::env::var("PIRATE_ROTATION").as_deref() {
        Ok("90") => Rotation::Deg90,
        _ => Rotation::Deg0,
    };
    let config = Config::default().with_rotation(rotation);

    let gpio = Gpio::new()?;
    // The display sits on CE1.
    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss1, config.spi_hz(), Mode::Mode0)?;
    let display_hw = PiDisplayHw::new(&gpio, spi)?;
    let buttons = PiButtons::new(&gpio, config.pin_map().pins())?;
    let mut display = PirateDisplay::new(display_hw, buttons, config)?;

    let (sender, events) = mpsc::channel();
    let button_sender = sender.clone();
    display.set_button_event_handler(move |button, action| {
        let _ = button_sender.send(UiEvent::Button(button, action));
    });
    let tick_sender = sender.clone();
    display.add_recurrent_timer(TICK, move || {
        let _ = tick_sender.send(UiEvent::Tick);
    });
    let mut idle = arm_idle(&display, None, &sender);

    let mut buffer = st7789::new_buffer();
    draw_test_pattern(&mut buffer)?;
    display.show_buffer(&buffer)?;
    display.wake()?;
    info!("Showing test pattern; press X to quit");

    let mut progress = 0;
    while let Ok(event) = events.recv() {
        match event {
            UiEvent::Button(button, action) => {
                info!("Button {} {:?} (code {})", button, action, action.code());
                idle = arm_idle(&display, Some(idle), &sender);
                if display.is_sleeping() {
                    display.wake()?;
                    continue;
                }
                if button == Button::X && action == Action::Press {
                    break;
                }
            }
            UiEvent::Tick => {
                if display.is_sleeping() {
                    continue;
                }
                progress = (progress + 1) % (PROGRESS_STEPS + 1);
                draw_progress(&mut buffer, progress)?;
                display.show_buffer(&buffer)?;
            }
            UiEvent::Idle => {
                info!("No input for {:?}, sleeping", IDLE_TIMEOUT);
                display.sleep()?;
            }
        }
    }

    display.sleep()?;
    display.close()
}

/// Schedules the inactivity timeout, re-arming `previous` if it's still pending.
fn arm_idle(
    display: &PirateDisplay<PiDisplayHw, PiButtons>,
    previous: Option<TimerId>,
    sender: &mpsc::Sender<UiEvent>,
) -> TimerId {
    let sender = sender.clone();
    let on_idle = move || {
        let _ = sender.send(UiEvent::Idle);
    };
    match previous {
        Some(id) => display.reset_timer(id, IDLE_TIMEOUT, on_idle),
        None => display.add_timer(IDLE_TIMEOUT, on_idle),
    }
}

fn draw_test_pattern(buffer: &mut FrameBuffer) -> Result<(), Error> {
    let size = buffer.bounding_box().size;
    let half = Size::new(size.width / 2, size.height / 2);
    let quadrants = [
        (Point::new(0, 0), Rgb888::RED),
        (Point::new(half.width as i32, 0), Rgb888::GREEN),
        (Point::new(0, half.height as i32), Rgb888::BLUE),
        (Point::new(half.width as i32, half.height as i32), Rgb888::WHITE),
    ];
    for (top_left, color) in quadrants {
        buffer.fill_solid(&Rectangle::new(top_left, half), color)?;
    }

    let style = MonoTextStyle::new(&FONT_10X20, Rgb888::BLACK);
    Text::with_alignment(
        "Pirate Audio",
        buffer.bounding_box().center(),
        style,
        Alignment::Center,
    )
    .draw(buffer)?;
    Ok(())
}

fn draw_progress(buffer: &mut FrameBuffer, progress: u32) -> Result<(), Error> {
    let size = buffer.bounding_box().size;
    let bar = Rectangle::new(Point::new(0, size.height as i32 - 12), Size::new(size.width, 12));
    bar.into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
        .draw(buffer)?;

    let filled = size.width * progress / PROGRESS_STEPS;
    Rectangle::new(bar.top_left, Size::new(filled, bar.size.height))
        .into_styled(PrimitiveStyle::with_fill(Rgb888::YELLOW))
        .draw(buffer)?;
    Ok(())
}
