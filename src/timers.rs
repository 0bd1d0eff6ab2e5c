use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::sound::Beeper;

pub const TICK_HZ: u32 = 60;
pub const TICK: Duration = Duration::from_nanos(1_000_000_000 / TICK_HZ as u64);

/// The delay/sound countdown pair, stored as expiry timestamps rather than
/// decremented counters: a timer holding v expires v/60 s from its write.
/// Reading converts the remaining wall time back to ticks.
///
/// Writing while a timer is still running re-arms from the pending expiry,
/// so the unfinished fraction of the current tick is kept.
pub struct Timers {
    delay: Mutex<Instant>,
    sound: Mutex<Instant>,
}

impl Timers {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            delay: Mutex::new(now),
            sound: Mutex::new(now),
        }
    }

    pub fn delay(&self) -> u8 {
        ticks_left(*self.delay.lock().unwrap())
    }

    pub fn set_delay(&self, value: u8) {
        rearm(&mut self.delay.lock().unwrap(), value);
    }

    pub fn set_sound(&self, value: u8) {
        rearm(&mut self.sound.lock().unwrap(), value);
    }

    /// The beep gate: on while the sound timer has not expired.
    pub fn sound_active(&self) -> bool {
        ticks_left(*self.sound.lock().unwrap()) > 0
    }
}

fn ticks_left(expiry: Instant) -> u8 {
    let remaining = expiry.saturating_duration_since(Instant::now());
    (remaining.as_secs_f64() * TICK_HZ as f64).ceil().min(255.0) as u8
}

fn rearm(expiry: &mut Instant, value: u8) {
    let base = (*expiry).max(Instant::now());
    *expiry = base + TICK * value as u32;
}

/// 60 Hz gate loop: starts the looping tone when the sound timer becomes
/// active, stops it when the timer expires, exits on the quit flag.
///
/// Runs on its own thread, which also owns the audio stream: cpal streams
/// are not `Send`, so the beeper must be built where it is driven. A
/// machine without a working audio device keeps ticking, just silently.
pub fn run_gate(timers: Arc<Timers>, quit: Arc<AtomicBool>) {
    let beeper = match Beeper::new() {
        Ok(beeper) => Some(beeper),
        Err(err) => {
            warn!("audio unavailable, beep will be silent: {err}");
            None
        }
    };

    let mut playing = false;
    while !quit.load(Ordering::Relaxed) {
        let active = timers.sound_active();
        if let Some(beeper) = &beeper {
            if active && !playing {
                beeper.start();
            } else if !active && playing {
                beeper.stop();
            }
        }
        playing = active;
        thread::sleep(TICK);
    }

    if playing {
        if let Some(beeper) = &beeper {
            beeper.stop();
        }
    }
    debug!("timer gate stopped");
}
