use std::sync::Mutex;
use std::time::Duration;

use log::warn;
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};

use crate::error::VmError;
use crate::framebuffer::{FrameBuffer, HEIGHT, WIDTH};
use crate::keypad::Keypad;

const ON_COLOR: u32 = 0x007FFF;
const OFF_COLOR: u32 = 0x000000;

/// The host window. Runs on the main thread, which owns the graphics
/// context exclusively: each frame it feeds key transitions to the keypad
/// and presents the framebuffer.
pub struct Screen {
    window: Window,
    pixels: Vec<u32>,
    held: [bool; 16],
}

impl Screen {
    pub fn new(fullscreen: bool) -> Result<Self, VmError> {
        // minifb has no exclusive mode; fullscreen is a borderless window
        // stretched over the desktop
        let options = if fullscreen {
            WindowOptions {
                borderless: true,
                resize: true,
                scale: Scale::FitScreen,
                scale_mode: ScaleMode::AspectRatioStretch,
                ..WindowOptions::default()
            }
        } else {
            WindowOptions {
                scale: Scale::X16,
                ..WindowOptions::default()
            }
        };
        let mut window = Window::new("chipvm - ESC to exit", WIDTH, HEIGHT, options)
            .map_err(|err| VmError::HostInit(err.to_string()))?;
        // ~60 fps presentation
        window.limit_update_rate(Some(Duration::from_micros(16600)));
        Ok(Self {
            window,
            pixels: vec![OFF_COLOR; WIDTH * HEIGHT],
            held: [false; 16],
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Diffs host key state against the previous frame and reports press
    /// and release transitions to the keypad.
    pub fn poll_keys(&mut self, keypad: &Keypad) {
        let mut down = [false; 16];
        for key in self.window.get_keys() {
            if let Some(index) = chip8_key(key) {
                down[index as usize] = true;
            }
        }
        for index in 0..16 {
            if down[index] && !self.held[index] {
                keypad.press(index as u8);
            } else if !down[index] && self.held[index] {
                keypad.release(index as u8);
            }
        }
        self.held = down;
    }

    /// Presents the framebuffer. The lock covers the whole frame copy and
    /// nothing else; the window update happens with the CPU free to draw.
    /// A failed update is logged and skipped; the machine keeps running.
    pub fn render(&mut self, fb: &Mutex<FrameBuffer>) {
        {
            let frame = fb.lock().unwrap();
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    self.pixels[y * WIDTH + x] =
                        if frame.get(x, y) { ON_COLOR } else { OFF_COLOR };
                }
            }
        }
        if let Err(err) = self.window.update_with_buffer(&self.pixels, WIDTH, HEIGHT) {
            warn!("window update failed: {err}");
        }
    }
}

/// Maps the left-hand 4x4 host block onto the hex pad:
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// Q W E R   ->   4 5 6 D
/// A S D F        7 8 9 E
/// Z X C V        A 0 B F
/// ```
///
/// Unmapped host keys are ignored.
fn chip8_key(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_mapping_is_a_bijection_onto_the_pad() {
        let mapped = [
            Key::Key1,
            Key::Key2,
            Key::Key3,
            Key::Key4,
            Key::Q,
            Key::W,
            Key::E,
            Key::R,
            Key::A,
            Key::S,
            Key::D,
            Key::F,
            Key::Z,
            Key::X,
            Key::C,
            Key::V,
        ];
        let mut seen = [false; 16];
        for key in mapped {
            let index = chip8_key(key).unwrap();
            assert!(!seen[index as usize], "{key:?} double-mapped");
            seen[index as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(chip8_key(Key::Space), None);
        assert_eq!(chip8_key(Key::Enter), None);
    }
}
