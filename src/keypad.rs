use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

pub const KEY_COUNT: usize = 16;

/// Pressed-state table for the 16-key hex pad. The host input poller is
/// the only writer; the CPU reads the atomic cells for SKP/SKNP and parks
/// on the condvar for the blocking wait-for-key instruction.
pub struct Keypad {
    keys: [AtomicBool; KEY_COUNT],
    channel: Mutex<PressChannel>,
    cond: Condvar,
}

struct PressChannel {
    last: u8,
    count: u64,
    shutdown: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Self {
            keys: Default::default(),
            channel: Mutex::new(PressChannel {
                last: 0,
                count: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys[key as usize & 0xF].load(Ordering::Relaxed)
    }

    /// Host callback for a down transition on a mapped key.
    pub fn press(&self, key: u8) {
        self.keys[key as usize & 0xF].store(true, Ordering::Relaxed);
        let mut channel = self.channel.lock().unwrap();
        channel.last = key & 0xF;
        channel.count += 1;
        self.cond.notify_all();
    }

    /// Host callback for an up transition.
    pub fn release(&self, key: u8) {
        self.keys[key as usize & 0xF].store(false, Ordering::Relaxed);
    }

    /// Blocks until a press transition arrives after this call and returns
    /// the key index, or `None` once shutdown is signalled. Keys already
    /// held when the wait begins do not satisfy it.
    pub fn wait_for_press(&self) -> Option<u8> {
        let mut channel = self.channel.lock().unwrap();
        let seen = channel.count;
        loop {
            if channel.shutdown {
                return None;
            }
            if channel.count != seen {
                return Some(channel.last);
            }
            channel = self.cond.wait(channel).unwrap();
        }
    }

    /// Wakes every blocked wait; all subsequent waits return `None`.
    pub fn shutdown(&self) {
        self.channel.lock().unwrap().shutdown = true;
        self.cond.notify_all();
    }
}
