use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};
use rand::Rng;

use crate::decode::{Instruction, Opcode};
use crate::error::VmError;
use crate::framebuffer::FrameBuffer;
use crate::keypad::Keypad;
use crate::memory::{Memory, Stack, FONT_BASE, GLYPH_BYTES};
use crate::registers::Registers;
use crate::timers::Timers;

pub const DEFAULT_HZ: u32 = 500;

/// The interpreter: register file, return stack, and memory, plus handles
/// to the shared framebuffer, keypad, and timers. Owned by the CPU thread.
pub struct Cpu {
    regs: Registers,
    stack: Stack,
    mem: Memory,
    fb: Arc<Mutex<FrameBuffer>>,
    keypad: Arc<Keypad>,
    timers: Arc<Timers>,
    quit: Arc<AtomicBool>,
    period: Duration,
}

impl Cpu {
    pub fn new(
        mem: Memory,
        fb: Arc<Mutex<FrameBuffer>>,
        keypad: Arc<Keypad>,
        timers: Arc<Timers>,
        quit: Arc<AtomicBool>,
        hz: u32,
    ) -> Self {
        Self {
            regs: Registers::new(),
            stack: Stack::new(),
            mem,
            fb,
            keypad,
            timers,
            quit,
            period: Duration::from_secs_f64(1.0 / hz as f64),
        }
    }

    /// Fetch/decode/execute until the quit flag is raised. Each iteration
    /// sleeps away the remainder of its instruction period; an iteration
    /// that overruns is not amortized. A runtime fault is fatal: it is
    /// logged, the quit flag is raised for the other threads, and the
    /// error is handed back to the host.
    pub fn run(mut self) -> Result<(), VmError> {
        debug!("cpu started, period {:?}", self.period);
        while !self.quit.load(Ordering::Relaxed) {
            let started = Instant::now();
            if let Err(err) = self.step() {
                error!("cpu halted: {err}");
                self.quit.store(true, Ordering::Relaxed);
                return Err(err);
            }
            if let Some(rest) = self.period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        debug!("cpu stopped");
        Ok(())
    }

    /// One instruction: fetch the big-endian word at PC, advance PC past
    /// it, then execute. Jumps overwrite the advanced PC; skips add 2.
    pub fn step(&mut self) -> Result<(), VmError> {
        let pc = self.regs.pc;
        let word = self.mem.read_word(pc)?;
        self.regs.pc = pc + 2;
        let instruction =
            Instruction::decode(Opcode(word)).ok_or(VmError::InvalidInstruction { pc, word })?;
        self.execute(instruction)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.regs.pc += 2;
        }
    }

    fn execute(&mut self, instruction: Instruction) -> Result<(), VmError> {
        use Instruction::*;
        match instruction {
            ClearScreen => self.fb.lock().unwrap().clear(),
            Return => self.regs.pc = self.stack.pop()?,
            Sys(_) => {}
            Jump(addr) => self.regs.pc = addr,
            Call(addr) => {
                self.stack.push(self.regs.pc)?;
                self.regs.pc = addr;
            }
            SkipEqualImm(x, kk) => self.skip_if(self.regs.get(x) == kk),
            SkipNotEqualImm(x, kk) => self.skip_if(self.regs.get(x) != kk),
            SkipEqualReg(x, y) => self.skip_if(self.regs.get(x) == self.regs.get(y)),
            LoadImm(x, kk) => self.regs.set(x, kk),
            AddImm(x, kk) => self.regs.set(x, self.regs.get(x).wrapping_add(kk)),
            Copy(x, y) => self.regs.set(x, self.regs.get(y)),
            Or(x, y) => self.regs.set(x, self.regs.get(x) | self.regs.get(y)),
            And(x, y) => self.regs.set(x, self.regs.get(x) & self.regs.get(y)),
            Xor(x, y) => self.regs.set(x, self.regs.get(x) ^ self.regs.get(y)),
            Add(x, y) => {
                let (sum, carry) = self.regs.get(x).overflowing_add(self.regs.get(y));
                self.regs.set(x, sum);
                self.regs.set_flag(carry);
            }
            Sub(x, y) => {
                let (vx, vy) = (self.regs.get(x), self.regs.get(y));
                self.regs.set(x, vx.wrapping_sub(vy));
                self.regs.set_flag(vx >= vy);
            }
            ShiftRight(x) => {
                let vx = self.regs.get(x);
                self.regs.set(x, vx >> 1);
                self.regs.set_flag(vx & 1 == 1);
            }
            SubNegate(x, y) => {
                let (vx, vy) = (self.regs.get(x), self.regs.get(y));
                self.regs.set(x, vy.wrapping_sub(vx));
                self.regs.set_flag(vy >= vx);
            }
            ShiftLeft(x) => {
                let vx = self.regs.get(x);
                self.regs.set(x, vx << 1);
                self.regs.set_flag(vx >> 7 == 1);
            }
            SkipNotEqualReg(x, y) => self.skip_if(self.regs.get(x) != self.regs.get(y)),
            LoadIndex(addr) => self.regs.i = addr,
            JumpOffset(addr) => self.regs.pc = addr + self.regs.get(0) as u16,
            Random(x, kk) => self.regs.set(x, rand::thread_rng().gen::<u8>() & kk),
            Draw(x, y, n) => {
                let base = self.regs.i;
                let mut sprite = Vec::with_capacity(n as usize);
                for row in 0..n as u16 {
                    let addr = base.checked_add(row).ok_or(VmError::OutOfBounds {
                        addr: base as u32 + row as u32,
                    })?;
                    sprite.push(self.mem.read(addr)?);
                }
                let (vx, vy) = (self.regs.get(x), self.regs.get(y));
                let collision = self.fb.lock().unwrap().draw(vx, vy, &sprite);
                self.regs.set_flag(collision);
            }
            SkipPressed(x) => self.skip_if(self.keypad.is_pressed(self.regs.get(x))),
            SkipNotPressed(x) => self.skip_if(!self.keypad.is_pressed(self.regs.get(x))),
            ReadDelay(x) => {
                let value = self.timers.delay();
                self.regs.set(x, value);
            }
            WaitKey(x) => {
                // parks this thread; a shutdown wake leaves Vx alone and
                // lets the run loop observe the quit flag
                if let Some(key) = self.keypad.wait_for_press() {
                    self.regs.set(x, key);
                }
            }
            SetDelay(x) => self.timers.set_delay(self.regs.get(x)),
            SetSound(x) => self.timers.set_sound(self.regs.get(x)),
            AddIndex(x) => self.regs.i = self.regs.i.wrapping_add(self.regs.get(x) as u16),
            LoadGlyph(x) => self.regs.i = FONT_BASE + GLYPH_BYTES * self.regs.get(x) as u16,
            StoreBcd(x) => {
                let value = self.regs.get(x);
                let i = self.regs.i;
                self.mem.write(i, value / 100)?;
                self.mem.write(i + 1, value / 10 % 10)?;
                self.mem.write(i + 2, value % 10)?;
            }
            StoreRegisters(x) => {
                for reg in 0..=x {
                    self.mem.write(self.regs.i + reg as u16, self.regs.get(reg))?;
                }
            }
            LoadRegisters(x) => {
                for reg in 0..=x {
                    let value = self.mem.read(self.regs.i + reg as u16)?;
                    self.regs.set(reg, value);
                }
            }
        }
        Ok(())
    }
}
