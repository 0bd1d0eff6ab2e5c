mod cpu;
mod decode;
mod display;
mod error;
mod framebuffer;
mod keypad;
mod memory;
mod registers;
mod sound;
mod timers;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use clap::Parser;
use log::info;

use crate::cpu::{Cpu, DEFAULT_HZ};
use crate::display::Screen;
use crate::framebuffer::FrameBuffer;
use crate::keypad::Keypad;
use crate::memory::{Font, Memory};
use crate::timers::Timers;

/// CHIP-8 virtual machine
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// ROM image to run
    rom: PathBuf,

    /// Stretch a borderless window over the desktop
    #[arg(short = 'f', long, alias = "fs")]
    fullscreen: bool,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_HZ)]
    ips: u32,

    /// Replacement 80-byte font image, 5 bytes per hex digit
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let font = match &args.font {
        Some(path) => Font::from_file(path)?,
        None => Font::default(),
    };
    let mut mem = Memory::new(&font);
    let rom_size = mem.load_rom_file(&args.rom)?;
    info!(
        "loaded {} ({rom_size} bytes), cpu at {} Hz{}",
        args.rom.display(),
        args.ips,
        if args.fullscreen { ", fullscreen" } else { "" },
    );

    // host window first: init failures must abort before any thread starts
    let mut screen = Screen::new(args.fullscreen)?;

    let fb = Arc::new(Mutex::new(FrameBuffer::new()));
    let keypad = Arc::new(Keypad::new());
    let timers = Arc::new(Timers::new());
    let quit = Arc::new(AtomicBool::new(false));

    let gate = thread::spawn({
        let timers = Arc::clone(&timers);
        let quit = Arc::clone(&quit);
        move || timers::run_gate(timers, quit)
    });

    let vm = thread::spawn({
        let cpu = Cpu::new(
            mem,
            Arc::clone(&fb),
            Arc::clone(&keypad),
            Arc::clone(&timers),
            Arc::clone(&quit),
            args.ips,
        );
        move || cpu.run()
    });

    // render/input loop; the window context stays on the main thread
    while screen.is_open() && !quit.load(Ordering::Relaxed) {
        screen.poll_keys(&keypad);
        screen.render(&fb);
    }

    quit.store(true, Ordering::Relaxed);
    keypad.shutdown();

    gate.join()
        .map_err(|_| anyhow::anyhow!("timer thread panicked"))?;
    vm.join()
        .map_err(|_| anyhow::anyhow!("cpu thread panicked"))?
        .context("the virtual machine stopped on a fatal error")?;

    info!("clean shutdown");
    Ok(())
}
