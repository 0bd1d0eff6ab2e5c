use std::io;
use std::path::PathBuf;

/// Failures the machine can raise, at load time or mid-run.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("could not read ROM {path:?}: {source}")]
    RomRead { path: PathBuf, source: io::Error },

    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("could not read font {path:?}: {source}")]
    FontRead { path: PathBuf, source: io::Error },

    #[error("font image must be 80 bytes, got {got}")]
    BadFontSize { got: usize },

    #[error("illegal instruction {word:#06X} at {pc:#05X}")]
    InvalidInstruction { pc: u16, word: u16 },

    #[error("call stack overflow: more than {max} nested subroutines")]
    StackOverflow { max: usize },

    #[error("return with an empty call stack")]
    StackUnderflow,

    #[error("memory access out of bounds at address {addr:#06X}")]
    OutOfBounds { addr: u32 },

    #[error("host subsystem failed to initialize: {0}")]
    HostInit(String),
}
