use crate::u4;

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Execution state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Fetching and executing instructions.
    Running,
    /// Suspended by Fx0A until a key is pressed; the key is written to `register`.
    ///
    /// PC already points at the instruction after the Fx0A, so resuming does
    /// not execute the wait again.
    AwaitingInput { register: u4 },
    /// Halted. Only a successful load leaves this state.
    Stopped,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Stack overflow: call depth exceeded {depth}")]
    StackOverflow { depth: usize },

    #[error("Program counter ran off the end of memory ({pc:#06X})")]
    PcOverflow { pc: u16 },

    #[error("Unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },
}
