//! A CHIP-8 virtual machine.
//!
//! [`Machine`] owns all interpreter state. A driver loads a ROM, calls
//! [`Machine::step`] with the elapsed time, forwards key events through
//! [`Machine::set_key`] and reads the framebuffer back with [`Machine::pixel`].

pub mod emu;
mod nibble;

pub use emu::{
    DISPLAY_X, DISPLAY_Y, MAX_ROM_SIZE, Machine, MachineConfig, MachineError, RunState,
    ShiftSource,
};
pub use nibble::{NibbleOverflow, u4};
