mod config;
mod display;
mod execute;
mod font;
mod keypad;
mod machine;
mod opcode;
mod timers;
mod types;

pub use config::*;
pub use display::*;
pub(crate) use font::*;
pub use keypad::*;
pub use machine::*;
pub use opcode::*;
pub(crate) use timers::*;
pub use types::*;
