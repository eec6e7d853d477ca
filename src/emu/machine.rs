use rand::{SeedableRng, rngs::StdRng};

use super::{
    FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, FrameBuffer, Keypad, MachineConfig,
    MachineError, Opcode, RunState, Timers,
};
use crate::u4;

// Fixed by the CHIP-8 memory map
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;
// Highest address an instruction word can start at
const LAST_INSTRUCTION_ADDRESS: u16 = (MEMORY_SIZE - 2) as u16;

/// CHIP-8 virtual machine state
pub struct Machine {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// 64x32 monochrome display with change tracking
    pub(crate) display: FrameBuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns
    pub(crate) stack: Vec<u16>,

    pub(crate) timers: Timers,
    pub(crate) keypad: Keypad,
    pub(crate) state: RunState,
    halt_reason: Option<MachineError>,

    pub(crate) config: MachineConfig,
    pub(crate) rng: StdRng,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    /// Creates a stopped machine; call [`Machine::load`] to start it.
    pub fn with_config(config: MachineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut machine = Machine {
            memory: [0; MEMORY_SIZE],
            display: FrameBuffer::new(),
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::with_capacity(config.stack_limit),
            timers: Timers::default(),
            keypad: Keypad::default(),
            state: RunState::Stopped,
            halt_reason: None,
            config,
            rng,
        };
        machine.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        machine
    }

    /// Resets the machine and loads a ROM into memory.
    ///
    /// An oversized ROM stops the machine and leaves memory and registers as they were.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), MachineError> {
        if rom.len() > MAX_ROM_SIZE {
            let err = MachineError::RomTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            };
            log::error!("{err}");
            self.state = RunState::Stopped;
            self.halt_reason = Some(err.clone());
            return Err(err);
        }

        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.memory[ROM_START_ADDRESS..ROM_START_ADDRESS + rom.len()].copy_from_slice(rom);

        self.display = FrameBuffer::new();
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack.clear();
        self.timers = Timers::default();
        self.keypad = Keypad::default();
        self.halt_reason = None;
        self.state = RunState::Running;

        log::debug!("loaded {} byte ROM at {:#05X}", rom.len(), ROM_START_ADDRESS);
        Ok(())
    }

    /// Executes a single instruction and advances the timers by `dt` seconds.
    ///
    /// Does nothing while stopped or waiting for a key. A fatal error stops the
    /// machine and is returned once; later calls are no-ops.
    pub fn step(&mut self, dt: f32) -> Result<(), MachineError> {
        if self.state != RunState::Running {
            return Ok(());
        }

        let pc = self.pc;
        self.cycle(dt).inspect_err(|err| self.halt(pc, err.clone()))
    }

    /// Set the state of a key on the keypad.
    ///
    /// A press while waiting on Fx0A resumes execution with the key stored in
    /// the register named by that instruction.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad.set(key, pressed);

        if let RunState::AwaitingInput { register } = self.state
            && pressed
        {
            log::debug!("key {key} resolves wait into V{register}");
            self.v[register] = key.get();
            self.state = RunState::Running;
        }
    }

    /// Returns the pixel at (`x`, `y`) and clears its changed flag.
    ///
    /// Panics if the coordinates are outside the 64x32 display.
    pub fn pixel(&mut self, x: usize, y: usize) -> bool {
        self.display.observe(x, y)
    }

    /// True if the pixel changed since it was last read with [`Machine::pixel`].
    pub fn is_pixel_dirty(&self, x: usize, y: usize) -> bool {
        self.display.is_pixel_dirty(x, y)
    }

    /// True while any pixel has changed since it was last read.
    pub fn is_frame_dirty(&self) -> bool {
        self.display.is_dirty()
    }

    /// True unless the machine has halted.
    pub fn is_running(&self) -> bool {
        self.state != RunState::Stopped
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn is_sound_active(&self) -> bool {
        self.timers.sound > 0
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// The error that stopped the machine, if any.
    pub fn halt_reason(&self) -> Option<&MachineError> {
        self.halt_reason.as_ref()
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound
    }

    pub fn keypad(&self) -> u16 {
        self.keypad.bits()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn cycle(&mut self, dt: f32) -> Result<(), MachineError> {
        let opcode = Opcode::decode(self.fetch()?);
        log::trace!("{:#05X}: {opcode:?}", self.pc);

        self.execute(opcode)?;
        self.timers.advance(dt);

        if self.pc > LAST_INSTRUCTION_ADDRESS {
            return Err(MachineError::PcOverflow { pc: self.pc });
        }

        Ok(())
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&self) -> Result<u16, MachineError> {
        let pc = self.pc as usize;
        let bytes = self
            .memory
            .get(pc..pc + 2)
            .ok_or(MachineError::MemoryOutOfBounds { address: pc })?;

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn halt(&mut self, pc: u16, err: MachineError) {
        log::error!("machine stopped at {pc:#05X}: {err}");
        self.state = RunState::Stopped;
        self.halt_reason = Some(err);
    }

    /// Bounds-checked view of `len` bytes of memory starting at `start`.
    pub(crate) fn mem_range(&mut self, start: u16, len: usize) -> Result<&mut [u8], MachineError> {
        let start = start as usize;
        let end = start + len;
        self.memory
            .get_mut(start..end)
            .ok_or(MachineError::MemoryOutOfBounds {
                address: end.saturating_sub(1),
            })
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
