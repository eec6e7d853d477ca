use crate::u4;

/// A decoded instruction word.
///
/// Operands keep their encoded widths: `x`/`y` select registers, `n` is a
/// nibble, `nn` a byte and `nnn` a 12-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `1nnn`: PC = nnn.
    Jump { nnn: u16 },
    /// `Bnnn`: PC = nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// `2nnn`: push the following address, then PC = nnn.
    Call { nnn: u16 },
    /// `00EE`: pop PC.
    Return,

    /// `3xnn`
    SkipRegEqualImm { x: u4, nn: u8 },
    /// `4xnn`
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// `5xy0`
    SkipRegEqualReg { x: u4, y: u4 },
    /// `9xy0`
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// `6xnn`: load a byte into VX.
    SetRegImm { x: u4, nn: u8 },
    /// `7xnn`: wrapping add, VF untouched.
    AddRegImm { x: u4, nn: u8 },
    /// `Annn`
    SetIndexImm { nnn: u16 },
    /// `Fx1E`: I += VX, must stay inside memory.
    AddIndexReg { x: u4 },

    /// `8xyN` register arithmetic, see [`AluOp`].
    Alu { x: u4, y: u4, op: AluOp },
    /// `Cxnn`: VX = random byte masked with nn.
    Random { x: u4, nn: u8 },

    /// `00E0`
    ClearDisplay,
    /// `Dxyn`: XOR an n-row sprite read from I onto the screen at (VX, VY).
    /// VF reports whether any lit pixel was erased.
    Draw { x: u4, y: u4, n: u4 },

    /// `Ex9E`: skip when the key held in VX is down.
    SkipIfPressed { x: u4 },
    /// `ExA1`: skip when the key held in VX is up.
    SkipIfNotPressed { x: u4 },
    /// `Fx0A`: park the machine until a key goes down, then write it to VX.
    WaitForKey { x: u4 },

    /// `Fx07`
    ReadDelayTimer { x: u4 },
    /// `Fx15`
    SetDelayTimer { x: u4 },
    /// `Fx18`
    SetSoundTimer { x: u4 },

    /// `Fx29`: point I at the built-in glyph for VX.
    FontChar { x: u4 },
    /// `Fx33`: hundreds, tens and ones digits of VX go to I..I+3.
    Bcd { x: u4 },

    /// `Fx55`: copy V0..=VX to memory at I, leaving I one past the last byte.
    StoreRegs { x: u4 },
    /// `Fx65`: the reverse of `Fx55`.
    LoadRegs { x: u4 },

    /// Any word that is not one of the 35 instructions above. `0nnn` lands here.
    Unknown(u16),
}

/// Low nibble of an `8xyN` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    /// `0`: copy VY.
    Set,
    /// `1`
    Or,
    /// `2`
    And,
    /// `3`
    Xor,
    /// `4`: VF = 1 on carry out of bit 7.
    Add,
    /// `5`: VX - VY, VF = 1 when no borrow occurred.
    Sub,
    /// `6`: VF takes bit 0 of the shift source.
    ShiftRight,
    /// `7`: VY - VX, VF = 1 when no borrow occurred.
    SubReverse,
    /// `E`: VF takes bit 7 of the shift source.
    ShiftLeft,
}

impl Opcode {
    /// Splits the raw word into nibbles and matches the instruction table.
    pub fn decode(word: u16) -> Self {
        let [hi, lo] = word.to_be_bytes();
        let nibble = (hi >> 4, hi & 0xF, lo >> 4, lo & 0xF);

        let x = u4::from_low_bits(hi);
        let y = u4::from_low_bits(lo >> 4);
        let n = u4::from_low_bits(lo);
        let nn = lo;
        let nnn = word & 0x0FFF;

        match nibble {
            (0x0, 0x0, 0xE, 0x0) => Opcode::ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Return,
            (0x1, _, _, _) => Opcode::Jump { nnn },
            (0x2, _, _, _) => Opcode::Call { nnn },
            (0x3, _, _, _) => Opcode::SkipRegEqualImm { x, nn },
            (0x4, _, _, _) => Opcode::SkipRegNotEqualImm { x, nn },
            (0x5, _, _, 0x0) => Opcode::SkipRegEqualReg { x, y },
            (0x6, _, _, _) => Opcode::SetRegImm { x, nn },
            (0x7, _, _, _) => Opcode::AddRegImm { x, nn },
            (0x8, _, _, _) => Opcode::Alu {
                x,
                y,
                op: match nibble.3 {
                    0x0 => AluOp::Set,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::ShiftRight,
                    0x7 => AluOp::SubReverse,
                    0xE => AluOp::ShiftLeft,
                    _ => return Opcode::Unknown(word),
                },
            },
            (0x9, _, _, 0x0) => Opcode::SkipRegNotEqualReg { x, y },
            (0xA, _, _, _) => Opcode::SetIndexImm { nnn },
            (0xB, _, _, _) => Opcode::JumpWithOffset { nnn },
            (0xC, _, _, _) => Opcode::Random { x, nn },
            (0xD, _, _, _) => Opcode::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::SkipIfPressed { x },
            (0xE, _, 0xA, 0x1) => Opcode::SkipIfNotPressed { x },
            (0xF, _, 0x0, 0x7) => Opcode::ReadDelayTimer { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitForKey { x },
            (0xF, _, 0x1, 0x5) => Opcode::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Opcode::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddIndexReg { x },
            (0xF, _, 0x2, 0x9) => Opcode::FontChar { x },
            (0xF, _, 0x3, 0x3) => Opcode::Bcd { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },

            _ => Opcode::Unknown(word),
        }
    }

    /// True for instructions that place the program counter themselves.
    pub(crate) fn sets_pc(&self) -> bool {
        matches!(
            self,
            Opcode::Jump { .. }
                | Opcode::JumpWithOffset { .. }
                | Opcode::Call { .. }
                | Opcode::Return
        )
    }
}
