use rand::Rng;

use super::{
    AluOp, DISPLAY_X, DISPLAY_Y, FONT_START_ADDRESS, GLYPH_SIZE, MEMORY_SIZE, Machine,
    MachineError, Opcode, RunState, ShiftSource,
};
use crate::u4;

impl Machine {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<(), MachineError> {
        let next = self.pc.wrapping_add(2);
        if !opcode.sets_pc() {
            self.pc = next;
        }

        match opcode {
            Opcode::ClearDisplay => {
                self.display.clear();
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn + u16::from(self.v[0]);
            }
            Opcode::Call { nnn } => {
                if self.stack.len() >= self.config.stack_limit {
                    return Err(MachineError::StackOverflow {
                        depth: self.config.stack_limit,
                    });
                }
                self.stack.push(next);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(MachineError::StackUnderflow)?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = checked_address(usize::from(nnn))?;
            }
            Opcode::AddIndexReg { x } => {
                self.i = checked_address(usize::from(self.i) + usize::from(self.v[x]))?;
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n)?;
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.keypad.is_pressed(u4::from_low_bits(self.v[x])));
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.keypad.is_pressed(u4::from_low_bits(self.v[x])));
            }
            Opcode::WaitForKey { x } => {
                log::debug!("waiting for key into V{x}");
                self.state = RunState::AwaitingInput { register: x };
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.timers.delay;
            }
            Opcode::SetDelayTimer { x } => {
                self.timers.delay = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.timers.sound = self.v[x];
            }
            Opcode::FontChar { x } => {
                self.i = checked_address(FONT_START_ADDRESS + usize::from(self.v[x]) * GLYPH_SIZE)?;
            }
            Opcode::Bcd { x } => {
                let value = self.v[x];
                self.mem_range(self.i, 3)?
                    .copy_from_slice(&[value / 100, (value / 10) % 10, value % 10]);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let next_i = checked_address(usize::from(self.i) + count)?;
                let values = self.v;
                self.mem_range(self.i, count)?
                    .copy_from_slice(&values[..count]);
                self.i = next_i;
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let next_i = checked_address(usize::from(self.i) + count)?;
                let mut values = [0; 16];
                values[..count].copy_from_slice(self.mem_range(self.i, count)?);
                self.v[..count].copy_from_slice(&values[..count]);
                self.i = next_i;
            }
            Opcode::Unknown(opcode) => {
                return Err(MachineError::UnknownOpcode { opcode });
            }
        };

        Ok(())
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    // VF is written before Vx so that a Vx of VF keeps the arithmetic result.
    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        let shift_source = match self.config.shift_source {
            ShiftSource::Vy => self.v[y],
            ShiftSource::Vx => self.v[x],
        };

        let (result, flag) = match op {
            AluOp::Set => (self.v[y], None),
            AluOp::Or => (self.v[x] | self.v[y], None),
            AluOp::And => (self.v[x] & self.v[y], None),
            AluOp::Xor => (self.v[x] ^ self.v[y], None),
            AluOp::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                (res, Some(u8::from(overflow)))
            }
            AluOp::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                (res, Some(u8::from(!borrow))) // Notice that borrow is inverted
            }
            AluOp::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                (res, Some(u8::from(!borrow)))
            }
            AluOp::ShiftRight => (shift_source >> 1, Some(shift_source & 1)),
            AluOp::ShiftLeft => (shift_source << 1, Some(shift_source >> 7)),
        };

        if let Some(flag) = flag {
            self.v[0xF] = flag;
        }
        self.v[x] = result;
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<(), MachineError> {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;
        let rows = usize::from(n);

        // The whole 8-bytes-per-row window has to be addressable, not just the rows read
        self.mem_range(self.i, rows * 8)?;
        let start = self.i as usize;

        let mut any_erased = false;
        for row in 0..rows {
            let sprite_byte = self.memory[start + row];
            any_erased |= self.display.xor_row(x_pos, y_pos + row, sprite_byte);
        }

        self.v[0xF] = u8::from(any_erased);
        Ok(())
    }
}

fn checked_address(address: usize) -> Result<u16, MachineError> {
    if address < MEMORY_SIZE {
        Ok(address as u16)
    } else {
        Err(MachineError::MemoryOutOfBounds { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MachineConfig;

    fn machine() -> Machine {
        let mut machine = Machine::with_config(MachineConfig {
            seed: Some(7),
            ..Default::default()
        });
        machine.load(&[]).unwrap();
        machine
    }

    fn run(machine: &mut Machine, raw: u16) -> Result<(), MachineError> {
        machine.execute(Opcode::decode(raw))
    }

    #[test]
    fn add_sets_carry() {
        let mut m = machine();
        m.v[0] = 0xFF;
        m.v[1] = 0x02;
        run(&mut m, 0x8014).unwrap();
        assert_eq!(m.v[0], 0x01);
        assert_eq!(m.v[0xF], 1);

        run(&mut m, 0x8014).unwrap();
        assert_eq!(m.v[0], 0x03);
        assert_eq!(m.v[0xF], 0);
    }

    #[test]
    fn sub_flags_not_borrow() {
        let mut m = machine();
        m.v[0] = 0x01;
        m.v[1] = 0x02;
        run(&mut m, 0x8015).unwrap();
        assert_eq!(m.v[0], 0xFF);
        assert_eq!(m.v[0xF], 0);

        m.v[2] = 0x05;
        m.v[3] = 0x05;
        run(&mut m, 0x8235).unwrap();
        assert_eq!(m.v[2], 0);
        assert_eq!(m.v[0xF], 1);
    }

    #[test]
    fn sub_reverse() {
        let mut m = machine();
        m.v[0] = 0x02;
        m.v[1] = 0x01;
        run(&mut m, 0x8017).unwrap();
        assert_eq!(m.v[0], 0xFF);
        assert_eq!(m.v[0xF], 0);
    }

    #[test]
    fn bitwise_ops_leave_vf_alone() {
        let mut m = machine();
        m.v[0xF] = 0x42;
        m.v[0] = 0b1100;
        m.v[1] = 0b1010;
        run(&mut m, 0x8011).unwrap();
        assert_eq!(m.v[0], 0b1110);
        run(&mut m, 0x8012).unwrap();
        assert_eq!(m.v[0], 0b1010);
        run(&mut m, 0x8013).unwrap();
        assert_eq!(m.v[0], 0);
        assert_eq!(m.v[0xF], 0x42);
    }

    #[test]
    fn shifts_read_vy_by_default() {
        let mut m = machine();
        m.v[0] = 0xFF;
        m.v[1] = 0b1000_0011;
        run(&mut m, 0x8016).unwrap();
        assert_eq!(m.v[0], 0b0100_0001);
        assert_eq!(m.v[0xF], 1);

        run(&mut m, 0x801E).unwrap();
        assert_eq!(m.v[0], 0b0000_0110);
        assert_eq!(m.v[0xF], 1);
    }

    #[test]
    fn shifts_read_vx_when_configured() {
        let mut m = Machine::with_config(MachineConfig {
            shift_source: ShiftSource::Vx,
            seed: Some(1),
            ..Default::default()
        });
        m.load(&[]).unwrap();
        m.v[0] = 0b0000_0010;
        m.v[1] = 0xFF;
        run(&mut m, 0x8016).unwrap();
        assert_eq!(m.v[0], 0b0000_0001);
        assert_eq!(m.v[0xF], 0);
    }

    #[test]
    fn flag_register_as_destination_keeps_result() {
        let mut m = machine();
        m.v[0xF] = 0xFF;
        m.v[1] = 0x02;
        run(&mut m, 0x8F14).unwrap();
        assert_eq!(m.v[0xF], 0x01);
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let mut m = machine();
        m.v[4] = 0xF0;
        run(&mut m, 0x7420).unwrap();
        assert_eq!(m.v[4], 0x10);
        assert_eq!(m.v[0xF], 0);
    }

    #[test]
    fn skips_advance_by_four() {
        let mut m = machine();
        m.v[1] = 0x11;
        run(&mut m, 0x3111).unwrap();
        assert_eq!(m.pc, 0x204);
        run(&mut m, 0x4111).unwrap();
        assert_eq!(m.pc, 0x206);
        run(&mut m, 0x5120).unwrap();
        assert_eq!(m.pc, 0x208);
        run(&mut m, 0x9120).unwrap();
        assert_eq!(m.pc, 0x20C);
    }

    #[test]
    fn call_and_return() {
        let mut m = machine();
        run(&mut m, 0x2400).unwrap();
        assert_eq!(m.pc, 0x400);
        assert_eq!(m.stack, vec![0x202]);
        run(&mut m, 0x00EE).unwrap();
        assert_eq!(m.pc, 0x202);
        assert_eq!(run(&mut m, 0x00EE), Err(MachineError::StackUnderflow));
    }

    #[test]
    fn call_depth_is_limited() {
        let mut m = machine();
        for _ in 0..16 {
            run(&mut m, 0x2200).unwrap();
        }
        assert_eq!(
            run(&mut m, 0x2200),
            Err(MachineError::StackOverflow { depth: 16 })
        );
    }

    #[test]
    fn jump_with_offset() {
        let mut m = machine();
        m.v[0] = 0x10;
        run(&mut m, 0xB300).unwrap();
        assert_eq!(m.pc, 0x310);
    }

    #[test]
    fn random_is_masked() {
        let mut m = machine();
        for _ in 0..32 {
            run(&mut m, 0xC50F).unwrap();
            assert_eq!(m.v[5] & 0xF0, 0);
        }
        run(&mut m, 0xC500).unwrap();
        assert_eq!(m.v[5], 0);
    }

    #[test]
    fn random_is_reproducible_with_a_seed() {
        let mut a = machine();
        let mut b = machine();
        for _ in 0..8 {
            run(&mut a, 0xC0FF).unwrap();
            run(&mut b, 0xC0FF).unwrap();
            assert_eq!(a.v[0], b.v[0]);
        }
    }

    #[test]
    fn index_arithmetic_is_bounds_checked() {
        let mut m = machine();
        run(&mut m, 0xAFFF).unwrap();
        assert_eq!(m.i, 0xFFF);

        m.v[0] = 1;
        assert_eq!(
            run(&mut m, 0xF01E),
            Err(MachineError::MemoryOutOfBounds { address: 0x1000 })
        );

        run(&mut m, 0xAFF0).unwrap();
        run(&mut m, 0xF01E).unwrap();
        assert_eq!(m.i, 0xFF1);
    }

    #[test]
    fn font_char_points_at_glyph() {
        let mut m = machine();
        m.v[2] = 0xA;
        run(&mut m, 0xF229).unwrap();
        assert_eq!(m.i, 50);
        assert_eq!(m.memory[50], 0xF0);
    }

    #[test]
    fn bcd() {
        let mut m = machine();
        m.v[0] = 254;
        m.i = 0x300;
        run(&mut m, 0xF033).unwrap();
        assert_eq!(&m.memory[0x300..0x303], &[2, 5, 4]);

        m.i = 0xFFE;
        assert!(matches!(
            run(&mut m, 0xF033),
            Err(MachineError::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn store_regs_is_checked_before_writing() {
        let mut m = machine();
        m.v = [0xAA; 16];
        m.i = 0xFFE;
        assert!(run(&mut m, 0xF255).is_err());
        assert_eq!(&m.memory[0xFFE..], &[0, 0]);
        assert_eq!(m.i, 0xFFE);
    }

    #[test]
    fn register_transfer_cannot_push_index_past_memory() {
        let mut m = machine();
        m.v[0] = 0x5A;
        m.i = 0xFFF;
        assert_eq!(
            run(&mut m, 0xF055),
            Err(MachineError::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(m.memory[0xFFF], 0);
        assert_eq!(m.i, 0xFFF);

        m.i = 0xFFF;
        assert_eq!(
            run(&mut m, 0xF065),
            Err(MachineError::MemoryOutOfBounds { address: 0x1000 })
        );

        m.i = 0xFFE;
        run(&mut m, 0xF055).unwrap();
        assert_eq!(m.i, 0xFFF);
        assert_eq!(m.memory[0xFFE], 0x5A);
    }

    #[test]
    fn load_regs_reads_inclusive_range() {
        let mut m = machine();
        m.memory[0x300..0x304].copy_from_slice(&[1, 2, 3, 4]);
        m.i = 0x300;
        run(&mut m, 0xF265).unwrap();
        assert_eq!(&m.v[..4], &[1, 2, 3, 0]);
        assert_eq!(m.i, 0x303);
    }

    #[test]
    fn draw_reports_collision() {
        let mut m = machine();
        m.i = 0x300;
        m.memory[0x300] = 0xFF;
        m.v[0] = 10;
        m.v[1] = 5;
        run(&mut m, 0xD011).unwrap();
        assert_eq!(m.v[0xF], 0);
        assert!(m.display.get(10, 5));
        assert!(m.display.get(17, 5));

        run(&mut m, 0xD011).unwrap();
        assert_eq!(m.v[0xF], 1);
        assert!(!m.display.get(10, 5));
    }

    #[test]
    fn draw_wraps_and_uses_modulo_origin() {
        let mut m = machine();
        m.i = 0x300;
        m.memory[0x300] = 0x81;
        m.memory[0x301] = 0x80;
        m.v[0] = 64 + 60;
        m.v[1] = 31;
        run(&mut m, 0xD012).unwrap();
        assert!(m.display.get(60, 31));
        assert!(m.display.get(3, 31));
        assert!(m.display.get(60, 0));
    }

    #[test]
    fn draw_checks_the_sprite_window() {
        let mut m = machine();
        m.i = 0xFF8;
        run(&mut m, 0xD001).unwrap();
        assert!(matches!(
            run(&mut m, 0xD002),
            Err(MachineError::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn key_skips_use_low_nibble_of_vx() {
        let mut m = machine();
        m.keypad.set(u4::new(0xA), true);
        m.v[3] = 0x1A;
        run(&mut m, 0xE39E).unwrap();
        assert_eq!(m.pc, 0x204);
        run(&mut m, 0xE3A1).unwrap();
        assert_eq!(m.pc, 0x206);
    }

    #[test]
    fn wait_for_key_records_register() {
        let mut m = machine();
        run(&mut m, 0xF70A).unwrap();
        assert_eq!(m.state, RunState::AwaitingInput { register: u4::new(7) });
        assert_eq!(m.pc, 0x202);
    }

    #[test]
    fn timers_round_trip_through_registers() {
        let mut m = machine();
        m.v[0] = 33;
        run(&mut m, 0xF015).unwrap();
        run(&mut m, 0xF018).unwrap();
        run(&mut m, 0xF107).unwrap();
        assert_eq!(m.v[1], 33);
        assert_eq!(m.timers.sound, 33);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut m = machine();
        assert_eq!(
            run(&mut m, 0x0FFF),
            Err(MachineError::UnknownOpcode { opcode: 0x0FFF })
        );
    }
}
