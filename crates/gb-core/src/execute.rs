//! Instruction execution
//!
//! One exhaustive match over [`Operation`]. Operand bytes are fetched here,
//! after the opcode, so PC always points past the full instruction by the
//! time a branch computes its target.

use crate::alu;
use crate::cpu::{Bus, Cpu, CpuError, Flags};
use crate::instruction::{Condition, IndirectPair, Instruction, Load, Operand8, Operation};

impl Cpu {
    /// Execute a decoded instruction and return the cycles it cost
    pub(crate) fn execute(&mut self, instruction: &Instruction, bus: &mut impl Bus) -> Result<u32, CpuError> {
        let cycles = u32::from(instruction.cycles);
        let not_taken = u32::from(instruction.cycles_not_taken);

        match instruction.operation {
            Operation::Nop => {}
            Operation::Load(load) => self.execute_load(load, bus),

            Operation::Push(pair) => {
                let value = self.registers.get_pair(pair);
                self.push_word(bus, value);
            }
            Operation::Pop(pair) => {
                let value = self.pop_word(bus);
                self.registers.set_pair(pair, value);
            }

            Operation::Jump(condition) => {
                let target = self.fetch_word(bus);
                if !self.condition_met(condition) {
                    return Ok(not_taken);
                }
                self.registers.pc = target;
            }
            Operation::JumpHl => self.registers.pc = self.registers.hl(),
            Operation::JumpRelative(condition) => {
                let offset = self.fetch_byte(bus) as i8;
                if !self.condition_met(condition) {
                    return Ok(not_taken);
                }
                self.registers.pc = self.registers.pc.wrapping_add_signed(i16::from(offset));
            }
            Operation::Call(condition) => {
                let target = self.fetch_word(bus);
                if !self.condition_met(condition) {
                    return Ok(not_taken);
                }
                let ret = self.registers.pc;
                self.push_word(bus, ret);
                self.registers.pc = target;
            }
            Operation::Return(condition) => {
                if !self.condition_met(condition) {
                    return Ok(not_taken);
                }
                self.registers.pc = self.pop_word(bus);
            }
            Operation::ReturnInterrupt => {
                self.registers.pc = self.pop_word(bus);
                self.ime = true;
                self.ime_delay = 0;
            }
            Operation::Reset(vector) => {
                let ret = self.registers.pc;
                self.push_word(bus, ret);
                self.registers.pc = vector;
            }

            Operation::Halt => self.halted = true,
            Operation::Stop => {
                // STOP is followed by a padding byte
                self.fetch_byte(bus);
                self.halted = true;
                self.stopped = true;
            }
            Operation::DisableInterrupts => {
                self.ime = false;
                self.ime_delay = 0;
            }
            Operation::EnableInterrupts => {
                if !self.ime && self.ime_delay == 0 {
                    self.ime_delay = 2;
                }
            }

            Operation::ComplementCarry => {
                let carry = self.registers.f.carry();
                self.registers.f = Flags::from_parts(self.registers.f.zero(), false, false, !carry);
            }
            Operation::SetCarry => {
                self.registers.f = Flags::from_parts(self.registers.f.zero(), false, false, true);
            }
            Operation::DecimalAdjust => {
                let (result, flags) = alu::decimal_adjust(self.registers.a, self.registers.f);
                self.registers.a = result;
                self.registers.f = flags;
            }
            Operation::Complement => {
                self.registers.a = !self.registers.a;
                let f = self.registers.f;
                self.registers.f = Flags::from_parts(f.zero(), true, true, f.carry());
            }

            Operation::Alu(op, source) => {
                let value = self.read_operand(source, bus);
                let (result, flags) = alu::apply(op, self.registers.a, value, self.registers.f);
                self.registers.a = result;
                self.registers.f = flags;
            }
            Operation::Increment(target) => {
                let value = self.read_operand(target, bus);
                let (result, flags) = alu::increment(value, self.registers.f);
                self.write_operand(target, bus, result);
                self.registers.f = flags;
            }
            Operation::Decrement(target) => {
                let value = self.read_operand(target, bus);
                let (result, flags) = alu::decrement(value, self.registers.f);
                self.write_operand(target, bus, result);
                self.registers.f = flags;
            }
            Operation::Increment16(reg) => {
                let value = self.registers.get16(reg).wrapping_add(1);
                self.registers.set16(reg, value);
            }
            Operation::Decrement16(reg) => {
                let value = self.registers.get16(reg).wrapping_sub(1);
                self.registers.set16(reg, value);
            }
            Operation::AddHl(reg) => {
                let value = self.registers.get16(reg);
                let (result, flags) = alu::add16(self.registers.hl(), value, self.registers.f);
                self.registers.set_hl(result);
                self.registers.f = flags;
            }
            Operation::AddSp => {
                let offset = self.fetch_byte(bus) as i8;
                let (result, flags) = alu::add_sp_offset(self.registers.sp, offset);
                self.registers.sp = result;
                self.registers.f = flags;
            }

            Operation::RotateA(op) => {
                let (result, flags) = alu::rotate(op, self.registers.a, self.registers.f);
                self.registers.a = result;
                // The accumulator forms always clear Z
                self.registers.f = Flags::from_parts(false, false, false, flags.carry());
            }
            Operation::Rotate(op, target) => {
                let value = self.read_operand(target, bus);
                let (result, flags) = alu::rotate(op, value, self.registers.f);
                self.write_operand(target, bus, result);
                self.registers.f = flags;
            }
            Operation::Bit(bit, target) => {
                let value = self.read_operand(target, bus);
                let set = value & (1 << bit) != 0;
                let carry = self.registers.f.carry();
                self.registers.f = Flags::from_parts(!set, false, true, carry);
            }
            Operation::Res(bit, target) => {
                let value = self.read_operand(target, bus);
                self.write_operand(target, bus, value & !(1 << bit));
            }
            Operation::Set(bit, target) => {
                let value = self.read_operand(target, bus);
                self.write_operand(target, bus, value | (1 << bit));
            }

            // The fetch loop resolves the prefix before execution
            Operation::Prefix => {
                return Err(CpuError::InvalidOpcode {
                    opcode: 0xCB,
                    pc: instruction.pc,
                })
            }
            Operation::Invalid(opcode) => {
                return Err(CpuError::InvalidOpcode {
                    opcode,
                    pc: instruction.pc,
                })
            }
        }

        Ok(cycles)
    }

    fn execute_load(&mut self, load: Load, bus: &mut impl Bus) {
        match load {
            Load::Byte { dst, src } => {
                let value = self.read_operand(src, bus);
                self.write_operand(dst, bus, value);
            }
            Load::WordImmediate(reg) => {
                let value = self.fetch_word(bus);
                self.registers.set16(reg, value);
            }
            Load::StoreSp => {
                let address = self.fetch_word(bus);
                let [lo, hi] = self.registers.sp.to_le_bytes();
                bus.write(address, lo);
                bus.write(address.wrapping_add(1), hi);
            }
            Load::StoreA(pair) => {
                let address = self.indirect_address(pair);
                bus.write(address, self.registers.a);
            }
            Load::LoadA(pair) => {
                let address = self.indirect_address(pair);
                self.registers.a = bus.read(address);
            }
            Load::StoreHigh => {
                let offset = self.fetch_byte(bus);
                bus.write(0xFF00 | u16::from(offset), self.registers.a);
            }
            Load::LoadHigh => {
                let offset = self.fetch_byte(bus);
                self.registers.a = bus.read(0xFF00 | u16::from(offset));
            }
            Load::StoreHighC => {
                bus.write(0xFF00 | u16::from(self.registers.c), self.registers.a);
            }
            Load::LoadHighC => {
                self.registers.a = bus.read(0xFF00 | u16::from(self.registers.c));
            }
            Load::StoreAbsolute => {
                let address = self.fetch_word(bus);
                bus.write(address, self.registers.a);
            }
            Load::LoadAbsolute => {
                let address = self.fetch_word(bus);
                self.registers.a = bus.read(address);
            }
            Load::SpFromHl => self.registers.sp = self.registers.hl(),
            Load::HlFromSpOffset => {
                let offset = self.fetch_byte(bus) as i8;
                let (result, flags) = alu::add_sp_offset(self.registers.sp, offset);
                self.registers.set_hl(result);
                self.registers.f = flags;
            }
        }
    }

    fn condition_met(&self, condition: Option<Condition>) -> bool {
        let f = self.registers.f;
        match condition {
            None => true,
            Some(Condition::NotZero) => !f.zero(),
            Some(Condition::Zero) => f.zero(),
            Some(Condition::NotCarry) => !f.carry(),
            Some(Condition::Carry) => f.carry(),
        }
    }

    /// Resolve `(BC)`, `(DE)`, `(HL+)` or `(HL-)`, applying the HL step
    fn indirect_address(&mut self, pair: IndirectPair) -> u16 {
        match pair {
            IndirectPair::BC => self.registers.bc(),
            IndirectPair::DE => self.registers.de(),
            IndirectPair::HlIncrement => {
                let hl = self.registers.hl();
                self.registers.set_hl(hl.wrapping_add(1));
                hl
            }
            IndirectPair::HlDecrement => {
                let hl = self.registers.hl();
                self.registers.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn read_operand(&mut self, operand: Operand8, bus: &mut impl Bus) -> u8 {
        match operand {
            Operand8::Register(reg) => self.registers.get(reg),
            Operand8::Indirect => bus.read(self.registers.hl()),
            Operand8::Immediate => self.fetch_byte(bus),
        }
    }

    fn write_operand(&mut self, operand: Operand8, bus: &mut impl Bus, value: u8) {
        match operand {
            Operand8::Register(reg) => self.registers.set(reg, value),
            Operand8::Indirect => bus.write(self.registers.hl(), value),
            // Immediates are never a destination
            Operand8::Immediate => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlatBus;

    fn run(program: &[u8]) -> (Cpu, FlatBus) {
        let mut bus = FlatBus::with_program(0x0100, program);
        let mut cpu = Cpu::new();
        let end = 0x0100 + program.len() as u16;
        while cpu.registers().pc < end && !cpu.halted() {
            cpu.step(&mut bus).expect("valid program");
        }
        (cpu, bus)
    }

    #[test]
    fn test_load_immediate_and_register() {
        // LD B,0x42 ; LD C,B ; LD A,C
        let (cpu, _) = run(&[0x06, 0x42, 0x48, 0x79]);
        assert_eq!(cpu.registers().b, 0x42);
        assert_eq!(cpu.registers().c, 0x42);
        assert_eq!(cpu.registers().a, 0x42);
    }

    #[test]
    fn test_hl_increment_and_decrement_stores() {
        // LD HL,0xC000 ; LD A,0x11 ; LD (HL+),A ; LD (HL-),A
        let (cpu, bus) = run(&[0x21, 0x00, 0xC0, 0x3E, 0x11, 0x22, 0x32]);
        assert_eq!(bus.peek(0xC000), 0x11);
        assert_eq!(bus.peek(0xC001), 0x11);
        assert_eq!(cpu.registers().hl(), 0xC000);
    }

    #[test]
    fn test_store_sp_little_endian() {
        // LD SP,0xBEEF ; LD (0xC010),SP
        let (_, bus) = run(&[0x31, 0xEF, 0xBE, 0x08, 0x10, 0xC0]);
        assert_eq!(bus.peek(0xC010), 0xEF);
        assert_eq!(bus.peek(0xC011), 0xBE);
    }

    #[test]
    fn test_high_page_loads() {
        // LD A,0x5A ; LDH (0x80),A ; LD C,0x80 ; LD A,0 ; LD A,(C)
        let (cpu, bus) = run(&[0x3E, 0x5A, 0xE0, 0x80, 0x0E, 0x80, 0x3E, 0x00, 0xF2]);
        assert_eq!(bus.peek(0xFF80), 0x5A);
        assert_eq!(cpu.registers().a, 0x5A);
    }

    #[test]
    fn test_push_pop_masks_flags() {
        // LD BC,0x12FF ; PUSH BC ; POP AF
        let (cpu, _) = run(&[0x01, 0xFF, 0x12, 0xC5, 0xF1]);
        assert_eq!(cpu.registers().a, 0x12);
        assert_eq!(cpu.registers().f.bits(), 0xF0);
        assert_eq!(cpu.registers().sp, 0xFFFE);
    }

    #[test]
    fn test_push_writes_high_byte_first() {
        let mut bus = FlatBus::with_program(0x0100, &[0xD5]);
        let mut cpu = Cpu::new();
        cpu.registers_mut().set_de(0xABCD);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().sp, 0xFFFC);
        assert_eq!(bus.peek(0xFFFD), 0xAB);
        assert_eq!(bus.peek(0xFFFC), 0xCD);
    }

    #[test]
    fn test_conditional_jump_costs() {
        let mut bus = FlatBus::with_program(0x0100, &[0xC2, 0x00, 0x02, 0xC2, 0x00, 0x02]);
        let mut cpu = Cpu::new();

        // Post-boot F has Z set, so JP NZ falls through
        assert_eq!(cpu.step(&mut bus).unwrap(), 12);
        assert_eq!(cpu.registers().pc, 0x0103);

        cpu.registers_mut().f.set_zero(false);
        assert_eq!(cpu.step(&mut bus).unwrap(), 16);
        assert_eq!(cpu.registers().pc, 0x0200);
    }

    #[test]
    fn test_relative_jump_backwards() {
        let mut bus = FlatBus::with_program(0x0100, &[0x00, 0x18, 0xFD]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 12);
        assert_eq!(cpu.registers().pc, 0x0100);
    }

    #[test]
    fn test_call_and_return() {
        let mut bus = FlatBus::with_program(0x0100, &[0xCD, 0x00, 0x02]);
        bus.load(0x0200, &[0xC9]);
        let mut cpu = Cpu::new();

        assert_eq!(cpu.step(&mut bus).unwrap(), 24);
        assert_eq!(cpu.registers().pc, 0x0200);
        assert_eq!(cpu.registers().sp, 0xFFFC);

        assert_eq!(cpu.step(&mut bus).unwrap(), 16);
        assert_eq!(cpu.registers().pc, 0x0103);
        assert_eq!(cpu.registers().sp, 0xFFFE);
    }

    #[test]
    fn test_conditional_return_costs() {
        // RET NC with carry set (post-boot F = B0)
        let mut bus = FlatBus::with_program(0x0100, &[0xD0]);
        let mut cpu = Cpu::new();
        assert_eq!(cpu.step(&mut bus).unwrap(), 8);
        assert_eq!(cpu.registers().pc, 0x0101);
    }

    #[test]
    fn test_reset_vector() {
        let mut bus = FlatBus::with_program(0x0100, &[0xEF]);
        let mut cpu = Cpu::new();
        assert_eq!(cpu.step(&mut bus).unwrap(), 16);
        assert_eq!(cpu.registers().pc, 0x0028);
        assert_eq!(bus.peek(0xFFFC), 0x01);
        assert_eq!(bus.peek(0xFFFD), 0x01);
    }

    #[test]
    fn test_enable_interrupts_is_delayed() {
        // EI ; NOP ; NOP
        let mut bus = FlatBus::with_program(0x0100, &[0xFB, 0x00, 0x00]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.ime());
        cpu.step(&mut bus).unwrap();
        assert!(cpu.ime());
    }

    #[test]
    fn test_disable_cancels_pending_enable() {
        // EI ; DI ; NOP
        let mut bus = FlatBus::with_program(0x0100, &[0xFB, 0xF3, 0x00]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.ime());
    }

    #[test]
    fn test_reti_enables_immediately() {
        let mut bus = FlatBus::with_program(0x0100, &[0xD9]);
        let mut cpu = Cpu::new();
        cpu.registers_mut().sp = 0xC000;
        bus.load(0xC000, &[0x34, 0x12]);
        cpu.step(&mut bus).unwrap();
        assert!(cpu.ime());
        assert_eq!(cpu.registers().pc, 0x1234);
    }

    #[test]
    fn test_halt_and_stop() {
        let (cpu, _) = run(&[0x76]);
        assert!(cpu.halted());

        let mut bus = FlatBus::with_program(0x0100, &[0x10, 0x00]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert!(cpu.stopped());
        assert!(cpu.halted());
        assert_eq!(cpu.registers().pc, 0x0102);
    }

    #[test]
    fn test_alu_with_indirect_and_immediate() {
        // LD HL,0xC000 ; LD (HL),0x0F ; LD A,0x01 ; ADD A,(HL) ; CP 0x10
        let (cpu, _) = run(&[0x21, 0x00, 0xC0, 0x36, 0x0F, 0x3E, 0x01, 0x86, 0xFE, 0x10]);
        assert_eq!(cpu.registers().a, 0x10);
        assert!(cpu.flags().zero());
        assert!(cpu.flags().subtract());
    }

    #[test]
    fn test_increment_memory() {
        // LD HL,0xC000 ; LD (HL),0xFF ; INC (HL)
        let (cpu, bus) = run(&[0x21, 0x00, 0xC0, 0x36, 0xFF, 0x34]);
        assert_eq!(bus.peek(0xC000), 0x00);
        assert!(cpu.flags().zero());
        assert!(cpu.flags().half_carry());
    }

    #[test]
    fn test_sixteen_bit_arithmetic() {
        // LD HL,0x0FFF ; LD BC,0x0001 ; ADD HL,BC ; DEC BC ; INC SP
        let (cpu, _) = run(&[0x21, 0xFF, 0x0F, 0x01, 0x01, 0x00, 0x09, 0x0B, 0x33]);
        assert_eq!(cpu.registers().hl(), 0x1000);
        assert_eq!(cpu.registers().bc(), 0x0000);
        assert_eq!(cpu.registers().sp, 0xFFFF);
        assert!(cpu.flags().half_carry());
    }

    #[test]
    fn test_stack_pointer_offsets() {
        // LD SP,0xFFF8 ; LD HL,SP+2 ; ADD SP,-8
        let (cpu, _) = run(&[0x31, 0xF8, 0xFF, 0xF8, 0x02, 0xE8, 0xF8]);
        assert_eq!(cpu.registers().hl(), 0xFFFA);
        assert_eq!(cpu.registers().sp, 0xFFF0);
    }

    #[test]
    fn test_accumulator_rotate_clears_zero() {
        // LD A,0x80 ; RLCA
        let (cpu, _) = run(&[0x3E, 0x80, 0x07]);
        assert_eq!(cpu.registers().a, 0x01);
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().carry());

        // XOR A ; RLA with carry clear still leaves Z clear
        let (cpu, _) = run(&[0xAF, 0x17]);
        assert_eq!(cpu.registers().a, 0x00);
        assert!(!cpu.flags().zero());
    }

    #[test]
    fn test_prefixed_bit_ops() {
        // LD A,0x01 ; BIT 0,A ; SET 7,A ; RES 0,A ; SWAP A
        let mut bus = FlatBus::with_program(0x0100, &[0x3E, 0x01, 0xCB, 0x47, 0xCB, 0xFF, 0xCB, 0x87, 0xCB, 0x37]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();

        assert_eq!(cpu.step(&mut bus).unwrap(), 8);
        assert!(!cpu.flags().zero());
        assert!(cpu.flags().half_carry());

        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().a, 0x81);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().a, 0x80);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().a, 0x08);
    }

    #[test]
    fn test_prefixed_memory_costs() {
        // LD HL,0xC000 ; BIT 0,(HL) ; SET 0,(HL)
        let mut bus = FlatBus::with_program(0x0100, &[0x21, 0x00, 0xC0, 0xCB, 0x46, 0xCB, 0xC6]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 12);
        assert!(cpu.flags().zero());
        assert_eq!(cpu.step(&mut bus).unwrap(), 16);
        assert_eq!(bus.peek(0xC000), 0x01);
        assert_eq!(cpu.registers().pc, 0x0107);
    }

    #[test]
    fn test_decimal_adjust_and_complement() {
        // LD A,0x45 ; ADD A,0x38 ; DAA ; CPL
        let (cpu, _) = run(&[0x3E, 0x45, 0xC6, 0x38, 0x27, 0x2F]);
        assert_eq!(cpu.registers().a, !0x83);
        assert!(cpu.flags().subtract());
        assert!(cpu.flags().half_carry());
    }

    #[test]
    fn test_carry_flag_ops() {
        // SCF ; CCF
        let mut bus = FlatBus::with_program(0x0100, &[0x37, 0x3F]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert!(cpu.flags().carry());
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.flags().carry());
        assert!(cpu.flags().zero());
    }

    #[test]
    fn test_invalid_opcode_is_an_error() {
        let mut bus = FlatBus::with_program(0x0100, &[0x00, 0xD3]);
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert_eq!(
            cpu.step(&mut bus),
            Err(CpuError::InvalidOpcode { opcode: 0xD3, pc: 0x0101 })
        );
    }
}
