//! CPU module - SM83 (LR35902) implementation
//!
//! The DMG uses an 8080/Z80 relative with its own flag layout and no
//! index registers. Execution lives in `execute.rs`; decoding in
//! `instruction.rs`.

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::interrupt::{Interrupt, INTERRUPT_ENABLE_ADDRESS, INTERRUPT_FLAG_ADDRESS};
use crate::instruction::{decode, decode_prefixed, Instruction, Operation, Reg16, Reg8, StackPair};

/// Flag register (F). The low nibble always reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const ZERO: u8 = 0b1000_0000;
    pub const SUBTRACT: u8 = 0b0100_0000;
    pub const HALF_CARRY: u8 = 0b0010_0000;
    pub const CARRY: u8 = 0b0001_0000;

    pub fn new(bits: u8) -> Self {
        Self(bits & 0xF0)
    }

    /// Build a flag set from its four components
    pub fn from_parts(zero: bool, subtract: bool, half_carry: bool, carry: bool) -> Self {
        let mut flags = Self(0);
        flags.set_zero(zero);
        flags.set_subtract(subtract);
        flags.set_half_carry(half_carry);
        flags.set_carry(carry);
        flags
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn zero(&self) -> bool {
        (self.0 & Self::ZERO) != 0
    }

    pub fn subtract(&self) -> bool {
        (self.0 & Self::SUBTRACT) != 0
    }

    pub fn half_carry(&self) -> bool {
        (self.0 & Self::HALF_CARRY) != 0
    }

    pub fn carry(&self) -> bool {
        (self.0 & Self::CARRY) != 0
    }

    pub fn set_zero(&mut self, val: bool) {
        self.0 = if val { self.0 | Self::ZERO } else { self.0 & !Self::ZERO };
    }

    pub fn set_subtract(&mut self, val: bool) {
        self.0 = if val { self.0 | Self::SUBTRACT } else { self.0 & !Self::SUBTRACT };
    }

    pub fn set_half_carry(&mut self, val: bool) {
        self.0 = if val { self.0 | Self::HALF_CARRY } else { self.0 & !Self::HALF_CARRY };
    }

    pub fn set_carry(&mut self, val: bool) {
        self.0 = if val { self.0 | Self::CARRY } else { self.0 & !Self::CARRY };
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            flag(self.zero(), 'Z'),
            flag(self.subtract(), 'N'),
            flag(self.half_carry(), 'H'),
            flag(self.carry(), 'C')
        )
    }
}

/// SM83 register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Default for Registers {
    /// Register state left behind by the DMG boot ROM
    fn default() -> Self {
        Self {
            a: 0x01,
            f: Flags::new(0xB0),
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
        }
    }
}

impl Registers {
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f.bits()])
    }

    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.f = Flags::new(f);
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    pub fn get(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::A => self.a = value,
            Reg8::B => self.b = value,
            Reg8::C => self.c = value,
            Reg8::D => self.d = value,
            Reg8::E => self.e = value,
            Reg8::H => self.h = value,
            Reg8::L => self.l = value,
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::BC => self.bc(),
            Reg16::DE => self.de(),
            Reg16::HL => self.hl(),
            Reg16::SP => self.sp,
        }
    }

    pub fn set16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::BC => self.set_bc(value),
            Reg16::DE => self.set_de(value),
            Reg16::HL => self.set_hl(value),
            Reg16::SP => self.sp = value,
        }
    }

    pub fn get_pair(&self, pair: StackPair) -> u16 {
        match pair {
            StackPair::BC => self.bc(),
            StackPair::DE => self.de(),
            StackPair::HL => self.hl(),
            StackPair::AF => self.af(),
        }
    }

    pub fn set_pair(&mut self, pair: StackPair, value: u16) {
        match pair {
            StackPair::BC => self.set_bc(value),
            StackPair::DE => self.set_de(value),
            StackPair::HL => self.set_hl(value),
            StackPair::AF => self.set_af(value),
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:{:02X} F:{} BC:{:04X} DE:{:04X} HL:{:04X} SP:{:04X} PC:{:04X}",
            self.a,
            self.f,
            self.bc(),
            self.de(),
            self.hl(),
            self.sp,
            self.pc
        )
    }
}

/// An instruction that ran to completion, with the cycles it cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executed {
    pub instruction: Instruction,
    pub cycles: u32,
}

/// Cycles spent while halted before the run loop checks for interrupts again
pub const HALT_TICK_CYCLES: u32 = 4;

/// Cycles spent pushing PC and jumping to an interrupt vector
pub const INTERRUPT_DISPATCH_CYCLES: u32 = 20;

/// CPU emulator state
#[derive(Debug, Clone)]
pub struct Cpu {
    pub(crate) registers: Registers,
    /// Interrupt master enable
    pub(crate) ime: bool,
    /// Instructions left before a pending EI takes effect (0 = none pending)
    pub(crate) ime_delay: u8,
    pub(crate) halted: bool,
    pub(crate) stopped: bool,
    /// Total cycles executed
    total_cycles: u64,
}

impl Cpu {
    /// Create a CPU in the post-boot state
    pub fn new() -> Self {
        Self {
            registers: Registers::default(),
            ime: false,
            ime_delay: 0,
            halted: false,
            stopped: false,
            total_cycles: 0,
        }
    }

    /// Reset the CPU to its post-boot state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn flags(&self) -> Flags {
        self.registers.f
    }

    pub fn ime(&self) -> bool {
        self.ime
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Execute one instruction and return the cycles it consumed
    pub fn step(&mut self, bus: &mut impl Bus) -> Result<u32, CpuError> {
        self.step_instruction(bus).map(|executed| executed.cycles)
    }

    /// Execute one instruction, returning it along with its cycle cost
    pub fn step_instruction(&mut self, bus: &mut impl Bus) -> Result<Executed, CpuError> {
        let instruction = self.fetch_instruction(bus);
        trace!("{:04X}  {:<14} {}", instruction.pc, instruction, self.registers);

        let cycles = self.execute(&instruction, bus)?;
        self.advance_ime_delay();
        self.total_cycles += u64::from(cycles);

        Ok(Executed { instruction, cycles })
    }

    /// Spend one tick halted. The caller keeps the peripherals running.
    pub fn idle(&mut self) -> u32 {
        self.total_cycles += u64::from(HALT_TICK_CYCLES);
        HALT_TICK_CYCLES
    }

    /// Leave HALT/STOP because an enabled interrupt became pending
    pub fn wake(&mut self) {
        self.halted = false;
        self.stopped = false;
    }

    /// Check IE & IF at an instruction boundary.
    ///
    /// A pending enabled source always wakes a halted CPU. With IME set the
    /// highest-priority source is acknowledged in IF and dispatched; the
    /// returned cycles are 0 when nothing was dispatched.
    pub fn service_interrupt(&mut self, bus: &mut impl Bus) -> u32 {
        let flags = bus.read(INTERRUPT_FLAG_ADDRESS);
        let pending = bus.read(INTERRUPT_ENABLE_ADDRESS) & flags & Interrupt::MASK;
        if pending == 0 {
            return 0;
        }
        self.wake();
        if !self.ime {
            return 0;
        }

        let Some(interrupt) = Interrupt::highest(pending) else {
            return 0;
        };
        bus.write(INTERRUPT_FLAG_ADDRESS, flags & !interrupt.bit());
        self.dispatch_interrupt(interrupt.vector(), bus)
    }

    /// Jump to an interrupt vector: IME is cleared and PC pushed
    fn dispatch_interrupt(&mut self, vector: u16, bus: &mut impl Bus) -> u32 {
        self.ime = false;
        self.ime_delay = 0;
        let pc = self.registers.pc;
        self.push_word(bus, pc);
        self.registers.pc = vector;
        self.total_cycles += u64::from(INTERRUPT_DISPATCH_CYCLES);
        INTERRUPT_DISPATCH_CYCLES
    }

    /// Read the opcode at PC, following the CB prefix into its table
    fn fetch_instruction(&mut self, bus: &mut impl Bus) -> Instruction {
        let pc = self.registers.pc;
        let opcode = self.fetch_byte(bus);
        let instruction = decode(opcode, pc);
        if instruction.operation == Operation::Prefix {
            let opcode = self.fetch_byte(bus);
            decode_prefixed(opcode, pc)
        } else {
            instruction
        }
    }

    fn advance_ime_delay(&mut self) {
        if self.ime_delay > 0 {
            self.ime_delay -= 1;
            if self.ime_delay == 0 {
                self.ime = true;
            }
        }
    }

    pub(crate) fn fetch_byte(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.registers.sp = self.registers.sp.wrapping_sub(1);
        bus.write(self.registers.sp, hi);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
        bus.write(self.registers.sp, lo);
    }

    pub(crate) fn pop_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = bus.read(self.registers.sp);
        self.registers.sp = self.registers.sp.wrapping_add(1);
        let hi = bus.read(self.registers.sp);
        self.registers.sp = self.registers.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("invalid opcode 0x{opcode:02X} at 0x{pc:04X}")]
    InvalidOpcode { opcode: u8, pc: u16 },
}

/// Bus trait for memory and I/O access
pub trait Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8;
    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8);
}
