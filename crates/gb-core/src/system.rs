//! DMG system integration
//!
//! `GameBoy` owns the CPU and the bus and drives them one instruction at a
//! time: execute, advance the peripherals by the cycles spent, then service
//! interrupts at the instruction boundary.

use crate::bus::SystemBus;
use crate::cartridge::Cartridge;
use crate::cpu::{Bus, Cpu};
use crate::instruction::{Instruction, Operation};
use crate::Result;

/// Run loop stop policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunConfig {
    /// Stop after this many instructions
    pub max_instructions: Option<u64>,
    /// Stop when a taken `JR` jumps to itself
    pub exit_on_infinite_loop: bool,
}

/// Outcome of a single [`GameBoy::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Cycles spent, interrupt dispatch included
    pub cycles: u32,
    /// The instruction executed, or None while halted
    pub instruction: Option<Instruction>,
    /// The instruction was a taken `JR` or `JR cc` back onto itself
    pub self_loop: bool,
}

/// Why [`GameBoy::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    InstructionLimit,
    InfiniteLoop { pc: u16 },
    /// Halted with no enabled source that the peripherals can raise
    Deadlock { pc: u16 },
}

/// DMG system - integrates CPU, bus and cartridge
#[derive(Debug, Clone)]
pub struct GameBoy {
    cpu: Cpu,
    bus: SystemBus,
    config: RunConfig,
    /// Instructions executed
    instructions: u64,
    /// T-cycles elapsed
    cycles: u64,
}

impl GameBoy {
    pub fn new(cartridge: Cartridge, config: RunConfig) -> Self {
        Self {
            cpu: Cpu::new(),
            bus: SystemBus::new(cartridge),
            config,
            instructions: 0,
            cycles: 0,
        }
    }

    /// Load a cartridge image and build a system around it
    pub fn from_rom(image: &[u8], config: RunConfig) -> Result<Self> {
        let cartridge = Cartridge::load(image)?;
        Ok(Self::new(cartridge, config))
    }

    /// Execute one instruction, or one halted tick
    pub fn step(&mut self) -> Result<Step> {
        let (cycles, instruction, self_loop) = if self.cpu.halted() {
            (self.cpu.idle(), None, false)
        } else {
            let executed = self.cpu.step_instruction(&mut self.bus)?;
            self.instructions += 1;
            let self_loop = matches!(executed.instruction.operation, Operation::JumpRelative(_))
                && self.cpu.registers().pc == executed.instruction.pc;
            (executed.cycles, Some(executed.instruction), self_loop)
        };
        self.bus.tick(cycles);

        let dispatch = self.cpu.service_interrupt(&mut self.bus);
        if dispatch > 0 {
            self.bus.tick(dispatch);
        }

        let total = cycles + dispatch;
        self.cycles += u64::from(total);
        Ok(Step {
            cycles: total,
            instruction,
            self_loop,
        })
    }

    /// Step until a stop condition from the configuration is met
    pub fn run(&mut self) -> Result<StopReason> {
        self.run_with(|_| {})
    }

    /// Like [`GameBoy::run`], calling `after_step` once per step
    pub fn run_with<F>(&mut self, mut after_step: F) -> Result<StopReason>
    where
        F: FnMut(&mut Self),
    {
        loop {
            if let Some(limit) = self.config.max_instructions {
                if self.instructions >= limit {
                    return Ok(StopReason::InstructionLimit);
                }
            }

            let step = self.step()?;
            after_step(self);

            if step.self_loop && self.config.exit_on_infinite_loop {
                let pc = step.instruction.map_or(self.cpu.registers().pc, |i| i.pc);
                return Ok(StopReason::InfiniteLoop { pc });
            }
            if self.cpu.halted()
                && !self.bus.interrupts().has_pending()
                && self.bus.reachable_interrupts() == 0
            {
                return Ok(StopReason::Deadlock {
                    pc: self.cpu.registers().pc,
                });
            }
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    pub fn cartridge(&self) -> &Cartridge {
        self.bus.cartridge()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Bytes sent over the serial port so far
    pub fn serial_output(&self) -> &[u8] {
        self.bus.serial().output()
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Read a byte from memory via the bus
    pub fn read_memory(&mut self, address: u16) -> u8 {
        self.bus.read(address)
    }

    /// Write a byte to memory via the bus
    pub fn write_memory(&mut self, address: u16, value: u8) {
        self.bus.write(address, value);
    }
}
