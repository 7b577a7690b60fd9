//! GB Core - Pure Rust DMG emulator library
//!
//! This crate provides the processing core of the original Game Boy: the
//! SM83 interpreter, the memory-mapped bus, cartridge bank switching and
//! the timer, interrupt, LCD and serial register blocks. It performs no
//! file I/O and renders no pixels.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Flag arithmetic shared by the execution engine
pub mod alu;
/// Memory bus and mapping
pub mod bus;
/// Cartridge header parsing and bank controllers
pub mod cartridge;
/// SM83 registers, fetch loop and interrupt entry
pub mod cpu;
mod execute;
/// Opcode decoding into typed operations
pub mod instruction;
/// Interrupt flag and enable registers
pub mod interrupt;
/// LCD controller registers
pub mod lcd;
/// Serial port with output capture
pub mod serial;
/// Integration module for the complete system
pub mod system;
/// Synthetic ROMs and a flat bus for tests and benchmarks
pub mod testing;
/// Divider and timer
pub mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use cpu::{Bus, Cpu, CpuError};
pub use system::{GameBoy, RunConfig, Step, StopReason};

/// Errors surfaced by the emulator
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
    #[error(transparent)]
    Cpu(#[from] CpuError),
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
