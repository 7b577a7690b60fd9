//! Testing utilities
//!
//! `RomBuilder` assembles synthetic cartridge images with a valid header so
//! tests can exercise the loader and the run loop without shipping ROM
//! files. `FlatBus` is a 64 KiB array with no mapping at all, for driving
//! the CPU in isolation.

use crate::cartridge::{header_checksum, NINTENDO_LOGO, ROM_BANK_SIZE};
use crate::cpu::Bus;

/// Address a builder-generated entry point jumps to
pub const PROGRAM_START: u16 = 0x0150;

/// Builder for cartridge images
#[derive(Debug, Clone)]
pub struct RomBuilder {
    title: String,
    cartridge_type: u8,
    rom_size_code: u8,
    header_rom_size_code: Option<u8>,
    ram_size_code: u8,
    bank_markers: bool,
    extra_logos: Vec<usize>,
    code: Vec<(usize, Vec<u8>)>,
}

impl RomBuilder {
    /// A 32 KiB ROM-only image whose entry point jumps to [`PROGRAM_START`]
    pub fn new() -> Self {
        Self {
            title: String::from("TEST"),
            cartridge_type: 0x00,
            rom_size_code: 0,
            header_rom_size_code: None,
            ram_size_code: 0,
            bank_markers: false,
            extra_logos: Vec::new(),
            code: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Cartridge type byte (0x147)
    pub fn chip(mut self, cartridge_type: u8) -> Self {
        self.cartridge_type = cartridge_type;
        self
    }

    /// ROM size code (0x148); the image is sized to match
    pub fn rom_size_code(mut self, code: u8) -> Self {
        self.rom_size_code = code;
        self
    }

    /// Write a ROM size code to the header without resizing the image
    pub fn raw_rom_size_code(mut self, code: u8) -> Self {
        self.header_rom_size_code = Some(code);
        self
    }

    /// RAM size code (0x149)
    pub fn ram_size_code(mut self, code: u8) -> Self {
        self.ram_size_code = code;
        self
    }

    /// Store the low byte of each bank's index at the bank's first byte
    pub fn bank_markers(mut self) -> Self {
        self.bank_markers = true;
        self
    }

    /// Copy the boot logo into another bank's header area
    pub fn logo_at_bank(mut self, bank: usize) -> Self {
        self.extra_logos.push(bank);
        self
    }

    /// Place bytes at an absolute image offset
    pub fn code(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.code.push((offset, bytes.to_vec()));
        self
    }

    /// Place a program at [`PROGRAM_START`]
    pub fn program(self, bytes: &[u8]) -> Self {
        self.code(usize::from(PROGRAM_START), bytes)
    }

    pub fn build(&self) -> Vec<u8> {
        let size = (32 * 1024) << self.rom_size_code.min(8);
        let mut image = vec![0u8; size];

        if self.bank_markers {
            for (bank, chunk) in image.chunks_mut(ROM_BANK_SIZE).enumerate() {
                chunk[0] = bank as u8;
            }
        }

        // NOP ; JP PROGRAM_START
        let [lo, hi] = PROGRAM_START.to_le_bytes();
        image[0x0100..0x0104].copy_from_slice(&[0x00, 0xC3, lo, hi]);
        image[0x0104..0x0134].copy_from_slice(&NINTENDO_LOGO);
        for &bank in &self.extra_logos {
            let start = bank * ROM_BANK_SIZE + 0x0104;
            image[start..start + NINTENDO_LOGO.len()].copy_from_slice(&NINTENDO_LOGO);
        }

        let title = self.title.as_bytes();
        let len = title.len().min(16);
        image[0x0134..0x0134 + len].copy_from_slice(&title[..len]);
        image[0x0147] = self.cartridge_type;
        image[0x0148] = self.header_rom_size_code.unwrap_or(self.rom_size_code);
        image[0x0149] = self.ram_size_code;

        for (offset, bytes) in &self.code {
            image[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }

        image[0x014D] = header_checksum(&image);
        image
    }
}

impl Default for RomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat 64 KiB memory
#[derive(Debug, Clone)]
pub struct FlatBus {
    memory: Vec<u8>,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            memory: vec![0; 0x10000],
        }
    }

    pub fn with_program(origin: u16, program: &[u8]) -> Self {
        let mut bus = Self::new();
        bus.load(origin, program);
        bus
    }

    pub fn load(&mut self, origin: u16, bytes: &[u8]) {
        let start = usize::from(origin);
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FlatBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }
}
