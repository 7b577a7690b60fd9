//! Cartridge and memory bank controller support
//!
//! A cartridge is the ROM image plus whatever external RAM and banking chip
//! the header declares. The chip decides which 16 KiB ROM bank appears in
//! each ROM window and which 8 KiB RAM bank appears at A000-BFFF.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// Size of the reserved area plus header
pub const HEADER_END: usize = 0x0150;

const LOGO_ADDRESS: u16 = 0x0104;
const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const TYPE_ADDRESS: usize = 0x0147;
const ROM_SIZE_ADDRESS: usize = 0x0148;
const RAM_SIZE_ADDRESS: usize = 0x0149;
const VERSION_ADDRESS: usize = 0x014C;
const CHECKSUM_ADDRESS: usize = 0x014D;
const GLOBAL_CHECKSUM_ADDRESS: usize = 0x014E;

/// MBC2 carries 512 half-bytes of RAM inside the chip
const MBC2_RAM_SIZE: usize = 512;

/// Multicart boards all use at least 8 Mbit of ROM
const MULTICART_MIN_ROM: usize = 1024 * 1024;

/// The boot logo every licensed cartridge carries at 0x0104
pub const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

/// Banking chip family, from header byte 0x147
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankingChip {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl BankingChip {
    pub fn from_type(code: u8) -> Option<Self> {
        match code {
            0x00 | 0x08 | 0x09 => Some(Self::RomOnly),
            0x01..=0x03 => Some(Self::Mbc1),
            0x05 | 0x06 => Some(Self::Mbc2),
            0x0F..=0x13 => Some(Self::Mbc3),
            0x19..=0x1E => Some(Self::Mbc5),
            _ => None,
        }
    }
}

impl fmt::Display for BankingChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BankingChip::RomOnly => "ROM only",
            BankingChip::Mbc1 => "MBC1",
            BankingChip::Mbc2 => "MBC2",
            BankingChip::Mbc3 => "MBC3",
            BankingChip::Mbc5 => "MBC5",
        };
        f.write_str(name)
    }
}

/// Parsed cartridge header (0x0100-0x014F)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    /// Game title, NUL-trimmed
    pub title: String,
    /// Raw cartridge type byte
    pub cartridge_type: u8,
    pub chip: BankingChip,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    /// Mask ROM version number
    pub version: u8,
    pub header_checksum: u8,
    /// Big-endian sum of every ROM byte except these two; not verified
    pub global_checksum: u16,
}

impl CartridgeHeader {
    /// Parse the header fields. Does not verify the checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_END {
            return Err(CartridgeError::TooSmall { len: bytes.len() });
        }

        let title = bytes[TITLE_START..=TITLE_END]
            .iter()
            .take_while(|&&b| b != 0 && b.is_ascii())
            .map(|&b| char::from(b))
            .collect::<String>()
            .trim_end()
            .to_string();

        let cartridge_type = bytes[TYPE_ADDRESS];
        let chip = BankingChip::from_type(cartridge_type).ok_or(CartridgeError::UnsupportedChip(cartridge_type))?;

        let header = Self {
            title,
            cartridge_type,
            chip,
            rom_size_code: bytes[ROM_SIZE_ADDRESS],
            ram_size_code: bytes[RAM_SIZE_ADDRESS],
            version: bytes[VERSION_ADDRESS],
            header_checksum: bytes[CHECKSUM_ADDRESS],
            global_checksum: u16::from_be_bytes([bytes[GLOBAL_CHECKSUM_ADDRESS], bytes[GLOBAL_CHECKSUM_ADDRESS + 1]]),
        };
        header.rom_size()?;
        header.ram_size()?;
        Ok(header)
    }

    /// ROM size in bytes: 32 KiB << code
    pub fn rom_size(&self) -> Result<usize, CartridgeError> {
        match self.rom_size_code {
            code @ 0..=8 => Ok((32 * 1024) << code),
            code => Err(CartridgeError::InvalidRomSize(code)),
        }
    }

    /// External RAM size in bytes. MBC2's internal RAM is not counted here.
    pub fn ram_size(&self) -> Result<usize, CartridgeError> {
        match self.ram_size_code {
            0 | 1 => Ok(0),
            2 => Ok(8 * 1024),
            3 => Ok(32 * 1024),
            4 => Ok(128 * 1024),
            5 => Ok(64 * 1024),
            code => Err(CartridgeError::InvalidRamSize(code)),
        }
    }
}

/// Header checksum over 0x0134..=0x014C: `x = x - b - 1`
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[TITLE_START..=VERSION_ADDRESS]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

/// Banking chip registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankRegisters {
    pub ram_enabled: bool,
    /// Switchable ROM bank (BANK1 on MBC1)
    pub rom_bank: u16,
    /// RAM bank, upper ROM bits on MBC1 (BANK2), or RTC select on MBC3
    pub ram_bank: u8,
    /// MBC1 banking mode
    pub mode: bool,
}

impl Default for BankRegisters {
    fn default() -> Self {
        Self {
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
            mode: false,
        }
    }
}

/// Loaded cartridge
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: CartridgeHeader,
    rom: Vec<u8>,
    ram: Vec<u8>,
    registers: BankRegisters,
    /// MBC1 multicart wiring: BANK2 shifts by 4 instead of 5
    multicart: bool,
    game_count: u8,
}

impl Cartridge {
    /// Validate and load a cartridge image
    pub fn load(image: &[u8]) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(image)?;

        let computed = header_checksum(image);
        if computed != header.header_checksum {
            return Err(CartridgeError::ChecksumMismatch {
                expected: header.header_checksum,
                computed,
            });
        }

        let rom_size = header.rom_size()?;
        if image.len() != rom_size {
            warn!(
                "image is {} bytes but header declares {} bytes of ROM",
                image.len(),
                rom_size
            );
        }
        let mut rom = vec![0xFF; rom_size];
        let copied = image.len().min(rom_size);
        rom[..copied].copy_from_slice(&image[..copied]);

        let ram_size = match header.chip {
            BankingChip::Mbc2 => MBC2_RAM_SIZE,
            _ => header.ram_size()?,
        };

        let mut cartridge = Self {
            header,
            rom,
            ram: vec![0x00; ram_size],
            registers: BankRegisters::default(),
            multicart: false,
            game_count: 1,
        };

        if cartridge.header.chip == BankingChip::Mbc1 {
            cartridge.detect_multicart();
        }

        info!(
            title = %cartridge.header.title,
            chip = %cartridge.header.chip,
            rom_kib = rom_size / 1024,
            ram_kib = ram_size / 1024,
            multicart = cartridge.multicart,
            "cartridge loaded"
        );
        Ok(cartridge)
    }

    /// Read from the ROM windows (0000-7FFF) or the RAM window (A000-BFFF)
    pub fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => self.read_rom(self.rom0_bank(), address),
            0x4000..=0x7FFF => self.read_rom(self.romx_bank(), address),
            0xA000..=0xBFFF => self.read_ram(address),
            _ => 0xFF,
        }
    }

    /// Write to a banking register (0000-7FFF) or to external RAM
    pub fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x7FFF => self.write_register(address, value),
            0xA000..=0xBFFF => self.write_ram(address, value),
            _ => {}
        }
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn chip(&self) -> BankingChip {
        self.header.chip
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn registers(&self) -> &BankRegisters {
        &self.registers
    }

    pub fn rom_bank_count(&self) -> usize {
        self.rom.len() / ROM_BANK_SIZE
    }

    pub fn ram_bank_count(&self) -> usize {
        self.ram.len() / RAM_BANK_SIZE
    }

    pub fn is_multicart(&self) -> bool {
        self.multicart
    }

    /// Games found on a multicart, 1 otherwise
    pub fn game_count(&self) -> u8 {
        self.game_count
    }

    fn bank2_shift(&self) -> u16 {
        if self.multicart {
            4
        } else {
            5
        }
    }

    /// Bank mapped at 0000-3FFF
    fn rom0_bank(&self) -> usize {
        match self.header.chip {
            BankingChip::Mbc1 if self.registers.mode => usize::from(u16::from(self.registers.ram_bank) << self.bank2_shift()),
            _ => 0,
        }
    }

    /// Bank mapped at 4000-7FFF
    fn romx_bank(&self) -> usize {
        let r = &self.registers;
        match self.header.chip {
            BankingChip::RomOnly => 1,
            BankingChip::Mbc1 => {
                let shift = self.bank2_shift();
                let bank1 = r.rom_bank & ((1 << shift) - 1);
                usize::from((u16::from(r.ram_bank) << shift) | bank1)
            }
            BankingChip::Mbc2 | BankingChip::Mbc3 | BankingChip::Mbc5 => usize::from(r.rom_bank),
        }
    }

    fn read_rom(&self, bank: usize, address: u16) -> u8 {
        let bank = bank % self.rom_bank_count();
        self.rom[bank * ROM_BANK_SIZE + usize::from(address & 0x3FFF)]
    }

    /// Offset into `ram` for an A000-BFFF access, or None when unmapped
    fn ram_offset(&self, address: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let r = &self.registers;
        let offset = usize::from(address - 0xA000);
        match self.header.chip {
            BankingChip::RomOnly => Some(offset % self.ram.len()),
            BankingChip::Mbc2 => r.ram_enabled.then_some(offset % MBC2_RAM_SIZE),
            BankingChip::Mbc1 | BankingChip::Mbc3 | BankingChip::Mbc5 => {
                if !r.ram_enabled {
                    return None;
                }
                let bank = match self.header.chip {
                    BankingChip::Mbc1 if !r.mode => 0,
                    // 08-0C select RTC registers, which are not emulated
                    BankingChip::Mbc3 if r.ram_bank > 0x03 => return None,
                    _ => usize::from(r.ram_bank),
                };
                // Sizes below one bank (none today) still mirror
                let banks = self.ram_bank_count().max(1);
                Some(((bank % banks) * RAM_BANK_SIZE + offset) % self.ram.len())
            }
        }
    }

    fn read_ram(&self, address: u16) -> u8 {
        match self.ram_offset(address) {
            Some(offset) if self.header.chip == BankingChip::Mbc2 => 0xF0 | self.ram[offset],
            Some(offset) => self.ram[offset],
            None => 0xFF,
        }
    }

    fn write_ram(&mut self, address: u16, value: u8) {
        if let Some(offset) = self.ram_offset(address) {
            self.ram[offset] = if self.header.chip == BankingChip::Mbc2 {
                value & 0x0F
            } else {
                value
            };
        }
    }

    fn write_register(&mut self, address: u16, value: u8) {
        let r = &mut self.registers;
        match self.header.chip {
            BankingChip::RomOnly => {}
            BankingChip::Mbc1 => match address {
                0x0000..=0x1FFF => r.ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => r.rom_bank = u16::from(value & 0x1F).max(1),
                0x4000..=0x5FFF => r.ram_bank = value & 0x03,
                _ => r.mode = value & 0x01 != 0,
            },
            BankingChip::Mbc2 => {
                if address <= 0x3FFF {
                    if address & 0x0100 == 0 {
                        r.ram_enabled = value & 0x0F == 0x0A;
                    } else {
                        r.rom_bank = u16::from(value & 0x0F).max(1);
                    }
                }
            }
            BankingChip::Mbc3 => match address {
                0x0000..=0x1FFF => r.ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => r.rom_bank = u16::from(value & 0x7F).max(1),
                0x4000..=0x5FFF => r.ram_bank = value,
                // Clock latch
                _ => {}
            },
            BankingChip::Mbc5 => match address {
                0x0000..=0x1FFF => r.ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x2FFF => r.rom_bank = (r.rom_bank & 0x100) | u16::from(value),
                0x3000..=0x3FFF => r.rom_bank = (r.rom_bank & 0x0FF) | (u16::from(value & 0x01) << 8),
                0x4000..=0x5FFF => r.ram_bank = value & 0x0F,
                _ => {}
            },
        }
    }

    /// Look for more than one boot logo behind the BANK2 lines.
    ///
    /// Every banking register touched by the scan is restored afterwards.
    fn detect_multicart(&mut self) {
        if self.rom.len() < MULTICART_MIN_ROM {
            return;
        }

        let saved = self.registers;
        self.multicart = true;
        self.registers.rom_bank = 0;
        self.registers.mode = true;

        let mut games = 0u8;
        for bank2 in 0..=3 {
            self.registers.ram_bank = bank2;
            let matches = NINTENDO_LOGO
                .iter()
                .zip(LOGO_ADDRESS..)
                .all(|(&expected, address)| self.read(address) == expected);
            if matches {
                games += 1;
            }
        }

        self.registers = saved;
        self.multicart = games >= 2;
        if self.multicart {
            self.game_count = games;
            info!(games, "MBC1 multicart detected");
        }
    }
}

/// Cartridge loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("image is {len} bytes, too small to hold a header")]
    TooSmall { len: usize },
    #[error("header checksum mismatch: header says 0x{expected:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },
    #[error("unsupported cartridge type 0x{0:02X}")]
    UnsupportedChip(u8),
    #[error("invalid ROM size code 0x{0:02X}")]
    InvalidRomSize(u8),
    #[error("invalid RAM size code 0x{0:02X}")]
    InvalidRamSize(u8),
}
