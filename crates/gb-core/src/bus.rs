//! Memory bus and mapping
//!
//! The DMG memory map:
//! $0000-$3FFF - Cartridge ROM bank 0 (bank switchable on MBC1 in mode 1)
//! $4000-$7FFF - Cartridge switchable ROM bank
//! $8000-$9FFF - 8KB Video RAM
//! $A000-$BFFF - Cartridge RAM (if present and enabled)
//! $C000-$DFFF - 8KB Work RAM
//! $E000-$FDFF - Echo of $C000-$DDFF
//! $FE00-$FE9F - Object attribute memory
//! $FEA0-$FEFF - Not usable
//! $FF00-$FF7F - I/O registers
//! $FF80-$FFFE - High RAM
//! $FFFF       - Interrupt enable

use tracing::{debug, warn};

use crate::cartridge::Cartridge;
use crate::cpu::Bus;
use crate::interrupt::{Interrupt, Interrupts, INTERRUPT_FLAG_ADDRESS};
use crate::lcd::Lcd;
use crate::serial::Serial;
use crate::timer::Timer;

pub const VRAM_SIZE: usize = 0x2000;
pub const WRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;
pub const HRAM_SIZE: usize = 0x7F;

const DMA_ADDRESS: u16 = 0xFF46;

/// System bus: owns the cartridge, RAM and the peripheral register blocks
#[derive(Debug, Clone)]
pub struct SystemBus {
    cartridge: Cartridge,
    vram: Box<[u8; VRAM_SIZE]>,
    wram: Box<[u8; WRAM_SIZE]>,
    oam: [u8; OAM_SIZE],
    hram: [u8; HRAM_SIZE],
    interrupts: Interrupts,
    timer: Timer,
    lcd: Lcd,
    serial: Serial,
}

impl SystemBus {
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            cartridge,
            vram: Box::new([0; VRAM_SIZE]),
            wram: Box::new([0; WRAM_SIZE]),
            oam: [0; OAM_SIZE],
            hram: [0; HRAM_SIZE],
            interrupts: Interrupts::new(),
            timer: Timer::new(),
            lcd: Lcd::new(),
            serial: Serial::new(),
        }
    }

    /// Advance the timer and the LCD line counter by `cycles` T-cycles
    pub fn tick(&mut self, cycles: u32) {
        self.timer.tick(cycles, &mut self.interrupts);
        self.lcd.tick(cycles, &mut self.interrupts);
    }

    /// Enabled interrupt sources that `tick` can still raise on its own.
    ///
    /// Serial transfers and the joypad need the CPU or a host to act, so a
    /// halted CPU waiting only on them never wakes.
    pub fn reachable_interrupts(&self) -> u8 {
        let mut sources = 0;
        if self.lcd.enabled() {
            sources |= Interrupt::VBlank.bit() | Interrupt::LcdStat.bit();
        }
        if self.timer.enabled() {
            sources |= Interrupt::Timer.bit();
        }
        self.interrupts.enable() & sources
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn lcd(&self) -> &Lcd {
        &self.lcd
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut Serial {
        &mut self.serial
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    fn read_io(&mut self, address: u16) -> u8 {
        match address {
            0xFF01..=0xFF02 => self.serial.read(address),
            0xFF04..=0xFF07 => self.timer.read(address),
            INTERRUPT_FLAG_ADDRESS => self.interrupts.flags(),
            0xFF40..=0xFF4B | 0xFF68..=0xFF6B => self.lcd.read(address),
            _ => {
                debug!("read from unassigned I/O register 0x{address:04X}");
                0xFF
            }
        }
    }

    fn write_io(&mut self, address: u16, value: u8) {
        match address {
            0xFF01..=0xFF02 => self.serial.write(address, value, &mut self.interrupts),
            0xFF04..=0xFF07 => self.timer.write(address, value),
            INTERRUPT_FLAG_ADDRESS => self.interrupts.set_flags(value),
            DMA_ADDRESS => {
                self.lcd.write(address, value, &mut self.interrupts);
                self.oam_dma(value);
            }
            0xFF40..=0xFF4B | 0xFF68..=0xFF6B => self.lcd.write(address, value, &mut self.interrupts),
            _ => debug!("write of 0x{value:02X} to unassigned I/O register 0x{address:04X} dropped"),
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM
    fn oam_dma(&mut self, page: u8) {
        let source = u16::from(page) << 8;
        for offset in 0..OAM_SIZE as u16 {
            self.oam[usize::from(offset)] = self.read(source.wrapping_add(offset));
        }
    }
}

impl Bus for SystemBus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cartridge.read(address),
            0x8000..=0x9FFF => self.vram[usize::from(address - 0x8000)],
            0xC000..=0xDFFF => self.wram[usize::from(address - 0xC000)],
            0xE000..=0xFDFF => self.wram[usize::from(address - 0xE000)],
            0xFE00..=0xFE9F => self.oam[usize::from(address - 0xFE00)],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(address),
            0xFF80..=0xFFFE => self.hram[usize::from(address - 0xFF80)],
            0xFFFF => self.interrupts.enable(),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cartridge.write(address, value),
            0x8000..=0x9FFF => self.vram[usize::from(address - 0x8000)] = value,
            0xC000..=0xDFFF => self.wram[usize::from(address - 0xC000)] = value,
            0xE000..=0xFDFF => self.wram[usize::from(address - 0xE000)] = value,
            0xFE00..=0xFE9F => self.oam[usize::from(address - 0xFE00)] = value,
            0xFEA0..=0xFEFF => warn!("write of 0x{value:02X} to unusable address 0x{address:04X} ignored"),
            0xFF00..=0xFF7F => self.write_io(address, value),
            0xFF80..=0xFFFE => self.hram[usize::from(address - 0xFF80)] = value,
            0xFFFF => self.interrupts.set_enable(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RomBuilder;

    fn bus() -> SystemBus {
        let image = RomBuilder::new().code(0x4000, &[0x5A]).build();
        SystemBus::new(Cartridge::load(&image).unwrap())
    }

    #[test]
    fn test_cartridge_windows() {
        let mut bus = bus();
        assert_eq!(bus.read(0x0104), 0xCE);
        assert_eq!(bus.read(0x4000), 0x5A);
        assert_eq!(bus.read(0xA000), 0xFF);
    }

    #[test]
    fn test_work_ram_and_echo() {
        let mut bus = bus();
        bus.write(0xC123, 0x42);
        assert_eq!(bus.read(0xE123), 0x42);
        bus.write(0xFDFF, 0x24);
        assert_eq!(bus.read(0xDDFF), 0x24);
    }

    #[test]
    fn test_vram_oam_hram() {
        let mut bus = bus();
        bus.write(0x8000, 0x01);
        bus.write(0xFE9F, 0x02);
        bus.write(0xFFFE, 0x03);
        assert_eq!(bus.read(0x8000), 0x01);
        assert_eq!(bus.read(0xFE9F), 0x02);
        assert_eq!(bus.read(0xFFFE), 0x03);
    }

    #[test]
    fn test_unusable_window() {
        let mut bus = bus();
        bus.write(0xFEA0, 0x12);
        assert_eq!(bus.read(0xFEA0), 0xFF);
        assert_eq!(bus.read(0xFEFF), 0xFF);
    }

    #[test]
    fn test_unassigned_io_reads_ff() {
        let mut bus = bus();
        bus.write(0xFF10, 0x80);
        assert_eq!(bus.read(0xFF10), 0xFF);
        assert_eq!(bus.read(0xFF7F), 0xFF);
    }

    #[test]
    fn test_interrupt_registers() {
        let mut bus = bus();
        bus.write(0xFF0F, 0x04);
        bus.write(0xFFFF, 0x05);
        assert_eq!(bus.read(0xFF0F), 0xE4);
        assert_eq!(bus.read(0xFFFF), 0x05);
        assert_eq!(bus.interrupts().pending(), 0x04);
    }

    #[test]
    fn test_oam_dma() {
        let mut bus = bus();
        for i in 0..OAM_SIZE as u16 {
            bus.write(0xC000 + i, i as u8);
        }
        bus.write(0xFF46, 0xC0);
        assert_eq!(bus.read(0xFE00), 0x00);
        assert_eq!(bus.read(0xFE9F), 0x9F);
        assert_eq!(bus.read(0xFF46), 0xC0);
    }

    #[test]
    fn test_tick_collects_timer_interrupt() {
        let mut bus = bus();
        bus.write(0xFF0F, 0x00);
        bus.write(0xFF04, 0x00);
        bus.write(0xFF05, 0xFF);
        bus.write(0xFF07, 0x05);
        bus.tick(16);
        assert_eq!(bus.read(0xFF0F) & 0x04, 0x04);
    }

    #[test]
    fn test_reachable_interrupts_follow_running_peripherals() {
        let mut bus = bus();
        bus.write(0xFFFF, 0x1F);
        // LCD on after boot, timer stopped
        assert_eq!(bus.reachable_interrupts(), 0x03);

        bus.write(0xFF07, 0x04);
        assert_eq!(bus.reachable_interrupts(), 0x07);

        bus.write(0xFF40, 0x00);
        assert_eq!(bus.reachable_interrupts(), 0x04);

        // Serial and joypad alone never count
        bus.write(0xFFFF, 0x18);
        assert_eq!(bus.reachable_interrupts(), 0x00);
    }
}
