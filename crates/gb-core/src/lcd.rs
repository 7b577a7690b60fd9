//! LCD controller registers (FF40-FF4B)
//!
//! Only the register file and the line counter are modelled. Nothing here
//! produces pixels; the mode bits follow a fixed per-line schedule so that
//! programs polling STAT or LY make progress.

use tracing::warn;

use crate::interrupt::{Interrupt, Interrupts};

pub const CYCLES_PER_LINE: u32 = 456;
pub const LINES_PER_FRAME: u8 = 154;
pub const VBLANK_LINE: u8 = 144;

/// End of OAM search within a line, in dots
const OAM_SCAN_END: u32 = 80;
/// End of pixel transfer within a line, in dots
const TRANSFER_END: u32 = 252;

const LCDC_ENABLE: u8 = 0x80;
const STAT_HBLANK_SOURCE: u8 = 0x08;
const STAT_VBLANK_SOURCE: u8 = 0x10;
const STAT_OAM_SOURCE: u8 = 0x20;
const STAT_LYC_SOURCE: u8 = 0x40;
const STAT_COINCIDENCE: u8 = 0x04;

/// STAT mode bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Transfer = 3,
}

#[derive(Debug, Clone)]
pub struct Lcd {
    lcdc: u8,
    /// Writable STAT bits (interrupt sources)
    stat_sources: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,
    /// FF68-FF6B: colour palette index/data bytes, stored as written
    color_palettes: [u8; 4],
    mode: Mode,
    coincidence: bool,
    /// Dots elapsed in the current line
    dot: u32,
    frames: u64,
}

impl Lcd {
    pub fn new() -> Self {
        let mut lcd = Self {
            lcdc: 0x91,
            stat_sources: 0x00,
            scy: 0x00,
            scx: 0x00,
            ly: 0x00,
            lyc: 0x00,
            dma: 0xFF,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0x00,
            wx: 0x00,
            color_palettes: [0xFF; 4],
            mode: Mode::OamScan,
            coincidence: false,
            dot: 0,
            frames: 0,
        };
        lcd.coincidence = lcd.ly == lcd.lyc;
        lcd
    }

    pub fn read(&self, address: u16) -> u8 {
        match address {
            0xFF40 => self.lcdc,
            0xFF41 => self.stat(),
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF68..=0xFF6B => self.color_palettes[usize::from(address - 0xFF68)],
            _ => 0xFF,
        }
    }

    /// Store a register. STAT interrupts raised by an LYC write go to `interrupts`.
    pub fn write(&mut self, address: u16, value: u8, interrupts: &mut Interrupts) {
        match address {
            0xFF40 => {
                let was_enabled = self.enabled();
                self.lcdc = value;
                if was_enabled && !self.enabled() {
                    self.ly = 0;
                    self.dot = 0;
                    self.mode = Mode::HBlank;
                } else if !was_enabled && self.enabled() {
                    self.mode = Mode::OamScan;
                }
                self.update_coincidence(interrupts);
            }
            0xFF41 => self.stat_sources = value & 0x78,
            0xFF42 => self.scy = value,
            0xFF43 => self.scx = value,
            0xFF44 => warn!("write of 0x{value:02X} to read-only LY ignored"),
            0xFF45 => {
                self.lyc = value;
                self.update_coincidence(interrupts);
            }
            0xFF46 => self.dma = value,
            0xFF47 => self.bgp = value,
            0xFF48 => self.obp0 = value,
            0xFF49 => self.obp1 = value,
            0xFF4A => self.wy = value,
            0xFF4B => self.wx = value,
            0xFF68..=0xFF6B => self.color_palettes[usize::from(address - 0xFF68)] = value,
            _ => {}
        }
    }

    /// Advance the line counter by `cycles` T-cycles
    pub fn tick(&mut self, cycles: u32, interrupts: &mut Interrupts) {
        if !self.enabled() {
            return;
        }

        let mut remaining = cycles;
        while remaining > 0 {
            let step = remaining.min(self.cycles_to_next_event());
            self.dot += step;
            remaining -= step;

            if self.dot >= CYCLES_PER_LINE {
                self.dot -= CYCLES_PER_LINE;
                self.next_line(interrupts);
            }
            self.update_mode(interrupts);
        }
    }

    pub fn enabled(&self) -> bool {
        self.lcdc & LCDC_ENABLE != 0
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Frames completed since power-on
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn stat(&self) -> u8 {
        let coincidence = if self.coincidence { STAT_COINCIDENCE } else { 0 };
        0x80 | self.stat_sources | coincidence | self.mode as u8
    }

    /// Dots until the next mode boundary or line end
    fn cycles_to_next_event(&self) -> u32 {
        let boundary = if self.ly >= VBLANK_LINE {
            CYCLES_PER_LINE
        } else if self.dot < OAM_SCAN_END {
            OAM_SCAN_END
        } else if self.dot < TRANSFER_END {
            TRANSFER_END
        } else {
            CYCLES_PER_LINE
        };
        boundary - self.dot
    }

    fn next_line(&mut self, interrupts: &mut Interrupts) {
        self.ly += 1;
        if self.ly == LINES_PER_FRAME {
            self.ly = 0;
            self.frames += 1;
        }
        if self.ly == VBLANK_LINE {
            interrupts.request(Interrupt::VBlank);
        }
        self.update_coincidence(interrupts);
    }

    fn update_mode(&mut self, interrupts: &mut Interrupts) {
        let mode = if self.ly >= VBLANK_LINE {
            Mode::VBlank
        } else if self.dot < OAM_SCAN_END {
            Mode::OamScan
        } else if self.dot < TRANSFER_END {
            Mode::Transfer
        } else {
            Mode::HBlank
        };
        if mode == self.mode {
            return;
        }
        self.mode = mode;

        let source = match mode {
            Mode::HBlank => STAT_HBLANK_SOURCE,
            Mode::VBlank => STAT_VBLANK_SOURCE,
            Mode::OamScan => STAT_OAM_SOURCE,
            Mode::Transfer => 0,
        };
        if self.stat_sources & source != 0 {
            interrupts.request(Interrupt::LcdStat);
        }
    }

    fn update_coincidence(&mut self, interrupts: &mut Interrupts) {
        let coincidence = self.ly == self.lyc;
        if coincidence && !self.coincidence && self.stat_sources & STAT_LYC_SOURCE != 0 {
            interrupts.request(Interrupt::LcdStat);
        }
        self.coincidence = coincidence;
    }
}

impl Default for Lcd {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Lcd, Interrupts) {
        let mut interrupts = Interrupts::new();
        interrupts.set_flags(0);
        (Lcd::new(), interrupts)
    }

    #[test]
    fn test_initial_registers() {
        let (lcd, _) = setup();
        assert_eq!(lcd.read(0xFF40), 0x91);
        assert_eq!(lcd.read(0xFF47), 0xFC);
        assert_eq!(lcd.read(0xFF48), 0xFF);
        assert_eq!(lcd.read(0xFF44), 0x00);
    }

    #[test]
    fn test_stat_low_bits_read_only() {
        let (mut lcd, mut interrupts) = setup();
        lcd.write(0xFF41, 0xFF, &mut interrupts);
        let stat = lcd.read(0xFF41);
        assert_eq!(stat & 0xF8, 0xF8);
        assert_eq!(stat & 0x03, Mode::OamScan as u8);

        lcd.write(0xFF41, 0x00, &mut interrupts);
        assert_eq!(lcd.read(0xFF41) & 0x80, 0x80);
    }

    #[test]
    fn test_ly_is_read_only() {
        let (mut lcd, mut interrupts) = setup();
        lcd.tick(CYCLES_PER_LINE * 3, &mut interrupts);
        lcd.write(0xFF44, 0x42, &mut interrupts);
        assert_eq!(lcd.read(0xFF44), 3);
    }

    #[test]
    fn test_lyc_write_updates_coincidence() {
        let (mut lcd, mut interrupts) = setup();
        assert_eq!(lcd.read(0xFF41) & STAT_COINCIDENCE, STAT_COINCIDENCE);
        lcd.write(0xFF45, 0x10, &mut interrupts);
        assert_eq!(lcd.read(0xFF41) & STAT_COINCIDENCE, 0);
    }

    #[test]
    fn test_vblank_at_line_144() {
        let (mut lcd, mut interrupts) = setup();
        interrupts.set_enable(0x1F);
        lcd.tick(CYCLES_PER_LINE * 143, &mut interrupts);
        assert!(!interrupts.has_pending());

        lcd.tick(CYCLES_PER_LINE, &mut interrupts);
        assert_eq!(lcd.ly(), VBLANK_LINE);
        assert_eq!(lcd.mode(), Mode::VBlank);
        assert_eq!(interrupts.take_highest(), Some(Interrupt::VBlank));
    }

    #[test]
    fn test_frame_wraps() {
        let (mut lcd, mut interrupts) = setup();
        lcd.tick(CYCLES_PER_LINE * u32::from(LINES_PER_FRAME), &mut interrupts);
        assert_eq!(lcd.ly(), 0);
        assert_eq!(lcd.frames(), 1);
        assert_eq!(lcd.mode(), Mode::OamScan);
    }

    #[test]
    fn test_mode_schedule() {
        let (mut lcd, mut interrupts) = setup();
        lcd.tick(OAM_SCAN_END, &mut interrupts);
        assert_eq!(lcd.mode(), Mode::Transfer);
        lcd.tick(TRANSFER_END - OAM_SCAN_END, &mut interrupts);
        assert_eq!(lcd.mode(), Mode::HBlank);
    }

    #[test]
    fn test_lyc_stat_interrupt() {
        let (mut lcd, mut interrupts) = setup();
        interrupts.set_enable(0x1F);
        lcd.write(0xFF45, 2, &mut interrupts);
        lcd.write(0xFF41, STAT_LYC_SOURCE, &mut interrupts);

        lcd.tick(CYCLES_PER_LINE * 2, &mut interrupts);
        assert_eq!(interrupts.take_highest(), Some(Interrupt::LcdStat));
    }

    #[test]
    fn test_disabling_resets_line() {
        let (mut lcd, mut interrupts) = setup();
        lcd.tick(CYCLES_PER_LINE * 10, &mut interrupts);
        lcd.write(0xFF40, 0x11, &mut interrupts);
        assert_eq!(lcd.ly(), 0);
        lcd.tick(CYCLES_PER_LINE * 10, &mut interrupts);
        assert_eq!(lcd.ly(), 0);
    }

    #[test]
    fn test_color_palette_bytes_stored() {
        let (mut lcd, mut interrupts) = setup();
        lcd.write(0xFF69, 0x7F, &mut interrupts);
        assert_eq!(lcd.read(0xFF69), 0x7F);
    }
}
