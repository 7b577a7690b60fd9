//! Interrupt controller: IF (FF0F) and IE (FFFF)

use std::fmt;

pub const INTERRUPT_FLAG_ADDRESS: u16 = 0xFF0F;
pub const INTERRUPT_ENABLE_ADDRESS: u16 = 0xFFFF;

/// Interrupt sources, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Bits of IF/IE that carry a source
    pub const MASK: u8 = 0x1F;

    pub fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Handler address: 0x40 + 8 * bit index
    pub fn vector(self) -> u16 {
        0x40 + 8 * self as u16
    }

    /// Highest-priority source set in `bits`
    pub fn highest(bits: u8) -> Option<Interrupt> {
        Self::ALL.into_iter().find(|interrupt| bits & interrupt.bit() != 0)
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interrupt::VBlank => "VBlank",
            Interrupt::LcdStat => "LCD STAT",
            Interrupt::Timer => "Timer",
            Interrupt::Serial => "Serial",
            Interrupt::Joypad => "Joypad",
        };
        f.write_str(name)
    }
}

/// Request and enable latches
#[derive(Debug, Clone)]
pub struct Interrupts {
    flags: u8,
    enable: u8,
}

impl Interrupts {
    /// Post-boot state: VBlank already requested, nothing enabled
    pub fn new() -> Self {
        Self {
            flags: 0x01,
            enable: 0x00,
        }
    }

    pub fn request(&mut self, interrupt: Interrupt) {
        self.flags |= interrupt.bit();
    }

    /// IF as the CPU sees it; the unused top bits read as 1
    pub fn flags(&self) -> u8 {
        0xE0 | self.flags
    }

    pub fn set_flags(&mut self, value: u8) {
        self.flags = value & Interrupt::MASK;
    }

    pub fn enable(&self) -> u8 {
        self.enable
    }

    pub fn set_enable(&mut self, value: u8) {
        self.enable = value;
    }

    /// Requested and enabled sources
    pub fn pending(&self) -> u8 {
        self.flags & self.enable & Interrupt::MASK
    }

    pub fn has_pending(&self) -> bool {
        self.pending() != 0
    }

    /// Whether IE enables any of the five sources
    pub fn any_enabled(&self) -> bool {
        self.enable & Interrupt::MASK != 0
    }

    /// Acknowledge and return the highest-priority pending source
    pub fn take_highest(&mut self) -> Option<Interrupt> {
        let interrupt = Interrupt::highest(self.pending())?;
        self.flags &= !interrupt.bit();
        Some(interrupt)
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors() {
        let vectors: Vec<u16> = Interrupt::ALL.iter().map(|i| i.vector()).collect();
        assert_eq!(vectors, vec![0x40, 0x48, 0x50, 0x58, 0x60]);
        assert_eq!(Interrupt::Serial.bit(), 0x08);
    }

    #[test]
    fn test_flags_read_with_top_bits() {
        let mut interrupts = Interrupts::new();
        assert_eq!(interrupts.flags(), 0xE1);
        interrupts.set_flags(0xFF);
        assert_eq!(interrupts.flags(), 0xFF);
        interrupts.set_flags(0x00);
        assert_eq!(interrupts.flags(), 0xE0);
    }

    #[test]
    fn test_take_highest_priority_first() {
        let mut interrupts = Interrupts::new();
        interrupts.set_flags(0x00);
        interrupts.set_enable(0x1F);
        interrupts.request(Interrupt::Joypad);
        interrupts.request(Interrupt::Timer);

        assert_eq!(interrupts.take_highest(), Some(Interrupt::Timer));
        assert_eq!(interrupts.take_highest(), Some(Interrupt::Joypad));
        assert_eq!(interrupts.take_highest(), None);
    }

    #[test]
    fn test_disabled_sources_are_not_pending() {
        let mut interrupts = Interrupts::new();
        interrupts.request(Interrupt::Timer);
        assert!(!interrupts.has_pending());
        assert!(!interrupts.any_enabled());

        interrupts.set_enable(Interrupt::Timer.bit());
        assert!(interrupts.has_pending());
        assert_eq!(interrupts.pending(), 0x04);
    }
}
