//! Divider and programmable timer (FF04-FF07)

use crate::interrupt::{Interrupt, Interrupts};

/// Divider bit whose falling edge clocks TIMA, indexed by TAC bits 0-1
const TAC_DIVIDER_BITS: [u16; 4] = [9, 3, 5, 7];

#[derive(Debug, Clone)]
pub struct Timer {
    /// Internal 16-bit counter; DIV is its upper byte
    divider: u16,
    tima: u8,
    tma: u8,
    tac: u8,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            divider: 0xABCC,
            tima: 0x00,
            tma: 0x00,
            tac: 0x00,
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        match address {
            0xFF04 => (self.divider >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => 0xF8 | self.tac,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        match address {
            0xFF04 => self.divider = 0,
            0xFF05 => self.tima = value,
            0xFF06 => self.tma = value,
            0xFF07 => self.tac = value & 0x07,
            _ => {}
        }
    }

    /// Advance by `cycles` T-cycles, requesting the timer interrupt on overflow
    pub fn tick(&mut self, cycles: u32, interrupts: &mut Interrupts) {
        for _ in 0..cycles {
            let before = self.divider;
            self.divider = self.divider.wrapping_add(1);
            if self.enabled() && self.falling_edge(before, self.divider) {
                self.increment_tima(interrupts);
            }
        }
    }

    pub fn divider(&self) -> u16 {
        self.divider
    }

    /// TAC bit 2: TIMA is counting
    pub fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    fn falling_edge(&self, before: u16, after: u16) -> bool {
        let bit = TAC_DIVIDER_BITS[usize::from(self.tac & 0x03)];
        (before >> bit) & 1 == 1 && (after >> bit) & 1 == 0
    }

    fn increment_tima(&mut self, interrupts: &mut Interrupts) {
        let (value, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            interrupts.request(Interrupt::Timer);
        } else {
            self.tima = value;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
