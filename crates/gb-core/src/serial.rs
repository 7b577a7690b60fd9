//! Serial port (FF01-FF02)
//!
//! There is no link partner. A transfer started with the internal clock
//! completes at once and the outgoing byte is captured, which is how test
//! ROMs report their results.

use crate::interrupt::{Interrupt, Interrupts};

const SC_TRANSFER: u8 = 0x80;
const SC_INTERNAL_CLOCK: u8 = 0x01;

#[derive(Debug, Clone)]
pub struct Serial {
    sb: u8,
    sc: u8,
    output: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0x00,
            sc: 0x00,
            output: Vec::new(),
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        match address {
            0xFF01 => self.sb,
            0xFF02 => 0x7E | self.sc,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, address: u16, value: u8, interrupts: &mut Interrupts) {
        match address {
            0xFF01 => self.sb = value,
            0xFF02 => {
                self.sc = value & (SC_TRANSFER | SC_INTERNAL_CLOCK);
                if self.sc == SC_TRANSFER | SC_INTERNAL_CLOCK {
                    self.output.push(self.sb);
                    self.sb = 0xFF;
                    self.sc &= !SC_TRANSFER;
                    interrupts.request(Interrupt::Serial);
                }
            }
            _ => {}
        }
    }

    /// Every byte transferred so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}
