//! Flag-producing arithmetic
//!
//! Every helper is a pure function from operands and the incoming flags to
//! a result and the outgoing flags, so the execution engine only has to
//! route operands.

use crate::cpu::Flags;
use crate::instruction::{AluOp, RotateOp};

/// 8-bit add, optionally with the carry flag as carry-in
pub fn add(a: u8, value: u8, carry_in: bool) -> (u8, Flags) {
    let carry = u8::from(carry_in);
    let sum = u16::from(a) + u16::from(value) + u16::from(carry);
    let result = sum as u8;
    let half_carry = (a & 0x0F) + (value & 0x0F) + carry > 0x0F;
    (result, Flags::from_parts(result == 0, false, half_carry, sum > 0xFF))
}

/// 8-bit subtract, optionally with the carry flag as borrow-in
pub fn sub(a: u8, value: u8, carry_in: bool) -> (u8, Flags) {
    let carry = u8::from(carry_in);
    let result = a.wrapping_sub(value).wrapping_sub(carry);
    let half_carry = (a & 0x0F) < (value & 0x0F) + carry;
    let borrow = u16::from(a) < u16::from(value) + u16::from(carry);
    (result, Flags::from_parts(result == 0, true, half_carry, borrow))
}

/// Apply an accumulator operation. `CP` leaves the accumulator as it was.
pub fn apply(op: AluOp, a: u8, value: u8, flags: Flags) -> (u8, Flags) {
    match op {
        AluOp::Add => add(a, value, false),
        AluOp::Adc => add(a, value, flags.carry()),
        AluOp::Sub => sub(a, value, false),
        AluOp::Sbc => sub(a, value, flags.carry()),
        AluOp::And => {
            let result = a & value;
            (result, Flags::from_parts(result == 0, false, true, false))
        }
        AluOp::Xor => {
            let result = a ^ value;
            (result, Flags::from_parts(result == 0, false, false, false))
        }
        AluOp::Or => {
            let result = a | value;
            (result, Flags::from_parts(result == 0, false, false, false))
        }
        AluOp::Cp => {
            let (_, flags) = sub(a, value, false);
            (a, flags)
        }
    }
}

/// `INC r`: carry is preserved
pub fn increment(value: u8, flags: Flags) -> (u8, Flags) {
    let result = value.wrapping_add(1);
    let half_carry = value & 0x0F == 0x0F;
    (result, Flags::from_parts(result == 0, false, half_carry, flags.carry()))
}

/// `DEC r`: carry is preserved
pub fn decrement(value: u8, flags: Flags) -> (u8, Flags) {
    let result = value.wrapping_sub(1);
    let half_carry = value & 0x0F == 0x00;
    (result, Flags::from_parts(result == 0, true, half_carry, flags.carry()))
}

/// `ADD HL,rr`: half-carry from bit 11, carry from bit 15, zero preserved
pub fn add16(hl: u16, value: u16, flags: Flags) -> (u16, Flags) {
    let sum = u32::from(hl) + u32::from(value);
    let half_carry = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
    (sum as u16, Flags::from_parts(flags.zero(), false, half_carry, sum > 0xFFFF))
}

/// `ADD SP,e8` and `LD HL,SP+e8`: flags come from the unsigned low-byte add
pub fn add_sp_offset(sp: u16, offset: i8) -> (u16, Flags) {
    let unsigned = u16::from(offset as u8);
    let half_carry = (sp & 0x000F) + (unsigned & 0x000F) > 0x000F;
    let carry = (sp & 0x00FF) + unsigned > 0x00FF;
    let result = sp.wrapping_add_signed(i16::from(offset));
    (result, Flags::from_parts(false, false, half_carry, carry))
}

/// Decimal-adjust the accumulator after a BCD add or subtract
pub fn decimal_adjust(a: u8, flags: Flags) -> (u8, Flags) {
    let mut correction = 0u8;
    let mut carry = flags.carry();

    if flags.subtract() {
        if flags.half_carry() {
            correction |= 0x06;
        }
        if flags.carry() {
            correction |= 0x60;
        }
        let result = a.wrapping_sub(correction);
        return (result, Flags::from_parts(result == 0, true, false, carry));
    }

    if flags.half_carry() || (a & 0x0F) > 0x09 {
        correction |= 0x06;
    }
    if flags.carry() || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let result = a.wrapping_add(correction);
    (result, Flags::from_parts(result == 0, false, false, carry))
}

/// CB-table rotates and shifts. Zero reflects the result.
pub fn rotate(op: RotateOp, value: u8, flags: Flags) -> (u8, Flags) {
    let carry_in = u8::from(flags.carry());
    let (result, carry_out) = match op {
        RotateOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
        RotateOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
        RotateOp::Rl => ((value << 1) | carry_in, value & 0x80 != 0),
        RotateOp::Rr => ((value >> 1) | (carry_in << 7), value & 0x01 != 0),
        RotateOp::Sla => (value << 1, value & 0x80 != 0),
        RotateOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        RotateOp::Swap => (value.rotate_left(4), false),
        RotateOp::Srl => (value >> 1, value & 0x01 != 0),
    };
    (result, Flags::from_parts(result == 0, false, false, carry_out))
}
