//! Instruction decoding
//!
//! An opcode is never matched as a whole byte. It is split into octal
//! fields which index small fixed tables:
//!
//! - `x` = bits 7-6
//! - `y` = bits 5-3
//! - `z` = bits 2-0
//! - `p` = bits 5-4 (`y >> 1`)
//! - `q` = bit 3 (`y & 1`)
//!
//! Decoding consults neither registers nor the bus. Immediate operands are
//! only announced through [`Instruction::immediate_len`]; the execution
//! engine consumes them.

use std::fmt;

/// Bit-fields of an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeFields {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub p: u8,
    pub q: u8,
}

impl OpcodeFields {
    pub fn new(opcode: u8) -> Self {
        let y = (opcode >> 3) & 0x07;
        Self {
            x: opcode >> 6,
            y,
            z: opcode & 0x07,
            p: y >> 1,
            q: y & 0x01,
        }
    }
}

/// 8-bit registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// 8-bit operand: a register, the byte at (HL), or an immediate byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Register(Reg8),
    Indirect,
    Immediate,
}

impl Operand8 {
    pub fn is_indirect(&self) -> bool {
        matches!(self, Operand8::Indirect)
    }
}

/// 16-bit register pairs addressable by loads and arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
}

/// 16-bit register pairs addressable by PUSH and POP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPair {
    BC,
    DE,
    HL,
    AF,
}

/// Pointer forms used by `LD (rr),A` and `LD A,(rr)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectPair {
    BC,
    DE,
    HlIncrement,
    HlDecrement,
}

/// Branch conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NotZero,
    Zero,
    NotCarry,
    Carry,
}

/// Accumulator arithmetic/logic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// Rotate and shift operations of the CB table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

/// Load instruction forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    /// `LD r,r'`, `LD r,d8`, `LD r,(HL)`, `LD (HL),r`, `LD (HL),d8`
    Byte { dst: Operand8, src: Operand8 },
    /// `LD rr,d16`
    WordImmediate(Reg16),
    /// `LD (a16),SP`
    StoreSp,
    /// `LD (rr),A`
    StoreA(IndirectPair),
    /// `LD A,(rr)`
    LoadA(IndirectPair),
    /// `LDH (a8),A`
    StoreHigh,
    /// `LDH A,(a8)`
    LoadHigh,
    /// `LD (C),A`
    StoreHighC,
    /// `LD A,(C)`
    LoadHighC,
    /// `LD (a16),A`
    StoreAbsolute,
    /// `LD A,(a16)`
    LoadAbsolute,
    /// `LD SP,HL`
    SpFromHl,
    /// `LD HL,SP+e8`
    HlFromSpOffset,
}

/// Decoded operation together with the identities of its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Nop,
    Load(Load),
    Push(StackPair),
    Pop(StackPair),
    /// `JP a16` / `JP cc,a16`
    Jump(Option<Condition>),
    JumpHl,
    /// `JR e8` / `JR cc,e8`
    JumpRelative(Option<Condition>),
    Call(Option<Condition>),
    Return(Option<Condition>),
    ReturnInterrupt,
    /// `RST n`, the target is embedded in the opcode
    Reset(u16),
    Halt,
    Stop,
    DisableInterrupts,
    EnableInterrupts,
    ComplementCarry,
    SetCarry,
    DecimalAdjust,
    Complement,
    Alu(AluOp, Operand8),
    Increment(Operand8),
    Decrement(Operand8),
    Increment16(Reg16),
    Decrement16(Reg16),
    AddHl(Reg16),
    AddSp,
    /// `RLCA`, `RRCA`, `RLA`, `RRA`
    RotateA(RotateOp),
    /// The CB prefix; the next byte selects from the second table
    Prefix,
    Rotate(RotateOp, Operand8),
    Bit(u8, Operand8),
    Res(u8, Operand8),
    Set(u8, Operand8),
    Invalid(u8),
}

/// Shape of an instruction's operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    None,
    Register8,
    Register16,
    RegisterPair,
    Address16,
    Immediate8,
    Immediate16,
    HlIndirect,
    AccumulatorHlIndirect,
    Displacement8,
    /// `SP` plus a signed displacement
    StackOffset,
    Condition,
    ConditionAddress16,
    ConditionDisplacement8,
    ResetVector,
    Bit,
    Invalid,
}

/// A decoded instruction. Built per fetch and dropped after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub operation: Operation,
    /// Address of the first opcode byte
    pub pc: u16,
    /// Cycle cost, or the taken cost for conditional branches
    pub cycles: u8,
    /// Cycle cost when a branch condition is false
    pub cycles_not_taken: u8,
}

impl Instruction {
    fn new(operation: Operation, pc: u16, cycles: u8) -> Self {
        Self {
            operation,
            pc,
            cycles,
            cycles_not_taken: cycles,
        }
    }

    fn branch(operation: Operation, pc: u16, taken: u8, not_taken: u8) -> Self {
        Self {
            operation,
            pc,
            cycles: taken,
            cycles_not_taken: not_taken,
        }
    }

    /// Whether the instruction carries a branch condition
    pub fn is_conditional(&self) -> bool {
        matches!(
            self.operation,
            Operation::Jump(Some(_))
                | Operation::JumpRelative(Some(_))
                | Operation::Call(Some(_))
                | Operation::Return(Some(_))
        )
    }

    /// Number of immediate bytes following the opcode
    pub fn immediate_len(&self) -> u16 {
        match self.operation {
            Operation::Load(load) => match load {
                Load::Byte { src: Operand8::Immediate, .. }
                | Load::StoreHigh
                | Load::LoadHigh
                | Load::HlFromSpOffset => 1,
                Load::WordImmediate(_) | Load::StoreSp | Load::StoreAbsolute | Load::LoadAbsolute => 2,
                _ => 0,
            },
            Operation::Alu(_, Operand8::Immediate)
            | Operation::JumpRelative(_)
            | Operation::AddSp
            | Operation::Stop => 1,
            Operation::Jump(_) | Operation::Call(_) => 2,
            _ => 0,
        }
    }

    /// Encoded length in bytes, prefix and immediates included
    pub fn len(&self) -> u16 {
        let opcode_len = match self.operation {
            Operation::Rotate(..) | Operation::Bit(..) | Operation::Res(..) | Operation::Set(..) => 2,
            _ => 1,
        };
        opcode_len + self.immediate_len()
    }

    pub fn shape(&self) -> OperandShape {
        use OperandShape as S;

        let operand8 = |operand: Operand8| match operand {
            Operand8::Register(_) => S::Register8,
            Operand8::Indirect => S::HlIndirect,
            Operand8::Immediate => S::Immediate8,
        };

        match self.operation {
            Operation::Nop
            | Operation::JumpHl
            | Operation::Return(None)
            | Operation::ReturnInterrupt
            | Operation::Halt
            | Operation::Stop
            | Operation::DisableInterrupts
            | Operation::EnableInterrupts
            | Operation::ComplementCarry
            | Operation::SetCarry
            | Operation::DecimalAdjust
            | Operation::Complement
            | Operation::RotateA(_)
            | Operation::Prefix => S::None,
            Operation::Load(load) => match load {
                Load::Byte { dst: Operand8::Register(_), src: Operand8::Register(_) } => S::RegisterPair,
                Load::Byte { dst: Operand8::Register(Reg8::A), src: Operand8::Indirect }
                | Load::Byte { dst: Operand8::Indirect, src: Operand8::Register(Reg8::A) } => {
                    S::AccumulatorHlIndirect
                }
                Load::Byte { src: Operand8::Immediate, .. } => S::Immediate8,
                Load::Byte { .. } => S::HlIndirect,
                Load::WordImmediate(_) => S::Immediate16,
                Load::StoreSp | Load::StoreAbsolute | Load::LoadAbsolute => S::Address16,
                Load::StoreA(pair) | Load::LoadA(pair) => match pair {
                    IndirectPair::BC | IndirectPair::DE => S::Register16,
                    IndirectPair::HlIncrement | IndirectPair::HlDecrement => S::AccumulatorHlIndirect,
                },
                Load::StoreHigh | Load::LoadHigh => S::Immediate8,
                Load::StoreHighC | Load::LoadHighC => S::Register8,
                Load::SpFromHl => S::Register16,
                Load::HlFromSpOffset => S::StackOffset,
            },
            Operation::Push(_)
            | Operation::Pop(_)
            | Operation::Increment16(_)
            | Operation::Decrement16(_)
            | Operation::AddHl(_) => S::Register16,
            Operation::Jump(None) | Operation::Call(None) => S::Address16,
            Operation::Jump(Some(_)) | Operation::Call(Some(_)) => S::ConditionAddress16,
            Operation::JumpRelative(None) => S::Displacement8,
            Operation::AddSp => S::StackOffset,
            Operation::JumpRelative(Some(_)) => S::ConditionDisplacement8,
            Operation::Return(Some(_)) => S::Condition,
            Operation::Reset(_) => S::ResetVector,
            Operation::Alu(_, Operand8::Indirect) => S::AccumulatorHlIndirect,
            Operation::Alu(_, operand)
            | Operation::Increment(operand)
            | Operation::Decrement(operand)
            | Operation::Rotate(_, operand) => operand8(operand),
            Operation::Bit(..) | Operation::Res(..) | Operation::Set(..) => S::Bit,
            Operation::Invalid(_) => S::Invalid,
        }
    }
}

/// r[] table: B C D E H L (HL) A
const OPERANDS: [Operand8; 8] = [
    Operand8::Register(Reg8::B),
    Operand8::Register(Reg8::C),
    Operand8::Register(Reg8::D),
    Operand8::Register(Reg8::E),
    Operand8::Register(Reg8::H),
    Operand8::Register(Reg8::L),
    Operand8::Indirect,
    Operand8::Register(Reg8::A),
];

/// rp[] table
const REGISTER_PAIRS: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];

/// rp2[] table
const STACK_PAIRS: [StackPair; 4] = [StackPair::BC, StackPair::DE, StackPair::HL, StackPair::AF];

const INDIRECT_PAIRS: [IndirectPair; 4] = [
    IndirectPair::BC,
    IndirectPair::DE,
    IndirectPair::HlIncrement,
    IndirectPair::HlDecrement,
];

/// cc[] table
const CONDITIONS: [Condition; 4] = [
    Condition::NotZero,
    Condition::Zero,
    Condition::NotCarry,
    Condition::Carry,
];

/// alu[] table
const ALU_OPS: [AluOp; 8] = [
    AluOp::Add,
    AluOp::Adc,
    AluOp::Sub,
    AluOp::Sbc,
    AluOp::And,
    AluOp::Xor,
    AluOp::Or,
    AluOp::Cp,
];

/// rot[] table
const ROTATIONS: [RotateOp; 8] = [
    RotateOp::Rlc,
    RotateOp::Rrc,
    RotateOp::Rl,
    RotateOp::Rr,
    RotateOp::Sla,
    RotateOp::Sra,
    RotateOp::Swap,
    RotateOp::Srl,
];

fn operand(index: u8) -> Operand8 {
    OPERANDS[usize::from(index)]
}

/// Pick the (HL) or register cost of an 8-bit operand
fn cost(operand: Operand8, register: u8, memory: u8) -> u8 {
    if operand.is_indirect() {
        memory
    } else {
        register
    }
}

/// Decode an unprefixed opcode located at `pc`
pub fn decode(opcode: u8, pc: u16) -> Instruction {
    let fields = OpcodeFields::new(opcode);
    match fields.x {
        0 => decode_block0(fields, pc),
        1 => {
            if fields.y == 6 && fields.z == 6 {
                Instruction::new(Operation::Halt, pc, 4)
            } else {
                let dst = operand(fields.y);
                let src = operand(fields.z);
                let cycles = if dst.is_indirect() || src.is_indirect() { 8 } else { 4 };
                Instruction::new(Operation::Load(Load::Byte { dst, src }), pc, cycles)
            }
        }
        2 => {
            let src = operand(fields.z);
            let op = ALU_OPS[usize::from(fields.y)];
            Instruction::new(Operation::Alu(op, src), pc, cost(src, 4, 8))
        }
        _ => decode_block3(opcode, fields, pc),
    }
}

fn decode_block0(f: OpcodeFields, pc: u16) -> Instruction {
    let p = usize::from(f.p);
    match f.z {
        0 => match f.y {
            0 => Instruction::new(Operation::Nop, pc, 4),
            1 => Instruction::new(Operation::Load(Load::StoreSp), pc, 20),
            2 => Instruction::new(Operation::Stop, pc, 4),
            3 => Instruction::new(Operation::JumpRelative(None), pc, 12),
            y => {
                let condition = CONDITIONS[usize::from(y - 4)];
                Instruction::branch(Operation::JumpRelative(Some(condition)), pc, 12, 8)
            }
        },
        1 => {
            if f.q == 0 {
                Instruction::new(Operation::Load(Load::WordImmediate(REGISTER_PAIRS[p])), pc, 12)
            } else {
                Instruction::new(Operation::AddHl(REGISTER_PAIRS[p]), pc, 8)
            }
        }
        2 => {
            let load = if f.q == 0 {
                Load::StoreA(INDIRECT_PAIRS[p])
            } else {
                Load::LoadA(INDIRECT_PAIRS[p])
            };
            Instruction::new(Operation::Load(load), pc, 8)
        }
        3 => {
            let op = if f.q == 0 {
                Operation::Increment16(REGISTER_PAIRS[p])
            } else {
                Operation::Decrement16(REGISTER_PAIRS[p])
            };
            Instruction::new(op, pc, 8)
        }
        4 => {
            let target = operand(f.y);
            Instruction::new(Operation::Increment(target), pc, cost(target, 4, 12))
        }
        5 => {
            let target = operand(f.y);
            Instruction::new(Operation::Decrement(target), pc, cost(target, 4, 12))
        }
        6 => {
            let dst = operand(f.y);
            let load = Load::Byte { dst, src: Operand8::Immediate };
            Instruction::new(Operation::Load(load), pc, cost(dst, 8, 12))
        }
        _ => {
            let op = match f.y {
                0..=3 => Operation::RotateA(ROTATIONS[usize::from(f.y)]),
                4 => Operation::DecimalAdjust,
                5 => Operation::Complement,
                6 => Operation::SetCarry,
                _ => Operation::ComplementCarry,
            };
            Instruction::new(op, pc, 4)
        }
    }
}

fn decode_block3(opcode: u8, f: OpcodeFields, pc: u16) -> Instruction {
    let invalid = Instruction::new(Operation::Invalid(opcode), pc, 0);
    let p = usize::from(f.p);
    match f.z {
        0 => match f.y {
            0..=3 => {
                let condition = CONDITIONS[usize::from(f.y)];
                Instruction::branch(Operation::Return(Some(condition)), pc, 20, 8)
            }
            4 => Instruction::new(Operation::Load(Load::StoreHigh), pc, 12),
            5 => Instruction::new(Operation::AddSp, pc, 16),
            6 => Instruction::new(Operation::Load(Load::LoadHigh), pc, 12),
            _ => Instruction::new(Operation::Load(Load::HlFromSpOffset), pc, 12),
        },
        1 => {
            if f.q == 0 {
                Instruction::new(Operation::Pop(STACK_PAIRS[p]), pc, 12)
            } else {
                match f.p {
                    0 => Instruction::new(Operation::Return(None), pc, 16),
                    1 => Instruction::new(Operation::ReturnInterrupt, pc, 16),
                    2 => Instruction::new(Operation::JumpHl, pc, 4),
                    _ => Instruction::new(Operation::Load(Load::SpFromHl), pc, 8),
                }
            }
        }
        2 => match f.y {
            0..=3 => {
                let condition = CONDITIONS[usize::from(f.y)];
                Instruction::branch(Operation::Jump(Some(condition)), pc, 16, 12)
            }
            4 => Instruction::new(Operation::Load(Load::StoreHighC), pc, 8),
            5 => Instruction::new(Operation::Load(Load::StoreAbsolute), pc, 16),
            6 => Instruction::new(Operation::Load(Load::LoadHighC), pc, 8),
            _ => Instruction::new(Operation::Load(Load::LoadAbsolute), pc, 16),
        },
        // The prefix cost is folded into the prefixed instruction's cost
        3 => match f.y {
            0 => Instruction::new(Operation::Jump(None), pc, 16),
            1 => Instruction::new(Operation::Prefix, pc, 4),
            6 => Instruction::new(Operation::DisableInterrupts, pc, 4),
            7 => Instruction::new(Operation::EnableInterrupts, pc, 4),
            _ => invalid,
        },
        4 => match f.y {
            0..=3 => {
                let condition = CONDITIONS[usize::from(f.y)];
                Instruction::branch(Operation::Call(Some(condition)), pc, 24, 12)
            }
            _ => invalid,
        },
        5 => {
            if f.q == 0 {
                Instruction::new(Operation::Push(STACK_PAIRS[p]), pc, 16)
            } else if f.p == 0 {
                Instruction::new(Operation::Call(None), pc, 24)
            } else {
                invalid
            }
        }
        6 => {
            let op = ALU_OPS[usize::from(f.y)];
            Instruction::new(Operation::Alu(op, Operand8::Immediate), pc, 8)
        }
        _ => Instruction::new(Operation::Reset(u16::from(f.y) * 8), pc, 16),
    }
}

/// Decode the byte following a CB prefix. `pc` is the address of the prefix.
pub fn decode_prefixed(opcode: u8, pc: u16) -> Instruction {
    let fields = OpcodeFields::new(opcode);
    let target = operand(fields.z);
    match fields.x {
        0 => {
            let op = ROTATIONS[usize::from(fields.y)];
            Instruction::new(Operation::Rotate(op, target), pc, cost(target, 8, 16))
        }
        1 => Instruction::new(Operation::Bit(fields.y, target), pc, cost(target, 8, 12)),
        2 => Instruction::new(Operation::Res(fields.y, target), pc, cost(target, 8, 16)),
        _ => Instruction::new(Operation::Set(fields.y, target), pc, cost(target, 8, 16)),
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg8::A => "A",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand8::Register(reg) => write!(f, "{reg}"),
            Operand8::Indirect => f.write_str("(HL)"),
            Operand8::Immediate => f.write_str("d8"),
        }
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg16::BC => "BC",
            Reg16::DE => "DE",
            Reg16::HL => "HL",
            Reg16::SP => "SP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for StackPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StackPair::BC => "BC",
            StackPair::DE => "DE",
            StackPair::HL => "HL",
            StackPair::AF => "AF",
        };
        f.write_str(name)
    }
}

impl fmt::Display for IndirectPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndirectPair::BC => "(BC)",
            IndirectPair::DE => "(DE)",
            IndirectPair::HlIncrement => "(HL+)",
            IndirectPair::HlDecrement => "(HL-)",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::NotZero => "NZ",
            Condition::Zero => "Z",
            Condition::NotCarry => "NC",
            Condition::Carry => "C",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AluOp::Add => "ADD",
            AluOp::Adc => "ADC",
            AluOp::Sub => "SUB",
            AluOp::Sbc => "SBC",
            AluOp::And => "AND",
            AluOp::Xor => "XOR",
            AluOp::Or => "OR",
            AluOp::Cp => "CP",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RotateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotateOp::Rlc => "RLC",
            RotateOp::Rrc => "RRC",
            RotateOp::Rl => "RL",
            RotateOp::Rr => "RR",
            RotateOp::Sla => "SLA",
            RotateOp::Sra => "SRA",
            RotateOp::Swap => "SWAP",
            RotateOp::Srl => "SRL",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Load::Byte { dst, src } => write!(f, "LD {dst},{src}"),
            Load::WordImmediate(reg) => write!(f, "LD {reg},d16"),
            Load::StoreSp => f.write_str("LD (a16),SP"),
            Load::StoreA(pair) => write!(f, "LD {pair},A"),
            Load::LoadA(pair) => write!(f, "LD A,{pair}"),
            Load::StoreHigh => f.write_str("LDH (a8),A"),
            Load::LoadHigh => f.write_str("LDH A,(a8)"),
            Load::StoreHighC => f.write_str("LD (C),A"),
            Load::LoadHighC => f.write_str("LD A,(C)"),
            Load::StoreAbsolute => f.write_str("LD (a16),A"),
            Load::LoadAbsolute => f.write_str("LD A,(a16)"),
            Load::SpFromHl => f.write_str("LD SP,HL"),
            Load::HlFromSpOffset => f.write_str("LD HL,SP+e8"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Nop => f.write_str("NOP"),
            Operation::Load(load) => write!(f, "{load}"),
            Operation::Push(pair) => write!(f, "PUSH {pair}"),
            Operation::Pop(pair) => write!(f, "POP {pair}"),
            Operation::Jump(None) => f.write_str("JP a16"),
            Operation::Jump(Some(cc)) => write!(f, "JP {cc},a16"),
            Operation::JumpHl => f.write_str("JP HL"),
            Operation::JumpRelative(None) => f.write_str("JR e8"),
            Operation::JumpRelative(Some(cc)) => write!(f, "JR {cc},e8"),
            Operation::Call(None) => f.write_str("CALL a16"),
            Operation::Call(Some(cc)) => write!(f, "CALL {cc},a16"),
            Operation::Return(None) => f.write_str("RET"),
            Operation::Return(Some(cc)) => write!(f, "RET {cc}"),
            Operation::ReturnInterrupt => f.write_str("RETI"),
            Operation::Reset(vector) => write!(f, "RST {vector:02X}H"),
            Operation::Halt => f.write_str("HALT"),
            Operation::Stop => f.write_str("STOP"),
            Operation::DisableInterrupts => f.write_str("DI"),
            Operation::EnableInterrupts => f.write_str("EI"),
            Operation::ComplementCarry => f.write_str("CCF"),
            Operation::SetCarry => f.write_str("SCF"),
            Operation::DecimalAdjust => f.write_str("DAA"),
            Operation::Complement => f.write_str("CPL"),
            Operation::Alu(op @ (AluOp::Add | AluOp::Adc | AluOp::Sbc), src) => write!(f, "{op} A,{src}"),
            Operation::Alu(op, src) => write!(f, "{op} {src}"),
            Operation::Increment(target) => write!(f, "INC {target}"),
            Operation::Decrement(target) => write!(f, "DEC {target}"),
            Operation::Increment16(reg) => write!(f, "INC {reg}"),
            Operation::Decrement16(reg) => write!(f, "DEC {reg}"),
            Operation::AddHl(reg) => write!(f, "ADD HL,{reg}"),
            Operation::AddSp => f.write_str("ADD SP,e8"),
            Operation::RotateA(op) => write!(f, "{op}A"),
            Operation::Prefix => f.write_str("PREFIX CB"),
            Operation::Rotate(op, target) => write!(f, "{op} {target}"),
            Operation::Bit(bit, target) => write!(f, "BIT {bit},{target}"),
            Operation::Res(bit, target) => write!(f, "RES {bit},{target}"),
            Operation::Set(bit, target) => write!(f, "SET {bit},{target}"),
            Operation::Invalid(opcode) => write!(f, "INVALID {opcode:02X}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pad through the inner Display so `{:<14}` works on instructions
        f.pad(&self.operation.to_string())
    }
}
