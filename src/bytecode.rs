//! The compiled instruction encoding shared by the compiler and the
//! interpreter.
//!
//! A compiled formula is a flat byte sequence: each opcode byte is followed
//! by its fixed-width operand (none for pure stack operations, one byte for
//! a variable slot, four little-endian bytes for an `i32` constant), so the
//! stream decodes unambiguously without a side table. The numbering is part
//! of the format: bytecode is only meaningful to the interpreter revision it
//! was compiled for and is not a storage format.

use std::fmt::Write;

use crate::lexer::VarSlot;

/// A single instruction tag.
///
/// Binary operators pop the right operand first, then the left, and push one
/// result. Comparisons and [`Opcode::BoolNot`] push canonical 0/1.
/// [`Opcode::ShiftRight`] is arithmetic (sign-preserving), and both shifts
/// mask their count to 0..31.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Push the 4-byte little-endian constant operand.
    Constant = 0x00,
    /// Push the value of the variable slot named by the operand byte.
    Var = 0x01,
    Negate = 0x02,
    /// Boolean not: 0 becomes 1, everything else 0.
    BoolNot = 0x03,
    /// Bitwise complement.
    BitNot = 0x04,
    Multiply = 0x05,
    /// Division by zero yields 0 instead of trapping.
    Divide = 0x06,
    /// Remainder by zero yields 0 instead of trapping.
    Modulo = 0x07,
    Add = 0x08,
    Subtract = 0x09,
    ShiftLeft = 0x0a,
    ShiftRight = 0x0b,
    Less = 0x0c,
    LessEqual = 0x0d,
    Greater = 0x0e,
    GreaterEqual = 0x0f,
    Equal = 0x10,
    NotEqual = 0x11,
    BitAnd = 0x12,
    BitXor = 0x13,
    BitOr = 0x14,
    /// Pop the stack into the variable slot named by the operand byte.
    /// Pushes nothing.
    Assign = 0x15,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Constant),
            0x01 => Some(Self::Var),
            0x02 => Some(Self::Negate),
            0x03 => Some(Self::BoolNot),
            0x04 => Some(Self::BitNot),
            0x05 => Some(Self::Multiply),
            0x06 => Some(Self::Divide),
            0x07 => Some(Self::Modulo),
            0x08 => Some(Self::Add),
            0x09 => Some(Self::Subtract),
            0x0a => Some(Self::ShiftLeft),
            0x0b => Some(Self::ShiftRight),
            0x0c => Some(Self::Less),
            0x0d => Some(Self::LessEqual),
            0x0e => Some(Self::Greater),
            0x0f => Some(Self::GreaterEqual),
            0x10 => Some(Self::Equal),
            0x11 => Some(Self::NotEqual),
            0x12 => Some(Self::BitAnd),
            0x13 => Some(Self::BitXor),
            0x14 => Some(Self::BitOr),
            0x15 => Some(Self::Assign),
            _ => None,
        }
    }

    /// Width of the operand following the opcode byte.
    pub fn operand_len(self) -> usize {
        match self {
            Self::Constant => 4,
            Self::Var | Self::Assign => 1,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Var => "var",
            Self::Negate => "negate",
            Self::BoolNot => "bool-not",
            Self::BitNot => "bit-not",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Modulo => "modulo",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::ShiftLeft => "shift-left",
            Self::ShiftRight => "shift-right",
            Self::Less => "less",
            Self::LessEqual => "less-equal",
            Self::Greater => "greater",
            Self::GreaterEqual => "greater-equal",
            Self::Equal => "equal",
            Self::NotEqual => "not-equal",
            Self::BitAnd => "bit-and",
            Self::BitXor => "bit-xor",
            Self::BitOr => "bit-or",
            Self::Assign => "assign",
        }
    }
}

/// Render a compiled stream one instruction per line, for the driver and
/// for debugging tests.
///
/// Stops at the first byte that is not a known opcode or whose operand is
/// truncated, flagging it with `??`; a stream produced by a successful
/// compilation never contains either.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    let mut pc = 0;
    while pc < code.len() {
        let at = pc;
        let Some(op) = Opcode::from_u8(code[pc]) else {
            let _ = writeln!(out, "{at:04} ?? {:#04x}", code[pc]);
            break;
        };
        pc += 1;
        let Some(operand) = code.get(pc..pc + op.operand_len()) else {
            let _ = writeln!(out, "{at:04} ?? truncated {}", op.mnemonic());
            break;
        };
        pc += op.operand_len();
        match op {
            Opcode::Constant => {
                let value = i32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
                let _ = writeln!(out, "{at:04} {} {value}", op.mnemonic());
            }
            Opcode::Var | Opcode::Assign => {
                match VarSlot::from_index(operand[0]) {
                    Some(slot) => {
                        let _ = writeln!(out, "{at:04} {} {}", op.mnemonic(), slot.name());
                    }
                    None => {
                        let _ = writeln!(out, "{at:04} {} ??{}", op.mnemonic(), operand[0]);
                    }
                }
            }
            _ => {
                let _ = writeln!(out, "{at:04} {}", op.mnemonic());
            }
        }
    }
    out
}
