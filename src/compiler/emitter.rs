//! Streaming instruction output into a caller-provided buffer.
//!
//! The emitter is the only writer of code bytes; the parsing cascade never
//! touches the buffer directly. Capacity is checked per whole instruction
//! (opcode plus operand), so a failed emit leaves nothing half-written.

use crate::bytecode::Opcode;
use crate::lexer::VarSlot;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("output buffer cannot hold the next instruction")]
pub struct BufferFull;

pub struct CodeEmitter<'buf> {
    buffer: &'buf mut [u8],
    written: usize,
}

impl<'buf> CodeEmitter<'buf> {
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self { buffer, written: 0 }
    }

    /// Bytes emitted so far; the final value is what `compile` reports.
    pub fn written(&self) -> usize {
        self.written
    }

    fn append(&mut self, op: Opcode, operand: &[u8]) -> Result<(), BufferFull> {
        debug_assert!(operand.len() == op.operand_len());
        let end = self
            .written
            .checked_add(1 + operand.len())
            .filter(|end| *end <= self.buffer.len())
            .ok_or(BufferFull)?;
        self.buffer[self.written] = op as u8;
        self.buffer[self.written + 1..end].copy_from_slice(operand);
        self.written = end;
        Ok(())
    }

    /// Append an instruction that takes no operand.
    pub fn op(&mut self, op: Opcode) -> Result<(), BufferFull> {
        self.append(op, &[])
    }

    /// Append [`Opcode::Constant`] with its little-endian value.
    pub fn constant(&mut self, value: i32) -> Result<(), BufferFull> {
        self.append(Opcode::Constant, &value.to_le_bytes())
    }

    /// Append [`Opcode::Var`] reading the given slot.
    pub fn var(&mut self, slot: VarSlot) -> Result<(), BufferFull> {
        self.append(Opcode::Var, &[slot as u8])
    }

    /// Append [`Opcode::Assign`] storing into the given slot.
    pub fn assign(&mut self, slot: VarSlot) -> Result<(), BufferFull> {
        self.append(Opcode::Assign, &[slot as u8])
    }
}

#[cfg(test)]
mod tests {
    use super::CodeEmitter;
    use crate::bytecode::Opcode;
    use crate::lexer::VarSlot;
    use assert2::{check, let_assert};

    #[test]
    fn encodes_operands_little_endian() {
        let mut buffer = [0u8; 16];
        let mut emitter = CodeEmitter::new(&mut buffer);
        check!(emitter.constant(-2) == Ok(()));
        check!(emitter.var(VarSlot::C) == Ok(()));
        check!(emitter.op(Opcode::Add) == Ok(()));
        let written = emitter.written();
        check!(written == 8);
        check!(
            buffer[..written]
                == [
                    Opcode::Constant as u8,
                    0xfe,
                    0xff,
                    0xff,
                    0xff,
                    Opcode::Var as u8,
                    3,
                    Opcode::Add as u8,
                ]
        );
    }

    #[test]
    fn rejects_an_instruction_that_does_not_fit() {
        let mut buffer = [0u8; 0];
        let mut emitter = CodeEmitter::new(&mut buffer);
        let_assert!(Err(_) = emitter.op(Opcode::Add));

        // Room for the opcode but not the operand still refuses the whole
        // instruction.
        let mut buffer = [0u8; 4];
        let mut emitter = CodeEmitter::new(&mut buffer);
        let_assert!(Err(_) = emitter.constant(7));
        check!(emitter.written() == 0);
    }

    #[test]
    fn fills_the_buffer_exactly() {
        let mut buffer = [0u8; 7];
        let mut emitter = CodeEmitter::new(&mut buffer);
        check!(emitter.constant(1) == Ok(()));
        check!(emitter.var(VarSlot::T) == Ok(()));
        check!(emitter.written() == 7);
        let_assert!(Err(_) = emitter.op(Opcode::Add));
    }
}
