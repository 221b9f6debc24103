//! Single-pass compilation of formula text into bytecode.
//!
//! The grammar, loosest binding first:
//!
//! ```text
//! program        = { ":" VAR "=" bit-or ";" } bit-or
//! bit-or         = bit-xor { "|" bit-xor }
//! bit-xor        = bit-and { "^" bit-and }
//! bit-and        = equality { "&" equality }
//! equality       = relational [ ("==" | "!=") relational ]
//! relational     = shift [ ("<" | "<=" | ">" | ">=") shift ]
//! shift          = additive [ ("<<" | ">>") additive ]
//! additive       = multiplicative { ("+" | "-") multiplicative }
//! multiplicative = unary { ("*" | "/" | "%") unary }
//! unary          = [ "+" | "-" | "!" | "~" ] primary
//! primary        = VAR | NUM | "(" bit-or ")"
//! ```
//!
//! One method per level, each emitting code for its subexpression before
//! returning, so the bytecode comes out in stack order and no syntax tree is
//! ever built. Equality, relational, and shift accept at most one operator
//! per descent; `a < b < c` leaves the second `<` as trailing input.
//!
//! The first error (unexpected token, invalid character, full output
//! buffer) is recorded in the [`Compiler`] context and wins; the cascade
//! keeps unwinding as cheap no-ops rather than threading results through
//! every level.

pub mod emitter;

use logos::Lexer;

use crate::bytecode::Opcode;
use crate::lexer::{LexerError, Span, Token, VarSlot};
use emitter::CodeEmitter;

/// Why a compilation failed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("invalid character")]
    InvalidCharacter,
    #[error("trailing input after the formula")]
    TrailingInput,
    #[error("output buffer too small")]
    BufferTooSmall,
}

/// A failed compilation, located at the byte offset of the first offending
/// token (or the end of input when the formula stops short).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub offset: usize,
}

/// Compile a formula into `buffer`.
///
/// On success, returns the number of bytecode bytes written, ready for
/// [`crate::runtime::evaluate`]. The buffer is caller-owned and never grown;
/// a formula that does not fit fails with
/// [`CompileErrorKind::BufferTooSmall`].
pub fn compile(source: &str, buffer: &mut [u8]) -> Result<usize, CompileError> {
    let mut compiler = Compiler::new(source, buffer);
    compiler.program();
    compiler.finish()
}

/// Pull cursor over the token stream: exactly the current token and its
/// span, no further lookahead. End of input is `None` and is never advanced
/// past.
struct TokenCursor<'src> {
    lexer: Lexer<'src, Token>,
    current: Option<Result<Token, LexerError>>,
    span: Span,
}

impl<'src> TokenCursor<'src> {
    fn new(source: &'src str) -> Self {
        let mut lexer = Token::lexer(source);
        let current = lexer.next();
        let span = lexer.span();
        Self {
            lexer,
            current,
            span,
        }
    }

    fn bump(&mut self) {
        if self.current.is_some() {
            self.current = self.lexer.next();
            self.span = self.lexer.span();
        }
    }

    fn offset(&self) -> usize {
        self.span.start
    }
}

/// Per-call compilation context (cursor, emitter, first-error slot); owning
/// it here instead of globals keeps independent compilations isolated.
struct Compiler<'src, 'buf> {
    cursor: TokenCursor<'src>,
    emitter: CodeEmitter<'buf>,
    error: Option<CompileError>,
}

impl<'src, 'buf> Compiler<'src, 'buf> {
    fn new(source: &'src str, buffer: &'buf mut [u8]) -> Self {
        Self {
            cursor: TokenCursor::new(source),
            emitter: CodeEmitter::new(buffer),
            error: None,
        }
    }

    fn finish(self) -> Result<usize, CompileError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.emitter.written()),
        }
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// The current token, if it lexed cleanly.
    fn peek(&self) -> Option<Token> {
        match self.cursor.current {
            Some(Ok(token)) => Some(token),
            _ => None,
        }
    }

    fn bump(&mut self) {
        self.cursor.bump();
    }

    /// Record the first error at the current token. A token the lexer
    /// rejected reports as an invalid character regardless of which rule
    /// stumbled over it.
    fn error_at_current(&mut self, kind: CompileErrorKind) {
        if self.error.is_some() {
            return;
        }
        let kind = match self.cursor.current {
            Some(Err(_)) => CompileErrorKind::InvalidCharacter,
            _ => kind,
        };
        self.error = Some(CompileError {
            kind,
            offset: self.cursor.offset(),
        });
    }

    fn accept(&mut self, token: Token) -> bool {
        if self.failed() {
            return false;
        }
        if self.peek() == Some(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> bool {
        if self.accept(token) {
            true
        } else {
            self.error_at_current(CompileErrorKind::UnexpectedToken);
            false
        }
    }

    fn emit_op(&mut self, op: Opcode) {
        if self.failed() {
            return;
        }
        if self.emitter.op(op).is_err() {
            self.error_at_current(CompileErrorKind::BufferTooSmall);
        }
    }

    fn emit_constant(&mut self, value: i32) {
        if self.failed() {
            return;
        }
        if self.emitter.constant(value).is_err() {
            self.error_at_current(CompileErrorKind::BufferTooSmall);
        }
    }

    fn emit_var(&mut self, slot: VarSlot) {
        if self.failed() {
            return;
        }
        if self.emitter.var(slot).is_err() {
            self.error_at_current(CompileErrorKind::BufferTooSmall);
        }
    }

    fn emit_assign(&mut self, slot: VarSlot) {
        if self.failed() {
            return;
        }
        if self.emitter.assign(slot).is_err() {
            self.error_at_current(CompileErrorKind::BufferTooSmall);
        }
    }

    /// Assignment statements, the final expression, then end of input.
    fn program(&mut self) {
        while self.accept(Token::Colon) {
            self.assignment();
        }
        self.bit_or();
        if self.failed() {
            return;
        }
        if self.cursor.current.is_some() {
            self.error_at_current(CompileErrorKind::TrailingInput);
        }
    }

    /// One `VAR = expr ;` statement; its leading `:` is already consumed.
    /// The assignment opcode goes out after the value expression, so the
    /// store pops what that expression pushed.
    fn assignment(&mut self) {
        let Some(Token::Variable(slot)) = self.peek() else {
            self.error_at_current(CompileErrorKind::UnexpectedToken);
            return;
        };
        self.bump();
        if !self.expect(Token::Assign) {
            return;
        }
        self.bit_or();
        if self.expect(Token::Semicolon) {
            self.emit_assign(slot);
        }
    }

    fn bit_or(&mut self) {
        if self.failed() {
            return;
        }
        self.bit_xor();
        while self.accept(Token::Pipe) {
            self.bit_xor();
            self.emit_op(Opcode::BitOr);
        }
    }

    fn bit_xor(&mut self) {
        if self.failed() {
            return;
        }
        self.bit_and();
        while self.accept(Token::Caret) {
            self.bit_and();
            self.emit_op(Opcode::BitXor);
        }
    }

    fn bit_and(&mut self) {
        if self.failed() {
            return;
        }
        self.equality();
        while self.accept(Token::Ampersand) {
            self.equality();
            self.emit_op(Opcode::BitAnd);
        }
    }

    // The comparison and shift levels are deliberately non-chaining: one
    // optional operator per descent.

    fn equality(&mut self) {
        if self.failed() {
            return;
        }
        self.relational();
        let op = match self.peek() {
            Some(Token::Equal) => Opcode::Equal,
            Some(Token::NotEqual) => Opcode::NotEqual,
            _ => return,
        };
        self.bump();
        self.relational();
        self.emit_op(op);
    }

    fn relational(&mut self) {
        if self.failed() {
            return;
        }
        self.shift();
        let op = match self.peek() {
            Some(Token::Less) => Opcode::Less,
            Some(Token::LessEqual) => Opcode::LessEqual,
            Some(Token::Greater) => Opcode::Greater,
            Some(Token::GreaterEqual) => Opcode::GreaterEqual,
            _ => return,
        };
        self.bump();
        self.shift();
        self.emit_op(op);
    }

    fn shift(&mut self) {
        if self.failed() {
            return;
        }
        self.additive();
        let op = match self.peek() {
            Some(Token::ShiftLeft) => Opcode::ShiftLeft,
            Some(Token::ShiftRight) => Opcode::ShiftRight,
            _ => return,
        };
        self.bump();
        self.additive();
        self.emit_op(op);
    }

    fn additive(&mut self) {
        if self.failed() {
            return;
        }
        self.multiplicative();
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Opcode::Add,
                Some(Token::Minus) => Opcode::Subtract,
                _ => break,
            };
            self.bump();
            self.multiplicative();
            self.emit_op(op);
        }
    }

    fn multiplicative(&mut self) {
        if self.failed() {
            return;
        }
        self.unary();
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Opcode::Multiply,
                Some(Token::Slash) => Opcode::Divide,
                Some(Token::Percent) => Opcode::Modulo,
                _ => break,
            };
            self.bump();
            self.unary();
            self.emit_op(op);
        }
    }

    /// An optional prefix applying to a primary, so `-2*3` is `(-2)*3`.
    /// Unary `+` parses but emits nothing.
    fn unary(&mut self) {
        if self.failed() {
            return;
        }
        if self.accept(Token::Plus) {
            self.primary();
        } else if self.accept(Token::Minus) {
            self.primary();
            self.emit_op(Opcode::Negate);
        } else if self.accept(Token::Bang) {
            self.primary();
            self.emit_op(Opcode::BoolNot);
        } else if self.accept(Token::Tilde) {
            self.primary();
            self.emit_op(Opcode::BitNot);
        } else {
            self.primary();
        }
    }

    fn primary(&mut self) {
        if self.failed() {
            return;
        }
        match self.peek() {
            Some(Token::Variable(slot)) => {
                self.bump();
                self.emit_var(slot);
            }
            Some(Token::Number(value)) => {
                self.bump();
                self.emit_constant(value);
            }
            _ => {
                if self.expect(Token::LParen) {
                    self.bit_or();
                    self.expect(Token::RParen);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compile, CompileError, CompileErrorKind};
    use crate::bytecode::Opcode;
    use assert2::{check, let_assert};

    fn compiled(source: &str) -> Vec<u8> {
        let mut buffer = [0u8; 256];
        let written = compile(source, &mut buffer).expect(source);
        buffer[..written].to_vec()
    }

    fn constant(value: i32) -> Vec<u8> {
        let mut bytes = vec![Opcode::Constant as u8];
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes
    }

    #[test]
    fn emits_postfix_order() {
        let mut expected = constant(1);
        expected.extend(constant(2));
        expected.push(Opcode::Add as u8);
        check!(compiled("1+2") == expected);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        // 1 2 3 * + rather than 1 2 + 3 *
        let mut expected = constant(1);
        expected.extend(constant(2));
        expected.extend(constant(3));
        expected.push(Opcode::Multiply as u8);
        expected.push(Opcode::Add as u8);
        check!(compiled("1+2*3") == expected);

        let mut expected = constant(1);
        expected.extend(constant(2));
        expected.push(Opcode::Add as u8);
        expected.extend(constant(3));
        expected.push(Opcode::Multiply as u8);
        check!(compiled("(1+2)*3") == expected);
    }

    #[test]
    fn left_associative_levels_fold_leftward() {
        // 10 3 - 2 -
        let mut expected = constant(10);
        expected.extend(constant(3));
        expected.push(Opcode::Subtract as u8);
        expected.extend(constant(2));
        expected.push(Opcode::Subtract as u8);
        check!(compiled("10-3-2") == expected);
    }

    #[test]
    fn unary_prefix_applies_to_the_primary() {
        // -2*3 compiles as (-2)*3: 2 negate 3 *
        let mut expected = constant(2);
        expected.push(Opcode::Negate as u8);
        expected.extend(constant(3));
        expected.push(Opcode::Multiply as u8);
        check!(compiled("-2*3") == expected);

        // unary plus emits nothing
        check!(compiled("+5") == constant(5));
    }

    #[test]
    fn variables_and_assignments_carry_slot_operands() {
        check!(compiled("b") == vec![Opcode::Var as u8, 2]);

        let mut expected = constant(5);
        expected.push(Opcode::Assign as u8);
        expected.push(0);
        expected.push(Opcode::Var as u8);
        expected.push(0);
        expected.extend(constant(1));
        expected.push(Opcode::Add as u8);
        check!(compiled(": t = 5 ; t + 1") == expected);
    }

    #[test]
    fn multiple_assignment_statements_compile_in_order() {
        let mut expected = constant(1);
        expected.push(Opcode::Assign as u8);
        expected.push(1);
        expected.extend(vec![Opcode::Var as u8, 1]);
        expected.push(Opcode::Assign as u8);
        expected.push(2);
        expected.extend(vec![Opcode::Var as u8, 2]);
        check!(compiled(": a = 1 ; : b = a ; b") == expected);
    }

    #[test]
    fn reports_the_offset_of_the_stray_token() {
        let_assert!(Err(error) = compile("1 + * 2", &mut [0u8; 64]));
        check!(
            error
                == CompileError {
                    kind: CompileErrorKind::UnexpectedToken,
                    offset: 4,
                }
        );
    }

    #[test]
    fn reports_trailing_input_after_a_complete_formula() {
        let_assert!(Err(error) = compile("1 2", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::TrailingInput);
        check!(error.offset == 2);
    }

    #[test]
    fn comparisons_do_not_chain() {
        let_assert!(Err(error) = compile("a < b < c", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::TrailingInput);
        check!(error.offset == 6);
    }

    #[test]
    fn reports_invalid_characters() {
        let_assert!(Err(error) = compile("1 + x", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::InvalidCharacter);
        check!(error.offset == 4);

        let_assert!(Err(error) = compile("5 $", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::InvalidCharacter);
        check!(error.offset == 2);
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        let_assert!(Err(error) = compile("(1+2", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::UnexpectedToken);
        check!(error.offset == 4);

        let_assert!(Err(error) = compile("", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::UnexpectedToken);
        check!(error.offset == 0);
    }

    #[test]
    fn rejects_malformed_assignments() {
        // missing `=`
        let_assert!(Err(error) = compile(": t 5 ; t", &mut [0u8; 64]));
        check!(error.kind == CompileErrorKind::UnexpectedToken);
        check!(error.offset == 4);

        // assignment target must be a variable
        let_assert!(Err(error) = compile(": 5 = 1 ; t", &mut [0u8; 64]));
        check!(error.offset == 2);

        // missing `;`
        let_assert!(Err(error) = compile(": t = 5 t", &mut [0u8; 64]));
        check!(error.offset == 8);
    }

    #[test]
    fn fails_when_the_buffer_cannot_hold_the_formula() {
        let_assert!(Err(error) = compile("1", &mut []));
        check!(error.kind == CompileErrorKind::BufferTooSmall);

        let_assert!(Err(error) = compile("1+2", &mut [0u8; 10]));
        check!(error.kind == CompileErrorKind::BufferTooSmall);

        // The same formula fits in exactly 11 bytes.
        let mut buffer = [0u8; 11];
        check!(compile("1+2", &mut buffer) == Ok(11));
    }

    #[test]
    fn the_first_error_wins() {
        // The stray `*` is hit before the invalid `$` and before the
        // unbalanced parenthesis.
        let_assert!(Err(error) = compile("( * $", &mut [0u8; 64]));
        check!(
            error
                == CompileError {
                    kind: CompileErrorKind::UnexpectedToken,
                    offset: 2,
                }
        );
    }
}
