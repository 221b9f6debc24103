pub use logos::Span;
use logos::{Lexer, Logos};

fn read_number(lexer: &mut Lexer<Token>) -> i32 {
    // Decimal accumulation wraps on overflow, like the embedded hosts this
    // targets; literals past u32::MAX silently alias smaller values.
    let mut value: u32 = 0;
    for digit in lexer.slice().bytes() {
        value = value.wrapping_mul(10).wrapping_add(u32::from(digit - b'0'));
    }
    value as i32
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid character encountered")]
    Invalid,
}

/// One of the four fixed variables a formula can read and assign.
///
/// The variable *values* live in a caller-owned array; a `VarSlot` is only
/// the index into it, and is what variable and assignment instructions carry
/// as their operand byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, arbitrary::Arbitrary)]
#[repr(u8)]
pub enum VarSlot {
    T = 0,
    A = 1,
    B = 2,
    C = 3,
}

impl VarSlot {
    /// Number of variable slots; evaluation takes a `[i32; VarSlot::COUNT]`.
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of the operand-byte encoding.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::T),
            1 => Some(Self::A),
            2 => Some(Self::B),
            3 => Some(Self::C),
            _ => None,
        }
    }

    pub fn name(self) -> char {
        match self {
            Self::T => 't',
            Self::A => 'a',
            Self::B => 'b',
            Self::C => 'c',
        }
    }
}

/// Tokens of the formula language.
///
/// Two-character operators win over their one-character prefixes by maximal
/// munch, so `<=` never lexes as `<` `=`. Anything outside the token set
/// (including letters other than the four variable names) is a
/// [`LexerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[regex("[0-9]+", read_number)]
    Number(i32),
    #[token("t", |_| VarSlot::T)]
    #[token("a", |_| VarSlot::A)]
    #[token("b", |_| VarSlot::B)]
    #[token("c", |_| VarSlot::C)]
    Variable(VarSlot),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Assign,

    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("&")]
    Ampersand,
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }
}
