//! A compiler and evaluator for a small infix formula language over four
//! integer variables (`t`, `a`, `b`, `c`), meant for hosts that evaluate
//! caller-supplied formulas repeatedly without re-parsing text: compile once
//! into a caller-owned byte buffer, then run the bytecode against a variable
//! array as often as needed. Neither path allocates.
//!
//! ```
//! use formulet::{compile, evaluate, VarSlot};
//!
//! let mut code = [0u8; 64];
//! let len = compile(": t = 5 ; t + 1", &mut code).unwrap();
//!
//! let mut vars = [0i32; VarSlot::COUNT];
//! assert_eq!(evaluate(&code[..len], &mut vars), 6);
//! assert_eq!(vars[VarSlot::T.index()], 5);
//! ```

pub mod bytecode;
pub mod compiler;
pub mod lexer;
pub mod runtime;

pub use bytecode::{disassemble, Opcode};
pub use compiler::{compile, CompileError, CompileErrorKind};
pub use lexer::{Token, VarSlot};
pub use runtime::{evaluate, STACK_SIZE};
