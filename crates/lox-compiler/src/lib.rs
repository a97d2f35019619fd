//! lox-compiler — Lox source to bytecode
//!
//! - [`scanner`]: on-demand tokens with clox-style error tokens
//! - [`compiler`]: single-pass Pratt compiler emitting a [`lox_core::Chunk`]
//!
//! ```
//! let chunk = lox_compiler::compile("(-1.2 + 3.4) / 5.6").unwrap();
//! assert_eq!(chunk.constants().len(), 3);
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod compiler;
pub mod scanner;

pub use compiler::{compile, compile_with, CompileError, CompilerOptions, Diagnostic, Location};
pub use scanner::{dump_tokens, Scanner, Token, TokenKind};
