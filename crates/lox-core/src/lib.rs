//! lox-core — shared primitives for the Lox bytecode toolchain
//!
//! Provides:
//! - `Value`: the tagged runtime value (`Bool`, `Nil`, `Number`)
//! - `Chunk`: code bytes + constant pool + run-length encoded line table
//! - `OpCode`: the one-byte instruction set and its operand widths
//! - a disassembler (text, compact and structured views)
//! - a small textual assembler and a structural validator
//!
//! Features:
//! - `serde` (default): `Serialize` on values and decoded instructions

#![deny(missing_docs)]

/* ─────────────────────────── Public modules ─────────────────────────── */

/// Runtime values.
pub mod value;

/// Bytecode primitives (chunk, assembler, disassembler, helpers).
pub mod bytecode;

/// Shortcut to the disassembler.
pub use bytecode::disasm;
/// Shortcut to the assembler.
pub use bytecode::asm;
/// Shortcut to the validation helpers.
pub use bytecode::helpers;

pub use bytecode::{Chunk, ChunkError, LineRun, LineTable, OpCode};
pub use value::Value;

/// Result alias for chunk-level operations.
pub type ChunkResult<T> = core::result::Result<T, ChunkError>;

/* ─────────────────────────── Prelude ─────────────────────────── */

/// Convenient glob import for the key types.
pub mod prelude {
    /// Re-exports.
    pub use super::{
        bytecode::{asm::assemble, disasm::disassemble_chunk, helpers::validate_chunk},
        Chunk, ChunkError, ChunkResult, LineTable, OpCode, Value,
    };
}
