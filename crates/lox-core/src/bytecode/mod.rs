//! Bytecode helpers: chunk structure, line table, validation, asm/disasm.

/// Chunk representation, opcode table and line table.
pub mod chunk;
pub mod helpers;
pub mod disasm;
pub mod asm;

pub use chunk::{Chunk, ChunkError, LineRun, LineTable, OpCode, MAX_CONSTANT_INDEX, MAX_SHORT_CONSTANT_INDEX};
