//! Core bytecode structures: the opcode table, the chunk and its line table.
//!
//! Encoding summary (one byte per opcode, operands follow inline):
//!
//! ```text
//! RETURN                     0
//! CONSTANT       idx:u8      1
//! CONSTANT_LONG  idx:u24 LE  2
//! NEGATE ADD SUBTRACT MULTIPLY DIVIDE NIL TRUE FALSE   3..=10
//! ```

use core::{fmt, ops::Range, slice};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::value::Value;
use crate::ChunkResult;

/// Largest constant index reachable with `CONSTANT`.
pub const MAX_SHORT_CONSTANT_INDEX: usize = u8::MAX as usize;
/// Largest constant index reachable with `CONSTANT_LONG` (24 bits).
pub const MAX_CONSTANT_INDEX: usize = (1 << 24) - 1;

/* ─────────────────────────── Opcodes ─────────────────────────── */

/// Instruction set. Discriminants are the encoded bytes; their order is part
/// of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum OpCode {
    /// Pop the top of stack and halt with it.
    Return = 0,
    /// Push `constants[u8]`.
    Constant = 1,
    /// Push `constants[u24 LE]`.
    ConstantLong = 2,
    /// Arithmetic negation of a number.
    Negate = 3,
    /// `left + right`.
    Add = 4,
    /// `left - right`.
    Subtract = 5,
    /// `left * right`.
    Multiply = 6,
    /// `left / right`, IEEE semantics.
    Divide = 7,
    /// Push `nil`.
    Nil = 8,
    /// Push `true`.
    True = 9,
    /// Push `false`.
    False = 10,
}

impl OpCode {
    /// Every opcode, in encoding order.
    pub const ALL: [OpCode; 11] = [
        OpCode::Return,
        OpCode::Constant,
        OpCode::ConstantLong,
        OpCode::Negate,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
    ];

    /// Number of operand bytes following the opcode byte.
    pub const fn operand_len(self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantLong => 3,
            _ => 0,
        }
    }

    /// Total encoded size (opcode + operands).
    pub const fn width(self) -> usize { 1 + self.operand_len() }

    /// Mnemonic used by the disassembler and the assembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Return => "OP_RETURN",
            OpCode::Constant => "OP_CONSTANT",
            OpCode::ConstantLong => "OP_CONSTANT_LONG",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
        }
    }

    /// Case-insensitive lookup, with or without the `OP_` prefix.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let bare = upper.strip_prefix("OP_").unwrap_or(&upper);
        Self::ALL.into_iter().find(|op| &op.mnemonic()[3..] == bare)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ChunkError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(byte as usize)
            .copied()
            .ok_or(ChunkError::UnknownOpcode(byte))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self { op as u8 }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.mnemonic()) }
}

/* ─────────────────────────── Errors ─────────────────────────── */

/// Errors raised while building, decoding or validating a chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Offset outside `[0, code.len())`.
    #[error("offset {offset} out of bounds (code length {len})")]
    OffsetOutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Length of the code buffer.
        len: usize,
    },
    /// Byte that does not name an opcode.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    /// Constant index that does not fit in 24 bits.
    #[error("too many constants in one chunk (index {index}, maximum {})", MAX_CONSTANT_INDEX)]
    TooManyConstants {
        /// Index that would have been used.
        index: usize,
    },
    /// Operand bytes missing at the end of the code buffer.
    #[error("{op} at offset {offset} is missing operand bytes")]
    Truncated {
        /// Offset of the opcode byte.
        offset: usize,
        /// The truncated instruction.
        op: OpCode,
    },
    /// Constant load pointing past the end of the pool.
    #[error("{op} at offset {offset} references constant {index} but the pool holds {len}")]
    ConstantOutOfRange {
        /// Offset of the opcode byte.
        offset: usize,
        /// The loading instruction.
        op: OpCode,
        /// Referenced index.
        index: usize,
        /// Pool size.
        len: usize,
    },
    /// Line table does not cover exactly the code buffer.
    #[error("line table covers {covered} bytes but code holds {len}")]
    LineTableMismatch {
        /// Sum of all run lengths.
        covered: usize,
        /// Length of the code buffer.
        len: usize,
    },
}

/* ─────────────────────────── Line table ─────────────────────────── */

/// One run of consecutive bytes sharing a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LineRun {
    /// Source line.
    pub line: u32,
    /// Number of consecutive code bytes on that line.
    pub count: u32,
}

/// Run-length encoded map from code offset to source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    runs: Vec<LineRun>,
}

impl LineTable {
    /// Create an empty line table.
    pub fn new() -> Self { Self { runs: Vec::new() } }

    /// Record the line of one more code byte.
    pub fn push(&mut self, line: u32) {
        match self.runs.last_mut() {
            Some(run) if run.line == line => run.count += 1,
            _ => self.runs.push(LineRun { line, count: 1 }),
        }
    }

    /// Line of the byte at `offset`, or `None` past the covered range.
    pub fn line_for(&self, offset: usize) -> Option<u32> {
        let mut remaining = offset;
        for run in &self.runs {
            let count = run.count as usize;
            if remaining < count {
                return Some(run.line);
            }
            remaining -= count;
        }
        None
    }

    /// Number of runs (not bytes).
    pub fn len(&self) -> usize { self.runs.len() }

    /// Whether no byte has been recorded.
    pub fn is_empty(&self) -> bool { self.runs.is_empty() }

    /// Number of bytes covered by all runs.
    pub fn covered(&self) -> usize { self.runs.iter().map(|run| run.count as usize).sum() }

    /// Raw runs, in code order.
    pub fn runs(&self) -> &[LineRun] { &self.runs }

    /// Iterate over `(offset range, line)` pairs.
    pub fn iter_ranges(&self) -> LineRangeIter<'_> { LineRangeIter { runs: self.runs.iter(), start: 0 } }

    /// Remove all runs.
    pub fn clear(&mut self) { self.runs.clear(); }
}

/// Iterator yielding `(start..end, line)` for each run.
pub struct LineRangeIter<'a> {
    runs: slice::Iter<'a, LineRun>,
    start: usize,
}

impl Iterator for LineRangeIter<'_> {
    type Item = (Range<usize>, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.next()?;
        let start = self.start;
        self.start += run.count as usize;
        Some((start..self.start, run.line))
    }
}

/* ─────────────────────────── Chunk ─────────────────────────── */

/// One compiled unit: code bytes, constant pool and line table.
///
/// Only grows by appending. Indices returned by [`Chunk::add_constant`] stay
/// valid for the lifetime of the chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    lines: LineTable,
}

impl Chunk {
    /// Create an empty chunk.
    pub fn new() -> Self { Self::default() }

    /// Append a raw byte and record its source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append an operand-less opcode (or the opcode byte of a wider one).
    pub fn write_op(&mut self, op: OpCode, line: u32) { self.write(op.into(), line); }

    /// Append a constant to the pool and return its index. Never deduplicates.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Add `value` to the pool and emit the instruction that loads it,
    /// `CONSTANT` for indices up to 255 and `CONSTANT_LONG` above.
    pub fn write_constant(&mut self, value: Value, line: u32) -> ChunkResult<usize> {
        let index = self.constants.len();
        if index > MAX_CONSTANT_INDEX {
            return Err(ChunkError::TooManyConstants { index });
        }
        self.constants.push(value);
        self.write_load(index, line)?;
        Ok(index)
    }

    /// Emit a load of an existing pool slot, picking the short form when it fits.
    pub fn write_load(&mut self, index: usize, line: u32) -> ChunkResult<()> {
        if index > MAX_SHORT_CONSTANT_INDEX {
            return self.write_load_long(index, line);
        }
        let [short, ..] = index.to_le_bytes();
        self.write_op(OpCode::Constant, line);
        self.write(short, line);
        Ok(())
    }

    /// Emit a `CONSTANT_LONG` load regardless of the index magnitude.
    pub fn write_load_long(&mut self, index: usize, line: u32) -> ChunkResult<()> {
        if index > MAX_CONSTANT_INDEX {
            return Err(ChunkError::TooManyConstants { index });
        }
        let [b0, b1, b2, _] = (index as u32).to_le_bytes();
        self.write_op(OpCode::ConstantLong, line);
        self.write(b0, line);
        self.write(b1, line);
        self.write(b2, line);
        Ok(())
    }

    /// Source line of the byte at `offset`.
    pub fn line(&self, offset: usize) -> ChunkResult<u32> {
        let len = self.code.len();
        if offset >= len {
            return Err(ChunkError::OffsetOutOfBounds { offset, len });
        }
        self.lines.line_for(offset).ok_or(ChunkError::OffsetOutOfBounds { offset, len })
    }

    /// Little-endian 24-bit operand starting at `offset`.
    pub fn read_u24(&self, offset: usize) -> Option<usize> {
        let bytes = self.code.get(offset..offset.checked_add(3)?)?;
        Some(usize::from(bytes[0]) | usize::from(bytes[1]) << 8 | usize::from(bytes[2]) << 16)
    }

    /// Instruction bytes.
    pub fn code(&self) -> &[u8] { &self.code }

    /// Constant pool.
    pub fn constants(&self) -> &[Value] { &self.constants }

    /// Lookup a constant by index.
    pub fn constant(&self, index: usize) -> Option<&Value> { self.constants.get(index) }

    /// Line table.
    pub fn lines(&self) -> &LineTable { &self.lines }

    /// Length of the code buffer in bytes.
    pub fn len(&self) -> usize { self.code.len() }

    /// Whether no byte has been written.
    pub fn is_empty(&self) -> bool { self.code.is_empty() }

    /// Release all three buffers, leaving an empty chunk.
    pub fn clear(&mut self) { *self = Self::new(); }
}

/* ─────────────────────────── Tests ─────────────────────────── */
