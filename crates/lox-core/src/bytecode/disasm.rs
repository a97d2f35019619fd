//! Textual and structured disassembly of a [`Chunk`].
//!
//! Read-only: decoding never touches VM state and never panics on malformed
//! input. Unknown opcode bytes are reported and skipped as one-byte
//! instructions, so a walk from offset 0 always terminates.

use core::fmt::Write;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::bytecode::chunk::{Chunk, OpCode};
use crate::value::Value;

/// Decoded form of the instruction at an offset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Instruction {
    /// Opcode without operands.
    Simple {
        /// The opcode.
        op: OpCode,
    },
    /// Constant load with its resolved index and value.
    Constant {
        /// `Constant` or `ConstantLong`.
        op: OpCode,
        /// Pool index read from the operand bytes.
        index: usize,
        /// Referenced value, `None` if the index is past the pool.
        value: Option<Value>,
    },
    /// Opcode whose operand bytes run past the end of the code.
    Truncated {
        /// The opcode.
        op: OpCode,
    },
    /// Byte that is not an opcode.
    Unknown {
        /// Raw byte.
        byte: u8,
    },
    /// Offset past the end of the code.
    OutOfBounds,
}

/// One decoded instruction plus its position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Decoded {
    /// Offset of the opcode byte.
    pub offset: usize,
    /// Source line, `None` when the offset is out of range.
    pub line: Option<u32>,
    /// Decoded payload.
    pub instruction: Instruction,
    /// Offset of the next instruction.
    pub next: usize,
}

/// Decode the instruction starting at `offset`.
pub fn decode(chunk: &Chunk, offset: usize) -> Decoded {
    let code = chunk.code();
    let line = chunk.line(offset).ok();

    let Some(&byte) = code.get(offset) else {
        return Decoded { offset, line, instruction: Instruction::OutOfBounds, next: offset.saturating_add(1) };
    };
    let Ok(op) = OpCode::try_from(byte) else {
        return Decoded { offset, line, instruction: Instruction::Unknown { byte }, next: offset.saturating_add(1) };
    };

    let next = offset + op.width();
    if next > code.len() {
        return Decoded { offset, line, instruction: Instruction::Truncated { op }, next: code.len() };
    }

    let index = match op {
        OpCode::Constant => Some(usize::from(code[offset + 1])),
        OpCode::ConstantLong => chunk.read_u24(offset + 1),
        _ => None,
    };
    let instruction = match index {
        Some(index) => Instruction::Constant { op, index, value: chunk.constant(index).copied() },
        None => Instruction::Simple { op },
    };
    Decoded { offset, line, instruction, next }
}

/// Iterator over every instruction of a chunk, from offset 0 to the end.
pub struct Instructions<'a> {
    chunk: &'a Chunk,
    offset: usize,
}

impl Iterator for Instructions<'_> {
    type Item = Decoded;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.chunk.len() {
            return None;
        }
        let decoded = decode(self.chunk, self.offset);
        self.offset = decoded.next;
        Some(decoded)
    }
}

/// Walk the chunk instruction by instruction.
pub fn instructions(chunk: &Chunk) -> Instructions<'_> { Instructions { chunk, offset: 0 } }

/// Render the instruction at `offset` and return it with the next offset.
///
/// Layout: `OOOO LLLL MNEMONIC [index 'value']`, where the line column shows
/// `   |` when the byte sits on the same line as the previous one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let decoded = decode(chunk, offset);
    let mut out = String::new();
    let _ = write!(out, "{offset:04} ");

    let same_line = offset > 0 && decoded.line.is_some() && chunk.line(offset - 1).ok() == decoded.line;
    match decoded.line {
        _ if same_line => out.push_str("   | "),
        Some(line) => {
            let _ = write!(out, "{line:4} ");
        }
        None => out.push_str("   ? "),
    }

    write_instruction(&mut out, &decoded.instruction);
    (out, decoded.next)
}

/// Full listing with a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        let (text, next) = disassemble_instruction(chunk, offset);
        let _ = writeln!(out, "{text}");
        offset = next;
    }
    out
}

/// One line per instruction, without line numbers.
pub fn disassemble_compact(chunk: &Chunk) -> String {
    let mut out = String::new();
    for decoded in instructions(chunk) {
        let _ = write!(out, "{:04}: ", decoded.offset);
        write_instruction(&mut out, &decoded.instruction);
        out.push('\n');
    }
    out
}

fn write_instruction(out: &mut String, instruction: &Instruction) {
    let _ = match instruction {
        Instruction::Simple { op } => write!(out, "{}", op.mnemonic()),
        Instruction::Constant { op, index, value: Some(value) } => {
            write!(out, "{:<16} {index:4} '{value}'", op.mnemonic())
        }
        Instruction::Constant { op, index, value: None } => {
            write!(out, "{:<16} {index:4} <missing constant>", op.mnemonic())
        }
        Instruction::Truncated { op } => write!(out, "{} <truncated operand>", op.mnemonic()),
        Instruction::Unknown { byte } => write!(out, "UNKNOWN OPCODE {byte}"),
        Instruction::OutOfBounds => write!(out, "ERROR: Offset out of bounds"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Chunk {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.2), 123).unwrap();
        chunk.write_op(OpCode::Negate, 123);
        chunk.write_op(OpCode::Return, 124);
        chunk
    }

    #[test]
    fn listing_matches_reference_layout() {
        let expected = "\
== test ==
0000  123 OP_CONSTANT         0 '1.2'
0002    | OP_NEGATE
0003  124 OP_RETURN
";
        assert_eq!(disassemble_chunk(&sample(), "test"), expected);
    }

    #[test]
    fn compact_listing() {
        let expected = "\
0000: OP_CONSTANT         0 '1.2'
0002: OP_NEGATE
0003: OP_RETURN
";
        assert_eq!(disassemble_compact(&sample()), expected);
    }

    #[test]
    fn unknown_opcode_advances_by_one() {
        let mut chunk = Chunk::new();
        chunk.write(0xEE, 5);
        chunk.write_op(OpCode::Return, 5);

        let (text, next) = disassemble_instruction(&chunk, 0);
        assert_eq!(text, "0000    5 UNKNOWN OPCODE 238");
        assert_eq!(next, 1);
        assert_eq!(decode(&chunk, 1).instruction, Instruction::Simple { op: OpCode::Return });
    }

    #[test]
    fn out_of_range_offset_is_reported() {
        let chunk = sample();
        let (text, next) = disassemble_instruction(&chunk, 10);
        assert_eq!(text, "0010    ? ERROR: Offset out of bounds");
        assert_eq!(next, 11);
    }

    #[test]
    fn offset_at_usize_max_does_not_wrap() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Return, 1);
        let (text, next) = disassemble_instruction(&chunk, usize::MAX);
        assert!(text.ends_with("ERROR: Offset out of bounds"));
        assert_eq!(next, usize::MAX);
        assert_eq!(decode(&chunk, usize::MAX).instruction, Instruction::OutOfBounds);
    }

    #[test]
    fn truncated_long_constant_stops_at_end() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::ConstantLong, 1);
        chunk.write(0, 1);
        let decoded = decode(&chunk, 0);
        assert_eq!(decoded.instruction, Instruction::Truncated { op: OpCode::ConstantLong });
        assert_eq!(decoded.next, chunk.len());
    }

    #[test]
    fn missing_constant_is_rendered_not_panicking() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(3, 1);
        let (text, _) = disassemble_instruction(&chunk, 0);
        assert_eq!(text, "0000    1 OP_CONSTANT         3 <missing constant>");
    }

    #[test]
    fn three_hundred_constants_switch_to_long_form() {
        let mut chunk = Chunk::new();
        for i in 0..300 {
            chunk.write_constant(Value::Number(f64::from(i)), 1).unwrap();
        }
        chunk.write_op(OpCode::Return, 1);

        let decoded: Vec<_> = instructions(&chunk).collect();
        assert_eq!(decoded.len(), 301);
        for (i, d) in decoded.iter().take(300).enumerate() {
            let (op, offset) = if i < 256 {
                (OpCode::Constant, i * 2)
            } else {
                (OpCode::ConstantLong, 512 + (i - 256) * 4)
            };
            assert_eq!(d.offset, offset);
            assert_eq!(
                d.instruction,
                Instruction::Constant { op, index: i, value: Some(Value::Number(i as f64)) }
            );
        }
        assert_eq!(decoded[300].offset, 512 + 44 * 4);
    }

    #[test]
    fn walk_visits_every_byte_once() {
        let mut chunk = Chunk::new();
        for i in 0..270 {
            chunk.write_constant(Value::Number(f64::from(i)), (i / 10) as u32).unwrap();
            chunk.write_op(OpCode::Negate, 1);
        }
        chunk.write(0xAB, 2);
        chunk.write_op(OpCode::Return, 3);

        let mut covered = 0;
        let mut expected_offset = 0;
        for decoded in instructions(&chunk) {
            assert_eq!(decoded.offset, expected_offset);
            covered += decoded.next - decoded.offset;
            expected_offset = decoded.next;
        }
        assert_eq!(covered, chunk.len());
        assert_eq!(expected_offset, chunk.len());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn decoded_serializes_with_kind_tag() {
        let json = serde_json::to_value(decode(&sample(), 0)).unwrap();
        assert_eq!(json["instruction"]["kind"], "constant");
        assert_eq!(json["instruction"]["index"], 0);
        assert_eq!(json["line"], 123);
        assert_eq!(json["next"], 2);
    }
}
