//! Structural validation reused by tooling.

use crate::bytecode::chunk::{Chunk, ChunkError, OpCode};
use crate::ChunkResult;

/// Basic structural validation of a chunk.
///
/// Checks stay lightweight: every byte decodes to an opcode, operands are
/// complete, constant loads stay inside the pool and the line table covers
/// exactly the code. Stack balance is the compiler's business and is not checked.
pub fn validate_chunk(chunk: &Chunk) -> ChunkResult<()> {
    let covered = chunk.lines().covered();
    if covered != chunk.len() {
        return Err(ChunkError::LineTableMismatch { covered, len: chunk.len() });
    }

    let code = chunk.code();
    let pool = chunk.constants().len();
    let mut offset = 0;
    while offset < code.len() {
        let op = OpCode::try_from(code[offset])?;
        if offset + op.width() > code.len() {
            return Err(ChunkError::Truncated { offset, op });
        }

        let index = match op {
            OpCode::Constant => Some(usize::from(code[offset + 1])),
            OpCode::ConstantLong => chunk.read_u24(offset + 1),
            _ => None,
        };
        if let Some(index) = index {
            if index >= pool {
                return Err(ChunkError::ConstantOutOfRange { offset, op, index, len: pool });
            }
        }

        offset += op.width();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn accepts_well_formed_chunks() {
        let mut chunk = Chunk::new();
        for i in 0..260 {
            chunk.write_constant(Value::Number(f64::from(i)), 1).unwrap();
        }
        chunk.write_op(OpCode::Add, 2);
        chunk.write_op(OpCode::Return, 2);
        assert_eq!(validate_chunk(&chunk), Ok(()));
        assert_eq!(validate_chunk(&Chunk::new()), Ok(()));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write(42, 1);
        assert_eq!(validate_chunk(&chunk), Err(ChunkError::UnknownOpcode(42)));
    }

    #[test]
    fn rejects_truncated_operand() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::True, 1);
        chunk.write_op(OpCode::ConstantLong, 1);
        chunk.write(0, 1);
        assert_eq!(
            validate_chunk(&chunk),
            Err(ChunkError::Truncated { offset: 1, op: OpCode::ConstantLong })
        );
    }

    #[test]
    fn rejects_dangling_constant() {
        let mut chunk = Chunk::new();
        chunk.add_constant(Value::Nil);
        chunk.write_load(1, 1).unwrap();
        assert_eq!(
            validate_chunk(&chunk),
            Err(ChunkError::ConstantOutOfRange { offset: 0, op: OpCode::Constant, index: 1, len: 1 })
        );
    }
}
