//! Small line-oriented assembler for building chunks by hand.
//!
//! ```text
//! ; (-1.2 + 3.4) / 5.6
//! CONSTANT 1.2
//! NEGATE
//! @7 CONSTANT 3.4        ; `@7` sets the source line of this instruction
//! ADD
//! CONSTANT_LONG 5.6      ; force the 24-bit form
//! DIVIDE
//! RETURN
//! ```
//!
//! Instructions:
//! - `CONSTANT <value>` adds a constant and emits the short or long load.
//! - `CONSTANT_LONG <value>` adds a constant and always emits the long load.
//! - `CONST <value>` adds a constant without emitting code.
//! - `LOAD <index>` loads an existing pool slot.
//! - any operand-less opcode (`NEGATE`, `ADD`, `NIL`, `RETURN`, ...).
//!
//! Mnemonics are case-insensitive and accept the `OP_` prefix. Values are
//! `true`, `false`, `nil` or a number. Without `@line` an instruction takes
//! the listing line it appears on.

use crate::bytecode::chunk::{Chunk, ChunkError, OpCode};
use crate::value::Value;

/// Errors reported by [`assemble`], tagged with the listing line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    /// Mnemonic not in the instruction set.
    #[error("line {line}: unsupported instruction `{name}`")]
    UnknownInstruction {
        /// Listing line.
        line: usize,
        /// Mnemonic as written.
        name: String,
    },
    /// Instruction that needs an operand was given none.
    #[error("line {line}: `{name}` expects an operand")]
    MissingOperand {
        /// Listing line.
        line: usize,
        /// Mnemonic as written.
        name: String,
    },
    /// Operand given to an instruction that takes none.
    #[error("line {line}: `{name}` takes no operand (found `{operand}`)")]
    UnexpectedOperand {
        /// Listing line.
        line: usize,
        /// Mnemonic as written.
        name: String,
        /// Extra text.
        operand: String,
    },
    /// Operand that does not parse as a value or index.
    #[error("line {line}: invalid operand `{operand}`")]
    InvalidOperand {
        /// Listing line.
        line: usize,
        /// Operand as written.
        operand: String,
    },
    /// Malformed `@line` marker.
    #[error("line {line}: invalid line marker `{marker}`")]
    InvalidLineMarker {
        /// Listing line.
        line: usize,
        /// Marker as written.
        marker: String,
    },
    /// The chunk refused the instruction.
    #[error("line {line}: {source}")]
    Chunk {
        /// Listing line.
        line: usize,
        /// Underlying error.
        #[source]
        source: ChunkError,
    },
}

/// Assemble a listing into a [`Chunk`].
pub fn assemble(source: &str) -> Result<Chunk, AsmError> {
    let mut chunk = Chunk::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let listing_line = idx + 1;
        let text = raw_line.split(';').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }

        let (source_line, text) = split_line_marker(text, listing_line)?;
        let (name, operand) = match text.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|s| !s.is_empty())),
            None => (text, None),
        };

        emit(&mut chunk, name, operand, source_line, listing_line)?;
    }

    Ok(chunk)
}

fn split_line_marker(text: &str, listing_line: usize) -> Result<(u32, &str), AsmError> {
    let Some(rest) = text.strip_prefix('@') else {
        return Ok((listing_line as u32, text));
    };
    let (marker, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let line = marker.parse::<u32>().map_err(|_| AsmError::InvalidLineMarker {
        line: listing_line,
        marker: format!("@{marker}"),
    })?;
    Ok((line, rest.trim()))
}

fn emit(
    chunk: &mut Chunk,
    name: &str,
    operand: Option<&str>,
    line: u32,
    listing_line: usize,
) -> Result<(), AsmError> {
    let chunk_err = |source| AsmError::Chunk { line: listing_line, source };
    let required = || {
        operand.ok_or_else(|| AsmError::MissingOperand { line: listing_line, name: name.to_string() })
    };

    let upper = name.to_ascii_uppercase();
    match upper.strip_prefix("OP_").unwrap_or(&upper) {
        "CONST" => {
            let value = parse_value(required()?, listing_line)?;
            chunk.add_constant(value);
        }
        "LOAD" => {
            let operand = required()?;
            let index = operand.parse::<usize>().map_err(|_| AsmError::InvalidOperand {
                line: listing_line,
                operand: operand.to_string(),
            })?;
            chunk.write_load(index, line).map_err(chunk_err)?;
        }
        "CONSTANT" => {
            let value = parse_value(required()?, listing_line)?;
            chunk.write_constant(value, line).map_err(chunk_err)?;
        }
        "CONSTANT_LONG" => {
            let value = parse_value(required()?, listing_line)?;
            let index = chunk.add_constant(value);
            chunk.write_load_long(index, line).map_err(chunk_err)?;
        }
        _ => {
            let op = OpCode::from_mnemonic(name)
                .filter(|op| op.operand_len() == 0)
                .ok_or_else(|| AsmError::UnknownInstruction { line: listing_line, name: name.to_string() })?;
            if let Some(extra) = operand {
                return Err(AsmError::UnexpectedOperand {
                    line: listing_line,
                    name: name.to_string(),
                    operand: extra.to_string(),
                });
            }
            chunk.write_op(op, line);
        }
    }
    Ok(())
}

fn parse_value(operand: &str, listing_line: usize) -> Result<Value, AsmError> {
    match operand {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "nil" => Ok(Value::Nil),
        other => other.parse::<f64>().map(Value::Number).map_err(|_| AsmError::InvalidOperand {
            line: listing_line,
            operand: other.to_string(),
        }),
    }
}
