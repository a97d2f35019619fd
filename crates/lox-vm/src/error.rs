//! Runtime failures and interpretation outcomes.

use lox_core::OpCode;

/// Final state of one interpretation, as seen by a shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpretResult {
    /// Ran to `RETURN`.
    Ok,
    /// The compiler rejected the source; the VM never started.
    CompileError,
    /// Execution halted on a runtime error.
    RuntimeError,
}

impl InterpretResult {
    /// Process exit code (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub const fn exit_code(self) -> i32 {
        match self {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError => 65,
            InterpretResult::RuntimeError => 70,
        }
    }

    /// True for `Ok`.
    pub const fn is_ok(self) -> bool { matches!(self, InterpretResult::Ok) }
}

/// What went wrong at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeErrorKind {
    /// Unary operator applied to a non-number.
    #[error("Operand must be a number.")]
    OperandNotNumber {
        /// Tag of the offending value.
        found: &'static str,
    },
    /// Binary operator with at least one non-number operand.
    #[error("Operands must be numbers.")]
    OperandsNotNumbers {
        /// Tag of the left operand.
        left: &'static str,
        /// Tag of the right operand.
        right: &'static str,
    },
    /// Byte that is not an opcode.
    #[error("Unknown opcode {0}.")]
    UnknownOpcode(u8),
    /// Operand bytes missing at the end of the code.
    #[error("Truncated {0} instruction.")]
    Truncated(OpCode),
    /// Constant load past the end of the pool.
    #[error("Constant {index} out of range (pool holds {len}).")]
    ConstantOutOfRange {
        /// Referenced index.
        index: usize,
        /// Pool size.
        len: usize,
    },
    /// Pop on an empty stack (unbalanced chunk).
    #[error("Stack underflow.")]
    StackUnderflow,
    /// Instruction pointer ran off the end of the code.
    #[error("Reached end of code without RETURN.")]
    MissingReturn,
}

/// A runtime error with the source line of the failing instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", location(.line))]
pub struct RuntimeError {
    /// Failure.
    pub kind: RuntimeErrorKind,
    /// Line of the failing opcode, if it could be resolved.
    pub line: Option<u32>,
    /// Offset of the failing opcode.
    pub offset: usize,
}

fn location(line: &Option<u32>) -> String {
    match line {
        Some(line) => format!("\n[line {line}] in script"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes() {
        assert_eq!(InterpretResult::Ok.exit_code(), 0);
        assert_eq!(InterpretResult::CompileError.exit_code(), 65);
        assert_eq!(InterpretResult::RuntimeError.exit_code(), 70);
    }

    #[test]
    fn display_appends_script_line() {
        let err = RuntimeError {
            kind: RuntimeErrorKind::OperandNotNumber { found: "bool" },
            line: Some(3),
            offset: 1,
        };
        assert_eq!(err.to_string(), "Operand must be a number.\n[line 3] in script");

        let err = RuntimeError { kind: RuntimeErrorKind::MissingReturn, line: None, offset: 0 };
        assert_eq!(err.to_string(), "Reached end of code without RETURN.");
    }
}
