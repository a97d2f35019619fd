//! lox-vm — stack virtual machine for Lox chunks
//!
//! - `Vm`: borrows one [`Chunk`], owns an instruction pointer and an operand stack
//! - `Vm::run` loops `Vm::step` until `RETURN` or the first runtime error
//! - `interpret`: one-shot helper for a finished chunk
//!
//! Runtime errors are detected eagerly at the failing instruction: the operand
//! types are checked before anything is popped, the stack is cleared and the
//! line of the failing opcode is attached to the error. No instruction runs
//! after an error.
//!
//! With the `tracing` feature (default), every step emits a `TRACE` event on
//! the `lox_vm::trace` target with the stack contents and the disassembled
//! instruction. This crate never installs a subscriber.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

mod error;

use lox_core::{Chunk, OpCode, Value};

pub use error::{InterpretResult, RuntimeError, RuntimeErrorKind};

/// Initial operand stack capacity.
pub const STACK_MIN: usize = 256;

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// More instructions to run.
    Continue,
    /// `RETURN` executed; carries the program result.
    Halt(Value),
}

/* ------------------------------ VM ------------------------------ */

/// Execution state bound to one chunk.
#[derive(Debug)]
pub struct Vm<'c> {
    chunk: &'c Chunk,
    ip: usize,
    stack: Vec<Value>,
}

impl<'c> Vm<'c> {
    /// Bind a fresh VM to `chunk`: ip at 0, empty stack.
    pub fn new(chunk: &'c Chunk) -> Self {
        Self { chunk, ip: 0, stack: Vec::with_capacity(STACK_MIN) }
    }

    /// The bound chunk.
    pub fn chunk(&self) -> &'c Chunk { self.chunk }

    /// Offset of the next byte to fetch.
    pub fn ip(&self) -> usize { self.ip }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[Value] { &self.stack }

    /// Push onto the operand stack.
    pub fn push(&mut self, value: Value) { self.stack.push(value); }

    /// Pop from the operand stack.
    pub fn pop(&mut self) -> Option<Value> { self.stack.pop() }

    /// Rewind to the initial state (ip 0, empty stack).
    pub fn reset(&mut self) {
        self.ip = 0;
        self.stack.clear();
    }

    /// Run until `RETURN` (the popped value is the result) or a runtime error.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        loop {
            if let Step::Halt(value) = self.step()? {
                #[cfg(feature = "tracing")]
                tracing::debug!(result = %value, ip = self.ip, "halted");
                return Ok(value);
            }
        }
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(&mut self) -> Result<Step, RuntimeError> {
        let start = self.ip;
        self.trace(start);

        let Some(&byte) = self.chunk.code().get(start) else {
            return Err(self.fail(start, RuntimeErrorKind::MissingReturn));
        };
        self.ip += 1;
        let Ok(op) = OpCode::try_from(byte) else {
            return Err(self.fail(start, RuntimeErrorKind::UnknownOpcode(byte)));
        };

        match op {
            OpCode::Return => {
                let Some(value) = self.stack.pop() else {
                    return Err(self.fail(start, RuntimeErrorKind::StackUnderflow));
                };
                return Ok(Step::Halt(value));
            }
            OpCode::Constant | OpCode::ConstantLong => {
                let value = self.read_constant(start, op)?;
                self.stack.push(value);
            }
            OpCode::Negate => match self.stack.last_mut() {
                Some(Value::Number(n)) => *n = -*n,
                Some(other) => {
                    let found = other.type_name();
                    return Err(self.fail(start, RuntimeErrorKind::OperandNotNumber { found }));
                }
                None => return Err(self.fail(start, RuntimeErrorKind::StackUnderflow)),
            },
            OpCode::Add => self.binary_op(start, |a, b| a + b)?,
            OpCode::Subtract => self.binary_op(start, |a, b| a - b)?,
            OpCode::Multiply => self.binary_op(start, |a, b| a * b)?,
            OpCode::Divide => self.binary_op(start, |a, b| a / b)?,
            OpCode::Nil => self.stack.push(Value::Nil),
            OpCode::True => self.stack.push(Value::Bool(true)),
            OpCode::False => self.stack.push(Value::Bool(false)),
        }

        Ok(Step::Continue)
    }

    /// Decode the operand of a constant load at `start` and fetch the value.
    fn read_constant(&mut self, start: usize, op: OpCode) -> Result<Value, RuntimeError> {
        let end = start + op.width();
        if end > self.chunk.len() {
            return Err(self.fail(start, RuntimeErrorKind::Truncated(op)));
        }
        let code = self.chunk.code();
        let index = match op {
            OpCode::ConstantLong => {
                usize::from(code[start + 1]) | usize::from(code[start + 2]) << 8 | usize::from(code[start + 3]) << 16
            }
            _ => usize::from(code[start + 1]),
        };
        self.ip = end;

        match self.chunk.constant(index) {
            Some(value) => Ok(*value),
            None => {
                let len = self.chunk.constants().len();
                Err(self.fail(start, RuntimeErrorKind::ConstantOutOfRange { index, len }))
            }
        }
    }

    /// Pop right then left, push `f(left, right)`. Types are checked before
    /// popping so a failure leaves nothing half-applied.
    fn binary_op(&mut self, start: usize, f: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let len = self.stack.len();
        if len < 2 {
            return Err(self.fail(start, RuntimeErrorKind::StackUnderflow));
        }
        let (left, right) = (self.stack[len - 2], self.stack[len - 1]);
        let (Value::Number(a), Value::Number(b)) = (left, right) else {
            let kind = RuntimeErrorKind::OperandsNotNumbers { left: left.type_name(), right: right.type_name() };
            return Err(self.fail(start, kind));
        };
        self.stack.truncate(len - 2);
        self.stack.push(Value::Number(f(a, b)));
        Ok(())
    }

    /// Build the error for the opcode at `start`, clear the stack and park ip
    /// at the end of the code.
    fn fail(&mut self, start: usize, kind: RuntimeErrorKind) -> RuntimeError {
        let line = self.chunk.line(start).ok();
        self.stack.clear();
        self.ip = self.chunk.len();
        #[cfg(feature = "tracing")]
        tracing::debug!(offset = start, ?line, error = %kind, "runtime error");
        RuntimeError { kind, line, offset: start }
    }

    #[cfg(feature = "tracing")]
    fn trace(&self, offset: usize) {
        tracing::trace!(
            target: "lox_vm::trace",
            "          {}\n{}",
            trace::Stack(&self.stack),
            trace::Instruction { chunk: self.chunk, offset },
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn trace(&self, _offset: usize) {}
}

/// Run a finished chunk on a fresh VM.
pub fn interpret(chunk: &Chunk) -> Result<Value, RuntimeError> { Vm::new(chunk).run() }

/* -------------------------- Trace rendering -------------------------- */

#[cfg(feature = "tracing")]
mod trace {
    use core::fmt;

    use lox_core::{disasm, Chunk, Value};

    /// `[ a ][ b ]`, formatted only when the event is recorded.
    pub(crate) struct Stack<'a>(pub(crate) &'a [Value]);

    impl fmt::Display for Stack<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for value in self.0 {
                write!(f, "[ {value} ]")?;
            }
            Ok(())
        }
    }

    /// Disassembly of the instruction about to run.
    pub(crate) struct Instruction<'a> {
        pub(crate) chunk: &'a Chunk,
        pub(crate) offset: usize,
    }

    impl fmt::Display for Instruction<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let (text, _) = disasm::disassemble_instruction(self.chunk, self.offset);
            f.write_str(&text)
        }
    }
}

/* ------------------------------ Tests ------------------------------ */
