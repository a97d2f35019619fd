//! Single-pass Pratt compiler: tokens in, bytecode out.
//!
//! Expressions only: number literals, `true`, `false`, `nil`, grouping,
//! unary `-` and binary `+ - * /`. The whole source must be one expression;
//! the chunk ends with `RETURN` so the VM hands the value back.

use core::fmt;

use lox_core::{Chunk, OpCode, Value};

use crate::scanner::{Scanner, Token, TokenKind};

/* ─────────────────────────── Options ─────────────────────────── */

/// Compiler knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Disassemble the finished chunk at `debug` level.
    pub dump: bool,
}

/* ─────────────────────────── Diagnostics ─────────────────────────── */

/// Where a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// At a token, quoted in the message.
    At(String),
    /// At the end of the source.
    AtEnd,
    /// A lexical error: the message already says what is wrong.
    Lexical,
}

/// One compile error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source line.
    pub line: u32,
    /// Offending token.
    pub location: Location,
    /// Human message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            Location::At(lexeme) => write!(f, " at '{lexeme}'")?,
            Location::AtEnd => f.write_str(" at end")?,
            Location::Lexical => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Compilation failed; the partial chunk is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.diagnostics))]
pub struct CompileError {
    /// Reported errors, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/* ─────────────────────────── Precedence ─────────────────────────── */

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Term,
    Factor,
    Unary,
}

impl Precedence {
    const fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor | Self::Unary => Self::Unary,
        }
    }

    const fn of(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Plus | TokenKind::Minus => Self::Term,
            TokenKind::Star | TokenKind::Slash => Self::Factor,
            _ => Self::None,
        }
    }
}

/* ─────────────────────────── Compiler ─────────────────────────── */

struct Compiler<'a> {
    scanner: Scanner<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    chunk: Chunk,
    diagnostics: Vec<Diagnostic>,
    panic_mode: bool,
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str) -> Self {
        let start = Token { kind: TokenKind::Eof, lexeme: "", line: 1 };
        Self {
            scanner: Scanner::new(source),
            current: start,
            previous: start,
            chunk: Chunk::new(),
            diagnostics: Vec::new(),
            panic_mode: false,
        }
    }

    /* ────────── Token plumbing ────────── */

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn error_at_current(&mut self, message: &str) { self.error_at(self.current, message); }

    fn error(&mut self, message: &str) { self.error_at(self.previous, message); }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let location = match token.kind {
            TokenKind::Eof => Location::AtEnd,
            TokenKind::Error => Location::Lexical,
            _ => Location::At(token.lexeme.to_string()),
        };
        self.diagnostics.push(Diagnostic { line: token.line, location, message: message.to_string() });
    }

    /* ────────── Emission ────────── */

    fn emit_op(&mut self, op: OpCode) { self.chunk.write_op(op, self.previous.line); }

    fn emit_constant(&mut self, value: Value) {
        if self.chunk.write_constant(value, self.previous.line).is_err() {
            self.error("Too many constants in one chunk.");
        }
    }

    /* ────────── Pratt ────────── */

    fn expression(&mut self) { self.parse_precedence(Precedence::Assignment); }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        if !self.prefix(self.previous.kind) {
            self.error("Expect expression.");
            return;
        }

        while precedence <= Precedence::of(self.current.kind) {
            self.advance();
            self.binary();
        }
    }

    /// Run the prefix rule for `kind`; false when there is none.
    fn prefix(&mut self, kind: TokenKind) -> bool {
        match kind {
            TokenKind::LeftParen => self.grouping(),
            TokenKind::Minus => self.unary(),
            TokenKind::Number => self.number(),
            TokenKind::True | TokenKind::False | TokenKind::Nil => self.literal(),
            _ => return false,
        }
        true
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let line = self.previous.line;
        self.parse_precedence(Precedence::Unary);
        self.chunk.write_op(OpCode::Negate, line);
    }

    fn binary(&mut self) {
        let operator = self.previous;
        self.parse_precedence(Precedence::of(operator.kind).next());
        let op = match operator.kind {
            TokenKind::Plus => OpCode::Add,
            TokenKind::Minus => OpCode::Subtract,
            TokenKind::Star => OpCode::Multiply,
            TokenKind::Slash => OpCode::Divide,
            _ => return,
        };
        self.chunk.write_op(op, operator.line);
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(n) => self.emit_constant(Value::Number(n)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn literal(&mut self) {
        let op = match self.previous.kind {
            TokenKind::True => OpCode::True,
            TokenKind::False => OpCode::False,
            _ => OpCode::Nil,
        };
        self.emit_op(op);
    }

    fn finish(mut self) -> Result<Chunk, CompileError> {
        self.emit_op(OpCode::Return);
        if self.diagnostics.is_empty() {
            Ok(self.chunk)
        } else {
            Err(CompileError { diagnostics: self.diagnostics })
        }
    }
}

/* ─────────────────────────── Entry points ─────────────────────────── */

/// Compile one expression into a chunk ending in `RETURN`.
pub fn compile(source: &str) -> Result<Chunk, CompileError> { compile_with(source, CompilerOptions::default()) }

/// [`compile`] with explicit options.
pub fn compile_with(source: &str, options: CompilerOptions) -> Result<Chunk, CompileError> {
    let mut compiler = Compiler::new(source);
    compiler.advance();
    compiler.expression();
    compiler.consume(TokenKind::Eof, "Expect end of expression.");
    let result = compiler.finish();

    #[cfg(feature = "tracing")]
    match &result {
        Ok(chunk) => {
            tracing::debug!(bytes = chunk.len(), constants = chunk.constants().len(), "compiled");
            if options.dump {
                tracing::debug!("\n{}", lox_core::disasm::disassemble_chunk(chunk, "code"));
            }
        }
        Err(err) => tracing::debug!(errors = err.diagnostics.len(), "compile failed"),
    }
    #[cfg(not(feature = "tracing"))]
    let _ = options;

    result
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use lox_core::disasm::disassemble_compact;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn eval(source: &str) -> Value { lox_vm::interpret(&compile(source).unwrap()).unwrap() }

    fn first_error(source: &str) -> String { compile(source).unwrap_err().diagnostics[0].to_string() }

    #[test]
    fn emits_expected_bytecode() {
        let chunk = compile("(-1.2 + 3.4) / 5.6").unwrap();
        let expected = "\
0000: OP_CONSTANT         0 '1.2'
0002: OP_NEGATE
0003: OP_CONSTANT         1 '3.4'
0005: OP_ADD
0006: OP_CONSTANT         2 '5.6'
0008: OP_DIVIDE
0009: OP_RETURN
";
        assert_eq!(disassemble_compact(&chunk), expected);
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Value::Number(9.0));
        assert_eq!(eval("10 - 4 - 3"), Value::Number(3.0));
        assert_eq!(eval("8 / 4 / 2"), Value::Number(1.0));
        assert_eq!(eval("--3"), Value::Number(3.0));
        assert_eq!(eval("-2 * 3"), Value::Number(-6.0));
    }

    #[test]
    fn literals() {
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval("false"), Value::Bool(false));
        assert_eq!(eval("nil"), Value::Nil);
    }

    #[test]
    fn type_errors_surface_at_runtime() {
        let chunk = compile("-true").unwrap();
        let err = lox_vm::interpret(&chunk).unwrap_err();
        assert_eq!(err.to_string(), "Operand must be a number.\n[line 1] in script");

        let chunk = compile("1 +\n\nnil").unwrap();
        let err = lox_vm::interpret(&chunk).unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn operators_carry_their_own_line() {
        let chunk = compile("1\n+\n2").unwrap();
        // CONSTANT(1) CONSTANT(3) ADD(2) RETURN(3)
        assert_eq!(chunk.line(0), Ok(1));
        assert_eq!(chunk.line(2), Ok(3));
        assert_eq!(chunk.line(4), Ok(2));
        assert_eq!(chunk.line(5), Ok(3));
    }

    #[test]
    fn reports_clox_style_diagnostics() {
        assert_eq!(first_error("1 +"), "[line 1] Error at end: Expect expression.");
        assert_eq!(first_error("(1 + 2"), "[line 1] Error at end: Expect ')' after expression.");
        assert_eq!(first_error("1 2"), "[line 1] Error at '2': Expect end of expression.");
        assert_eq!(first_error("\n* 3"), "[line 2] Error at '*': Expect expression.");
        assert_eq!(first_error("1 < 2"), "[line 1] Error at '<': Expect end of expression.");
        assert_eq!(first_error("1 + @"), "[line 1] Error: Unexpected character.");
        assert_eq!(first_error("\"str\""), "[line 1] Error at '\"str\"': Expect expression.");
        assert_eq!(first_error(""), "[line 1] Error at end: Expect expression.");
    }

    #[test]
    fn panic_mode_keeps_only_the_first_error() {
        let err = compile("@ # $").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(err.to_string(), "[line 1] Error: Unexpected character.");
    }

    #[test]
    fn many_literals_switch_to_long_constants() {
        let source = vec!["1"; 300].join(" + ");
        let chunk = compile(&source).unwrap();
        assert_eq!(chunk.constants().len(), 300);
        assert!(chunk.code().contains(&(OpCode::ConstantLong as u8)));
        assert_eq!(lox_vm::interpret(&chunk), Ok(Value::Number(300.0)));
    }

    proptest! {
        #[test]
        fn integer_arithmetic_matches_rust(a in 0u32..10_000, b in 1u32..10_000, c in 0u32..10_000) {
            let source = format!("{a} + {b} * {c} - {a} / {b}");
            let (a, b, c) = (f64::from(a), f64::from(b), f64::from(c));
            prop_assert_eq!(eval(&source), Value::Number(a + b * c - a / b));
        }
    }
}
