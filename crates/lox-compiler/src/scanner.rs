//! On-demand scanner for the Lox lexical grammar.
//!
//! Tokens borrow their lexeme from the source. Lexical errors do not abort
//! scanning: they come back as [`TokenKind::Error`] tokens whose lexeme is the
//! message, and the parser reports them like any other diagnostic.

use core::fmt;

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Single-character tokens.
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `;`
    Semicolon,
    /// `/`
    Slash,
    /// `*`
    Star,
    // One or two character tokens.
    /// `!`
    Bang,
    /// `!=`
    BangEqual,
    /// `=`
    Equal,
    /// `==`
    EqualEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    // Literals.
    /// Identifier.
    Identifier,
    /// String literal, quotes included in the lexeme.
    String,
    /// Number literal.
    Number,
    // Keywords.
    /// `and`
    And,
    /// `class`
    Class,
    /// `else`
    Else,
    /// `false`
    False,
    /// `for`
    For,
    /// `fun`
    Fun,
    /// `if`
    If,
    /// `nil`
    Nil,
    /// `or`
    Or,
    /// `print`
    Print,
    /// `return`
    Return,
    /// `super`
    Super,
    /// `this`
    This,
    /// `true`
    True,
    /// `var`
    Var,
    /// `while`
    While,
    /// Lexical error; the lexeme holds the message.
    Error,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Upper-case name used by token dumps (`LEFT_PAREN`, `NUMBER`, ...).
    pub const fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            LeftParen => "LEFT_PAREN",
            RightParen => "RIGHT_PAREN",
            LeftBrace => "LEFT_BRACE",
            RightBrace => "RIGHT_BRACE",
            Comma => "COMMA",
            Dot => "DOT",
            Minus => "MINUS",
            Plus => "PLUS",
            Semicolon => "SEMICOLON",
            Slash => "SLASH",
            Star => "STAR",
            Bang => "BANG",
            BangEqual => "BANG_EQUAL",
            Equal => "EQUAL",
            EqualEqual => "EQUAL_EQUAL",
            Greater => "GREATER",
            GreaterEqual => "GREATER_EQUAL",
            Less => "LESS",
            LessEqual => "LESS_EQUAL",
            Identifier => "IDENTIFIER",
            String => "STRING",
            Number => "NUMBER",
            And => "AND",
            Class => "CLASS",
            Else => "ELSE",
            False => "FALSE",
            For => "FOR",
            Fun => "FUN",
            If => "IF",
            Nil => "NIL",
            Or => "OR",
            Print => "PRINT",
            Return => "RETURN",
            Super => "SUPER",
            This => "THIS",
            True => "TRUE",
            Var => "VAR",
            While => "WHILE",
            Error => "ERROR",
            Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// A token with its lexeme and 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Category.
    pub kind: TokenKind,
    /// Source slice (or the message for `Error` tokens, empty for `Eof`).
    pub lexeme: &'a str,
    /// Scanner line when the token ended (multi-line strings report their last line).
    pub line: u32,
}

/* ─────────────────────────── Scanner ─────────────────────────── */

/// Scanner over one source string.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    start: usize,
    off: usize,
    line: u32,
    done: bool,
}

impl<'a> Scanner<'a> {
    /// Start scanning `src` at line 1.
    pub fn new(src: &'a str) -> Self { Self { src, bytes: src.as_bytes(), start: 0, off: 0, line: 1, done: false } }

    /// Next token. After the end of input this keeps returning `Eof`.
    pub fn scan_token(&mut self) -> Token<'a> {
        if let Err(token) = self.skip_ws_and_comments() {
            return token;
        }
        self.start = self.off;

        let Some(c) = self.bump() else {
            return self.make(TokenKind::Eof);
        };

        let kind = match c {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'-' => TokenKind::Minus,
            b'+' => TokenKind::Plus,
            b'/' => TokenKind::Slash,
            b'*' => TokenKind::Star,
            b'!' => if self.eat(b'=') { TokenKind::BangEqual } else { TokenKind::Bang },
            b'=' => if self.eat(b'=') { TokenKind::EqualEqual } else { TokenKind::Equal },
            b'<' => if self.eat(b'=') { TokenKind::LessEqual } else { TokenKind::Less },
            b'>' => if self.eat(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater },
            b'"' => return self.string(),
            b if b.is_ascii_digit() => return self.number(),
            b if is_alpha(b) => return self.identifier(),
            _ => {
                // Swallow the rest of a multi-byte character so lexemes stay on char boundaries.
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.off += 1;
                }
                return self.error("Unexpected character.");
            }
        };

        self.make(kind)
    }

    /// Scan everything, `Eof` included.
    pub fn tokenize(mut self) -> Vec<Token<'a>> {
        let mut out = Vec::new();
        loop {
            let token = self.scan_token();
            out.push(token);
            if token.kind == TokenKind::Eof {
                return out;
            }
        }
    }

    /* ────────── Primitives ────────── */

    #[inline] fn peek(&self) -> Option<u8> { self.bytes.get(self.off).copied() }
    #[inline] fn peek2(&self) -> Option<u8> { self.bytes.get(self.off + 1).copied() }
    #[inline] fn bump(&mut self) -> Option<u8> { let b = self.peek(); if b.is_some() { self.off += 1; } b }
    #[inline] fn eat(&mut self, expected: u8) -> bool { if self.peek() == Some(expected) { self.off += 1; true } else { false } }

    fn make(&self, kind: TokenKind) -> Token<'a> {
        Token { kind, lexeme: &self.src[self.start..self.off], line: self.line }
    }

    fn error(&self, message: &'static str) -> Token<'a> {
        Token { kind: TokenKind::Error, lexeme: message, line: self.line }
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), Token<'a>> {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(b' ' | b'\r' | b'\t'), _) => self.off += 1,
                (Some(b'\n'), _) => {
                    self.line += 1;
                    self.off += 1;
                }
                (Some(b'/'), Some(b'/')) => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.off += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.off += 2;
                    loop {
                        match (self.peek(), self.peek2()) {
                            (None, _) => return Err(self.error("Unterminated block comment.")),
                            (Some(b'*'), Some(b'/')) => {
                                self.off += 2;
                                break;
                            }
                            (Some(b'\n'), _) => {
                                self.line += 1;
                                self.off += 1;
                            }
                            _ => self.off += 1,
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(&mut self) -> Token<'a> {
        loop {
            match self.bump() {
                None => return self.error("Unterminated string."),
                Some(b'"') => return self.make(TokenKind::String),
                Some(b'\n') => self.line += 1,
                Some(_) => {}
            }
        }
    }

    fn number(&mut self) -> Token<'a> {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.off += 1;
        }
        if self.peek() == Some(b'.') && self.peek2().is_some_and(|b| b.is_ascii_digit()) {
            self.off += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.off += 1;
            }
        }
        self.make(TokenKind::Number)
    }

    fn identifier(&mut self) -> Token<'a> {
        while self.peek().is_some_and(|b| is_alpha(b) || b.is_ascii_digit()) {
            self.off += 1;
        }
        let kind = keyword_of(&self.src[self.start..self.off]).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    /// Yields every token up to and including the first `Eof`.
    fn next(&mut self) -> Option<Token<'a>> {
        if self.done {
            return None;
        }
        let token = self.scan_token();
        self.done = token.kind == TokenKind::Eof;
        Some(token)
    }
}

const fn is_alpha(b: u8) -> bool { b.is_ascii_alphabetic() || b == b'_' }

fn keyword_of(s: &str) -> Option<TokenKind> {
    Some(match s {
        "and" => TokenKind::And,
        "class" => TokenKind::Class,
        "else" => TokenKind::Else,
        "false" => TokenKind::False,
        "for" => TokenKind::For,
        "fun" => TokenKind::Fun,
        "if" => TokenKind::If,
        "nil" => TokenKind::Nil,
        "or" => TokenKind::Or,
        "print" => TokenKind::Print,
        "return" => TokenKind::Return,
        "super" => TokenKind::Super,
        "this" => TokenKind::This,
        "true" => TokenKind::True,
        "var" => TokenKind::Var,
        "while" => TokenKind::While,
        _ => return None,
    })
}

/// Render tokens one source line per output line: `N: lexeme lexeme ...`.
pub fn dump_tokens(src: &str) -> String {
    use fmt::Write as _;

    let mut out = String::new();
    let mut line = None;
    for token in Scanner::new(src).tokenize() {
        if token.kind == TokenKind::Eof {
            break;
        }
        if line != Some(token.line) {
            if line.is_some() {
                out.push('\n');
            }
            let _ = write!(out, "{:4}:", token.line);
            line = Some(token.line);
        }
        let _ = write!(out, " {}", token.lexeme);
    }
    if line.is_some() {
        out.push('\n');
    }
    out
}

/* ─────────────────────────── Tests ─────────────────────────── */
