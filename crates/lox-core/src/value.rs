//! Dynamically typed runtime values.
//!
//! `Value` is a closed sum type. Nothing converts between variants implicitly:
//! the VM instruction handlers are the only place a value of one tag turns
//! into a value of another.

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Significant digits used when printing numbers (C `%g`).
const PRINT_PRECISION: i32 = 6;

/// A Lox value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Absence of a value.
    Nil,
    /// Double precision number.
    Number(f64),
}

impl Value {
    /// True for `Value::Number`.
    pub const fn is_number(&self) -> bool { matches!(self, Value::Number(_)) }

    /// True for `Value::Nil`.
    pub const fn is_nil(&self) -> bool { matches!(self, Value::Nil) }

    /// True for `Value::Bool`.
    pub const fn is_bool(&self) -> bool { matches!(self, Value::Bool(_)) }

    /// The payload of a `Number`, if this is one.
    pub const fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The payload of a `Bool`, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Name of the tag, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Number(_) => "number",
        }
    }
}

impl Default for Value {
    fn default() -> Self { Value::Nil }
}

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Number(v) } }
impl From<()> for Value { fn from(_: ()) -> Self { Value::Nil } }

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => f.write_str("nil"),
            Value::Number(n) => write_number(f, n),
        }
    }
}

/// `%g` rendering: shortest of fixed/exponent form at 6 significant digits,
/// trailing zeros removed.
fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        return f.write_str("nan");
    }
    if n.is_infinite() {
        return f.write_str(if n > 0.0 { "inf" } else { "-inf" });
    }
    if n == 0.0 {
        return f.write_str(if n.is_sign_negative() { "-0" } else { "0" });
    }

    // Round first: the exponent that decides the layout is the one after rounding.
    let sci = format!("{:.*e}", (PRINT_PRECISION - 1) as usize, n);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return write!(f, "{n}");
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRINT_PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        write!(f, "{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (PRINT_PRECISION - 1 - exp) as usize;
        let fixed = format!("{n:.decimals$}");
        f.write_str(trim_fraction(&fixed))
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
