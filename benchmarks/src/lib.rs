//! Shared inputs for the Lox benches.

use std::fmt::Write as _;

/// `1 + 1 + ... + 1` with `terms` literals.
pub fn sum_chain(terms: usize) -> String { vec!["1"; terms.max(1)].join(" + ") }

/// Nested `-(-(...))` around a single literal.
pub fn negate_chain(depth: usize) -> String { format!("{}2.5{}", "-(".repeat(depth), ")".repeat(depth)) }

/// Mixed-precedence expression of roughly `terms` operations.
pub fn mixed(terms: usize) -> String {
    let ops = ["+", "*", "-", "/"];
    let mut out = String::from("1");
    for i in 0..terms {
        let _ = write!(out, " {} ({}.5)", ops[i % ops.len()], i % 7 + 1);
    }
    out
}
