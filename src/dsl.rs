//! # Dipamkara — Filter expression language
//!
//! Compact boolean expressions over inverted indices:
//!
//! ```text
//! expr      := atom (logicalOp atom)*
//! atom      := indexName compareOp literal
//! compareOp := '==' | '!=' | '<' | '<=' | '>' | '>='
//! logicalOp := '&&' | '||'
//! literal   := number | '"' anyCharsExceptQuote '"'
//! ```
//!
//! There are no parentheses and no operator precedence: atoms are folded
//! strictly left to right, `&&` intersecting and `||` unioning the running
//! set. Clients depend on this exact order, so do not add precedence.
//!
//! String equality uses LIKE semantics: a leading and/or trailing `%` in the
//! pattern becomes a wildcard (`%x%` substring, `%x` suffix, `x%` prefix).
//!
//! The evaluator is pure over a borrowed snapshot of the indices; it never
//! mutates engine state.

use crate::error::{DbError, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// One inverted index: vector key → the document's value at the indexed field.
pub type Index = IndexMap<String, Value>;

/// All inverted indices, keyed by field name.
pub type Indices = IndexMap<String, Index>;

/// Operator tokens that may not appear in index names.
pub const RESERVED_TOKENS: [&str; 8] = [">", "<", ">=", "<=", "==", "!=", "&&", "||"];

/// First reserved operator token found in `text`, if any.
pub fn reserved_token_in(text: &str) -> Option<&'static str> {
    RESERVED_TOKENS.iter().find(|kw| text.contains(*kw)).copied()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Cmp(CmpOp),
    Logic(LogicOp),
}

/// Split an expression into words and operators. Words end at whitespace or
/// at the first operator character, so `age>=30` and `age >= 30` tokenize
/// identically.
fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if matches!(c, '&' | '|' | '<' | '>' | '=' | '!') {
            let next = chars.get(i + 1).copied();
            let (token, width) = match (c, next) {
                ('<', Some('=')) => (Token::Cmp(CmpOp::Le), 2),
                ('<', _) => (Token::Cmp(CmpOp::Lt), 1),
                ('>', Some('=')) => (Token::Cmp(CmpOp::Ge), 2),
                ('>', _) => (Token::Cmp(CmpOp::Gt), 1),
                ('=', Some('=')) => (Token::Cmp(CmpOp::Eq), 2),
                ('!', Some('=')) => (Token::Cmp(CmpOp::Ne), 2),
                ('&', Some('&')) => (Token::Logic(LogicOp::And), 2),
                ('|', Some('|')) => (Token::Logic(LogicOp::Or), 2),
                _ => {
                    return Err(DbError::DslSyntax(format!(
                        "unexpected operator character '{c}'"
                    )))
                }
            };
            tokens.push(token);
            i += width;
            continue;
        }
        let start = i;
        while i < chars.len()
            && !chars[i].is_whitespace()
            && !matches!(chars[i], '&' | '|' | '<' | '>' | '=' | '!')
        {
            i += 1;
        }
        tokens.push(Token::Word(chars[start..i].iter().collect()));
    }
    Ok(tokens)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone)]
struct Atom {
    index: String,
    op: CmpOp,
    literal: Literal,
}

/// Nonnegative decimal with at most one dot. Anything else must be quoted.
fn is_number(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().filter(|c| *c == '.').count() <= 1
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn parse_literal(word: &str) -> Result<Literal> {
    if is_number(word) {
        let n = word
            .parse::<f64>()
            .map_err(|_| DbError::DslSyntax(format!("bad number literal \"{word}\"")))?;
        return Ok(Literal::Number(n));
    }
    if word.len() >= 2 && word.starts_with('"') && word.ends_with('"') {
        return Ok(Literal::Str(word[1..word.len() - 1].to_string()));
    }
    Err(DbError::DslSyntax(
        "string value should be surrounded by \" \"".to_string(),
    ))
}

/// The expression as a flat chain: the first atom, then (operator, atom) pairs.
fn parse(expr: &str) -> Result<(Atom, Vec<(LogicOp, Atom)>)> {
    let tokens = tokenize(expr)?;
    let mut iter = tokens.into_iter();

    let first = parse_atom(&mut iter)?;
    let mut rest = Vec::new();
    while let Some(token) = iter.next() {
        let op = match token {
            Token::Logic(op) => op,
            other => {
                return Err(DbError::DslSyntax(format!(
                    "expected && or || between atoms, got {other:?}"
                )))
            }
        };
        rest.push((op, parse_atom(&mut iter)?));
    }
    Ok((first, rest))
}

fn parse_atom(iter: &mut std::vec::IntoIter<Token>) -> Result<Atom> {
    let index = match iter.next() {
        Some(Token::Word(w)) => w,
        other => {
            return Err(DbError::DslSyntax(format!(
                "expected index name, got {other:?}"
            )))
        }
    };
    let op = match iter.next() {
        Some(Token::Cmp(op)) => op,
        other => {
            return Err(DbError::DslSyntax(format!(
                "expected comparison operator after \"{index}\", got {other:?}"
            )))
        }
    };
    let literal = match iter.next() {
        Some(Token::Word(w)) => parse_literal(&w)?,
        other => {
            return Err(DbError::DslSyntax(format!(
                "expected literal after operator, got {other:?}"
            )))
        }
    };
    Ok(Atom { index, op, literal })
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluate `expr` against `indices`, returning the matching vector keys.
pub fn evaluate(expr: &str, indices: &Indices) -> Result<HashSet<String>> {
    let (first, rest) = parse(expr)?;
    let mut running = eval_atom(&first, indices)?;
    for (op, atom) in &rest {
        let next = eval_atom(atom, indices)?;
        match op {
            LogicOp::And => running.retain(|k| next.contains(k)),
            LogicOp::Or => running.extend(next),
        }
    }
    Ok(running)
}

fn eval_atom(atom: &Atom, indices: &Indices) -> Result<HashSet<String>> {
    let index = indices
        .get(&atom.index)
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| DbError::IndexNotExist(atom.index.clone()))?;

    let mut matched = HashSet::new();
    for (vk, stored) in index {
        if atom_match(atom.op, stored, &atom.literal) {
            matched.insert(vk.clone());
        }
    }
    Ok(matched)
}

fn atom_match(op: CmpOp, stored: &Value, literal: &Literal) -> bool {
    // Numeric comparison only when both sides are numbers; everything else
    // is compared as text.
    if let (Some(lhs), Literal::Number(rhs)) = (stored.as_f64(), literal) {
        return match op {
            CmpOp::Eq => lhs == *rhs,
            CmpOp::Ne => lhs != *rhs,
            CmpOp::Lt => lhs < *rhs,
            CmpOp::Le => lhs <= *rhs,
            CmpOp::Gt => lhs > *rhs,
            CmpOp::Ge => lhs >= *rhs,
        };
    }
    let lhs = value_text(stored);
    let rhs = literal_text(literal);
    match op {
        CmpOp::Eq => like_match(&rhs, &lhs),
        CmpOp::Ne => !like_match(&rhs, &lhs),
        CmpOp::Lt => lhs < rhs,
        CmpOp::Le => lhs <= rhs,
        CmpOp::Gt => lhs > rhs,
        CmpOp::Ge => lhs >= rhs,
    }
}

/// Stored value as comparison text. Strings compare by their content; any
/// other JSON type compares by its serialized form.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Number(n) => format!("{n}"),
        Literal::Str(s) => s.clone(),
    }
}

/// LIKE pattern match: `%x%` substring, `%x` suffix, `x%` prefix, else strict.
fn like_match(pattern: &str, object: &str) -> bool {
    if pattern.starts_with('%') && pattern.ends_with('%') && pattern.len() >= 2 {
        object.contains(&pattern[1..pattern.len() - 1])
    } else if let Some(suffix) = pattern.strip_prefix('%') {
        object.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('%') {
        object.starts_with(prefix)
    } else {
        pattern == object
    }
}

// ─────────────────────────────────────────────────────────────────────────────
