//! Classification of raw `setVariable` values.

use std::sync::OnceLock;

use regex::Regex;

use swfdap_core::{format_number, ValueKind};

/// A raw value typed by its literal syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    /// Decimal number, kept as written.
    Number(String),
    /// Hexadecimal number, already converted.
    Hex(i64),
    /// Quoted string with the quotes removed.
    String(String),
    Unrecognized,
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?([0-9]+(\.[0-9]+)?|\.[0-9]+)$").expect("decimal regex is valid")
    })
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?0[xX][0-9A-Fa-f]+$").expect("hex regex is valid"))
}

/// Classifies `raw`; the first matching form wins.
pub fn parse_literal(raw: &str) -> Literal {
    match raw {
        "true" => return Literal::Boolean(true),
        "false" => return Literal::Boolean(false),
        _ => {}
    }
    if decimal_pattern().is_match(raw) {
        return Literal::Number(raw.to_string());
    }
    if hex_pattern().is_match(raw) {
        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, &rest[2..]),
            None => (false, &raw[2..]),
        };
        return match i64::from_str_radix(digits, 16) {
            Ok(value) if negative => Literal::Hex(-value),
            Ok(value) => Literal::Hex(value),
            Err(_) => Literal::Unrecognized,
        };
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Literal::String(raw[1..raw.len() - 1].to_string());
    }
    Literal::Unrecognized
}

impl Literal {
    /// The native kind and text to assign, or `None` when unrecognized.
    pub fn assignment(&self) -> Option<(ValueKind, String)> {
        match self {
            Literal::Boolean(b) => Some((ValueKind::Boolean, b.to_string())),
            Literal::Number(text) => Some((ValueKind::Number, text.clone())),
            Literal::Hex(value) => Some((ValueKind::Number, format_number(*value as f64))),
            Literal::String(text) => Some((ValueKind::String, text.clone())),
            Literal::Unrecognized => None,
        }
    }
}
