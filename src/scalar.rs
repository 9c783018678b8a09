//! Conversions between scalar text and values.
//!
//! Numbers accept decimal integers and floats, `0x`/`0o`/`0b`
//! prefixed integers, `_` digit separators and the `.inf`/`.nan`
//! spellings. Bytes use the standard Base64 alphabet.

use base64::prelude::*;

use crate::token::Token;
use crate::value::Number;

/// Returns true for the plain spellings of null.
pub fn is_null(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Decides which token a plain (unquoted) scalar produces.
pub fn classify_plain(s: &str) -> Token {
    if is_null(s) {
        Token::Null
    } else if parse_bool(s).is_some() {
        Token::Boolean
    } else if parse_number(s).is_some() {
        Token::Number
    } else {
        Token::String
    }
}

pub fn parse_number(s: &str) -> Option<Number> {
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    match digits {
        ".inf" | ".Inf" | ".INF" => {
            return Some(Number::Float(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }))
        }
        ".nan" | ".NaN" | ".NAN" if digits.len() == s.len() => return Some(Number::Float(f64::NAN)),
        _ => {}
    }

    let radix = match digits.get(..2) {
        Some("0x") => 16,
        Some("0o") => 8,
        Some("0b") => 2,
        _ => 10,
    };

    let body = strip_separators(if radix == 10 { digits } else { &digits[2..] })?;

    if radix != 10 {
        let v = u64::from_str_radix(&body, radix).ok()?;
        return Some(signed(negative, v));
    }

    if !is_decimal(&body) {
        return None;
    }

    if body.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(v) = body.parse::<u64>() {
            return Some(signed(negative, v));
        }
    }

    let v: f64 = body.parse().ok()?;
    Some(Number::Float(if negative { -v } else { v }))
}

fn signed(negative: bool, v: u64) -> Number {
    if !negative {
        Number::UInt(v)
    } else if v <= i64::MAX as u64 + 1 {
        Number::Int((v as i64).wrapping_neg())
    } else {
        Number::Float(-(v as f64))
    }
}

/// Removes `_` separators. They are only allowed between digits.
fn strip_separators(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    if !s.contains('_') {
        return Some(s.to_owned());
    }
    if s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return None;
    }

    Some(s.chars().filter(|c| *c != '_').collect())
}

/// Matches `(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?`.
fn is_decimal(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;

    let int = count_digits(&b[i..]);
    i += int;

    let mut frac = 0;
    if b.get(i) == Some(&b'.') {
        i += 1;
        frac = count_digits(&b[i..]);
        i += frac;
    }
    if int == 0 && frac == 0 {
        return false;
    }

    if matches!(b.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(b.get(i), Some(b'-' | b'+')) {
            i += 1;
        }
        let exp = count_digits(&b[i..]);
        if exp == 0 {
            return false;
        }
        i += exp;
    }

    i == b.len()
}

fn count_digits(b: &[u8]) -> usize {
    b.iter().take_while(|b| b.is_ascii_digit()).count()
}

pub fn encode_bytes(v: &[u8]) -> String {
    BASE64_STANDARD.encode(v)
}

pub fn decode_bytes(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD.decode(s.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        let cases = vec![
            ("0", Some(Number::UInt(0))),
            ("42", Some(Number::UInt(42))),
            ("-42", Some(Number::Int(-42))),
            ("+7", Some(Number::UInt(7))),
            ("1_000", Some(Number::UInt(1000))),
            ("0x1F", Some(Number::UInt(31))),
            ("-0o17", Some(Number::Int(-15))),
            ("0b101", Some(Number::UInt(5))),
            ("1.5", Some(Number::Float(1.5))),
            (".5", Some(Number::Float(0.5))),
            ("1e3", Some(Number::Float(1000.0))),
            ("-2.5E-1", Some(Number::Float(-0.25))),
            ("-9223372036854775808", Some(Number::Int(i64::MIN))),
            ("18446744073709551615", Some(Number::UInt(u64::MAX))),
            (".inf", Some(Number::Float(f64::INFINITY))),
            ("-.inf", Some(Number::Float(f64::NEG_INFINITY))),
            ("", None),
            ("-", None),
            (".", None),
            ("1e", None),
            ("1_", None),
            ("inf", None),
            ("nan", None),
            ("0x", None),
            ("12:30", None),
            ("1.2.3", None),
        ];

        for (s, want) in cases {
            assert_eq!(parse_number(s), want, "{:?}", s);
        }
    }

    #[test]
    fn test_parse_nan() {
        assert!(matches!(parse_number(".nan"), Some(Number::Float(v)) if v.is_nan()));
        assert_eq!(parse_number("-.nan"), None);
    }

    #[test]
    fn test_classify_plain() {
        let cases = vec![
            ("~", Token::Null),
            ("null", Token::Null),
            ("True", Token::Boolean),
            ("false", Token::Boolean),
            ("3.14", Token::Number),
            ("yes", Token::String),
            ("hello world", Token::String),
            ("2024-01-01", Token::String),
        ];

        for (s, want) in cases {
            assert_eq!(classify_plain(s), want, "{:?}", s);
        }
    }

    #[test]
    fn test_bytes() {
        assert_eq!(encode_bytes(b"\x00"), "AA==");
        assert_eq!(decode_bytes("AA==").unwrap(), b"\x00");
        assert!(decode_bytes("!!").is_err());
    }
}
