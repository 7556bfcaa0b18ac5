//! Literal decoding.
//!
//! Literals reach the compiler in textual form; this module turns them
//! into values: integer base detection, the `f` suffix, string escape
//! processing, and splitting a user-defined literal into its payload and
//! suffix.

use crate::ast::{Literal, LiteralKind};
use crate::value::Value;

use super::errors::{CResult, CompilationFailure, CompileError};

/// Decodes a non-user-defined literal.
pub fn process(lit: &Literal) -> CResult<Value> {
    let fail = || CompilationFailure::at(CompileError::MalformedLiteral(lit.text.clone()), lit.span);

    match lit.kind {
        LiteralKind::True => Ok(Value::Bool(true)),
        LiteralKind::False => Ok(Value::Bool(false)),
        LiteralKind::Integer => lit.text.parse::<i64>().map(Value::Int).map_err(|_| fail()),
        LiteralKind::Binary => i64::from_str_radix(&lit.text[2..], 2)
            .map(Value::Int)
            .map_err(|_| fail()),
        LiteralKind::Hexadecimal => i64::from_str_radix(&lit.text[2..], 16)
            .map(Value::Int)
            .map_err(|_| fail()),
        LiteralKind::Octal => {
            let digits = lit.text.trim_start_matches('0');
            if digits.is_empty() {
                Ok(Value::Int(0))
            } else {
                i64::from_str_radix(digits, 8)
                    .map(Value::Int)
                    .map_err(|_| fail())
            }
        }
        LiteralKind::Decimal => {
            if let Some(stripped) = lit.text.strip_suffix('f') {
                stripped.parse::<f32>().map(Value::Float).map_err(|_| fail())
            } else {
                lit.text.parse::<f64>().map(Value::Double).map_err(|_| fail())
            }
        }
        LiteralKind::String => {
            let inner = lit
                .text
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(fail)?;
            decode_escapes(inner)
                .map(Value::String)
                .ok_or_else(fail)
        }
        LiteralKind::Char => {
            let inner = lit
                .text
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .ok_or_else(fail)?;
            let decoded = decode_escapes(inner).ok_or_else(fail)?;
            let mut chars = decoded.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(CompilationFailure::at(
                    CompileError::InvalidCharacterLiteral,
                    lit.span,
                )),
            }
        }
        LiteralKind::UserDefined => Err(fail()),
    }
}

/// Processes `\n \t \r \0 \\` (and quote escapes).
pub fn decode_escapes(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            _ => return None,
        }
    }

    Some(out)
}

/// Splits a user-defined literal into its payload literal and suffix,
/// e.g. `2.5_s` into (`2.5` as a decimal literal, `"_s"`).
pub fn split_user_defined(lit: &Literal) -> CResult<(Literal, String)> {
    let text = &lit.text;
    let fail = || CompilationFailure::at(CompileError::MalformedLiteral(text.clone()), lit.span);

    if let Some(rest) = text.strip_prefix('"') {
        let close = rest.rfind('"').ok_or_else(fail)?;
        let payload = &text[..close + 2];
        let suffix = &rest[close + 1..];
        return Ok((
            Literal {
                kind: LiteralKind::String,
                text: payload.to_string(),
                span: lit.span,
            },
            suffix.to_string(),
        ));
    }

    let bytes = text.as_bytes();
    let mut i = 0;

    if text.starts_with("0x") || text.starts_with("0b") {
        i = 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
    } else {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }

    if i == 0 || i == bytes.len() {
        return Err(fail());
    }

    let payload = &text[..i];
    let suffix = &text[i..];

    let kind = if payload.starts_with("0x") {
        LiteralKind::Hexadecimal
    } else if payload.starts_with("0b") {
        LiteralKind::Binary
    } else if payload.contains('.') || payload.contains('e') || payload.contains('E') {
        LiteralKind::Decimal
    } else if payload.starts_with('0') && payload.len() > 1 {
        LiteralKind::Octal
    } else {
        LiteralKind::Integer
    };

    Ok((
        Literal {
            kind,
            text: payload.to_string(),
            span: lit.span,
        },
        suffix.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Span;

    fn lit(kind: LiteralKind, text: &str) -> Literal {
        Literal {
            kind,
            text: text.into(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_integer_bases_agree() {
        assert_eq!(
            process(&lit(LiteralKind::Integer, "255")).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            process(&lit(LiteralKind::Hexadecimal, "0xFF")).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            process(&lit(LiteralKind::Octal, "0377")).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            process(&lit(LiteralKind::Binary, "0b11111111")).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            process(&lit(LiteralKind::Octal, "0")).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_decimal_and_float_suffix() {
        assert_eq!(
            process(&lit(LiteralKind::Decimal, "3.14")).unwrap(),
            Value::Double(3.14)
        );
        assert_eq!(
            process(&lit(LiteralKind::Decimal, "2.5f")).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            process(&lit(LiteralKind::Decimal, "6.02e23")).unwrap(),
            Value::Double(6.02e23)
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            process(&lit(LiteralKind::String, "\"a\\tb\\n\\0\\\\\"")).unwrap(),
            Value::String("a\tb\n\0\\".into())
        );
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(
            process(&lit(LiteralKind::Char, "'x'")).unwrap(),
            Value::Char('x')
        );
        assert_eq!(
            process(&lit(LiteralKind::Char, "'\\n'")).unwrap(),
            Value::Char('\n')
        );
    }

    #[test]
    fn test_split_user_defined() {
        let (payload, suffix) =
            split_user_defined(&lit(LiteralKind::UserDefined, "2.5_s")).unwrap();
        assert_eq!(payload.kind, LiteralKind::Decimal);
        assert_eq!(payload.text, "2.5");
        assert_eq!(suffix, "_s");

        let (payload, suffix) =
            split_user_defined(&lit(LiteralKind::UserDefined, "10km")).unwrap();
        assert_eq!(payload.kind, LiteralKind::Integer);
        assert_eq!(payload.text, "10");
        assert_eq!(suffix, "km");

        let (payload, suffix) =
            split_user_defined(&lit(LiteralKind::UserDefined, "\"abc\"_sv")).unwrap();
        assert_eq!(payload.kind, LiteralKind::String);
        assert_eq!(payload.text, "\"abc\"");
        assert_eq!(suffix, "_sv");
    }
}
