use libscript::lexer::{tokenize, TokenId};

#[test]
fn test_token_sequence_of_declaration() {
    let tokens = tokenize("int a = 5;").unwrap();
    let ids: Vec<TokenId> = tokens.iter().map(|t| t.id).collect();

    assert_eq!(
        ids,
        vec![
            TokenId::Int,
            TokenId::UserDefinedName,
            TokenId::Eq,
            TokenId::IntegerLiteral,
            TokenId::Semicolon,
        ]
    );
}

#[test]
fn test_spans_reproduce_the_source() {
    let src = "class A : B {\n  int n;\n  double operator+(double x) { return x; }\n};\n";
    let tokens = tokenize(src).unwrap();

    // every token's span points at its own text...
    for tok in &tokens {
        assert_eq!(
            &src[tok.span.offset..tok.span.offset + tok.span.length],
            tok.text
        );
    }

    // ...and the gaps between consecutive tokens are whitespace only, so
    // spans plus whitespace reproduce the buffer
    let mut end = 0;
    for tok in &tokens {
        assert!(src[end..tok.span.offset].chars().all(char::is_whitespace));
        end = tok.span.offset + tok.span.length;
    }
    assert!(src[end..].chars().all(char::is_whitespace));
}

#[test]
fn test_scope_resolution_is_one_token() {
    let tokens = tokenize("A::B::C").unwrap();
    let ids: Vec<TokenId> = tokens.iter().map(|t| t.id).collect();
    assert_eq!(
        ids,
        vec![
            TokenId::UserDefinedName,
            TokenId::ScopeResolution,
            TokenId::UserDefinedName,
            TokenId::ScopeResolution,
            TokenId::UserDefinedName,
        ]
    );
}

#[test]
fn test_right_shift_is_one_token() {
    let tokens = tokenize("a >> b").unwrap();
    assert_eq!(tokens[1].id, TokenId::RightShift);
}

#[test]
fn test_literal_kinds() {
    let tokens = tokenize("0 0b11 0x1F 017 42 1.5 2e10 1.f 'c' \"s\" 10km").unwrap();
    let ids: Vec<TokenId> = tokens.iter().map(|t| t.id).collect();
    assert_eq!(
        ids,
        vec![
            TokenId::OctalLiteral,
            TokenId::BinaryLiteral,
            TokenId::HexadecimalLiteral,
            TokenId::OctalLiteral,
            TokenId::IntegerLiteral,
            TokenId::DecimalLiteral,
            TokenId::DecimalLiteral,
            TokenId::DecimalLiteral,
            TokenId::CharLiteral,
            TokenId::StringLiteral,
            TokenId::UserDefinedLiteral,
        ]
    );
}

#[test]
fn test_lexer_failures() {
    assert!(tokenize("\"no closing quote").is_err());
    assert!(tokenize("/* no closing").is_err());
    assert!(tokenize("0b").is_err());
    assert!(tokenize("0x").is_err());
    assert!(tokenize("$").is_err());
}

#[test]
fn test_tokens_serialize() {
    let tokens = tokenize("int a;").unwrap();
    let json = serde_json::to_string(&tokens).unwrap();
    let back: Vec<libscript::lexer::Token> = serde_json::from_str(&json).unwrap();
    assert_eq!(tokens, back);
}
