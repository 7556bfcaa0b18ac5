//! Tokenization of script source code.
//!
//! The lexer walks a source buffer byte by byte and produces [`Token`]s
//! carrying their id, category flags and span. Operators are matched
//! greedily against 1/2/3-character tables, identifiers against a keyword
//! table. Comments and whitespace are discarded by [`tokenize`].
//!
//! The lexer does not attempt recovery: a malformed literal, an
//! unterminated string or comment, or an unrecognized byte raises a
//! [`LexError`] immediately.

mod token;

pub use token::*;

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use once_cell::sync::Lazy;

use crate::source::SourceLocation;

static KEYWORDS: Lazy<HashMap<&'static str, TokenId>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("auto", TokenId::Auto);
    m.insert("bool", TokenId::Bool);
    m.insert("break", TokenId::Break);
    m.insert("char", TokenId::Char);
    m.insert("class", TokenId::Class);
    m.insert("const", TokenId::Const);
    m.insert("continue", TokenId::Continue);
    m.insert("default", TokenId::Default);
    m.insert("delete", TokenId::Delete);
    m.insert("double", TokenId::Double);
    m.insert("else", TokenId::Else);
    m.insert("enum", TokenId::Enum);
    m.insert("explicit", TokenId::Explicit);
    m.insert("export", TokenId::Export);
    m.insert("false", TokenId::False);
    m.insert("float", TokenId::Float);
    m.insert("for", TokenId::For);
    m.insert("friend", TokenId::Friend);
    m.insert("if", TokenId::If);
    m.insert("import", TokenId::Import);
    m.insert("int", TokenId::Int);
    m.insert("mutable", TokenId::Mutable);
    m.insert("namespace", TokenId::Namespace);
    m.insert("operator", TokenId::Operator);
    m.insert("private", TokenId::Private);
    m.insert("protected", TokenId::Protected);
    m.insert("public", TokenId::Public);
    m.insert("return", TokenId::Return);
    m.insert("static", TokenId::Static);
    m.insert("struct", TokenId::Struct);
    m.insert("template", TokenId::Template);
    m.insert("this", TokenId::This);
    m.insert("true", TokenId::True);
    m.insert("typedef", TokenId::Typedef);
    m.insert("typename", TokenId::Typename);
    m.insert("using", TokenId::Using);
    m.insert("virtual", TokenId::Virtual);
    m.insert("void", TokenId::Void);
    m.insert("while", TokenId::While);
    m
});

static OPERATORS: Lazy<HashMap<&'static str, TokenId>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("+", TokenId::Plus);
    m.insert("-", TokenId::Minus);
    m.insert("!", TokenId::LogicalNot);
    m.insert("~", TokenId::BitwiseNot);
    m.insert("*", TokenId::Mul);
    m.insert("/", TokenId::Div);
    m.insert("%", TokenId::Remainder);
    m.insert("<", TokenId::Less);
    m.insert(">", TokenId::GreaterThan);
    m.insert("&", TokenId::BitwiseAnd);
    m.insert("^", TokenId::BitwiseXor);
    m.insert("|", TokenId::BitwiseOr);
    m.insert("=", TokenId::Eq);
    m.insert("++", TokenId::PlusPlus);
    m.insert("--", TokenId::MinusMinus);
    m.insert("<<", TokenId::LeftShift);
    m.insert(">>", TokenId::RightShift);
    m.insert("<=", TokenId::LessEqual);
    m.insert(">=", TokenId::GreaterThanEqual);
    m.insert("==", TokenId::EqEq);
    m.insert("!=", TokenId::Neq);
    m.insert("&&", TokenId::LogicalAnd);
    m.insert("||", TokenId::LogicalOr);
    m.insert("*=", TokenId::MulEq);
    m.insert("/=", TokenId::DivEq);
    m.insert("%=", TokenId::RemainderEq);
    m.insert("+=", TokenId::AddEq);
    m.insert("-=", TokenId::SubEq);
    m.insert("&=", TokenId::BitAndEq);
    m.insert("|=", TokenId::BitOrEq);
    m.insert("^=", TokenId::BitXorEq);
    m.insert("<<=", TokenId::LeftShiftEq);
    m.insert(">>=", TokenId::RightShiftEq);
    m
});

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl LexError {
    fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.location.is_valid() {
            write!(f, "{} at {}", self.message, self.location)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

/// Streams tokens over a source buffer.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        };
        lexer.consume_discardable();
        lexer
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn read_char(&mut self) -> u8 {
        let c = self.input.as_bytes()[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn consume_discardable(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, b' ' | b'\t' | b'\r' | b'\n') {
                self.read_char();
            } else {
                return;
            }
        }
    }

    fn here(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.col)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            offset: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn make(&self, start: (usize, usize, usize), id: TokenId) -> Token {
        let (offset, line, col) = start;
        let span = Span {
            offset,
            length: self.pos - offset,
            line,
            col,
        };
        Token::new(id, span, &self.input[offset..self.pos])
    }

    fn fail<T>(&self, message: impl Into<String>) -> LexResult<T> {
        Err(LexError::new(message, self.location()))
    }

    /// Reads the next token. Comments are returned as tokens here and
    /// filtered out by [`tokenize`].
    pub fn read(&mut self) -> LexResult<Token> {
        if self.at_end() {
            return self.fail("reached end of input");
        }

        let start = self.here();
        let c = self.read_char();

        let tok = match c {
            b'0'..=b'9' => self.read_numeric_literal(start)?,
            b'"' => self.read_string_literal(start)?,
            b'\'' => self.read_char_literal(start)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.read_identifier(start),
            b'(' => self.make(start, TokenId::LeftPar),
            b')' => self.make(start, TokenId::RightPar),
            b'{' => self.make(start, TokenId::LeftBrace),
            b'}' => self.make(start, TokenId::RightBrace),
            b'[' => self.make(start, TokenId::LeftBracket),
            b']' => self.make(start, TokenId::RightBracket),
            b';' => self.make(start, TokenId::Semicolon),
            b',' => self.make(start, TokenId::Comma),
            b'.' => self.make(start, TokenId::Dot),
            b'?' => self.make(start, TokenId::QuestionMark),
            b':' => self.read_colon_or_colon_colon(start),
            b'/' => match self.peek() {
                Some(b'/') => self.read_single_line_comment(start),
                Some(b'*') => self.read_multi_line_comment(start)?,
                _ => self.read_operator(start)?,
            },
            b'+' | b'-' | b'!' | b'~' | b'*' | b'%' | b'<' | b'>' | b'&' | b'^' | b'|' | b'=' => {
                self.read_operator(start)?
            }
            _ => return self.fail(format!("unrecognized character '{}'", c as char)),
        };

        self.consume_discardable();
        Ok(tok)
    }

    fn read_identifier(&mut self, start: (usize, usize, usize)) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.read_char();
            } else {
                break;
            }
        }

        let text = &self.input[start.0..self.pos];
        let id = KEYWORDS
            .get(text)
            .copied()
            .unwrap_or(TokenId::UserDefinedName);
        self.make(start, id)
    }

    fn read_numeric_literal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        let first = self.input.as_bytes()[start.0];

        if first == b'0' && self.peek() != Some(b'.') {
            match self.peek() {
                Some(b'x') => return self.read_hexadecimal(start),
                Some(b'b') => return self.read_binary(start),
                Some(c) if c.is_ascii_digit() => return self.read_octal(start),
                _ => {
                    // a lone zero is an octal literal
                    if self.try_read_literal_suffix() {
                        return Ok(self.make(start, TokenId::UserDefinedLiteral));
                    }
                    self.check_no_letter_after("integer literal")?;
                    return Ok(self.make(start, TokenId::OctalLiteral));
                }
            }
        }

        self.read_decimal(start)
    }

    fn check_no_letter_after(&self, what: &str) -> LexResult<()> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => Err(LexError::new(
                format!("unexpected character after {what}"),
                self.location(),
            )),
            _ => Ok(()),
        }
    }

    fn read_hexadecimal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        self.read_char(); // the 'x'

        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.read_char();
        }

        if self.pos == digits_start {
            return self.fail("malformed hexadecimal literal");
        }

        self.check_no_letter_after("hexadecimal literal")?;
        Ok(self.make(start, TokenId::HexadecimalLiteral))
    }

    fn read_binary(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        self.read_char(); // the 'b'

        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0') | Some(b'1')) {
            self.read_char();
        }

        if self.pos == digits_start {
            return self.fail("malformed binary literal");
        }

        self.check_no_letter_after("binary literal")?;
        Ok(self.make(start, TokenId::BinaryLiteral))
    }

    fn read_octal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        while matches!(self.peek(), Some(c) if (b'0'..=b'7').contains(&c)) {
            self.read_char();
        }

        self.check_no_letter_after("octal literal")?;
        Ok(self.make(start, TokenId::OctalLiteral))
    }

    fn read_decimal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.read_char();
        }

        let mut is_decimal = false;

        if self.peek() == Some(b'.') {
            self.read_char();
            is_decimal = true;

            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.read_char();
            }
        }

        if self.peek() == Some(b'e') || self.peek() == Some(b'E') {
            self.read_char();
            is_decimal = true;

            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.read_char();
            }

            let exp_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.read_char();
            }
            if self.pos == exp_start {
                return self.fail("malformed exponent in decimal literal");
            }
        }

        if self.peek() == Some(b'f') {
            self.read_char();
            is_decimal = true;
        } else if self.try_read_literal_suffix() {
            return Ok(self.make(start, TokenId::UserDefinedLiteral));
        }

        self.check_no_letter_after("numeric literal")?;

        let id = if is_decimal {
            TokenId::DecimalLiteral
        } else {
            TokenId::IntegerLiteral
        };
        Ok(self.make(start, id))
    }

    /// A letter/underscore sequence glued to a literal, e.g. `10_km`.
    fn try_read_literal_suffix(&mut self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                self.read_char();
            }
            _ => return false,
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.read_char();
        }

        true
    }

    fn read_string_literal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        loop {
            match self.peek() {
                None => return self.fail("unexpected end of input inside string literal"),
                Some(b'\n') => return self.fail("end of line inside string literal"),
                Some(b'"') => break,
                Some(b'\\') => {
                    self.read_char();
                    if self.at_end() {
                        return self.fail("unexpected end of input inside string literal");
                    }
                    self.read_char();
                }
                Some(_) => {
                    self.read_char();
                }
            }
        }

        self.read_char(); // closing quote

        if self.try_read_literal_suffix() {
            return Ok(self.make(start, TokenId::UserDefinedLiteral));
        }

        Ok(self.make(start, TokenId::StringLiteral))
    }

    fn read_char_literal(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        match self.peek() {
            None => return self.fail("unexpected end of input inside character literal"),
            Some(b'\\') => {
                self.read_char();
                if self.at_end() {
                    return self.fail("unexpected end of input inside character literal");
                }
                self.read_char();
            }
            Some(_) => {
                self.read_char();
            }
        }

        if self.peek() != Some(b'\'') {
            return self.fail("malformed character literal");
        }
        self.read_char();

        Ok(self.make(start, TokenId::CharLiteral))
    }

    fn read_colon_or_colon_colon(&mut self, start: (usize, usize, usize)) -> Token {
        if self.peek() == Some(b':') {
            self.read_char();
            self.make(start, TokenId::ScopeResolution)
        } else {
            self.make(start, TokenId::Colon)
        }
    }

    /// Maximal munch over the operator tables: keep extending while the
    /// longer prefix is still an operator.
    fn read_operator(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        let mut op = match OPERATORS.get(&self.input[start.0..self.pos]) {
            Some(op) => *op,
            None => return self.fail("no operator starts with the given character"),
        };

        while matches!(self.peek(), Some(c) if c.is_ascii_punctuation()) {
            let candidate = &self.input[start.0..self.pos + 1];
            match OPERATORS.get(candidate) {
                Some(longer) => {
                    op = *longer;
                    self.read_char();
                }
                None => break,
            }
        }

        Ok(self.make(start, op))
    }

    fn read_single_line_comment(&mut self, start: (usize, usize, usize)) -> Token {
        self.read_char(); // second '/'

        while matches!(self.peek(), Some(c) if c != b'\n') {
            self.read_char();
        }

        self.make(start, TokenId::SingleLineComment)
    }

    fn read_multi_line_comment(&mut self, start: (usize, usize, usize)) -> LexResult<Token> {
        self.read_char(); // the '*'

        loop {
            while matches!(self.peek(), Some(c) if c != b'*') {
                self.read_char();
            }

            if self.at_end() {
                return self.fail("unexpected end of input inside comment");
            }

            self.read_char(); // the '*'

            match self.peek() {
                None => return self.fail("unexpected end of input inside comment"),
                Some(b'/') => {
                    self.read_char();
                    return Ok(self.make(start, TokenId::MultiLineComment));
                }
                Some(_) => {}
            }
        }
    }
}

/// Tokenizes a whole buffer, discarding comments.
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = vec![];

    while !lexer.at_end() {
        let tok = lexer.read()?;
        if !tok.id.is_comment() {
            tokens.push(tok);
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(input: &str) -> Vec<TokenId> {
        tokenize(input).unwrap().iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_lex_declaration() {
        assert_eq!(
            ids("int a = 5;"),
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
    fn test_lex_numeric_literals() {
        assert_eq!(ids("0"), vec![TokenId::OctalLiteral]);
        assert_eq!(ids("025"), vec![TokenId::OctalLiteral]);
        assert_eq!(ids("0b0101"), vec![TokenId::BinaryLiteral]);
        assert_eq!(ids("0xFF"), vec![TokenId::HexadecimalLiteral]);
        assert_eq!(ids("1337"), vec![TokenId::IntegerLiteral]);
        assert_eq!(ids("3.14"), vec![TokenId::DecimalLiteral]);
        assert_eq!(ids("125.f"), vec![TokenId::DecimalLiteral]);
        assert_eq!(ids("6.02e23"), vec![TokenId::DecimalLiteral]);
        assert_eq!(ids("6.67e-11"), vec![TokenId::DecimalLiteral]);
    }

    #[test]
    fn test_lex_user_defined_literals() {
        assert_eq!(ids("10km"), vec![TokenId::UserDefinedLiteral]);
        assert_eq!(ids("2.5_s"), vec![TokenId::UserDefinedLiteral]);
        assert_eq!(ids("\"abc\"_sv"), vec![TokenId::UserDefinedLiteral]);
    }

    #[test]
    fn test_lex_operators_maximal_munch() {
        assert_eq!(ids("a<<=b"), vec![
            TokenId::UserDefinedName,
            TokenId::LeftShiftEq,
            TokenId::UserDefinedName,
        ]);
        assert_eq!(ids("a>>b"), vec![
            TokenId::UserDefinedName,
            TokenId::RightShift,
            TokenId::UserDefinedName,
        ]);
        assert_eq!(ids("A::B"), vec![
            TokenId::UserDefinedName,
            TokenId::ScopeResolution,
            TokenId::UserDefinedName,
        ]);
    }

    #[test]
    fn test_lex_comments_are_discarded() {
        assert_eq!(
            ids("a // comment\n/* block\ncomment */ b"),
            vec![TokenId::UserDefinedName, TokenId::UserDefinedName]
        );
    }

    #[test]
    fn test_lex_string_and_char() {
        assert_eq!(
            ids("\"hello\\n\" 'c' '\\n'"),
            vec![TokenId::StringLiteral, TokenId::CharLiteral, TokenId::CharLiteral]
        );
    }

    #[test]
    fn test_lex_errors() {
        assert!(tokenize("\"unterminated").is_err());
        assert!(tokenize("/* unterminated").is_err());
        assert!(tokenize("0x").is_err());
        assert!(tokenize("@").is_err());
    }

    #[test]
    fn test_spans_reproduce_source() {
        let src = "int a = 5;\nif (a) { a = a + 1; }";
        let tokens = tokenize(src).unwrap();

        for tok in &tokens {
            assert_eq!(
                &src[tok.span.offset..tok.span.offset + tok.span.length],
                tok.text
            );
        }
    }

    #[test]
    fn test_keyword_flags() {
        let toks = tokenize("class true 12").unwrap();
        assert!(toks[0].id.is_keyword() && toks[0].id.is_identifier());
        assert!(toks[1].id.is_keyword() && toks[1].id.is_literal());
        assert!(toks[2].id.is_literal() && !toks[2].id.is_keyword());
    }
}
