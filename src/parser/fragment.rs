//! Bounded token cursors.
//!
//! A [`Fragment`] is a view over a token range with a current position.
//! Sub-fragments descend into the range delimited by a matched
//! bracket/brace/paren pair, or run up to a delimiter at nesting depth
//! zero; the parent cursor resumes past the closing token.

use crate::lexer::{Span, Token, TokenId};

use super::{SyntaxError, SyntaxErrorKind};

#[derive(Debug, Clone)]
pub struct Fragment<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    /// A `>>` whose first `>` has been consumed to close a template
    /// argument list; the remaining half reads as a `>`.
    half_gt: Option<usize>,
}

/// Save point for speculative parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    half_gt: Option<usize>,
}

fn closing_delimiter(open: TokenId) -> TokenId {
    match open {
        TokenId::LeftPar => TokenId::RightPar,
        TokenId::LeftBracket => TokenId::RightBracket,
        TokenId::LeftBrace => TokenId::RightBrace,
        _ => unreachable!("not an opening delimiter"),
    }
}

fn is_opening(id: TokenId) -> bool {
    matches!(id, TokenId::LeftPar | TokenId::LeftBracket | TokenId::LeftBrace)
}

fn is_closing(id: TokenId) -> bool {
    matches!(id, TokenId::RightPar | TokenId::RightBracket | TokenId::RightBrace)
}

impl<'a> Fragment<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            end: tokens.len(),
            half_gt: None,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Span to report when the fragment is exhausted.
    pub fn end_span(&self) -> Span {
        if self.end > 0 && !self.tokens.is_empty() {
            self.tokens[(self.end - 1).min(self.tokens.len() - 1)].span
        } else {
            Span::default()
        }
    }

    pub fn peek(&self) -> Option<Token> {
        if self.at_end() {
            return None;
        }

        let tok = &self.tokens[self.pos];
        if self.half_gt == Some(self.pos) {
            // remaining half of a split '>>'
            let span = Span {
                offset: tok.span.offset + 1,
                length: 1,
                line: tok.span.line,
                col: tok.span.col + 1,
            };
            Some(Token::new(TokenId::GreaterThan, span, ">"))
        } else {
            Some(tok.clone())
        }
    }

    pub fn peek_at(&self, lookahead: usize) -> Option<Token> {
        let pos = self.pos + lookahead;
        if pos >= self.end {
            None
        } else {
            Some(self.tokens[pos].clone())
        }
    }

    pub fn advance(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        if self.half_gt == Some(self.pos) {
            self.half_gt = None;
        }
        self.pos += 1;
        Some(tok)
    }

    /// Consumes the first `>` of a `>>` token; the second half stays
    /// readable as a `>`.
    pub fn split_right_shift(&mut self) -> Token {
        debug_assert!(self.peek().map(|t| t.id) == Some(TokenId::RightShift));
        let tok = &self.tokens[self.pos];
        self.half_gt = Some(self.pos);
        Token::new(
            TokenId::GreaterThan,
            Span {
                offset: tok.span.offset,
                length: 1,
                line: tok.span.line,
                col: tok.span.col,
            },
            ">",
        )
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            half_gt: self.half_gt,
        }
    }

    pub fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.half_gt = cp.half_gt;
    }

    pub fn next_is(&self, id: TokenId) -> bool {
        self.peek().map(|t| t.id) == Some(id)
    }

    /// Consumes the next token if it has the given id.
    pub fn eat(&mut self, id: TokenId) -> Option<Token> {
        if self.next_is(id) {
            self.advance()
        } else {
            None
        }
    }

    pub fn expect(&mut self, id: TokenId) -> Result<Token, SyntaxError> {
        match self.peek() {
            Some(tok) if tok.id == id => Ok(self.advance().unwrap()),
            Some(tok) => Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedToken {
                    found: tok.text.clone(),
                    expected: Some(id),
                },
                span: tok.span,
            }),
            None => Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedEndOfInput,
                span: self.end_span(),
            }),
        }
    }

    /// The current token must be an opening delimiter; returns the
    /// sub-fragment between it and its match, and resumes past the match.
    pub fn enclosed(&mut self) -> Result<Fragment<'a>, SyntaxError> {
        let open = match self.peek() {
            Some(tok) if is_opening(tok.id) => tok,
            Some(tok) => {
                return Err(SyntaxError {
                    kind: SyntaxErrorKind::UnexpectedToken {
                        found: tok.text.clone(),
                        expected: None,
                    },
                    span: tok.span,
                })
            }
            None => {
                return Err(SyntaxError {
                    kind: SyntaxErrorKind::UnexpectedEndOfInput,
                    span: self.end_span(),
                })
            }
        };

        let close_id = closing_delimiter(open.id);
        let open_pos = self.pos;
        let mut depth = 0usize;
        let mut i = open_pos;
        while i < self.end {
            let id = self.tokens[i].id;
            if is_opening(id) {
                depth += 1;
            } else if is_closing(id) {
                depth -= 1;
                if depth == 0 {
                    if id != close_id {
                        return Err(SyntaxError {
                            kind: SyntaxErrorKind::UnmatchedDelimiter,
                            span: self.tokens[i].span,
                        });
                    }
                    let inner = Fragment {
                        tokens: self.tokens,
                        pos: open_pos + 1,
                        end: i,
                        half_gt: None,
                    };
                    self.pos = i + 1;
                    self.half_gt = None;
                    return Ok(inner);
                }
            }
            i += 1;
        }

        Err(SyntaxError {
            kind: SyntaxErrorKind::UnmatchedDelimiter,
            span: open.span,
        })
    }

    /// Sub-fragment running from the current position up to the next
    /// `delim` at nesting depth zero; resumes past the delimiter.
    pub fn delimited(&mut self, delim: TokenId) -> Result<Fragment<'a>, SyntaxError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut i = start;
        while i < self.end {
            let id = self.tokens[i].id;
            if is_opening(id) {
                depth += 1;
            } else if is_closing(id) {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if id == delim && depth == 0 {
                let inner = Fragment {
                    tokens: self.tokens,
                    pos: start,
                    end: i,
                    half_gt: self.half_gt,
                };
                self.pos = i + 1;
                self.half_gt = None;
                return Ok(inner);
            }
            i += 1;
        }

        Err(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEndOfInput,
            span: self.end_span(),
        })
    }

    /// Like [`Fragment::delimited`], but stops at the fragment end if the
    /// delimiter never occurs; the delimiter itself is optional.
    pub fn delimited_or_rest(&mut self, delim: TokenId) -> Fragment<'a> {
        match self.delimited(delim) {
            Ok(inner) => inner,
            Err(_) => {
                let inner = Fragment {
                    tokens: self.tokens,
                    pos: self.pos,
                    end: self.end,
                    half_gt: self.half_gt,
                };
                self.pos = self.end;
                self.half_gt = None;
                inner
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_enclosed_fragment() {
        let tokens = tokenize("f(a, (b), c) d").unwrap();
        let mut frag = Fragment::new(&tokens);

        frag.advance(); // f
        let mut inner = frag.enclosed().unwrap();
        assert_eq!(inner.advance().unwrap().text, "a");

        // the parent resumes after the closing paren
        assert_eq!(frag.peek().unwrap().text, "d");

        inner.advance(); // ,
        let mut nested = inner.enclosed().unwrap();
        assert_eq!(nested.advance().unwrap().text, "b");
        assert!(nested.at_end());
    }

    #[test]
    fn test_delimited_fragment() {
        let tokens = tokenize("int a = 0; b;").unwrap();
        let mut frag = Fragment::new(&tokens);

        let mut stmt = frag.delimited(TokenId::Semicolon).unwrap();
        assert_eq!(stmt.advance().unwrap().id, TokenId::Int);
        assert_eq!(frag.peek().unwrap().text, "b");
    }

    #[test]
    fn test_split_right_shift() {
        let tokens = tokenize("a>>b").unwrap();
        let mut frag = Fragment::new(&tokens);

        frag.advance(); // a
        let first = frag.split_right_shift();
        assert_eq!(first.id, TokenId::GreaterThan);

        let second = frag.advance().unwrap();
        assert_eq!(second.id, TokenId::GreaterThan);
        assert_eq!(second.text, ">");

        assert_eq!(frag.advance().unwrap().text, "b");
    }

    #[test]
    fn test_unmatched_delimiter() {
        let tokens = tokenize("( a ").unwrap();
        let mut frag = Fragment::new(&tokens);
        assert!(frag.enclosed().is_err());
    }
}
