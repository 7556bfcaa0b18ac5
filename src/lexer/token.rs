use std::fmt;

/// Byte range of a token inside its source buffer, with the 1-based
/// line/column of its first character.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn merge(&self, other: &Span) -> Span {
        let end = (other.offset + other.length).max(self.offset + self.length);
        Span {
            offset: self.offset,
            length: end - self.offset,
            line: self.line,
            col: self.col,
        }
    }

    pub fn location(&self) -> crate::source::SourceLocation {
        crate::source::SourceLocation {
            offset: self.offset,
            line: self.line,
            col: self.col,
        }
    }
}

/// Orthogonal token categories; a token id can carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCategories(pub u8);

impl TokenCategories {
    pub const PUNCTUATOR: TokenCategories = TokenCategories(0x01);
    pub const LITERAL: TokenCategories = TokenCategories(0x02);
    pub const OPERATOR: TokenCategories = TokenCategories(0x04);
    pub const IDENTIFIER: TokenCategories = TokenCategories(0x08);
    pub const KEYWORD: TokenCategories = TokenCategories(0x10);

    pub fn contains(self, other: TokenCategories) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TokenCategories {
    type Output = TokenCategories;

    fn bitor(self, rhs: TokenCategories) -> TokenCategories {
        TokenCategories(self.0 | rhs.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum TokenId {
    // literals
    IntegerLiteral,
    DecimalLiteral,
    BinaryLiteral,
    OctalLiteral,
    HexadecimalLiteral,
    StringLiteral,
    CharLiteral,
    UserDefinedLiteral,
    // punctuators
    LeftPar,
    RightPar,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Semicolon,
    Colon,
    Dot,
    QuestionMark,
    // keywords
    Auto,
    Bool,
    Break,
    Char,
    Class,
    Const,
    Continue,
    Default,
    Delete,
    Double,
    Else,
    Enum,
    Explicit,
    Export,
    False,
    Float,
    For,
    Friend,
    If,
    Import,
    Int,
    Mutable,
    Namespace,
    Operator,
    Private,
    Protected,
    Public,
    Return,
    Static,
    Struct,
    Template,
    This,
    True,
    Typedef,
    Typename,
    Using,
    Virtual,
    Void,
    While,
    // operators
    ScopeResolution,
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
    Mul,
    Div,
    Remainder,
    LeftShift,
    RightShift,
    Less,
    GreaterThan,
    LessEqual,
    GreaterThanEqual,
    EqEq,
    Neq,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    Eq,
    MulEq,
    DivEq,
    AddEq,
    SubEq,
    RemainderEq,
    LeftShiftEq,
    RightShiftEq,
    BitAndEq,
    BitOrEq,
    BitXorEq,
    Comma,
    // identifiers
    UserDefinedName,
    // trivia
    SingleLineComment,
    MultiLineComment,
}

impl TokenId {
    pub fn categories(self) -> TokenCategories {
        use TokenId::*;
        match self {
            IntegerLiteral | DecimalLiteral | BinaryLiteral | OctalLiteral
            | HexadecimalLiteral | StringLiteral | CharLiteral | UserDefinedLiteral => {
                TokenCategories::LITERAL
            }
            LeftPar | RightPar | LeftBracket | RightBracket | LeftBrace | RightBrace
            | Semicolon | Colon | Dot | QuestionMark => TokenCategories::PUNCTUATOR,
            True | False => {
                TokenCategories::KEYWORD | TokenCategories::IDENTIFIER | TokenCategories::LITERAL
            }
            Auto | Bool | Break | Char | Class | Const | Continue | Default | Delete | Double
            | Else | Enum | Explicit | Export | Float | For | Friend | If | Import | Int
            | Mutable | Namespace | Operator | Private | Protected | Public | Return | Static
            | Struct | Template | This | Typedef | Typename | Using | Virtual | Void | While => {
                TokenCategories::KEYWORD | TokenCategories::IDENTIFIER
            }
            ScopeResolution | PlusPlus | MinusMinus | LeftShift | RightShift | LessEqual
            | GreaterThanEqual | EqEq | Neq | LogicalAnd | LogicalOr | Eq | MulEq | DivEq
            | AddEq | SubEq | RemainderEq | LeftShiftEq | RightShiftEq | BitAndEq | BitOrEq
            | BitXorEq | Comma => TokenCategories::OPERATOR,
            Plus | Minus | LogicalNot | BitwiseNot | Mul | Div | Remainder | Less
            | GreaterThan | BitwiseAnd | BitwiseOr | BitwiseXor => {
                TokenCategories::OPERATOR | TokenCategories::PUNCTUATOR
            }
            UserDefinedName => TokenCategories::IDENTIFIER,
            SingleLineComment | MultiLineComment => TokenCategories(0),
        }
    }

    pub fn is_literal(self) -> bool {
        self.categories().contains(TokenCategories::LITERAL)
    }

    pub fn is_operator(self) -> bool {
        self.categories().contains(TokenCategories::OPERATOR)
    }

    pub fn is_identifier(self) -> bool {
        self.categories().contains(TokenCategories::IDENTIFIER)
    }

    pub fn is_keyword(self) -> bool {
        self.categories().contains(TokenCategories::KEYWORD)
    }

    pub fn is_comment(self) -> bool {
        matches!(self, TokenId::SingleLineComment | TokenId::MultiLineComment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub span: Span,
    pub text: String,
}

impl Token {
    pub fn new(id: TokenId, span: Span, text: impl Into<String>) -> Self {
        Self {
            id,
            span,
            text: text.into(),
        }
    }

    pub fn is(&self, id: TokenId) -> bool {
        self.id == id
    }

    pub fn location(&self) -> crate::source::SourceLocation {
        self.span.location()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
