use std::fmt;

/// Source location of a token or syntax node.
///
/// Lines are 1-based, columns 0-based, matching the lexer's counters.
/// `start`/`end` are byte offsets into the source the node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
            end_line: other.end_line,
            end_column: other.end_column,
        }
    }
}

/// Words with a fixed meaning somewhere in the grammar.
///
/// Matching is case-insensitive. Only [`Keyword::is_reserved`] words are
/// refused as names; every other keyword reads as a plain identifier in
/// positions where the grammar expects a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Across,
    And,
    Any,
    Assign,
    Break,
    Bridge,
    By,
    Cardinality,
    Class,
    Continue,
    Control,
    Create,
    Creator,
    Delete,
    Each,
    Elif,
    Else,
    Empty,
    End,
    EndFor,
    EndIf,
    EndWhile,
    Event,
    False,
    First,
    For,
    From,
    Generate,
    If,
    In,
    Instance,
    Instances,
    Last,
    Many,
    Not,
    NotEmpty,
    Object,
    Of,
    One,
    Or,
    Param,
    RcvdEvt,
    Relate,
    Related,
    Return,
    Select,
    Selected,
    SelfRef,
    Send,
    Stop,
    To,
    Transform,
    True,
    Unrelate,
    Using,
    Where,
    While,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "across" => Keyword::Across,
            "and" => Keyword::And,
            "any" => Keyword::Any,
            "assign" => Keyword::Assign,
            "break" => Keyword::Break,
            "bridge" => Keyword::Bridge,
            "by" => Keyword::By,
            "cardinality" => Keyword::Cardinality,
            "class" => Keyword::Class,
            "continue" => Keyword::Continue,
            "control" => Keyword::Control,
            "create" => Keyword::Create,
            "creator" => Keyword::Creator,
            "delete" => Keyword::Delete,
            "each" => Keyword::Each,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "empty" => Keyword::Empty,
            "end" => Keyword::End,
            "event" => Keyword::Event,
            "false" => Keyword::False,
            "first" => Keyword::First,
            "for" => Keyword::For,
            "from" => Keyword::From,
            "generate" => Keyword::Generate,
            "if" => Keyword::If,
            "in" => Keyword::In,
            "instance" => Keyword::Instance,
            "instances" => Keyword::Instances,
            "last" => Keyword::Last,
            "many" => Keyword::Many,
            "not" => Keyword::Not,
            "not_empty" => Keyword::NotEmpty,
            "object" => Keyword::Object,
            "of" => Keyword::Of,
            "one" => Keyword::One,
            "or" => Keyword::Or,
            "param" => Keyword::Param,
            "rcvd_evt" => Keyword::RcvdEvt,
            "relate" => Keyword::Relate,
            "related" => Keyword::Related,
            "return" => Keyword::Return,
            "select" => Keyword::Select,
            "selected" => Keyword::Selected,
            "self" => Keyword::SelfRef,
            "send" => Keyword::Send,
            "stop" => Keyword::Stop,
            "to" => Keyword::To,
            "transform" => Keyword::Transform,
            "true" => Keyword::True,
            "unrelate" => Keyword::Unrelate,
            "using" => Keyword::Using,
            "where" => Keyword::Where,
            "while" => Keyword::While,
            _ => return None,
        };
        Some(keyword)
    }

    /// Keywords that can never stand in for a name.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Keyword::And
                | Keyword::Or
                | Keyword::Not
                | Keyword::True
                | Keyword::False
                | Keyword::SelfRef
                | Keyword::Selected
                | Keyword::Param
                | Keyword::RcvdEvt
                | Keyword::End
                | Keyword::EndFor
                | Keyword::EndIf
                | Keyword::EndWhile
                | Keyword::Elif
                | Keyword::Else
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Keyword(Keyword),
    /// Identifier written immediately before `::`; the `::` is consumed.
    Namespace(&'a str),
    Integer(i64),
    Real(f64),
    String(&'a str),
    /// Single-quoted phrase, quotes stripped.
    TickedPhrase(&'a str),

    // Operators
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Percent,   // %
    Less,      // <
    LessEq,    // <=
    Greater,   // >
    GreaterEq, // >=
    EqualEqual,
    NotEqual, // !=
    Equal,    // =
    Arrow,    // ->

    // Delimiters
    Colon,       // :
    DoubleColon, // ::
    Semicolon,   // ;
    Comma,       // ,
    Dot,         // .
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]

    EOF,
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier '{name}'"),
            TokenKind::Keyword(keyword) => write!(f, "keyword {keyword:?}"),
            TokenKind::Namespace(name) => write!(f, "'{name}::'"),
            TokenKind::Integer(value) => write!(f, "integer {value}"),
            TokenKind::Real(value) => write!(f, "real {value}"),
            TokenKind::String(value) => write!(f, "string \"{value}\""),
            TokenKind::TickedPhrase(value) => write!(f, "phrase '{value}'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Less => f.write_str("'<'"),
            TokenKind::LessEq => f.write_str("'<='"),
            TokenKind::Greater => f.write_str("'>'"),
            TokenKind::GreaterEq => f.write_str("'>='"),
            TokenKind::EqualEqual => f.write_str("'=='"),
            TokenKind::NotEqual => f.write_str("'!='"),
            TokenKind::Equal => f.write_str("'='"),
            TokenKind::Arrow => f.write_str("'->'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::DoubleColon => f.write_str("'::'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::EOF => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
