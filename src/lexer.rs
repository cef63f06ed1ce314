use std::{iter::Peekable, str::CharIndices};

use tracing::warn;

use crate::token::{Keyword, Span, Token, TokenKind};

pub mod error;

pub use error::LexError;

/// Token stream for one action body plus whatever the lexer had to skip.
#[derive(Debug, Clone, PartialEq)]
pub struct Tokens<'a> {
    pub tokens: Vec<Token<'a>>,
    pub errors: Vec<LexError>,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    errors: Vec<LexError>,
    eof_reached: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            errors: Vec::new(),
            eof_reached: false,
            line: 1,
            column: 0,
        }
    }

    /// Errors recorded so far. Each one cost exactly the offending input.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn next_token(&mut self) -> Token<'a> {
        loop {
            if let Some(token) = self.scan() {
                return token;
            }
        }
    }

    /// Scans one token; `None` means input was skipped and scanning should retry.
    fn scan(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                self.eof_reached = true;
                let index = self.input.len();
                let (line, column) = (self.line, self.column);
                return Some(Token::new(TokenKind::EOF, self.span_from(index, line, column)));
            }
        };

        let line = self.line;
        let column = self.column;
        let kind = match ch {
            '"' => return self.read_string(start_idx, line, column),
            '\'' => return self.read_phrase(start_idx, line, column),
            c if c.is_ascii_alphabetic() || c == '_' => {
                return Some(self.read_word(start_idx, line, column));
            }
            c if c.is_ascii_digit() => return self.read_number(start_idx, line, column),
            '+' => self.single(TokenKind::Plus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '-' => self.pair('>', TokenKind::Minus, TokenKind::Arrow),
            '<' => self.pair('=', TokenKind::Less, TokenKind::LessEq),
            '>' => self.pair('=', TokenKind::Greater, TokenKind::GreaterEq),
            '=' => self.pair('=', TokenKind::Equal, TokenKind::EqualEqual),
            ':' => self.pair(':', TokenKind::Colon, TokenKind::DoubleColon),
            '!' if self.peek_second() == Some('=') => {
                self.advance_char();
                self.advance_char();
                TokenKind::NotEqual
            }
            other => {
                self.advance_char();
                self.record(LexError::UnexpectedCharacter {
                    character: other,
                    line,
                    column,
                });
                return None;
            }
        };
        let span = self.span_from(start_idx, line, column);
        Some(Token::new(kind, span))
    }

    fn single(&mut self, kind: TokenKind<'a>) -> TokenKind<'a> {
        self.advance_char();
        kind
    }

    fn pair(&mut self, second: char, one: TokenKind<'a>, two: TokenKind<'a>) -> TokenKind<'a> {
        self.advance_char();
        if matches!(self.chars.peek(), Some(&(_, c)) if c == second) {
            self.advance_char();
            two
        } else {
            one
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some(&(_, c)) if c.is_whitespace() => {
                    self.advance_char();
                }
                Some(&(_, '/')) => match self.peek_second() {
                    Some('/') => {
                        while let Some(&(_, c)) = self.chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance_char();
                        }
                    }
                    Some('*') => self.skip_block_comment(),
                    _ => return,
                },
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let line = self.line;
        let column = self.column;
        self.advance_char();
        self.advance_char();
        while let Some((_, c)) = self.advance_char() {
            if c == '*' && matches!(self.chars.peek(), Some(&(_, '/'))) {
                self.advance_char();
                return;
            }
        }
        self.record(LexError::UnterminatedComment { line, column });
    }

    fn read_word(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        let input = self.input;
        let end = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let word = &input[start..end];

        if input[end..].starts_with("::") {
            self.advance_char();
            self.advance_char();
            let span = self.span_from(start, line, column);
            return Token::new(TokenKind::Namespace(word), span);
        }

        let kind = match Keyword::from_word(word) {
            Some(Keyword::End) => TokenKind::Keyword(self.read_end_keyword()),
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(word),
        };
        let span = self.span_from(start, line, column);
        Token::new(kind, span)
    }

    /// Folds `end for`, `end if` and `end while` into one keyword.
    fn read_end_keyword(&mut self) -> Keyword {
        let input = self.input;
        let index = self.current_index();
        let rest = &input[index..];
        let gap = rest.len() - rest.trim_start().len();
        if gap == 0 {
            return Keyword::End;
        }
        let after = &rest[gap..];
        let word_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let keyword = match after[..word_len].to_ascii_lowercase().as_str() {
            "for" => Keyword::EndFor,
            "if" => Keyword::EndIf,
            "while" => Keyword::EndWhile,
            _ => return Keyword::End,
        };
        let target = index + gap + word_len;
        while self.current_index() < target {
            self.advance_char();
        }
        keyword
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> Option<Token<'a>> {
        let input = self.input;
        let mut end = self.take_while(|c| c.is_ascii_digit());
        let mut fractional = false;

        let rest = &input[end..];
        if rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            fractional = true;
            self.advance_char();
            end = self.take_while(|c| c.is_ascii_digit());
        }

        let rest = &input[end..];
        if rest.starts_with(['e', 'E']) {
            let exponent = rest[1..].strip_prefix(['+', '-']).unwrap_or(&rest[1..]);
            if exponent.starts_with(|c: char| c.is_ascii_digit()) {
                fractional = true;
                self.advance_char();
                if rest[1..].starts_with(['+', '-']) {
                    self.advance_char();
                }
                end = self.take_while(|c| c.is_ascii_digit());
            }
        }

        let literal = &input[start..end];
        let kind = if fractional {
            literal.parse::<f64>().ok().map(TokenKind::Real)
        } else {
            literal.parse::<i64>().ok().map(TokenKind::Integer)
        };
        match kind {
            Some(kind) => {
                let span = self.span_from(start, line, column);
                Some(Token::new(kind, span))
            }
            None => {
                self.record(LexError::InvalidNumber {
                    literal: literal.to_string(),
                    line,
                    column,
                });
                None
            }
        }
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> Option<Token<'a>> {
        let (content, end) = match self.delimited(start, '"') {
            Some(found) => found,
            None => {
                self.skip_opening(start);
                self.record(LexError::UnterminatedString { line, column });
                return None;
            }
        };
        self.consume_to(end);
        let span = self.span_from(start, line, column);
        Some(Token::new(TokenKind::String(content), span))
    }

    fn read_phrase(&mut self, start: usize, line: usize, column: usize) -> Option<Token<'a>> {
        let (content, end) = match self.delimited(start, '\'') {
            Some(found) => found,
            None => {
                self.skip_opening(start);
                self.record(LexError::UnterminatedPhrase { line, column });
                return None;
            }
        };
        self.consume_to(end);
        let span = self.span_from(start, line, column);
        Some(Token::new(TokenKind::TickedPhrase(content), span))
    }

    /// Content between `input[start]` and the next `quote` on the same line.
    fn delimited(&self, start: usize, quote: char) -> Option<(&'a str, usize)> {
        let input = self.input;
        let body = &input[start + 1..];
        let close = body.find([quote, '\n'])?;
        if !body[close..].starts_with(quote) {
            return None;
        }
        let content_end = start + 1 + close;
        Some((&input[start + 1..content_end], content_end + 1))
    }

    fn skip_opening(&mut self, start: usize) {
        debug_assert_eq!(self.current_index(), start);
        self.advance_char();
    }

    fn consume_to(&mut self, end: usize) {
        while self.current_index() < end {
            self.advance_char();
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> usize {
        while let Some(&(_, c)) = self.chars.peek() {
            if accept(c) {
                self.advance_char();
            } else {
                break;
            }
        }
        self.current_index()
    }

    fn record(&mut self, error: LexError) {
        warn!("{error}");
        self.errors.push(error);
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_reached {
            return None;
        }
        Some(self.next_token())
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next().map(|(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn span_from(&mut self, start: usize, line: usize, column: usize) -> Span {
        Span {
            start,
            end: self.current_index(),
            line,
            column,
            end_line: self.line,
            end_column: self.column,
        }
    }
}

pub fn tokenize(input: &str) -> Tokens<'_> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Tokens {
        tokens,
        errors: lexer.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .tokens
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            select many a_set from instances of A;
            for each a in a_set
                assign x = x + 1.5;
            END  FOR;
        "};
        let expected_tokens = vec![
            TokenKind::Keyword(Keyword::Select),
            TokenKind::Keyword(Keyword::Many),
            TokenKind::Identifier("a_set"),
            TokenKind::Keyword(Keyword::From),
            TokenKind::Keyword(Keyword::Instances),
            TokenKind::Keyword(Keyword::Of),
            TokenKind::Identifier("A"),
            TokenKind::Semicolon,
            TokenKind::Keyword(Keyword::For),
            TokenKind::Keyword(Keyword::Each),
            TokenKind::Identifier("a"),
            TokenKind::Keyword(Keyword::In),
            TokenKind::Identifier("a_set"),
            TokenKind::Keyword(Keyword::Assign),
            TokenKind::Identifier("x"),
            TokenKind::Equal,
            TokenKind::Identifier("x"),
            TokenKind::Plus,
            TokenKind::Real(1.5),
            TokenKind::Semicolon,
            TokenKind::Keyword(Keyword::EndFor),
            TokenKind::Semicolon,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn keywords_are_case_insensitive_but_names_keep_case() {
        assert_eq!(
            kinds("SeLeCt Any Foo"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Keyword(Keyword::Any),
                TokenKind::Identifier("Foo"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn end_without_known_follower_stays_single_word() {
        assert_eq!(
            kinds("end foo"),
            vec![
                TokenKind::Keyword(Keyword::End),
                TokenKind::Identifier("foo"),
                TokenKind::EOF,
            ]
        );
        assert_eq!(
            kinds("end format"),
            vec![
                TokenKind::Keyword(Keyword::End),
                TokenKind::Identifier("format"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn namespace_requires_adjacent_double_colon() {
        assert_eq!(
            kinds("LOG::LogInfo ::f A ::"),
            vec![
                TokenKind::Namespace("LOG"),
                TokenKind::Identifier("LogInfo"),
                TokenKind::DoubleColon,
                TokenKind::Identifier("f"),
                TokenKind::Identifier("A"),
                TokenKind::DoubleColon,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn numbers_distinguish_integer_and_real() {
        assert_eq!(
            kinds("42 4.25 1e3 2E-2 7."),
            vec![
                TokenKind::Integer(42),
                TokenKind::Real(4.25),
                TokenKind::Real(1000.0),
                TokenKind::Real(0.02),
                TokenKind::Integer(7),
                TokenKind::Dot,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn strings_and_phrases_strip_quotes() {
        assert_eq!(
            kinds(r#"x = "hello world"; ->A[R1.'is next to']"#),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::String("hello world"),
                TokenKind::Semicolon,
                TokenKind::Arrow,
                TokenKind::Identifier("A"),
                TokenKind::LBracket,
                TokenKind::Identifier("R1"),
                TokenKind::Dot,
                TokenKind::TickedPhrase("is next to"),
                TokenKind::RBracket,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_but_lines_still_count() {
        let tokens = tokenize("/* one\ntwo */ x // trailing\n y").tokens;
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x"));
        assert_eq!(tokens[0].span.line, 2);
        assert_eq!(tokens[1].kind, TokenKind::Identifier("y"));
        assert_eq!(tokens[1].span.line, 3);
        assert_eq!(tokens[1].span.column, 1);
    }

    #[test]
    fn operators_prefer_the_longest_match() {
        assert_eq!(
            kinds("<= < >= > == = != -> - :: :"),
            vec![
                TokenKind::LessEq,
                TokenKind::Less,
                TokenKind::GreaterEq,
                TokenKind::Greater,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Arrow,
                TokenKind::Minus,
                TokenKind::DoubleColon,
                TokenKind::Colon,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn illegal_character_is_reported_and_skipped() {
        let result = tokenize("x = 1 @ 2;\n");
        assert_eq!(
            result.errors,
            vec![LexError::UnexpectedCharacter {
                character: '@',
                line: 1,
                column: 6,
            }]
        );
        let kinds = result
            .tokens
            .into_iter()
            .map(|token| token.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Integer(2),
                TokenKind::Semicolon,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn unterminated_string_skips_only_the_quote() {
        let result = tokenize("\"abc\nx");
        assert_eq!(
            result.errors,
            vec![LexError::UnterminatedString { line: 1, column: 0 }]
        );
        let kinds = result
            .tokens
            .into_iter()
            .map(|token| token.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("abc"),
                TokenKind::Identifier("x"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn end_keyword_spans_line_breaks() {
        let result = tokenize("end\n  while;\nx");
        let positions = result
            .tokens
            .iter()
            .map(|token| (token.kind.clone(), token.span.line))
            .collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![
                (TokenKind::Keyword(Keyword::EndWhile), 1),
                (TokenKind::Semicolon, 2),
                (TokenKind::Identifier("x"), 3),
                (TokenKind::EOF, 3),
            ]
        );
        assert_eq!(
            kinds("end\nx"),
            vec![
                TokenKind::Keyword(Keyword::End),
                TokenKind::Identifier("x"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn errors_on_integer_overflow() {
        let result = tokenize("n = 99999999999999999999999999;\n");
        assert!(matches!(
            result.errors.as_slice(),
            [LexError::InvalidNumber { .. }]
        ));
    }
}
