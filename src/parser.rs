use tracing::trace;

use crate::ast::{
    Argument, BinaryOperator, Block, Body, Cardinality, ElifClause, EventSpec, EventTarget,
    Expression, ExpressionKind, Invocation, InvocationKind, NavigationStart, NavigationStep,
    Position, Relationship, Statement, StatementKind, UnaryOperator,
};
use crate::lexer::{self, Tokens};
use crate::token::{Keyword, Span, Token, TokenKind};

pub mod error;

pub use error::ParseError;

type ParseResult<T> = Result<T, ParseError>;

const IF_TERMINATORS: [Keyword; 3] = [Keyword::Elif, Keyword::Else, Keyword::EndIf];

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    index: usize,
    previous: Span,
}

impl<'a> Parser<'a> {
    /// `tokens` must come from `source` and end with an EOF token.
    pub fn new(source: &'a str, tokens: Vec<Token<'a>>) -> Self {
        Self {
            source,
            tokens,
            index: 0,
            previous: Span::default(),
        }
    }

    pub fn parse_body(mut self) -> ParseResult<Body> {
        let start = self.current_span();
        let statements = self.parse_statements(&[])?;
        if !matches!(self.current().kind, TokenKind::EOF) {
            return Err(self.error("statement"));
        }
        let block = Block {
            statements,
            position: self.position_from(start),
        };
        Ok(Body {
            position: block.position.clone(),
            block,
        })
    }

    fn parse_statements(&mut self, terminators: &[Keyword]) -> ParseResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            match &self.current().kind {
                TokenKind::EOF => break,
                TokenKind::Keyword(keyword) if terminators.contains(keyword) => break,
                TokenKind::Semicolon => {
                    self.advance();
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(statements)
    }

    fn parse_block(&mut self, terminators: &[Keyword]) -> ParseResult<Block> {
        let start = self.current_span();
        let statements = self.parse_statements(terminators)?;
        Ok(Block {
            statements,
            position: self.position_from(start),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current_span();
        let kind = match self.current().kind {
            // `select = 1;` and `create.x = 2;` use the keyword as a plain name.
            TokenKind::Keyword(keyword)
                if keyword.is_reserved()
                    || !matches!(
                        self.peek_kind(1),
                        TokenKind::Equal | TokenKind::Dot | TokenKind::LBracket
                    ) =>
            {
                self.parse_keyword_statement(keyword)?
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(Statement {
            kind,
            position: self.position_from(start),
        })
    }

    fn parse_keyword_statement(&mut self, keyword: Keyword) -> ParseResult<StatementKind> {
        match keyword {
            Keyword::Break => {
                self.advance();
                self.expect_semicolon()?;
                Ok(StatementKind::Break)
            }
            Keyword::Continue => {
                self.advance();
                self.expect_semicolon()?;
                Ok(StatementKind::Continue)
            }
            Keyword::Control => {
                self.advance();
                self.expect_keyword(Keyword::Stop, "'stop'")?;
                self.expect_semicolon()?;
                Ok(StatementKind::ControlStop)
            }
            Keyword::Return => {
                self.advance();
                if self.eat(&TokenKind::Semicolon) {
                    return Ok(StatementKind::Return(None));
                }
                let value = self.parse_expression()?;
                self.expect_semicolon()?;
                Ok(StatementKind::Return(Some(value)))
            }
            Keyword::Assign => {
                self.advance();
                self.parse_assignment_tail()
            }
            Keyword::Bridge | Keyword::Transform | Keyword::Send => {
                self.advance();
                self.parse_prefixed_invocation(keyword)
            }
            Keyword::Create => {
                self.advance();
                if self.eat_keyword(Keyword::Object) {
                    self.parse_create_object()
                } else {
                    self.expect_keyword(Keyword::Event, "'object' or 'event'")?;
                    self.parse_create_event()
                }
            }
            Keyword::Delete => {
                self.advance();
                self.expect_keyword(Keyword::Object, "'object'")?;
                self.expect_keyword(Keyword::Instance, "'instance'")?;
                let variable = self.expect_name("variable name")?;
                self.expect_semicolon()?;
                Ok(StatementKind::DeleteObject { variable })
            }
            Keyword::Relate => {
                self.advance();
                let from = self.expect_name("variable name")?;
                self.expect_keyword(Keyword::To, "'to'")?;
                let to = self.expect_name("variable name")?;
                let (relationship, using) = self.parse_across()?;
                Ok(StatementKind::Relate {
                    from,
                    to,
                    relationship,
                    using,
                })
            }
            Keyword::Unrelate => {
                self.advance();
                let from = self.expect_name("variable name")?;
                self.expect_keyword(Keyword::From, "'from'")?;
                let to = self.expect_name("variable name")?;
                let (relationship, using) = self.parse_across()?;
                Ok(StatementKind::Unrelate {
                    from,
                    to,
                    relationship,
                    using,
                })
            }
            Keyword::Select => {
                self.advance();
                self.parse_select()
            }
            Keyword::For => {
                self.advance();
                self.expect_keyword(Keyword::Each, "'each'")?;
                let variable = self.expect_name("loop variable")?;
                self.expect_keyword(Keyword::In, "'in'")?;
                let set = self.expect_name("set variable")?;
                let block = self.parse_block(&[Keyword::EndFor])?;
                self.expect_keyword(Keyword::EndFor, "'end for'")?;
                self.expect_semicolon()?;
                Ok(StatementKind::ForEach {
                    variable,
                    set,
                    block,
                })
            }
            Keyword::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let block = self.parse_block(&[Keyword::EndWhile])?;
                self.expect_keyword(Keyword::EndWhile, "'end while'")?;
                self.expect_semicolon()?;
                Ok(StatementKind::While { condition, block })
            }
            Keyword::If => {
                self.advance();
                self.parse_if()
            }
            Keyword::Generate => {
                self.advance();
                if self.is_name_at(0) && matches!(self.peek_kind(1), TokenKind::Semicolon) {
                    let variable = self.expect_name("event variable")?;
                    self.expect_semicolon()?;
                    return Ok(StatementKind::GeneratePrecreated { variable });
                }
                let event = self.parse_event_spec()?;
                self.expect_keyword(Keyword::To, "'to'")?;
                let target = self.parse_event_target()?;
                self.expect_semicolon()?;
                Ok(StatementKind::GenerateEvent { event, target })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StatementKind> {
        let expression = self.parse_postfix()?;
        if matches!(self.current().kind, TokenKind::Equal) {
            self.ensure_assignable(&expression)?;
            self.advance();
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            return Ok(StatementKind::Assign {
                target: expression,
                value,
            });
        }
        if !matches!(expression.kind, ExpressionKind::Invoke(_)) {
            return Err(self.error("'=' or an invocation"));
        }
        self.expect_semicolon()?;
        Ok(StatementKind::Invoke(expression))
    }

    fn parse_assignment_tail(&mut self) -> ParseResult<StatementKind> {
        let target = self.parse_postfix()?;
        self.ensure_assignable(&target)?;
        self.expect(&TokenKind::Equal, "'='")?;
        let value = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(StatementKind::Assign { target, value })
    }

    /// `bridge`/`transform`/`send` followed by `[lhs =] NS::name(args);`.
    fn parse_prefixed_invocation(&mut self, keyword: Keyword) -> ParseResult<StatementKind> {
        let target = if matches!(self.current().kind, TokenKind::Namespace(_)) {
            None
        } else {
            let target = self.parse_postfix()?;
            self.ensure_assignable(&target)?;
            self.expect(&TokenKind::Equal, "'='")?;
            Some(target)
        };

        let start = self.current_span();
        let TokenKind::Namespace(namespace) = self.current().kind else {
            return Err(self.error("'Namespace::'"));
        };
        self.advance();
        let namespace = namespace.to_string();
        let name = self.expect_name("operation name")?;
        let arguments = self.parse_arguments()?;
        let kind = match keyword {
            Keyword::Bridge => InvocationKind::Bridge { entity: namespace },
            Keyword::Transform => InvocationKind::Class { class: namespace },
            _ => InvocationKind::Port { port: namespace },
        };
        let invocation = Expression {
            kind: ExpressionKind::Invoke(Invocation {
                kind,
                name,
                arguments,
            }),
            position: self.position_from(start),
        };
        self.expect_semicolon()?;

        Ok(match target {
            Some(target) => StatementKind::Assign {
                target,
                value: invocation,
            },
            None => StatementKind::Invoke(invocation),
        })
    }

    fn parse_create_object(&mut self) -> ParseResult<StatementKind> {
        self.expect_keyword(Keyword::Instance, "'instance'")?;
        let anonymous = self.at_keyword(Keyword::Of)
            && self.is_name_at(1)
            && matches!(self.peek_kind(2), TokenKind::Semicolon);
        let variable = if anonymous {
            None
        } else {
            Some(self.expect_name("variable name")?)
        };
        self.expect_keyword(Keyword::Of, "'of'")?;
        let class = self.expect_name("class name")?;
        self.expect_semicolon()?;
        Ok(StatementKind::CreateObject { variable, class })
    }

    fn parse_create_event(&mut self) -> ParseResult<StatementKind> {
        self.expect_keyword(Keyword::Instance, "'instance'")?;
        let variable = self.expect_name("variable name")?;
        self.expect_keyword(Keyword::Of, "'of'")?;
        let event = self.parse_event_spec()?;
        self.expect_keyword(Keyword::To, "'to'")?;
        let target = self.parse_event_target()?;
        self.expect_semicolon()?;
        Ok(StatementKind::CreateEvent {
            variable,
            event,
            target,
        })
    }

    fn parse_event_spec(&mut self) -> ParseResult<EventSpec> {
        let label = self.expect_name("event label")?;
        let meaning = if self.eat(&TokenKind::Colon) {
            if let TokenKind::TickedPhrase(phrase) = self.current().kind {
                self.advance();
                Some(phrase.to_string())
            } else {
                Some(self.expect_name("event meaning")?)
            }
        } else {
            None
        };
        let arguments = if matches!(self.current().kind, TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(EventSpec {
            label,
            meaning,
            arguments,
        })
    }

    fn parse_event_target(&mut self) -> ParseResult<EventTarget> {
        if self.is_name_at(0) {
            match self.peek_kind(1) {
                TokenKind::Keyword(Keyword::Class) => {
                    let class = self.expect_name("class name")?;
                    self.advance();
                    return Ok(EventTarget::Class(class));
                }
                TokenKind::Keyword(Keyword::Creator) => {
                    let class = self.expect_name("class name")?;
                    self.advance();
                    return Ok(EventTarget::Creator(class));
                }
                _ => {}
            }
        }
        Ok(EventTarget::Instance(self.parse_expression()?))
    }

    fn parse_across(&mut self) -> ParseResult<(Relationship, Option<String>)> {
        self.expect_keyword(Keyword::Across, "'across'")?;
        let relationship = self.parse_relationship()?;
        let using = if self.eat_keyword(Keyword::Using) {
            Some(self.expect_name("link variable")?)
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok((relationship, using))
    }

    fn parse_relationship(&mut self) -> ParseResult<Relationship> {
        let id = self.expect_name("relationship id")?;
        let phrase = match (&self.current().kind, self.peek_kind(1)) {
            (TokenKind::Dot, TokenKind::TickedPhrase(phrase)) => {
                let phrase = phrase.to_string();
                self.advance();
                self.advance();
                Some(phrase)
            }
            _ => None,
        };
        Ok(Relationship { id, phrase })
    }

    fn parse_select(&mut self) -> ParseResult<StatementKind> {
        let cardinality_token = self.current().clone();
        let cardinality = if self.eat_keyword(Keyword::One) {
            Cardinality::One
        } else if self.eat_keyword(Keyword::Any) {
            Cardinality::Any
        } else if self.eat_keyword(Keyword::Many) {
            Cardinality::Many
        } else {
            return Err(self.error("'one', 'any' or 'many'"));
        };
        let variable = self.expect_name("variable name")?;

        if self.eat_keyword(Keyword::From) {
            if cardinality == Cardinality::One {
                return Err(ParseError {
                    token: cardinality_token.kind.to_string(),
                    expected: "'any' or 'many'".to_string(),
                    line: cardinality_token.span.line,
                    column: cardinality_token.span.column,
                });
            }
            self.expect_keyword(Keyword::Instances, "'instances'")?;
            self.expect_keyword(Keyword::Of, "'of'")?;
            let class = self.expect_name("class name")?;
            let condition = self.parse_where()?;
            self.expect_semicolon()?;
            return Ok(StatementKind::SelectFrom {
                cardinality,
                variable,
                class,
                condition,
            });
        }

        self.expect_keyword(Keyword::Related, "'from' or 'related'")?;
        self.expect_keyword(Keyword::By, "'by'")?;
        let start = if self.eat_keyword(Keyword::SelfRef) {
            NavigationStart::SelfRef
        } else if self.eat_keyword(Keyword::Selected) {
            NavigationStart::Selected
        } else {
            NavigationStart::Variable(self.expect_name("navigation start")?)
        };
        let mut chain = Vec::new();
        loop {
            let step_start = self.current_span();
            if chain.is_empty() {
                self.expect(&TokenKind::Arrow, "'->'")?;
            } else if !self.eat(&TokenKind::Arrow) {
                break;
            }
            let class = self.expect_name("class name")?;
            self.expect(&TokenKind::LBracket, "'['")?;
            let relationship = self.parse_relationship()?;
            self.expect(&TokenKind::RBracket, "']'")?;
            chain.push(NavigationStep {
                class,
                relationship,
                position: self.position_from(step_start),
            });
        }
        let condition = self.parse_where()?;
        self.expect_semicolon()?;
        Ok(StatementKind::SelectRelated {
            cardinality,
            variable,
            start,
            chain,
            condition,
        })
    }

    fn parse_where(&mut self) -> ParseResult<Option<Expression>> {
        if self.eat_keyword(Keyword::Where) {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn parse_if(&mut self) -> ParseResult<StatementKind> {
        let condition = self.parse_expression()?;
        let then_block = self.parse_block(&IF_TERMINATORS)?;
        let mut elifs = Vec::new();
        while self.at_keyword(Keyword::Elif) {
            let start = self.current_span();
            self.advance();
            let condition = self.parse_expression()?;
            let block = self.parse_block(&IF_TERMINATORS)?;
            elifs.push(ElifClause {
                condition,
                block,
                position: self.position_from(start),
            });
        }
        let else_block = if self.eat_keyword(Keyword::Else) {
            Some(self.parse_block(&[Keyword::EndIf])?)
        } else {
            None
        };
        self.expect_keyword(Keyword::EndIf, "'end if'")?;
        self.expect_semicolon()?;
        Ok(StatementKind::If {
            condition,
            then_block,
            elifs,
            else_block,
        })
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut expr = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            expr = self.binary(start, expr, BinaryOperator::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut expr = self.parse_comparison()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_comparison()?;
            expr = self.binary(start, expr, BinaryOperator::And, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_operator() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.comparison_operator().is_some() {
            return Err(self.error("end of comparison"));
        }
        Ok(self.binary(start, left, op, right))
    }

    fn comparison_operator(&self) -> Option<BinaryOperator> {
        match self.current().kind {
            TokenKind::Less => Some(BinaryOperator::Less),
            TokenKind::LessEq => Some(BinaryOperator::LessEq),
            TokenKind::Greater => Some(BinaryOperator::Greater),
            TokenKind::GreaterEq => Some(BinaryOperator::GreaterEq),
            TokenKind::EqualEqual => Some(BinaryOperator::Equal),
            TokenKind::NotEqual => Some(BinaryOperator::NotEqual),
            _ => None,
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = self.binary(start, expr, op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = self.binary(start, expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Keyword(Keyword::Not) => Some(UnaryOperator::Not),
            // `empty` alone is a variable; `empty x` is the operator.
            TokenKind::Keyword(keyword) => unary_keyword(keyword).filter(|_| self.starts_operand(1)),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression {
            kind: ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            position: self.position_from(start),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut expr = self.parse_primary()?;
        loop {
            let kind = if self.eat(&TokenKind::Dot) {
                let name = self.expect_name("attribute or operation name")?;
                if matches!(self.current().kind, TokenKind::LParen) {
                    let arguments = self.parse_arguments()?;
                    ExpressionKind::Invoke(Invocation {
                        kind: InvocationKind::Instance {
                            target: Box::new(expr),
                        },
                        name,
                        arguments,
                    })
                } else {
                    ExpressionKind::Field {
                        target: Box::new(expr),
                        name,
                    }
                }
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                ExpressionKind::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                }
            } else {
                break;
            };
            expr = Expression {
                kind,
                position: self.position_from(start),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let kind = match self.current().kind {
            TokenKind::Integer(value) => {
                self.advance();
                ExpressionKind::Integer(value)
            }
            TokenKind::Real(value) => {
                self.advance();
                ExpressionKind::Real(value)
            }
            TokenKind::String(value) => {
                self.advance();
                ExpressionKind::String(value.to_string())
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExpressionKind::Boolean(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExpressionKind::Boolean(false)
            }
            TokenKind::Keyword(Keyword::SelfRef) => {
                self.advance();
                ExpressionKind::SelfRef
            }
            TokenKind::Keyword(Keyword::Selected) => {
                self.advance();
                ExpressionKind::Selected
            }
            TokenKind::Keyword(keyword @ (Keyword::Param | Keyword::RcvdEvt)) => {
                self.advance();
                self.expect(&TokenKind::Dot, "'.'")?;
                let name = self.expect_name("parameter name")?;
                ExpressionKind::Param {
                    name,
                    event: keyword == Keyword::RcvdEvt,
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(expr);
            }
            TokenKind::DoubleColon => {
                self.advance();
                let name = self.expect_name("function name")?;
                let arguments = self.parse_arguments()?;
                ExpressionKind::Invoke(Invocation {
                    kind: InvocationKind::Function,
                    name,
                    arguments,
                })
            }
            TokenKind::Namespace(namespace) => {
                self.advance();
                let name = self.expect_name("name")?;
                if matches!(self.current().kind, TokenKind::LParen) {
                    let arguments = self.parse_arguments()?;
                    ExpressionKind::Invoke(Invocation {
                        kind: InvocationKind::Implicit {
                            namespace: namespace.to_string(),
                        },
                        name,
                        arguments,
                    })
                } else {
                    ExpressionKind::Enumerator {
                        enumeration: namespace.to_string(),
                        name,
                    }
                }
            }
            _ if self.is_name_at(0) => ExpressionKind::Variable(self.expect_name("name")?),
            _ => return Err(self.error("expression")),
        };
        Ok(Expression {
            kind,
            position: self.position_from(start),
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut arguments = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(arguments);
        }
        loop {
            let start = self.current_span();
            let name = self.expect_name("parameter name")?;
            self.expect(&TokenKind::Colon, "':'")?;
            let value = self.parse_expression()?;
            arguments.push(Argument {
                name,
                value,
                position: self.position_from(start),
            });
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(arguments);
        }
    }

    fn binary(
        &self,
        start: Span,
        left: Expression,
        op: BinaryOperator,
        right: Expression,
    ) -> Expression {
        Expression {
            kind: ExpressionKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            position: self.position_from(start),
        }
    }

    fn ensure_assignable(&self, target: &Expression) -> ParseResult<()> {
        match target.kind {
            ExpressionKind::Variable(_)
            | ExpressionKind::Field { .. }
            | ExpressionKind::Index { .. } => Ok(()),
            _ => Err(ParseError {
                token: format!("'{}'", target.position.text),
                expected: "assignable expression".to_string(),
                line: target.position.line,
                column: target.position.column,
            }),
        }
    }

    /// Whether the token `offset` ahead can begin the operand of a prefix keyword.
    fn starts_operand(&self, offset: usize) -> bool {
        match self.peek_kind(offset) {
            TokenKind::Identifier(_)
            | TokenKind::Namespace(_)
            | TokenKind::DoubleColon
            | TokenKind::LParen
            | TokenKind::Integer(_)
            | TokenKind::Real(_)
            | TokenKind::String(_) => true,
            TokenKind::Keyword(keyword) => {
                !keyword.is_reserved()
                    || matches!(
                        keyword,
                        Keyword::True
                            | Keyword::False
                            | Keyword::SelfRef
                            | Keyword::Selected
                            | Keyword::Param
                            | Keyword::RcvdEvt
                            | Keyword::Not
                    )
            }
            _ => false,
        }
    }

    fn is_name_at(&self, offset: usize) -> bool {
        match self.peek_kind(offset) {
            TokenKind::Identifier(_) => true,
            TokenKind::Keyword(keyword) => !keyword.is_reserved(),
            _ => false,
        }
    }

    fn expect_name(&mut self, expected: &str) -> ParseResult<String> {
        if !self.is_name_at(0) {
            return Err(self.error(expected));
        }
        let token = self.advance();
        Ok(self.source[token.span.start..token.span.end].to_string())
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current().kind == TokenKind::Keyword(keyword)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, expected: &str) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn eat(&mut self, kind: &TokenKind<'a>) -> bool {
        if &self.current().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind<'a>, expected: &str) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_semicolon(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Semicolon, "';'")
    }

    fn current(&self) -> &Token<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind<'a> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        self.previous = token.span;
        token
    }

    /// Position covering `start` through the last consumed token.
    fn position_from(&self, start: Span) -> Position {
        let span = if self.previous.end > start.start {
            start.to(self.previous)
        } else {
            Span {
                end: start.start,
                end_line: start.line,
                end_column: start.column,
                ..start
            }
        };
        Position {
            line: span.line,
            column: span.column,
            end_line: span.end_line,
            end_column: span.end_column,
            text: self.source[span.start..span.end].to_string(),
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError {
            token: token.kind.to_string(),
            expected: expected.to_string(),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

fn unary_keyword(keyword: Keyword) -> Option<UnaryOperator> {
    match keyword {
        Keyword::Cardinality => Some(UnaryOperator::Cardinality),
        Keyword::Empty => Some(UnaryOperator::Empty),
        Keyword::NotEmpty => Some(UnaryOperator::NotEmpty),
        Keyword::First => Some(UnaryOperator::First),
        Keyword::Last => Some(UnaryOperator::Last),
        _ => None,
    }
}

/// Parses an already tokenized body. `source` must be the text `tokens` came from.
pub fn parse_tokens<'a>(source: &'a str, tokens: Vec<Token<'a>>) -> Result<Body, ParseError> {
    Parser::new(source, tokens).parse_body()
}

/// Parses one action body. Lexical errors are logged and skipped; any syntax
/// error rejects the whole body.
pub fn parse(text: &str) -> Result<Body, ParseError> {
    let source = format!("{text}\n");
    let Tokens { tokens, errors } = lexer::tokenize(&source);
    trace!(
        tokens = tokens.len(),
        lex_errors = errors.len(),
        "tokenized action body"
    );
    parse_tokens(&source, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn statements(input: &str) -> Vec<StatementKind> {
        parse(input)
            .expect("parse failed")
            .block
            .statements
            .into_iter()
            .map(|statement| statement.kind)
            .collect()
    }

    fn single(input: &str) -> StatementKind {
        let mut statements = statements(input);
        assert_eq!(statements.len(), 1, "expected exactly one statement");
        statements.remove(0)
    }

    fn returned(input: &str) -> ExpressionKind {
        match single(input) {
            StatementKind::Return(Some(expression)) => expression.kind,
            other => panic!("expected return, got {other:?}"),
        }
    }

    #[test]
    fn parses_empty_body() {
        let body = parse("").expect("parse failed");
        assert!(body.block.statements.is_empty());
        let body = parse("// nothing here\n").expect("parse failed");
        assert!(body.block.statements.is_empty());
    }

    #[test]
    fn records_positions_and_source_text() {
        let body = parse("assign x = 1;\n  return x + 1;").expect("parse failed");
        let second = &body.block.statements[1];
        assert_eq!(second.position.line, 2);
        assert_eq!(second.position.column, 2);
        assert_eq!(second.position.text, "return x + 1;");
        let StatementKind::Return(Some(value)) = &second.kind else {
            panic!("expected return");
        };
        assert_eq!(value.position.text, "x + 1");
        assert_eq!(value.position.column, 9);
    }

    #[test]
    fn block_end_may_follow_a_line_break() {
        let parsed = statements(indoc! {"
            while (x < 3)
              x = x + 1;
            end
            while;
            return x;
        "});
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[0], StatementKind::While { .. }));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let ExpressionKind::Binary { left, op, right } = returned("return 1 + 2 * 3;") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOperator::Add);
        assert_eq!(left.kind, ExpressionKind::Integer(1));
        assert!(matches!(
            right.kind,
            ExpressionKind::Binary {
                op: BinaryOperator::Mul,
                ..
            }
        ));
    }

    #[test]
    fn or_binds_looser_than_and() {
        let ExpressionKind::Binary { op, right, .. } = returned("return a or b and c;") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOperator::Or);
        assert!(matches!(
            right.kind,
            ExpressionKind::Binary {
                op: BinaryOperator::And,
                ..
            }
        ));
    }

    #[test]
    fn unary_binds_tightest_and_nests() {
        let ExpressionKind::Binary { left, op, .. } = returned("return not not a == b;") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOperator::Equal);
        let ExpressionKind::Unary { op, operand } = left.kind else {
            panic!("expected unary");
        };
        assert_eq!(op, UnaryOperator::Not);
        assert!(matches!(
            operand.kind,
            ExpressionKind::Unary {
                op: UnaryOperator::Not,
                ..
            }
        ));
    }

    #[test]
    fn comparisons_do_not_chain() {
        let error = parse("return 1 < 2 < 3;").expect_err("expected parse failure");
        assert_eq!(error.expected, "end of comparison");
        assert_eq!(error.line, 1);
        assert_eq!(error.column, 13);
    }

    #[test]
    fn parses_select_related_chain_with_phrase_and_where() {
        let kind = single(
            "select many cs related by self->B[R1]->C[R2.'is next to'] where (selected.x > 1);",
        );
        let StatementKind::SelectRelated {
            cardinality,
            variable,
            start,
            chain,
            condition,
        } = kind
        else {
            panic!("expected select related");
        };
        assert_eq!(cardinality, Cardinality::Many);
        assert_eq!(variable, "cs");
        assert_eq!(start, NavigationStart::SelfRef);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].class, "B");
        assert_eq!(
            chain[1].relationship,
            Relationship {
                id: "R2".to_string(),
                phrase: Some("is next to".to_string()),
            }
        );
        assert!(condition.is_some());
    }

    #[test]
    fn select_one_from_instances_is_rejected() {
        let error =
            parse("select one a from instances of A;").expect_err("expected parse failure");
        assert_eq!(error.token, "keyword One");
        assert_eq!(error.column, 7);
    }

    #[test]
    fn parses_create_forms() {
        assert_eq!(
            statements("create object instance a of A;\ncreate object instance of B;"),
            vec![
                StatementKind::CreateObject {
                    variable: Some("a".to_string()),
                    class: "A".to_string(),
                },
                StatementKind::CreateObject {
                    variable: None,
                    class: "B".to_string(),
                },
            ]
        );
    }

    #[test]
    fn parses_relate_using_and_unrelate() {
        assert_eq!(
            statements(indoc! {"
                relate a to b across R3 using link;
                unrelate a from b across R5.'precedes';
            "}),
            vec![
                StatementKind::Relate {
                    from: "a".to_string(),
                    to: "b".to_string(),
                    relationship: Relationship {
                        id: "R3".to_string(),
                        phrase: None,
                    },
                    using: Some("link".to_string()),
                },
                StatementKind::Unrelate {
                    from: "a".to_string(),
                    to: "b".to_string(),
                    relationship: Relationship {
                        id: "R5".to_string(),
                        phrase: Some("precedes".to_string()),
                    },
                    using: None,
                },
            ]
        );
    }

    #[test]
    fn parses_if_elif_else() {
        let kind = single(indoc! {"
            if (x == 1)
                return 1;
            elif (x == 2)
                return 2;
            elif (x == 3)
                return 3;
            else
                return 4;
            end if;
        "});
        let StatementKind::If {
            elifs, else_block, ..
        } = kind
        else {
            panic!("expected if");
        };
        assert_eq!(elifs.len(), 2);
        assert_eq!(else_block.map(|block| block.statements.len()), Some(1));
    }

    #[test]
    fn keywords_double_as_names_by_position() {
        let parsed = statements(indoc! {"
            select = 1;
            assign create = select + 1;
            a.from = empty;
            return cardinality many;
        "});
        assert!(matches!(
            &parsed[0],
            StatementKind::Assign { target, .. } if target.kind == ExpressionKind::Variable("select".to_string())
        ));
        assert!(matches!(
            &parsed[2],
            StatementKind::Assign { target, value }
                if matches!(&target.kind, ExpressionKind::Field { name, .. } if name == "from")
                && value.kind == ExpressionKind::Variable("empty".to_string())
        ));
        let StatementKind::Return(Some(value)) = &parsed[3] else {
            panic!("expected return");
        };
        assert!(matches!(
            &value.kind,
            ExpressionKind::Unary { op: UnaryOperator::Cardinality, operand }
                if operand.kind == ExpressionKind::Variable("many".to_string())
        ));
    }

    #[test]
    fn prefixes_reclassify_implicit_invocations() {
        let parsed = statements(indoc! {"
            bridge LOG::LogInfo(message: \"hi\");
            transform total = Account::sum(a: 1, b: 2);
            send x = Port::ping();
            EE::op();
            ::helper();
            r = Color::Red;
        "});
        let kinds = parsed
            .iter()
            .map(|statement| match statement {
                StatementKind::Invoke(expression) | StatementKind::Assign { value: expression, .. } => {
                    &expression.kind
                }
                other => panic!("unexpected statement {other:?}"),
            })
            .collect::<Vec<_>>();
        assert!(matches!(kinds[0], ExpressionKind::Invoke(Invocation { kind: InvocationKind::Bridge { entity }, .. }) if entity == "LOG"));
        assert!(matches!(kinds[1], ExpressionKind::Invoke(Invocation { kind: InvocationKind::Class { class }, arguments, .. }) if class == "Account" && arguments.len() == 2));
        assert!(matches!(kinds[2], ExpressionKind::Invoke(Invocation { kind: InvocationKind::Port { port }, .. }) if port == "Port"));
        assert!(matches!(kinds[3], ExpressionKind::Invoke(Invocation { kind: InvocationKind::Implicit { namespace }, .. }) if namespace == "EE"));
        assert!(matches!(kinds[4], ExpressionKind::Invoke(Invocation { kind: InvocationKind::Function, name, .. }) if name == "helper"));
        assert_eq!(
            kinds[5],
            &ExpressionKind::Enumerator {
                enumeration: "Color".to_string(),
                name: "Red".to_string(),
            }
        );
    }

    #[test]
    fn parses_event_statements() {
        let parsed = statements(indoc! {"
            generate A1:go(speed: 3) to a;
            generate A2:'wake up' to A class;
            generate A3 to A creator;
            create event instance e of A1:go to self;
            generate e;
        "});
        assert!(matches!(
            &parsed[0],
            StatementKind::GenerateEvent { event, target: EventTarget::Instance(_) }
                if event.label == "A1" && event.meaning.as_deref() == Some("go") && event.arguments.len() == 1
        ));
        assert!(matches!(
            &parsed[1],
            StatementKind::GenerateEvent { event, target: EventTarget::Class(class) }
                if event.meaning.as_deref() == Some("wake up") && class == "A"
        ));
        assert!(matches!(
            &parsed[2],
            StatementKind::GenerateEvent { target: EventTarget::Creator(class), .. } if class == "A"
        ));
        assert!(matches!(&parsed[3], StatementKind::CreateEvent { variable, .. } if variable == "e"));
        assert_eq!(
            parsed[4],
            StatementKind::GeneratePrecreated {
                variable: "e".to_string()
            }
        );
    }

    #[test]
    fn parses_index_and_param_access() {
        let ExpressionKind::Binary { left, right, .. } =
            returned("return arr[i + 1].x + param.count;")
        else {
            panic!("expected binary");
        };
        let ExpressionKind::Field { target, name } = left.kind else {
            panic!("expected field");
        };
        assert_eq!(name, "x");
        assert!(matches!(target.kind, ExpressionKind::Index { .. }));
        assert_eq!(
            right.kind,
            ExpressionKind::Param {
                name: "count".to_string(),
                event: false,
            }
        );
    }

    #[test]
    fn instance_invocation_chains_from_field_access() {
        let kind = single("self.owner.notify(reason: \"done\");");
        let StatementKind::Invoke(expression) = kind else {
            panic!("expected invocation");
        };
        let ExpressionKind::Invoke(Invocation {
            kind: InvocationKind::Instance { target },
            name,
            ..
        }) = expression.kind
        else {
            panic!("expected instance invocation");
        };
        assert_eq!(name, "notify");
        assert!(matches!(target.kind, ExpressionKind::Field { .. }));
    }

    #[test]
    fn rejects_positional_arguments() {
        let error = parse("::f(1);").expect_err("expected parse failure");
        assert_eq!(error.expected, "parameter name");
        assert_eq!(error.token, "integer 1");
    }

    #[test]
    fn reports_missing_terminator_with_position() {
        let error = parse("while (x > 0)\n  x = x - 1;").expect_err("expected parse failure");
        assert_eq!(error.expected, "'end while'");
        assert_eq!(error.token, "end of input");
        assert_eq!(error.line, 3);
    }

    #[test]
    fn rejects_non_assignable_targets() {
        let error = parse("1 = 2;").expect_err("expected parse failure");
        assert_eq!(error.expected, "assignable expression");
    }

    #[test]
    fn rejects_bare_expression_statement() {
        let error = parse("x + 1;").expect_err("expected parse failure");
        assert_eq!(error.expected, "'=' or an invocation");
        assert_eq!(error.token, "'+'");
    }

    #[test]
    fn parsing_is_deterministic() {
        let input = indoc! {"
            select many a_set from instances of A;
            for each a in a_set
                if (first a_set)
                    assign x = x + 1;
                end if;
            end for;
            return x;
        "};
        assert_eq!(parse(input), parse(input));
    }
}
