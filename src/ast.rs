//! Syntax tree for one action body.
//!
//! The parser builds these nodes once; the interpreter only ever reads them.
//! Every node carries its [`Position`] (line/column range plus the raw source
//! text it was parsed from) so diagnostics can point back at the source.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub block: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Any,
    Many,
}

/// Relationship id plus the optional phrase naming one end of a reflexive
/// association, e.g. `R5.'precedes'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub phrase: Option<String>,
}

/// One `->Class[R1]` hop of a navigation chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStep {
    pub class: String,
    pub relationship: Relationship,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationStart {
    SelfRef,
    Selected,
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElifClause {
    pub condition: Expression,
    pub block: Block,
    pub position: Position,
}

/// `Label[:meaning][(args)]` in `generate` and `create event`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSpec {
    pub label: String,
    pub meaning: Option<String>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget {
    Class(String),
    Creator(String),
    Instance(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Break,
    Continue,
    ControlStop,
    Return(Option<Expression>),
    Assign {
        target: Expression,
        value: Expression,
    },
    Invoke(Expression),
    CreateObject {
        variable: Option<String>,
        class: String,
    },
    DeleteObject {
        variable: String,
    },
    Relate {
        from: String,
        to: String,
        relationship: Relationship,
        using: Option<String>,
    },
    Unrelate {
        from: String,
        to: String,
        relationship: Relationship,
        using: Option<String>,
    },
    SelectFrom {
        cardinality: Cardinality,
        variable: String,
        class: String,
        condition: Option<Expression>,
    },
    SelectRelated {
        cardinality: Cardinality,
        variable: String,
        start: NavigationStart,
        chain: Vec<NavigationStep>,
        condition: Option<Expression>,
    },
    ForEach {
        variable: String,
        set: String,
        block: Block,
    },
    While {
        condition: Expression,
        block: Block,
    },
    If {
        condition: Expression,
        then_block: Block,
        elifs: Vec<ElifClause>,
        else_block: Option<Block>,
    },
    GenerateEvent {
        event: EventSpec,
        target: EventTarget,
    },
    CreateEvent {
        variable: String,
        event: EventSpec,
        target: EventTarget,
    },
    GeneratePrecreated {
        variable: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Integer(i64),
    Real(f64),
    String(String),
    Boolean(bool),
    Enumerator {
        enumeration: String,
        name: String,
    },
    SelfRef,
    Selected,
    /// `param.name`, or `rcvd_evt.name` when `event` is set.
    Param {
        name: String,
        event: bool,
    },
    Variable(String),
    Field {
        target: Box<Expression>,
        name: String,
    },
    Index {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Invoke(Invocation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
    Cardinality,
    Empty,
    NotEmpty,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub kind: InvocationKind,
    pub name: String,
    pub arguments: Vec<Argument>,
}

/// Who receives an invocation.
///
/// `Implicit` is what an unprefixed `NS::name(..)` parses to; a leading
/// `bridge`, `transform` or `send` turns it into `Bridge`, `Class` or `Port`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationKind {
    Function,
    Implicit { namespace: String },
    Bridge { entity: String },
    Class { class: String },
    Port { port: String },
    Instance { target: Box<Expression> },
}

/// Named argument `name: value`. Positional arguments do not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: Expression,
    pub position: Position,
}

/// Borrowed view over any node, for generic traversal.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Body(&'a Body),
    Block(&'a Block),
    Statement(&'a Statement),
    Elif(&'a ElifClause),
    Step(&'a NavigationStep),
    Expression(&'a Expression),
    Argument(&'a Argument),
}

impl<'a> Node<'a> {
    pub fn position(&self) -> &'a Position {
        match *self {
            Node::Body(node) => &node.position,
            Node::Block(node) => &node.position,
            Node::Statement(node) => &node.position,
            Node::Elif(node) => &node.position,
            Node::Step(node) => &node.position,
            Node::Expression(node) => &node.position,
            Node::Argument(node) => &node.position,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Node::Body(_) => "Body",
            Node::Block(_) => "Block",
            Node::Elif(_) => "ElifClause",
            Node::Step(_) => "NavigationStep",
            Node::Argument(_) => "Argument",
            Node::Statement(statement) => match &statement.kind {
                StatementKind::Break => "Break",
                StatementKind::Continue => "Continue",
                StatementKind::ControlStop => "ControlStop",
                StatementKind::Return(_) => "Return",
                StatementKind::Assign { .. } => "Assign",
                StatementKind::Invoke(_) => "InvocationStatement",
                StatementKind::CreateObject { variable: None, .. } => "CreateObjectNoVariable",
                StatementKind::CreateObject { .. } => "CreateObject",
                StatementKind::DeleteObject { .. } => "DeleteObject",
                StatementKind::Relate { using: None, .. } => "Relate",
                StatementKind::Relate { .. } => "RelateUsing",
                StatementKind::Unrelate { using: None, .. } => "Unrelate",
                StatementKind::Unrelate { .. } => "UnrelateUsing",
                StatementKind::SelectFrom {
                    condition: None, ..
                } => "SelectFrom",
                StatementKind::SelectFrom { .. } => "SelectFromWhere",
                StatementKind::SelectRelated {
                    condition: None, ..
                } => "SelectRelated",
                StatementKind::SelectRelated { .. } => "SelectRelatedWhere",
                StatementKind::ForEach { .. } => "ForEach",
                StatementKind::While { .. } => "While",
                StatementKind::If { .. } => "If",
                StatementKind::GenerateEvent { .. } => "GenerateEvent",
                StatementKind::CreateEvent { .. } => "CreateEvent",
                StatementKind::GeneratePrecreated { .. } => "GeneratePrecreatedEvent",
            },
            Node::Expression(expression) => match &expression.kind {
                ExpressionKind::Integer(_) => "IntegerLiteral",
                ExpressionKind::Real(_) => "RealLiteral",
                ExpressionKind::String(_) => "StringLiteral",
                ExpressionKind::Boolean(_) => "BooleanLiteral",
                ExpressionKind::Enumerator { .. } => "Enumerator",
                ExpressionKind::SelfRef => "SelfAccess",
                ExpressionKind::Selected => "SelectedAccess",
                ExpressionKind::Param { .. } => "ParamAccess",
                ExpressionKind::Variable(_) => "VariableAccess",
                ExpressionKind::Field { .. } => "FieldAccess",
                ExpressionKind::Index { .. } => "IndexAccess",
                ExpressionKind::Unary { .. } => "UnaryOperation",
                ExpressionKind::Binary { .. } => "BinaryOperation",
                ExpressionKind::Invoke(invocation) => match invocation.kind {
                    InvocationKind::Function => "FunctionInvocation",
                    InvocationKind::Implicit { .. } => "ImplicitInvocation",
                    InvocationKind::Bridge { .. } => "BridgeInvocation",
                    InvocationKind::Class { .. } => "ClassInvocation",
                    InvocationKind::Port { .. } => "PortInvocation",
                    InvocationKind::Instance { .. } => "InstanceInvocation",
                },
            },
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Body(body) => vec![Node::Block(&body.block)],
            Node::Block(block) => block.statements.iter().map(Node::Statement).collect(),
            Node::Elif(clause) => vec![
                Node::Expression(&clause.condition),
                Node::Block(&clause.block),
            ],
            Node::Step(_) => Vec::new(),
            Node::Argument(argument) => vec![Node::Expression(&argument.value)],
            Node::Statement(statement) => statement_children(statement),
            Node::Expression(expression) => expression_children(expression),
        }
    }
}

fn statement_children(statement: &Statement) -> Vec<Node<'_>> {
    match &statement.kind {
        StatementKind::Break
        | StatementKind::Continue
        | StatementKind::ControlStop
        | StatementKind::Return(None)
        | StatementKind::CreateObject { .. }
        | StatementKind::DeleteObject { .. }
        | StatementKind::Relate { .. }
        | StatementKind::Unrelate { .. }
        | StatementKind::GeneratePrecreated { .. }
        | StatementKind::SelectFrom {
            condition: None, ..
        } => Vec::new(),
        StatementKind::Return(Some(value)) | StatementKind::Invoke(value) => {
            vec![Node::Expression(value)]
        }
        StatementKind::Assign { target, value } => {
            vec![Node::Expression(target), Node::Expression(value)]
        }
        StatementKind::SelectFrom {
            condition: Some(condition),
            ..
        } => vec![Node::Expression(condition)],
        StatementKind::SelectRelated {
            chain, condition, ..
        } => chain
            .iter()
            .map(Node::Step)
            .chain(condition.iter().map(Node::Expression))
            .collect(),
        StatementKind::ForEach { block, .. } => vec![Node::Block(block)],
        StatementKind::While { condition, block } => {
            vec![Node::Expression(condition), Node::Block(block)]
        }
        StatementKind::If {
            condition,
            then_block,
            elifs,
            else_block,
        } => {
            let mut children = vec![Node::Expression(condition), Node::Block(then_block)];
            children.extend(elifs.iter().map(Node::Elif));
            children.extend(else_block.iter().map(Node::Block));
            children
        }
        StatementKind::GenerateEvent { event, target }
        | StatementKind::CreateEvent { event, target, .. } => {
            let mut children = event.arguments.iter().map(Node::Argument).collect::<Vec<_>>();
            if let EventTarget::Instance(expression) = target {
                children.push(Node::Expression(expression));
            }
            children
        }
    }
}

fn expression_children(expression: &Expression) -> Vec<Node<'_>> {
    match &expression.kind {
        ExpressionKind::Integer(_)
        | ExpressionKind::Real(_)
        | ExpressionKind::String(_)
        | ExpressionKind::Boolean(_)
        | ExpressionKind::Enumerator { .. }
        | ExpressionKind::SelfRef
        | ExpressionKind::Selected
        | ExpressionKind::Param { .. }
        | ExpressionKind::Variable(_) => Vec::new(),
        ExpressionKind::Field { target, .. } => vec![Node::Expression(target)],
        ExpressionKind::Index { target, index } => {
            vec![Node::Expression(target), Node::Expression(index)]
        }
        ExpressionKind::Unary { operand, .. } => vec![Node::Expression(operand)],
        ExpressionKind::Binary { left, right, .. } => {
            vec![Node::Expression(left), Node::Expression(right)]
        }
        ExpressionKind::Invoke(invocation) => {
            let mut children = Vec::new();
            if let InvocationKind::Instance { target } = &invocation.kind {
                children.push(Node::Expression(target));
            }
            children.extend(invocation.arguments.iter().map(Node::Argument));
            children
        }
    }
}

/// Renders the tree one node per line, indented by depth.
pub fn dump(body: &Body) -> String {
    let mut out = String::new();
    dump_node(Node::Body(body), 0, &mut out);
    out
}

fn dump_node(node: Node<'_>, depth: usize, out: &mut String) {
    let position = node.position();
    let text = position.text.lines().next().unwrap_or_default().trim();
    let _ = writeln!(
        out,
        "{:indent$}{} @{}:{} `{}`",
        "",
        node.name(),
        position.line,
        position.column,
        text,
        indent = depth * 2
    );
    for child in node.children() {
        dump_node(child, depth + 1, out);
    }
}
