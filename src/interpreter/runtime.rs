use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::trace;

use crate::ast::{
    Argument, BinaryOperator, Block, Body, Cardinality, ElifClause, EventSpec, EventTarget,
    Expression, ExpressionKind, Invocation, InvocationKind, NavigationStart, NavigationStep,
    Statement, StatementKind, UnaryOperator,
};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::domain::{Action, Arguments, Domain, Event, EventRecipient, InstanceRef, Symbol};
use crate::symtab::SymbolTable;
use crate::value::Value;

use super::error::RuntimeError;
use super::place::Place;

type Result<T> = std::result::Result<T, RuntimeError>;

/// Control-flow marker for statement execution.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ExecResult {
    Normal,
    Return(Value),
    Break,
    Continue,
    Stop,
}

#[derive(Debug)]
struct LoopCursor {
    set: String,
    index: usize,
    len: usize,
}

/// Result slot of a derived attribute under computation.
#[derive(Debug)]
pub(super) struct DerivedCell {
    pub(super) attribute: String,
    pub(super) result: Value,
}

/// State of one body activation.
#[derive(Debug)]
pub(super) struct Frame {
    label: String,
    receiver: Option<InstanceRef>,
    arguments: Arguments,
    pub(super) derived: Option<DerivedCell>,
    selected: Vec<InstanceRef>,
    loops: Vec<LoopCursor>,
}

impl Frame {
    pub(super) fn new(label: &str, receiver: Option<InstanceRef>, arguments: Arguments) -> Self {
        Self {
            label: label.to_string(),
            receiver,
            arguments,
            derived: None,
            selected: Vec::new(),
            loops: Vec::new(),
        }
    }

    pub(super) fn derived_attribute(label: &str, attribute: &str, receiver: InstanceRef) -> Self {
        Self {
            derived: Some(DerivedCell {
                attribute: attribute.to_string(),
                result: Value::Null,
            }),
            ..Self::new(label, Some(receiver), Arguments::new())
        }
    }
}

/// Tree-walking evaluator shared by every call context.
pub(super) struct Runtime<'a> {
    pub(super) domain: &'a mut dyn Domain,
    pub(super) symbols: SymbolTable,
    pub(super) frame: Frame,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> Runtime<'a> {
    pub(super) fn new(
        domain: &'a mut dyn Domain,
        sink: &'a mut dyn DiagnosticSink,
        frame: Frame,
    ) -> Self {
        Self {
            domain,
            symbols: SymbolTable::new(),
            frame,
            sink,
        }
    }

    pub(super) fn report(&mut self, line: usize, error: &RuntimeError) {
        self.sink.report(Diagnostic {
            label: self.frame.label.clone(),
            line,
            message: error.to_string(),
        });
    }

    /// Runs `body` in the current frame. The body's scope is left on every
    /// exit path.
    pub(super) fn exec_body(&mut self, body: &Body) -> Result<Value> {
        trace!(label = %self.frame.label, "entering body");
        self.symbols.enter_scope();
        let result = self.exec_block(&body.block);
        let left = self.symbols.leave_scope();
        let signal = result?;
        left?;

        let value = match signal {
            ExecResult::Return(value) => value,
            ExecResult::Normal | ExecResult::Break | ExecResult::Continue | ExecResult::Stop => {
                Value::Null
            }
        };
        match self.frame.derived.take() {
            Some(cell) if value == Value::Null => Ok(cell.result),
            _ => Ok(value),
        }
    }

    fn call_body(&mut self, frame: Frame, body: &Body) -> Result<Value> {
        let caller = std::mem::replace(&mut self.frame, frame);
        let result = self.exec_body(body);
        self.frame = caller;
        result
    }

    pub(super) fn call(
        &mut self,
        action: &Action,
        receiver: Option<InstanceRef>,
        arguments: Arguments,
    ) -> Result<Value> {
        match action {
            Action::Oal { label, body } => {
                self.call_body(Frame::new(label, receiver, arguments), body)
            }
            Action::Native(native) => {
                Ok((**native)(&mut *self.domain, receiver.as_ref(), &arguments)?)
            }
        }
    }

    pub(super) fn call_derived(
        &mut self,
        action: &Action,
        instance: &InstanceRef,
        attribute: &str,
    ) -> Result<Value> {
        match action {
            Action::Oal { label, body } => self.call_body(
                Frame::derived_attribute(label, attribute, instance.clone()),
                body,
            ),
            Action::Native(native) => {
                Ok((**native)(&mut *self.domain, Some(instance), &Arguments::new())?)
            }
        }
    }

    fn exec_block(&mut self, block: &Block) -> Result<ExecResult> {
        self.symbols.enter_block()?;
        let result = self.exec_statements(&block.statements);
        self.symbols.leave_block()?;
        result
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> Result<ExecResult> {
        for statement in statements {
            match self.exec_statement(statement)? {
                ExecResult::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(ExecResult::Normal)
    }

    /// Recoverable failures are reported against the statement's line and the
    /// statement counts as done.
    fn exec_statement(&mut self, statement: &Statement) -> Result<ExecResult> {
        match self.exec_kind(&statement.kind) {
            Err(error) if error.is_recoverable() => {
                self.report(statement.position.line, &error);
                Ok(ExecResult::Normal)
            }
            result => result,
        }
    }

    fn exec_kind(&mut self, kind: &StatementKind) -> Result<ExecResult> {
        match kind {
            StatementKind::Break => return Ok(ExecResult::Break),
            StatementKind::Continue => return Ok(ExecResult::Continue),
            StatementKind::ControlStop => return Ok(ExecResult::Stop),
            StatementKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Null,
                };
                return Ok(ExecResult::Return(value));
            }
            StatementKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.place(target)?.set(self, value)?;
            }
            StatementKind::Invoke(invocation) => {
                self.eval(invocation)?;
            }
            StatementKind::CreateObject { variable, class } => {
                let instance = self.domain.new_instance(class)?;
                if let Some(variable) = variable {
                    self.symbols.install(variable, Value::Instance(instance))?;
                }
            }
            StatementKind::DeleteObject { variable } => {
                let instance = self.instance_variable(variable)?;
                self.domain.delete_instance(&instance)?;
            }
            StatementKind::Relate {
                from,
                to,
                relationship,
                using,
            } => {
                let from = self.instance_variable(from)?;
                let to = self.instance_variable(to)?;
                let phrase = relationship.phrase.as_deref();
                // The phrase names the `to` end, so both legs are read towards it.
                match using {
                    Some(link) => {
                        let link = self.instance_variable(link)?;
                        self.domain.relate(&from, &link, &relationship.id, phrase)?;
                        self.domain.relate(&link, &to, &relationship.id, phrase)?;
                    }
                    None => self.domain.relate(&from, &to, &relationship.id, phrase)?,
                }
            }
            StatementKind::Unrelate {
                from,
                to,
                relationship,
                using,
            } => {
                let from = self.instance_variable(from)?;
                let to = self.instance_variable(to)?;
                let phrase = relationship.phrase.as_deref();
                match using {
                    Some(link) => {
                        let link = self.instance_variable(link)?;
                        self.domain.unrelate(&from, &link, &relationship.id, phrase)?;
                        self.domain.unrelate(&link, &to, &relationship.id, phrase)?;
                    }
                    None => self.domain.unrelate(&from, &to, &relationship.id, phrase)?,
                }
            }
            StatementKind::SelectFrom {
                cardinality,
                variable,
                class,
                condition,
            } => {
                let candidates = if *cardinality == Cardinality::Many || condition.is_some() {
                    self.domain.select_many(class)?
                } else {
                    self.domain.select_one(class)?.into_iter().collect()
                };
                let selected = self.filter(candidates, condition.as_ref(), *cardinality)?;
                self.bind_selection(variable, *cardinality, selected)?;
            }
            StatementKind::SelectRelated {
                cardinality,
                variable,
                start,
                chain,
                condition,
            } => {
                let mut reached = self.navigation_start(start)?;
                for step in chain {
                    reached = self.navigate(&reached, step)?;
                }
                let selected = self.filter(reached, condition.as_ref(), *cardinality)?;
                self.bind_selection(variable, *cardinality, selected)?;
            }
            StatementKind::ForEach {
                variable,
                set,
                block,
            } => return self.exec_for_each(variable, set, block),
            StatementKind::While { condition, block } => {
                while self.eval(condition)?.is_truthy() {
                    match self.exec_block(block)? {
                        ExecResult::Normal | ExecResult::Continue => {}
                        ExecResult::Break => break,
                        signal => return Ok(signal),
                    }
                }
            }
            StatementKind::If {
                condition,
                then_block,
                elifs,
                else_block,
            } => return self.exec_if(condition, then_block, elifs, else_block.as_ref()),
            StatementKind::GenerateEvent { event, target } => {
                let event = self.build_event(event, target)?;
                self.domain.generate_event(event)?;
            }
            StatementKind::CreateEvent {
                variable,
                event,
                target,
            } => {
                let event = self.build_event(event, target)?;
                self.symbols.install(variable, Value::Event(event))?;
            }
            StatementKind::GeneratePrecreated { variable } => match self.read_variable(variable)? {
                Value::Event(event) => self.domain.generate_event(event)?,
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "event",
                        got: other.type_name(),
                    });
                }
            },
        }
        Ok(ExecResult::Normal)
    }

    fn exec_for_each(&mut self, variable: &str, set: &str, block: &Block) -> Result<ExecResult> {
        let value = self.read_variable(set)?;
        let items = value.instances().ok_or(RuntimeError::TypeMismatch {
            expected: "instance set",
            got: value.type_name(),
        })?;
        self.frame.loops.push(LoopCursor {
            set: set.to_string(),
            index: 0,
            len: items.len(),
        });
        let result = self.iterate(variable, items, block);
        self.frame.loops.pop();
        result
    }

    fn iterate(
        &mut self,
        variable: &str,
        items: Vec<InstanceRef>,
        block: &Block,
    ) -> Result<ExecResult> {
        for (index, item) in items.into_iter().enumerate() {
            if let Some(cursor) = self.frame.loops.last_mut() {
                cursor.index = index;
            }
            self.symbols.install(variable, Value::Instance(item))?;
            match self.exec_block(block)? {
                ExecResult::Normal | ExecResult::Continue => {}
                ExecResult::Break => break,
                signal => return Ok(signal),
            }
        }
        Ok(ExecResult::Normal)
    }

    fn exec_if(
        &mut self,
        condition: &Expression,
        then_block: &Block,
        elifs: &[ElifClause],
        else_block: Option<&Block>,
    ) -> Result<ExecResult> {
        if self.eval(condition)?.is_truthy() {
            return self.exec_block(then_block);
        }
        for elif in elifs {
            if self.eval(&elif.condition)?.is_truthy() {
                return self.exec_block(&elif.block);
            }
        }
        match else_block {
            Some(block) => self.exec_block(block),
            None => Ok(ExecResult::Normal),
        }
    }

    /// Applies a where clause: the condition is evaluated once per candidate,
    /// in order, in its own block with `selected` bound to the candidate.
    fn filter(
        &mut self,
        mut candidates: Vec<InstanceRef>,
        condition: Option<&Expression>,
        cardinality: Cardinality,
    ) -> Result<Vec<InstanceRef>> {
        let single = cardinality != Cardinality::Many;
        let Some(condition) = condition else {
            if single {
                candidates.truncate(1);
            }
            return Ok(candidates);
        };

        let mut selected = Vec::new();
        for candidate in candidates {
            self.symbols.enter_block()?;
            self.frame.selected.push(candidate.clone());
            let value = self.eval(condition);
            self.frame.selected.pop();
            self.symbols.leave_block()?;
            if value?.is_truthy() {
                selected.push(candidate);
                if single {
                    break;
                }
            }
        }
        Ok(selected)
    }

    fn bind_selection(
        &mut self,
        variable: &str,
        cardinality: Cardinality,
        mut selected: Vec<InstanceRef>,
    ) -> Result<()> {
        let value = match cardinality {
            Cardinality::Many => Value::Set(selected),
            Cardinality::One | Cardinality::Any if selected.is_empty() => Value::Null,
            Cardinality::One | Cardinality::Any => Value::Instance(selected.swap_remove(0)),
        };
        Ok(self.symbols.install(variable, value)?)
    }

    fn navigation_start(&mut self, start: &NavigationStart) -> Result<Vec<InstanceRef>> {
        match start {
            NavigationStart::SelfRef => Ok(vec![self.receiver()?]),
            NavigationStart::Selected => Ok(vec![self.selected()?]),
            NavigationStart::Variable(name) => {
                let value = self.read_variable(name)?;
                value.instances().ok_or(RuntimeError::TypeMismatch {
                    expected: "instance or instance set",
                    got: value.type_name(),
                })
            }
        }
    }

    /// One hop from every instance in `from`; duplicates keep their first position.
    fn navigate(&mut self, from: &[InstanceRef], step: &NavigationStep) -> Result<Vec<InstanceRef>> {
        let mut seen = HashSet::new();
        let mut reached = Vec::new();
        for instance in from {
            let next = self.domain.navigate(
                instance,
                &step.class,
                &step.relationship.id,
                step.relationship.phrase.as_deref(),
            )?;
            for instance in next {
                if seen.insert(instance.clone()) {
                    reached.push(instance);
                }
            }
        }
        Ok(reached)
    }

    fn build_event(&mut self, spec: &EventSpec, target: &EventTarget) -> Result<Event> {
        let arguments = self.eval_arguments(&spec.arguments)?;
        let recipient = match target {
            EventTarget::Class(class) => EventRecipient::Class(class.clone()),
            EventTarget::Creator(class) => EventRecipient::Creator(class.clone()),
            EventTarget::Instance(expression) => {
                EventRecipient::Instance(self.eval_instance(expression)?)
            }
        };
        Ok(Event {
            label: spec.label.clone(),
            meaning: spec.meaning.clone(),
            arguments,
            recipient,
        })
    }

    /// Evaluates `expression`. Domain failures are reported at this node and
    /// read as null.
    pub(super) fn eval(&mut self, expression: &Expression) -> Result<Value> {
        match self.eval_kind(expression) {
            Err(error @ RuntimeError::Domain(_)) => {
                self.report(expression.position.line, &error);
                Ok(Value::Null)
            }
            result => result,
        }
    }

    fn eval_kind(&mut self, expression: &Expression) -> Result<Value> {
        match &expression.kind {
            ExpressionKind::Integer(value) => Ok(Value::Integer(*value)),
            ExpressionKind::Real(value) => Ok(Value::Real(*value)),
            ExpressionKind::String(value) => Ok(Value::String(value.clone())),
            ExpressionKind::Boolean(value) => Ok(Value::Boolean(*value)),
            ExpressionKind::Enumerator { enumeration, name } => {
                Ok(self.domain.enumerator(enumeration, name)?)
            }
            ExpressionKind::SelfRef => self.receiver().map(Value::Instance),
            ExpressionKind::Selected => self.selected().map(Value::Instance),
            ExpressionKind::Param { name, .. } => {
                self.frame
                    .arguments
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownParameter { name: name.clone() })
            }
            ExpressionKind::Variable(_)
            | ExpressionKind::Field { .. }
            | ExpressionKind::Index { .. } => self.place(expression)?.get(self),
            ExpressionKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExpressionKind::Binary { left, op, right } => {
                // Both sides always run, `and`/`or` included.
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            ExpressionKind::Invoke(invocation) => self.invoke(invocation),
        }
    }

    /// Resolves an expression to the cell it denotes. Expressions that do not
    /// name storage become read-only constants.
    pub(super) fn place(&mut self, expression: &Expression) -> Result<Place> {
        match &expression.kind {
            ExpressionKind::Variable(name) => Ok(Place::Variable(name.clone())),
            ExpressionKind::Field { target, name } => {
                let redirected = matches!(target.kind, ExpressionKind::SelfRef)
                    && self
                        .frame
                        .derived
                        .as_ref()
                        .is_some_and(|cell| cell.attribute == *name);
                if redirected {
                    return Ok(Place::Derived);
                }
                let instance = self.eval_instance(target)?;
                Ok(Place::Field {
                    instance,
                    name: name.clone(),
                })
            }
            ExpressionKind::Index { target, index } => {
                let base = self.place(target)?;
                let index = match self.eval(index)? {
                    Value::Integer(index) if index < 0 => {
                        return Err(RuntimeError::NegativeIndex { index });
                    }
                    Value::Integer(index) => usize::try_from(index)
                        .map_err(|_| RuntimeError::IndexOutOfRange { index: usize::MAX })?,
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "integer",
                            got: other.type_name(),
                        });
                    }
                };
                Ok(Place::Index {
                    base: Box::new(base),
                    index,
                })
            }
            _ => Ok(Place::Value(self.eval(expression)?)),
        }
    }

    fn eval_unary(&mut self, op: UnaryOperator, operand: &Expression) -> Result<Value> {
        match op {
            UnaryOperator::First => self.loop_position(operand, true),
            UnaryOperator::Last => self.loop_position(operand, false),
            UnaryOperator::Minus => match self.eval(operand)? {
                Value::Integer(value) => value
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or(RuntimeError::Overflow { operator: "-" }),
                Value::Real(value) => Ok(Value::Real(-value)),
                other => Err(RuntimeError::InvalidOperand {
                    operator: "-",
                    operand: other.type_name(),
                }),
            },
            UnaryOperator::Plus => match self.eval(operand)? {
                value @ (Value::Integer(_) | Value::Real(_)) => Ok(value),
                other => Err(RuntimeError::InvalidOperand {
                    operator: "+",
                    operand: other.type_name(),
                }),
            },
            UnaryOperator::Not | UnaryOperator::Empty => {
                Ok(Value::Boolean(!self.eval(operand)?.is_truthy()))
            }
            UnaryOperator::NotEmpty => Ok(Value::Boolean(self.eval(operand)?.is_truthy())),
            UnaryOperator::Cardinality => {
                let value = self.eval(operand)?;
                Ok(Value::Integer(self.domain.cardinality(&value)))
            }
        }
    }

    /// `first S` / `last S` against the innermost loop over set variable `S`.
    fn loop_position(&self, operand: &Expression, first: bool) -> Result<Value> {
        let operator = if first { "first" } else { "last" };
        let ExpressionKind::Variable(set) = &operand.kind else {
            return Err(RuntimeError::Unsupported(format!(
                "'{operator}' needs a set variable, got '{}'",
                operand.position.text
            )));
        };
        let cursor = self
            .frame
            .loops
            .iter()
            .rev()
            .find(|cursor| cursor.set == *set)
            .ok_or_else(|| RuntimeError::NoLoop {
                operator,
                set: set.clone(),
            })?;
        Ok(Value::Boolean(if first {
            cursor.index == 0
        } else {
            cursor.index + 1 == cursor.len
        }))
    }

    fn invoke(&mut self, invocation: &Invocation) -> Result<Value> {
        let name = invocation.name.as_str();
        let (action, receiver) = match &invocation.kind {
            InvocationKind::Function => (self.domain.find_function(name)?, None),
            InvocationKind::Implicit { namespace } => match self.domain.find_symbol(namespace) {
                Ok(Symbol::Class(_)) => (self.domain.find_class_operation(namespace, name)?, None),
                _ => (self.domain.find_bridge_operation(namespace, name)?, None),
            },
            InvocationKind::Bridge { entity } => {
                (self.domain.find_bridge_operation(entity, name)?, None)
            }
            InvocationKind::Class { class } => {
                (self.domain.find_class_operation(class, name)?, None)
            }
            InvocationKind::Port { port } => (self.domain.find_port_operation(port, name)?, None),
            InvocationKind::Instance { target } => {
                let instance = self.eval_instance(target)?;
                let action = self.domain.find_instance_operation(&instance, name)?;
                (action, Some(instance))
            }
        };
        let arguments = self.eval_arguments(&invocation.arguments)?;
        trace!(callee = name, ?action, "invoking");
        self.call(&action, receiver, arguments)
    }

    fn eval_arguments(&mut self, arguments: &[Argument]) -> Result<Arguments> {
        let mut evaluated = Arguments::new();
        for argument in arguments {
            let value = self.eval(&argument.value)?;
            evaluated.insert(argument.name.clone(), value);
        }
        Ok(evaluated)
    }

    pub(super) fn read_variable(&self, name: &str) -> Result<Value> {
        Ok(self.symbols.resolve(name, &*self.domain)?)
    }

    fn instance_variable(&self, name: &str) -> Result<InstanceRef> {
        expect_instance(self.read_variable(name)?)
    }

    fn eval_instance(&mut self, expression: &Expression) -> Result<InstanceRef> {
        expect_instance(self.eval(expression)?)
    }

    fn receiver(&self) -> Result<InstanceRef> {
        self.frame.receiver.clone().ok_or(RuntimeError::NoSelf)
    }

    fn selected(&self) -> Result<InstanceRef> {
        self.frame
            .selected
            .last()
            .cloned()
            .ok_or(RuntimeError::NoSelected)
    }
}

fn expect_instance(value: Value) -> Result<InstanceRef> {
    match value {
        Value::Instance(instance) => Ok(instance),
        other => Err(RuntimeError::TypeMismatch {
            expected: "instance",
            got: other.type_name(),
        }),
    }
}

fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOperator::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinaryOperator::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinaryOperator::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
        BinaryOperator::Less
        | BinaryOperator::LessEq
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEq => compare(op, &left, &right),
        BinaryOperator::Add
        | BinaryOperator::Sub
        | BinaryOperator::Mul
        | BinaryOperator::Div
        | BinaryOperator::Rem => arithmetic(op, left, right),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(integer), Value::Real(real))
        | (Value::Real(real), Value::Integer(integer)) => *integer as f64 == *real,
        _ => left == right,
    }
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    let ordering = match (left, right) {
        (Value::Integer(left), Value::Integer(right)) => Some(left.cmp(right)),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => match (left.as_real(), right.as_real()) {
            (Some(left), Some(right)) => left.partial_cmp(&right),
            _ => return Err(invalid_operands(op, left, right)),
        },
    };
    let holds = ordering.is_some_and(|ordering| match op {
        BinaryOperator::Less => ordering == Ordering::Less,
        BinaryOperator::LessEq => ordering != Ordering::Greater,
        BinaryOperator::Greater => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    });
    Ok(Value::Boolean(holds))
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Integer(left), Value::Integer(right)) => integer_arithmetic(op, left, right),
        (Value::String(left), Value::String(right)) if op == BinaryOperator::Add => {
            Ok(Value::String(left + &right))
        }
        (left, right) => match (left.as_real(), right.as_real()) {
            (Some(left), Some(right)) => real_arithmetic(op, left, right),
            _ => Err(invalid_operands(op, &left, &right)),
        },
    }
}

fn integer_arithmetic(op: BinaryOperator, left: i64, right: i64) -> Result<Value> {
    let result = match op {
        BinaryOperator::Add => left.checked_add(right),
        BinaryOperator::Sub => left.checked_sub(right),
        BinaryOperator::Mul => left.checked_mul(right),
        BinaryOperator::Div | BinaryOperator::Rem if right == 0 => {
            return Err(RuntimeError::DivisionByZero);
        }
        BinaryOperator::Div => left.checked_div(right),
        BinaryOperator::Rem => left.checked_rem(right),
        other => return Err(RuntimeError::Unsupported(format!("operator '{}'", other.symbol()))),
    };
    result.map(Value::Integer).ok_or(RuntimeError::Overflow {
        operator: op.symbol(),
    })
}

fn real_arithmetic(op: BinaryOperator, left: f64, right: f64) -> Result<Value> {
    let result = match op {
        BinaryOperator::Add => left + right,
        BinaryOperator::Sub => left - right,
        BinaryOperator::Mul => left * right,
        BinaryOperator::Div | BinaryOperator::Rem if right == 0.0 => {
            return Err(RuntimeError::DivisionByZero);
        }
        BinaryOperator::Div => left / right,
        BinaryOperator::Rem => left % right,
        other => return Err(RuntimeError::Unsupported(format!("operator '{}'", other.symbol()))),
    };
    Ok(Value::Real(result))
}

fn invalid_operands(op: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::InvalidOperands {
        operator: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}
