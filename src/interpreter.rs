//! Tree-walking evaluation of parsed bodies against a [`Domain`].
//!
//! There are three call contexts: plain functions, operations (with a
//! receiver bound to `self`) and derived attributes (where assigning to
//! `self.<attr>` sets the result). Each entry point returns the body's value
//! and never fails: failures are reported to the [`DiagnosticSink`] and the
//! result is null.

use tracing::debug;

use crate::ast::Body;
use crate::diagnostics::DiagnosticSink;
use crate::domain::{Action, Arguments, Domain, InstanceRef};
use crate::value::Value;

pub mod error;
mod place;
mod runtime;

pub use error::RuntimeError;

use runtime::{Frame, Runtime};

pub fn run_function(
    domain: &mut dyn Domain,
    label: &str,
    body: &Body,
    arguments: Arguments,
    sink: &mut dyn DiagnosticSink,
) -> Value {
    run(domain, sink, Frame::new(label, None, arguments), body)
}

pub fn run_operation(
    domain: &mut dyn Domain,
    label: &str,
    body: &Body,
    arguments: Arguments,
    receiver: &InstanceRef,
    sink: &mut dyn DiagnosticSink,
) -> Value {
    let frame = Frame::new(label, Some(receiver.clone()), arguments);
    run(domain, sink, frame, body)
}

/// Computes `attribute` of `receiver`. The value is whatever the body assigns
/// to `self.<attribute>`, unless it returns something non-null.
pub fn run_derived_attribute(
    domain: &mut dyn Domain,
    label: &str,
    body: &Body,
    attribute: &str,
    receiver: &InstanceRef,
    sink: &mut dyn DiagnosticSink,
) -> Value {
    let frame = Frame::derived_attribute(label, attribute, receiver.clone());
    run(domain, sink, frame, body)
}

/// Invokes a resolved action, OAL or native.
pub fn call_action(
    domain: &mut dyn Domain,
    action: &Action,
    receiver: Option<&InstanceRef>,
    arguments: Arguments,
    sink: &mut dyn DiagnosticSink,
) -> Value {
    let label = match action {
        Action::Oal { label, .. } => label.as_str(),
        Action::Native(_) => "<native>",
    };
    let mut runtime = Runtime::new(domain, sink, Frame::new(label, None, Arguments::new()));
    let result = runtime.call(action, receiver.cloned(), arguments);
    settle(&mut runtime, 0, result)
}

fn run(
    domain: &mut dyn Domain,
    sink: &mut dyn DiagnosticSink,
    frame: Frame,
    body: &Body,
) -> Value {
    let mut runtime = Runtime::new(domain, sink, frame);
    let result = runtime.exec_body(body);
    settle(&mut runtime, body.position.line, result)
}

fn settle(runtime: &mut Runtime<'_>, line: usize, result: Result<Value, RuntimeError>) -> Value {
    match result {
        Ok(value) => {
            debug!(%value, "body finished");
            value
        }
        Err(error) => {
            runtime.report(line, &error);
            Value::Null
        }
    }
}
