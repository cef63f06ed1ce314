use std::fmt;

use tracing::error;

/// A positioned message about one action body, rendered `<label>:<line>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub label: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.label, self.line, self.message)
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        error!(target: "oal", "{diagnostic}");
    }
}

#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Rendered diagnostics, one per line.
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(Diagnostic::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_label_line_and_message() {
        let mut sink = CollectingSink::new();
        sink.report(Diagnostic {
            label: "Order.ship".to_string(),
            line: 4,
            message: "unknown class 'Crate'".to_string(),
        });
        sink.report(Diagnostic {
            label: "main".to_string(),
            line: 1,
            message: "division by zero".to_string(),
        });
        assert_eq!(
            sink.render(),
            "Order.ship:4: unknown class 'Crate'\nmain:1: division by zero"
        );
    }
}
