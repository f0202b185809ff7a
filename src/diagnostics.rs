use std::fmt::{Display, Formatter};

use crate::error::Error;

/// A recorded failure. Lowering has no source positions to offer, so its
/// diagnostics sit at `0:0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub error: Error,
}

impl Diagnostic {
    pub fn new(line: usize, column: usize, error: Error) -> Self {
        Self {
            line,
            column,
            error,
        }
    }

    pub fn unpositioned(error: Error) -> Self {
        Self::new(0, 0, error)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.error)
    }
}

/// Append-only sink for parse and lowering failures.
pub trait Diagnostics {
    fn record(&mut self, diagnostic: Diagnostic);
}

impl Diagnostics for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "recorded");
        self.push(diagnostic);
    }
}
