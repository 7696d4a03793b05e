//! Bind-time errors (`spec.md` §4.4), distinct from runtime [`Exception`]s
//! (`crate::exception`): a `BindError` means the program is malformed and
//! is reported before any statement ever executes, never caught by a
//! script-level `try`/`catch`.

use std::fmt;

/// A static error discovered while binding a [`crate::statement::Block`]:
/// an undeclared identifier, a reserved name used as a declaration, or a
/// duplicate `default` clause in a `switch`.
#[derive(Debug, Clone)]
pub struct BindError {
    message: String,
}

impl BindError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind error: {}", self.message)
    }
}

impl std::error::Error for BindError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_with_a_bind_error_prefix() {
        let err = BindError::new("undeclared identifier `x`");
        assert_eq!(err.to_string(), "bind error: undeclared identifier `x`");
    }
}
