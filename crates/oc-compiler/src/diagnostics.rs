//! Error taxonomy and diagnostic rendering for the semantic analyzer.
//!
//! Unlike the teacher's `Diagnostics` collector, analysis here aborts at the
//! first semantic error rather than accumulating a batch: every fallible
//! analyzer function returns `Result<T, Located<SemanticError>>`, and the
//! first `Err` short-circuits the whole pass. `Severity` still exists for
//! the one ambient warning the cleanup passes can plausibly want to note
//! without making the build fail, `DuplicateConstructorSignature` siblings
//! aside; nothing in this compiler currently emits `Severity::Warning`.

use oc_core::{Position, Span};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// The closed set of ways semantic analysis can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    #[error("duplicate class '{0}'")]
    DuplicateClass(String),
    #[error("class '{1}' extends unknown base class '{0}'")]
    UnknownBase(String, String),
    #[error("inheritance cycle or unresolved base among: {}", .0.join(", "))]
    InheritanceCycleOrUnresolved(Vec<String>),
    #[error("duplicate field '{0}' in class '{1}'")]
    DuplicateField(String, String),
    #[error("duplicate forward declaration of method '{0}'")]
    DuplicateForwardDeclaration(String),
    #[error("duplicate implementation of method '{0}'")]
    DuplicateImplementation(String),
    #[error("return type of '{0}' does not match its forward declaration")]
    ReturnTypeMismatchBetweenDeclarations(String),
    #[error("duplicate constructor signature in class '{0}'")]
    DuplicateConstructorSignature(String),
    #[error("implementation of '{0}' does not match any declared signature")]
    SignatureNotDeclared(String),
    #[error("undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),
    #[error("type '{0}' is not declared")]
    TypeNotDeclared(String),
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    #[error("method '{0}' is not declared on class '{1}'")]
    MethodNotDeclared(String, String),
    #[error("no overload of '{0}' matches the given arguments")]
    NoMatchingOverload(String),
    #[error("expected {expected} argument(s), found {found}")]
    ArgumentCountMismatch { expected: usize, found: usize },
    #[error("expected type '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },
    #[error("'{0}' cannot be initialized from a void expression")]
    VoidInitializer(String),
    #[error("'{0}' has void type and cannot be an assignment target")]
    VoidAssignmentTarget(String),
    #[error("return statement outside of a method body")]
    ReturnOutsideMethod,
    #[error("method is declared void but returns a value")]
    ReturnValueInVoid,
    #[error("missing return value in non-void method")]
    MissingReturnValue,
    #[error("expression-bodied method '{0}' must declare a return type")]
    ExpressionBodyWithoutReturnType(String),
    #[error("duplicate variable '{0}' in this scope")]
    DuplicateVariable(String),
    #[error("unsupported expression used as an assignment target")]
    UnsupportedExpressionTarget,
}

/// A `SemanticError` pinned to the AST node that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<E> {
    pub error: E,
    pub span: Span,
}

impl<E> Located<E> {
    pub fn new(error: E, span: Span) -> Self {
        Self { error, span }
    }
}

impl<E: fmt::Display> fmt::Display for Located<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.error, self.span)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Located<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub type SemanticResult<T> = Result<T, Located<SemanticError>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_error_displays_message_and_position() {
        let err = Located::new(
            SemanticError::UndeclaredIdentifier("x".to_string()),
            Span::new(Position::start(), Position::start()),
        );
        assert_eq!(err.to_string(), "undeclared identifier 'x' at 1:1");
    }
}
