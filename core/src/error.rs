//! Error taxonomy and diagnostics for phil processing.
//!
//! Parsing and fetching default to *collecting* mode: every problem found in
//! a pass is gathered into a list of [`Diagnostic`]s and reported together.
//! Strict mode switches to fail-fast with a single [`PhilError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::PhilPath;
use crate::types::SourceLocation;

/// Errors raised while parsing, merging, or re-validating phil trees.
///
/// Every variant is attributed to a path and/or source location when one is
/// available.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PhilError {
    /// Malformed source text.
    #[error("syntax error: {message}{}", location.where_str())]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// A value failed validation against its declared type.
    #[error("{path}: expected {expected} value, got \"{value}\"{}", location.where_str())]
    Type {
        path: PhilPath,
        expected: String,
        value: String,
        location: SourceLocation,
    },

    /// Reference to a path that does not exist in the target tree.
    #[error("unknown parameter: {path}")]
    Path { path: PhilPath },

    /// A partial path matched more than one parameter.
    #[error("ambiguous parameter \"{given}\" (matches {})", candidates.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", "))]
    AmbiguousPath {
        given: String,
        candidates: Vec<PhilPath>,
    },

    /// A `single`-cardinality name was repeated, or repeatable instances
    /// disagreed with their template shape.
    #[error("{path}: {message}{}", location.where_str())]
    Multiplicity {
        path: PhilPath,
        message: String,
        location: SourceLocation,
    },
}

impl PhilError {
    /// Creates a syntax error at a location.
    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        PhilError::Syntax {
            message: message.into(),
            location,
        }
    }

    /// Creates a type error with no path attribution yet.
    pub fn type_error(
        expected: impl Into<String>,
        value: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        PhilError::Type {
            path: PhilPath::root(),
            expected: expected.into(),
            value: value.into(),
            location,
        }
    }

    /// Attributes the error to a path, replacing any placeholder.
    ///
    /// Type handlers do not know where a definition lives in the tree, so
    /// they raise with an empty path and the merge engine fills it in.
    pub fn with_path(self, path: PhilPath) -> Self {
        match self {
            PhilError::Type {
                expected,
                value,
                location,
                ..
            } => PhilError::Type {
                path,
                expected,
                value,
                location,
            },
            PhilError::Multiplicity {
                message, location, ..
            } => PhilError::Multiplicity {
                path,
                message,
                location,
            },
            other => other,
        }
    }
}

/// Convenience alias for results with [`PhilError`].
pub type Result<T> = std::result::Result<T, PhilError>;

/// How serious a collected diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Surfaced but does not block the operation.
    Warning,
    /// Would have been a hard failure in strict mode.
    Error,
}

/// A single collected problem, surfaced without aborting the pass.
///
/// # Examples
///
/// ```
/// use phil_core::{Diagnostic, PhilPath, Severity};
///
/// let d = Diagnostic::warning("parameter is deprecated")
///     .at_path(PhilPath::new("old.flag"));
/// assert_eq!(d.severity, Severity::Warning);
/// assert_eq!(d.to_string(), "warning: old.flag: parameter is deprecated");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PhilPath>,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a warning-severity diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            path: None,
        }
    }

    /// Wraps a hard error as an error-severity diagnostic.
    pub fn from_error(error: &PhilError) -> Self {
        Self::error(error.to_string())
    }

    /// Creates the standard deprecation warning for a parameter.
    pub fn deprecated(path: PhilPath) -> Self {
        Self::warning("parameter is deprecated and will be removed").at_path(path)
    }

    /// Attributes the diagnostic to a path.
    pub fn at_path(mut self, path: PhilPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Returns `true` for error-severity diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.path {
            Some(path) => write!(f, "{tag}: {path}: {}", self.message),
            None => write!(f, "{tag}: {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_message_carries_path_and_location() {
        let err = PhilError::type_error("int", "abc", SourceLocation::new("cmd.phil", 4, 1))
            .with_path(PhilPath::new("scope.count"));
        assert_eq!(
            err.to_string(),
            "scope.count: expected int value, got \"abc\" (cmd.phil, line 4)"
        );
    }

    #[test]
    fn test_ambiguous_path_lists_candidates() {
        let err = PhilError::AmbiguousPath {
            given: "foo.name".to_string(),
            candidates: vec![PhilPath::new("x.foo.name"), PhilPath::new("y.foo.name")],
        };
        let message = err.to_string();
        assert!(message.contains("x.foo.name"));
        assert!(message.contains("y.foo.name"));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error("unknown parameter").at_path(PhilPath::new("z.unknown"));
        assert_eq!(d.to_string(), "error: z.unknown: unknown parameter");
        assert!(d.is_error());
    }
}
