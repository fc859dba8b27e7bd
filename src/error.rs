//! Error types for declaration and synthesis

use std::fmt;

use thiserror::Error;

use crate::validate::FieldPath;

/// Result type for synthesis operations
pub type Result<T> = std::result::Result<T, SynthError>;

/// Errors raised by declarations, references and document emission
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Schema violation: {0}")]
    SchemaViolation(ValidationError),

    #[error("Cross-field violation: {0}")]
    CrossFieldViolation(ValidationError),

    #[error("Duplicate declaration: {resource_type}.{name} already declared in scope '{scope}'")]
    DuplicateDeclaration {
        scope: String,
        resource_type: String,
        name: String,
    },

    #[error("Unknown reference target: {resource_type}.{name} (field '{field}') is not declared in scope '{scope}'")]
    UnknownReferenceTarget {
        scope: String,
        resource_type: String,
        name: String,
        field: String,
    },

    #[error("Unknown output: {resource_type}.{name} has no output or attribute '{field}'")]
    UnknownOutput {
        resource_type: String,
        name: String,
        field: String,
    },

    #[error("Unsupported destination: scope '{scope}' does not export '{output}'")]
    UnsupportedDestination { scope: String, output: String },

    #[error("Unknown provider: no '{kind}' provider bound with alias '{alias}'")]
    UnknownProvider { kind: String, alias: String },

    #[error("Invalid provider binding: {0}")]
    InvalidProviderBinding(String),

    #[error("Invalid version constraint: {0}")]
    InvalidVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthError {
    /// The validation error carried by a schema or cross-field violation
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            SynthError::SchemaViolation(e) | SynthError::CrossFieldViolation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for SynthError {
    fn from(err: ValidationError) -> Self {
        if err.violation.is_cross_field() {
            SynthError::CrossFieldViolation(err)
        } else {
            SynthError::SchemaViolation(err)
        }
    }
}

/// The constraint a value failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Required field absent or null
    Required,
    /// Key not declared by a closed schema
    UnknownField,
    /// Value has the wrong shape
    Type { expected: String },
    /// String did not match a pattern
    Pattern { pattern: String },
    /// Number outside an inclusive range
    Range,
    /// String length outside bounds
    Length,
    /// Collection size outside bounds
    Size,
    /// Value not one of the allowed literals
    Enum { allowed: Vec<String> },
    /// Map key did not match the key pattern
    KeyPattern { pattern: String },
    /// Tagged union matched zero or several variants
    Variant,
    /// Resource or output name is not an identifier
    Name,
    /// `field` set without `companion`
    Requires { companion: String },
    /// More than one of the fields set
    MutuallyExclusive { fields: Vec<String> },
    /// Not exactly one of the fields set
    ExactlyOneOf { fields: Vec<String> },
    /// None of the fields set
    AtLeastOneOf { fields: Vec<String> },
    /// Named custom invariant failed
    Invariant { name: String },
}

impl Violation {
    /// Whether this violation comes from a sibling-field invariant
    pub fn is_cross_field(&self) -> bool {
        matches!(
            self,
            Violation::Requires { .. }
                | Violation::MutuallyExclusive { .. }
                | Violation::ExactlyOneOf { .. }
                | Violation::AtLeastOneOf { .. }
                | Violation::Invariant { .. }
        )
    }
}

/// A single validation failure with its full field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: FieldPath,
    pub violation: Violation,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: FieldPath, violation: Violation, message: impl Into<String>) -> Self {
        Self {
            path,
            violation,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_field_routing() {
        let err = ValidationError::new(
            FieldPath::root().field("csr"),
            Violation::MutuallyExclusive {
                fields: vec!["csr".into(), "certificate_pem".into()],
            },
            "fields are mutually exclusive",
        );
        assert!(matches!(SynthError::from(err), SynthError::CrossFieldViolation(_)));

        let err = ValidationError::new(FieldPath::root().field("port"), Violation::Range, "out of range");
        assert!(matches!(SynthError::from(err), SynthError::SchemaViolation(_)));
    }

    #[test]
    fn test_display_includes_path() {
        let err = ValidationError::new(
            FieldPath::root().field("ingress").index(0).field("from_port"),
            Violation::Required,
            "missing required field",
        );
        assert_eq!(err.to_string(), "ingress[0].from_port: missing required field");
    }
}
