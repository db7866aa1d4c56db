//! Error types for schema compilation

use thiserror::Error;

/// Result type for schema compilation
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Build-time schema errors.
///
/// Every variant is a `SchemaError`; [`SchemaError::kind`] exposes which
/// family it belongs to so callers can match broadly or specifically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Malformed or incomplete schema structure
    #[error("Schema error: {0}")]
    Schema(String),

    /// Unsupported or missing type information
    #[error("Type error: {0}")]
    Type(String),

    /// Malformed allOf/anyOf/oneOf usage
    #[error("Combiner error: {0}")]
    Combiner(String),

    /// Bad, non-local or circular `$ref`
    #[error("Reference error: {0}")]
    Reference(String),
}

/// The family a [`SchemaError`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Schema,
    Type,
    Combiner,
    Reference,
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::Schema,
            Self::Type(_) => ErrorKind::Type,
            Self::Combiner(_) => ErrorKind::Combiner,
            Self::Reference(_) => ErrorKind::Reference,
        }
    }

    /// The message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Schema(m) | Self::Type(m) | Self::Combiner(m) | Self::Reference(m) => m,
        }
    }

    /// Append the location of the offending node to the message
    pub fn at(self, pointer: &str) -> Self {
        let locate = |m: String| format!("{} at {}", m, pointer);
        match self {
            Self::Schema(m) => Self::Schema(locate(m)),
            Self::Type(m) => Self::Type(locate(m)),
            Self::Combiner(m) => Self::Combiner(locate(m)),
            Self::Reference(m) => Self::Reference(locate(m)),
        }
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn combiner(msg: impl Into<String>) -> Self {
        Self::Combiner(msg.into())
    }

    pub(crate) fn reference(msg: impl Into<String>) -> Self {
        Self::Reference(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_message() {
        let err = SchemaError::reference("Circular reference detected: #/definitions/a");
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.message(), "Circular reference detected: #/definitions/a");
        assert!(err.to_string().starts_with("Reference error:"));
    }

    #[test]
    fn test_at_keeps_kind() {
        let err = SchemaError::type_error("Unsupported type: 'tuple'").at("#/properties/x");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message(), "Unsupported type: 'tuple' at #/properties/x");
    }
}
