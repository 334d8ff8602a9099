//! Compilation errors.
//!
//! Every variant is fatal: it describes a mistake in how a predicate was
//! constructed, never a transient condition, so callers should surface it
//! instead of retrying.

/// A fatal predicate compilation failure, carrying the reason and a rendering
/// of the offending subtree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("unsupported construct: {reason} in `{subtree}`")]
    UnsupportedConstruct { reason: String, subtree: String },

    #[error("expression is not constant-foldable: {reason} in `{subtree}`")]
    NonConstantFoldable { reason: String, subtree: String },

    #[error("invalid comparison shape: {reason} in `{subtree}`")]
    InvalidComparisonShape { reason: String, subtree: String },

    #[error("unknown field '{subtree}': {reason}")]
    UnresolvedField { reason: String, subtree: String },

    #[error("unsupported value for {reason}: `{subtree}`")]
    UnsupportedBackendValue { reason: String, subtree: String },
}

impl CompileError {
    pub fn unsupported(reason: impl Into<String>, subtree: impl ToString) -> Self {
        Self::UnsupportedConstruct {
            reason: reason.into(),
            subtree: subtree.to_string(),
        }
    }

    pub fn non_constant(reason: impl Into<String>, subtree: impl ToString) -> Self {
        Self::NonConstantFoldable {
            reason: reason.into(),
            subtree: subtree.to_string(),
        }
    }

    pub fn invalid_shape(reason: impl Into<String>, subtree: impl ToString) -> Self {
        Self::InvalidComparisonShape {
            reason: reason.into(),
            subtree: subtree.to_string(),
        }
    }

    pub fn unresolved_field(record_type: &str, property: &str) -> Self {
        Self::UnresolvedField {
            reason: format!("no storage mapping on record type '{record_type}'"),
            subtree: property.to_string(),
        }
    }

    pub fn backend_value(backend: &str, subtree: impl ToString) -> Self {
        Self::UnsupportedBackendValue {
            reason: backend.to_string(),
            subtree: subtree.to_string(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::UnsupportedConstruct { reason, .. }
            | Self::NonConstantFoldable { reason, .. }
            | Self::InvalidComparisonShape { reason, .. }
            | Self::UnresolvedField { reason, .. }
            | Self::UnsupportedBackendValue { reason, .. } => reason,
        }
    }

    /// Rendering of the subtree (or property name) the error refers to.
    pub fn subtree(&self) -> &str {
        match self {
            Self::UnsupportedConstruct { subtree, .. }
            | Self::NonConstantFoldable { subtree, .. }
            | Self::InvalidComparisonShape { subtree, .. }
            | Self::UnresolvedField { subtree, .. }
            | Self::UnsupportedBackendValue { subtree, .. } => subtree,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_field_message_carries_property() {
        let err = CompileError::unresolved_field("Person", "Nickname");
        assert_eq!(err.subtree(), "Nickname");
        assert!(err.to_string().contains("Nickname"));
        assert!(err.reason().contains("Person"));
    }
}
