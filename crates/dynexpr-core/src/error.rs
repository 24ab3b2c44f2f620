//! Translation failures.
//!
//! Every variant signals a defect at the call site (wrong property, wrong
//! operation, missing configuration). They abort the compilation in progress
//! and are never retried; the context that produced them must be discarded.

use dynexpr_model::{KeyRole, MetadataError};

/// Boxed error returned by pluggable encoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while compiling an expression.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    /// A logical property has no metadata mapping.
    #[error("property '{property}' is not mapped on entity '{entity}'")]
    UnmappedProperty {
        /// Entity (table) name, or `<untyped>` when no metadata is attached.
        entity: String,
        /// Logical property name.
        property: String,
    },
    /// A non-key property was used where only key attributes are allowed.
    #[error("invalid key condition on '{property}': {reason}")]
    InvalidKeyExpression {
        /// Logical property name.
        property: String,
        /// Explanation.
        reason: String,
    },
    /// An update targets a key attribute.
    #[error("cannot update '{property}': it is the {role} key")]
    InvalidUpdateOperation {
        /// Logical property name.
        property: String,
        /// Key role of the property.
        role: KeyRole,
    },
    /// An operator, method, node or format reference the compiler does not handle.
    #[error("unsupported {kind}: {detail}")]
    UnsupportedExpression {
        /// Node kind, method name or construct.
        kind: String,
        /// Explanation.
        detail: String,
    },
    /// An encrypted property was given a value but no encryptor is registered.
    #[error("property '{property}' is encrypted but no field encryptor is configured")]
    EncryptionRequired {
        /// Logical property name.
        property: String,
    },
    /// A placeholder token was bound twice to different values.
    #[error("placeholder {token} is already bound to {existing}, cannot rebind to {attempted}")]
    PlaceholderConflict {
        /// The placeholder token.
        token: String,
        /// Existing binding.
        existing: String,
        /// Rejected binding.
        attempted: String,
    },
    /// A registered encryptor or geo encoder failed.
    #[error("encoding value for '{property}' failed: {source}")]
    EncoderFailed {
        /// Logical property name.
        property: String,
        /// The encoder's error.
        #[source]
        source: BoxError,
    },
    /// The entity metadata breaks a structural invariant.
    #[error(transparent)]
    InvalidMetadata(#[from] MetadataError),
}

impl ExpressionError {
    /// Shorthand for [`ExpressionError::UnsupportedExpression`].
    #[must_use]
    pub fn unsupported(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedExpression {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// Convenience result type for compilation steps.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_name_offending_property_in_message() {
        let err = ExpressionError::InvalidUpdateOperation {
            property: "CustomerId".to_owned(),
            role: KeyRole::Partition,
        };
        assert_eq!(
            err.to_string(),
            "cannot update 'CustomerId': it is the partition key"
        );
    }

    #[test]
    fn test_should_build_unsupported_error() {
        let err = ExpressionError::unsupported("method", "'soundex' is not recognized");
        assert!(matches!(err, ExpressionError::UnsupportedExpression { ref kind, .. } if kind == "method"));
        assert_eq!(err.to_string(), "unsupported method: 'soundex' is not recognized");
    }
}
