//! Pluggable value encoders: field encryption and geospatial cell indexing.
//!
//! Both collaborators live outside the compiler. The compiler only calls them
//! for properties whose metadata asks for it, right before the value is bound.

use std::fmt;

use bytes::Bytes;
use dynexpr_model::{AttributeValue, GeoEncoding};

use crate::error::BoxError;
use crate::value::GeoPoint;

/// Where an encrypted value is headed, passed to the encryptor as associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionContext<'a> {
    /// Table name.
    pub table: &'a str,
    /// Physical attribute name.
    pub attribute: &'a str,
}

/// Encrypts field values bound for properties marked `encrypted`.
pub trait FieldEncryptor: fmt::Debug + Send + Sync {
    /// Encrypt `plaintext`, returning the ciphertext stored as a `B` value.
    fn encrypt(&self, plaintext: &[u8], context: &EncryptionContext<'_>) -> Result<Bytes, BoxError>;
}

/// Computes index values for location-typed properties.
pub trait GeoEncoder: fmt::Debug + Send + Sync {
    /// Encode `point` under the property's encoding parameters.
    fn encode(&self, point: GeoPoint, encoding: &GeoEncoding) -> Result<AttributeValue, BoxError>;
}

/// Bytes handed to the encryptor for an already formatted value.
///
/// Scalars use their text (or raw bytes), composites their DynamoDB JSON form.
pub(crate) fn plaintext(value: &AttributeValue) -> Result<Vec<u8>, BoxError> {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => Ok(s.clone().into_bytes()),
        AttributeValue::B(b) => Ok(b.to_vec()),
        other => Ok(serde_json::to_vec(other)?),
    }
}
