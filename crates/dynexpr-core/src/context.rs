//! Per-compilation session state.
//!
//! An [`ExpressionContext`] bundles the placeholder generator, both
//! accumulators, the entity metadata and the active validation mode. Every
//! fragment compiled for one request goes through the same context, so typed
//! expressions, format templates and raw fragments share one placeholder space
//! and can never collide.
//!
//! A context lives for exactly one request. After an error it must be thrown
//! away: accumulators are append-only and nothing is rolled back.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, Utc};
use dynexpr_model::{
    AttributeValue, EntityMetadata, IndexMetadata, KeyRole, PropertyMetadata, TimezoneMode,
};

use crate::accumulator::{NameAccumulator, ValueAccumulator};
use crate::config::CompilerConfig;
use crate::encoding::{self, EncryptionContext, FieldEncryptor, GeoEncoder};
use crate::error::{ExpressionError, ExpressionResult};
use crate::format;
use crate::params::ParameterGenerator;
use crate::value::Value;

/// Which properties an expression role may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Any mapped property (filters, conditions, projections, updates).
    #[default]
    None,
    /// Only key attributes (query key conditions).
    KeysOnly,
}

/// Compilation session shared by every fragment of one request.
#[derive(Debug)]
pub struct ExpressionContext<'m> {
    names: NameAccumulator,
    values: ValueAccumulator,
    metadata: Option<&'m EntityMetadata>,
    mode: ValidationMode,
    index: Option<&'m IndexMetadata>,
    params: ParameterGenerator,
    encryptor: Option<Arc<dyn FieldEncryptor>>,
    geo_encoder: Option<Arc<dyn GeoEncoder>>,
    default_date_format: String,
    allow_raw: bool,
    partition_bound: bool,
}

impl<'m> ExpressionContext<'m> {
    /// Create an untyped context: property names are used as attribute names
    /// and no key validation happens.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            names: NameAccumulator::new(config.name_prefix.clone()),
            values: ValueAccumulator::new(),
            metadata: None,
            mode: ValidationMode::None,
            index: None,
            params: ParameterGenerator::new(config.value_prefix.clone()),
            encryptor: None,
            geo_encoder: None,
            default_date_format: config.default_date_format.clone(),
            allow_raw: config.allow_raw_expressions,
            partition_bound: false,
        }
    }

    /// Create a context that resolves and validates properties against `metadata`.
    ///
    /// `metadata` is trusted as is; run [`EntityMetadata::validate`] on tables
    /// loaded from JSON first. The builders do this themselves.
    #[must_use]
    pub fn for_entity(metadata: &'m EntityMetadata, config: &CompilerConfig) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(config)
        }
    }

    /// Register the field encryptor.
    #[must_use]
    pub fn with_encryptor(mut self, encryptor: Arc<dyn FieldEncryptor>) -> Self {
        self.set_encryptor(encryptor);
        self
    }

    /// Register the geospatial encoder.
    #[must_use]
    pub fn with_geo_encoder(mut self, encoder: Arc<dyn GeoEncoder>) -> Self {
        self.set_geo_encoder(encoder);
        self
    }

    /// Register the field encryptor in place.
    pub fn set_encryptor(&mut self, encryptor: Arc<dyn FieldEncryptor>) {
        self.encryptor = Some(encryptor);
    }

    /// Register the geospatial encoder in place.
    pub fn set_geo_encoder(&mut self, encoder: Arc<dyn GeoEncoder>) {
        self.geo_encoder = Some(encoder);
    }

    /// Entity metadata, if this context is typed.
    #[must_use]
    pub fn metadata(&self) -> Option<&'m EntityMetadata> {
        self.metadata
    }

    /// Active validation mode.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Switch the validation mode, returning the previous one.
    pub fn set_mode(&mut self, mode: ValidationMode) -> ValidationMode {
        std::mem::replace(&mut self.mode, mode)
    }

    /// Validate key conditions against a secondary index instead of the table key.
    pub fn use_index(&mut self, name: &str) -> ExpressionResult<()> {
        let metadata = self.metadata.ok_or_else(|| {
            ExpressionError::unsupported("index", format!("'{name}' needs entity metadata"))
        })?;
        let index = metadata.index(name).ok_or_else(|| {
            ExpressionError::unsupported(
                "index",
                format!("'{name}' is not declared on '{}'", metadata.table_name),
            )
        })?;
        self.index = Some(index);
        Ok(())
    }

    /// Whether raw fragments with caller-supplied maps are accepted.
    #[must_use]
    pub fn allows_raw(&self) -> bool {
        self.allow_raw
    }

    /// Resolve a logical property name.
    ///
    /// Untyped contexts treat the name as the attribute name itself.
    pub fn resolve(&self, logical_name: &str) -> ExpressionResult<Cow<'m, PropertyMetadata>> {
        let Some(metadata) = self.metadata else {
            return Ok(Cow::Owned(PropertyMetadata::new(logical_name, logical_name)));
        };
        metadata
            .property(logical_name)
            .map(Cow::Borrowed)
            .ok_or_else(|| ExpressionError::UnmappedProperty {
                entity: metadata.table_name.clone(),
                property: logical_name.to_owned(),
            })
    }

    /// Check `property` against the active validation mode.
    pub fn check_mode(&self, property: &PropertyMetadata) -> ExpressionResult<()> {
        if self.mode == ValidationMode::None || self.metadata.is_none() {
            return Ok(());
        }
        let (is_key, scope) = match self.index {
            Some(index) => (
                index.is_key_attribute(&property.attribute_name),
                format!("index '{}'", index.name),
            ),
            None => (property.key_role.is_key(), "the table".to_owned()),
        };
        if is_key {
            Ok(())
        } else {
            Err(ExpressionError::InvalidKeyExpression {
                property: property.logical_name.clone(),
                reason: format!("'{}' is not a key attribute of {scope}", property.attribute_name),
            })
        }
    }

    /// Whether `property` is the partition key of the active key schema (the
    /// selected index, else the table). Always `false` for untyped contexts.
    #[must_use]
    pub fn is_partition_key(&self, property: &PropertyMetadata) -> bool {
        if self.metadata.is_none() {
            return false;
        }
        match self.index {
            Some(index) => index.partition_key == property.attribute_name,
            None => property.key_role == KeyRole::Partition,
        }
    }

    /// Record that a key condition compared the partition key with `=`.
    pub fn mark_partition_bound(&mut self) {
        self.partition_bound = true;
    }

    /// Fail unless the key condition pinned the partition key.
    pub fn require_partition_bound(&self) -> ExpressionResult<()> {
        let Some(metadata) = self.metadata else {
            return Ok(());
        };
        if self.partition_bound {
            return Ok(());
        }
        let attribute = match self.index {
            Some(index) => Some(index.partition_key.as_str()),
            None => metadata.partition_key().map(|p| p.attribute_name.as_str()),
        };
        let Some(attribute) = attribute else {
            return Ok(());
        };
        let property = metadata
            .property_by_attribute(attribute)
            .map_or(attribute, |p| p.logical_name.as_str());
        Err(ExpressionError::InvalidKeyExpression {
            property: property.to_owned(),
            reason: format!("a key condition must compare '{attribute}' with ="),
        })
    }

    /// Bind an attribute name, returning its placeholder.
    pub fn bind_name(&mut self, attribute: &str) -> String {
        self.names.bind(attribute)
    }

    /// Bind a finished value under a fresh placeholder.
    pub fn bind_value(&mut self, value: AttributeValue) -> ExpressionResult<String> {
        let mut token = self.params.next_token();
        while self.values.contains(&token) {
            token = self.params.next_token();
        }
        self.values.insert(token.clone(), value)?;
        Ok(token)
    }

    /// Encode `value` for `property` and bind it under a fresh placeholder.
    pub fn bind_literal(
        &mut self,
        value: &Value,
        property: Option<&PropertyMetadata>,
        spec: Option<&str>,
    ) -> ExpressionResult<String> {
        let encoded = self.encode(value, property, spec)?;
        self.bind_value(encoded)
    }

    /// Run the value pipeline: timezone normalization, geo encoding, format
    /// specifier, then encryption.
    ///
    /// An explicit `spec` wins over the property's own format. Property formats
    /// only apply to dates and numbers; other values use their default rendering.
    pub fn encode(
        &self,
        value: &Value,
        property: Option<&PropertyMetadata>,
        spec: Option<&str>,
    ) -> ExpressionResult<AttributeValue> {
        let Some(property) = property else {
            return format::render(value, spec, &self.default_date_format);
        };

        let normalized = match (value, property.timezone) {
            (Value::DateTime(dt), TimezoneMode::Utc) => {
                Cow::Owned(Value::DateTime(dt.with_timezone(&Utc).fixed_offset()))
            }
            (Value::DateTime(dt), TimezoneMode::Local) => {
                Cow::Owned(Value::DateTime(dt.with_timezone(&Local).fixed_offset()))
            }
            _ => Cow::Borrowed(value),
        };

        let rendered = match (normalized.as_ref(), &property.geo, &self.geo_encoder) {
            (Value::Location(point), Some(geo), Some(encoder)) => {
                encoder
                    .encode(*point, geo)
                    .map_err(|source| ExpressionError::EncoderFailed {
                        property: property.logical_name.clone(),
                        source,
                    })?
            }
            (v, _, _) => {
                let spec = spec.or_else(|| {
                    accepts_format(v)
                        .then_some(property.format.as_deref())
                        .flatten()
                });
                format::render(v, spec, &self.default_date_format)?
            }
        };

        if !property.encrypted {
            return Ok(rendered);
        }
        let Some(encryptor) = &self.encryptor else {
            return Err(ExpressionError::EncryptionRequired {
                property: property.logical_name.clone(),
            });
        };
        let context = EncryptionContext {
            table: self.metadata.map_or("", |m| m.table_name.as_str()),
            attribute: &property.attribute_name,
        };
        let ciphertext = encoding::plaintext(&rendered)
            .and_then(|plain| encryptor.encrypt(&plain, &context))
            .map_err(|source| ExpressionError::EncoderFailed {
                property: property.logical_name.clone(),
                source,
            })?;
        Ok(AttributeValue::B(ciphertext))
    }

    /// Insert a caller-supplied name binding.
    pub fn insert_name(
        &mut self,
        token: impl Into<String>,
        attribute: impl Into<String>,
    ) -> ExpressionResult<()> {
        self.names.insert(token, attribute)
    }

    /// Insert a caller-supplied value binding.
    pub fn insert_value(
        &mut self,
        token: impl Into<String>,
        value: AttributeValue,
    ) -> ExpressionResult<()> {
        self.values.insert(token, value)
    }

    /// Bound names so far.
    #[must_use]
    pub fn names(&self) -> &NameAccumulator {
        &self.names
    }

    /// Bound values so far.
    #[must_use]
    pub fn values(&self) -> &ValueAccumulator {
        &self.values
    }

    /// Consume the context, returning the name and value maps.
    #[must_use]
    pub fn finish(self) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
        (self.names.into_map(), self.values.into_map())
    }
}

fn accepts_format(value: &Value) -> bool {
    matches!(value, Value::DateTime(_) | Value::Date(_)) || value.is_numeric()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use dynexpr_model::{GeoEncoding, IndexMetadata};

    use super::*;
    use crate::error::BoxError;
    use crate::value::GeoPoint;

    #[derive(Debug)]
    struct ReverseEncryptor;

    impl FieldEncryptor for ReverseEncryptor {
        fn encrypt(
            &self,
            plaintext: &[u8],
            context: &EncryptionContext<'_>,
        ) -> Result<bytes::Bytes, BoxError> {
            let mut out: Vec<u8> = plaintext.iter().rev().copied().collect();
            out.extend_from_slice(context.attribute.as_bytes());
            Ok(out.into())
        }
    }

    #[derive(Debug)]
    struct CellEncoder;

    impl GeoEncoder for CellEncoder {
        fn encode(&self, point: GeoPoint, encoding: &GeoEncoding) -> Result<AttributeValue, BoxError> {
            Ok(AttributeValue::S(format!(
                "{}:{}:{:.0}:{:.0}",
                encoding.scheme, encoding.precision, point.latitude, point.longitude
            )))
        }
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("users")
            .with_property(PropertyMetadata::new("Id", "pk").partition_key())
            .with_property(PropertyMetadata::new("Email", "email"))
            .with_property(PropertyMetadata::new("Ssn", "ssn").encrypted())
            .with_property(
                PropertyMetadata::new("Seen", "seen")
                    .with_format("yyyy-MM-dd HH:mm")
                    .with_timezone(TimezoneMode::Utc),
            )
            .with_property(PropertyMetadata::new("Score", "score").with_format("F1"))
            .with_property(PropertyMetadata::new("Home", "home").with_geo(GeoEncoding {
                scheme: "geohash".to_owned(),
                precision: 7,
            }))
            .with_index(IndexMetadata::new("by-email", "email", None))
    }

    #[test]
    fn test_should_resolve_untyped_names_verbatim() {
        let ctx = ExpressionContext::new(&CompilerConfig::default());
        let property = ctx.resolve("status").unwrap();
        assert_eq!(property.attribute_name, "status");
    }

    #[test]
    fn test_should_fail_on_unmapped_property() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let err = ctx.resolve("Nope").unwrap_err();
        assert!(matches!(err, ExpressionError::UnmappedProperty { ref property, .. } if property == "Nope"));
    }

    #[test]
    fn test_should_enforce_keys_only_mode() {
        let meta = metadata();
        let mut ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let email = ctx.resolve("Email").unwrap().into_owned();
        assert!(ctx.check_mode(&email).is_ok());

        assert_eq!(ctx.set_mode(ValidationMode::KeysOnly), ValidationMode::None);
        let err = ctx.check_mode(&email).unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidKeyExpression { ref property, .. } if property == "Email"));
        assert!(ctx.check_mode(&ctx.resolve("Id").unwrap()).is_ok());
    }

    #[test]
    fn test_should_validate_against_index_keys() {
        let meta = metadata();
        let mut ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        ctx.use_index("by-email").unwrap();
        ctx.set_mode(ValidationMode::KeysOnly);
        assert!(ctx.check_mode(&ctx.resolve("Email").unwrap()).is_ok());
        assert!(ctx.check_mode(&ctx.resolve("Id").unwrap()).is_err());
        assert!(ctx.is_partition_key(&ctx.resolve("Email").unwrap()));
        assert!(!ctx.is_partition_key(&ctx.resolve("Id").unwrap()));
        assert!(matches!(
            ctx.require_partition_bound(),
            Err(ExpressionError::InvalidKeyExpression { ref property, .. }) if property == "Email"
        ));
        ctx.mark_partition_bound();
        assert!(ctx.require_partition_bound().is_ok());
        assert!(ctx.use_index("missing").is_err());
    }

    #[test]
    fn test_should_skip_tokens_taken_by_caller() {
        let mut ctx = ExpressionContext::new(&CompilerConfig::default());
        ctx.insert_value(":p0", AttributeValue::from("raw")).unwrap();
        let token = ctx.bind_value(AttributeValue::from("typed")).unwrap();
        assert_eq!(token, ":p1");
        assert_eq!(ctx.values().len(), 2);
    }

    #[test]
    fn test_should_require_encryptor_for_encrypted_property() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let ssn = ctx.resolve("Ssn").unwrap();
        let err = ctx.encode(&Value::from("123"), Some(&ssn), None).unwrap_err();
        assert!(matches!(err, ExpressionError::EncryptionRequired { ref property } if property == "Ssn"));
    }

    #[test]
    fn test_should_store_encryptor_output() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default())
            .with_encryptor(Arc::new(ReverseEncryptor));
        let ssn = ctx.resolve("Ssn").unwrap();
        let encoded = ctx.encode(&Value::from("123"), Some(&ssn), None).unwrap();
        assert_eq!(encoded, AttributeValue::B(bytes::Bytes::from_static(b"321ssn")));
    }

    #[test]
    fn test_should_normalize_timezone_before_property_format() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let seen = ctx.resolve("Seen").unwrap();
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let dt = offset.with_ymd_and_hms(2024, 6, 1, 9, 15, 0).unwrap();
        let encoded = ctx.encode(&Value::from(dt), Some(&seen), None).unwrap();
        assert_eq!(encoded, AttributeValue::S("2024-06-01 04:15".to_owned()));
    }

    #[test]
    fn test_should_render_unformattable_values_by_default() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let seen = ctx.resolve("Seen").unwrap();
        assert_eq!(
            ctx.encode(&Value::Null, Some(&seen), None).unwrap(),
            AttributeValue::Null(true)
        );
        assert_eq!(
            ctx.encode(&Value::Bool(true), Some(&seen), None).unwrap(),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            ctx.encode(&Value::enumeration("Pending"), Some(&seen), None).unwrap(),
            AttributeValue::S("Pending".to_owned())
        );
    }

    #[test]
    fn test_should_prefer_explicit_spec_over_property_format() {
        let meta = metadata();
        let ctx = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let score = ctx.resolve("Score").unwrap();
        assert_eq!(
            ctx.encode(&Value::from(9.87), Some(&score), None).unwrap(),
            AttributeValue::N("9.9".to_owned())
        );
        assert_eq!(
            ctx.encode(&Value::from(9.87), Some(&score), Some("F0")).unwrap(),
            AttributeValue::N("10".to_owned())
        );
    }

    #[test]
    fn test_should_delegate_locations_to_geo_encoder() {
        let meta = metadata();
        let point = Value::from(GeoPoint::new(48.0, 2.0));

        let plain = ExpressionContext::for_entity(&meta, &CompilerConfig::default());
        let home = plain.resolve("Home").unwrap();
        assert_eq!(
            plain.encode(&point, Some(&home), None).unwrap(),
            AttributeValue::S("48,2".to_owned())
        );

        let encoded = ExpressionContext::for_entity(&meta, &CompilerConfig::default())
            .with_geo_encoder(Arc::new(CellEncoder));
        assert_eq!(
            encoded.encode(&point, Some(&home), None).unwrap(),
            AttributeValue::S("geohash:7:48:2".to_owned())
        );
    }
}
