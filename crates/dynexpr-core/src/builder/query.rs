use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynexpr_model::AttributeValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Session, join_conditions, raw_fragment};
use crate::config::CompilerConfig;
use crate::context::ValidationMode;
use crate::encoding::{FieldEncryptor, GeoEncoder};
use crate::error::{ExpressionError, ExpressionResult};
use crate::expression::{Condition, Entity, Property, Translator};
use crate::template::compile_template;
use crate::value::Value;

/// Compiled `Query` request fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompiledQuery {
    /// Index the key condition was validated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// `KeyConditionExpression`.
    pub key_condition_expression: String,
    /// `FilterExpression`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// `ProjectionExpression`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// `ExpressionAttributeNames`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// `ExpressionAttributeValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

/// Builds the key condition, filter and projection of a query on `E`.
///
/// Key conditions may only reference the table key (or the key of the index
/// selected with [`using_index`](Self::using_index)). A typed key condition
/// must compare the partition key with `=`; `BETWEEN` and `begins_with` are for
/// the sort key.
pub struct QueryExpression<E> {
    session: Session,
    index_name: Option<String>,
    key_condition: Vec<String>,
    // template or raw key fragments, which are not inspected
    opaque_key_condition: bool,
    filter: Vec<String>,
    projection: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> QueryExpression<E> {
    /// Builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&CompilerConfig::default())
    }

    /// Builder with an explicit configuration.
    #[must_use]
    pub fn with_config(config: &CompilerConfig) -> Self {
        Self {
            session: Session::for_entity::<E>(config),
            index_name: None,
            key_condition: Vec::new(),
            opaque_key_condition: false,
            filter: Vec::new(),
            projection: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Register the field encryptor for encrypted properties.
    #[must_use]
    pub fn with_encryptor(mut self, encryptor: Arc<dyn FieldEncryptor>) -> Self {
        self.session.set_encryptor(encryptor);
        self
    }

    /// Register the geospatial encoder for location properties.
    #[must_use]
    pub fn with_geo_encoder(mut self, encoder: Arc<dyn GeoEncoder>) -> Self {
        self.session.set_geo_encoder(encoder);
        self
    }

    /// Query a secondary index; key conditions are validated against its keys.
    #[must_use]
    pub fn using_index(mut self, name: &str) -> Self {
        if self
            .session
            .run(ValidationMode::None, |ctx| ctx.use_index(name))
            .is_some()
        {
            self.index_name = Some(name.to_owned());
        }
        self
    }

    /// Add a typed key condition.
    #[must_use]
    pub fn key_condition(mut self, condition: Condition<E>) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::KeysOnly, |ctx| {
            Translator::new(ctx).condition(condition.expr())
        }) {
            self.key_condition.push(fragment);
        }
        self
    }

    /// Add a key condition from a format template.
    #[must_use]
    pub fn key_condition_format(mut self, template: &str, args: &[Value]) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::KeysOnly, |ctx| {
            compile_template(ctx, template, args)
        }) {
            self.key_condition.push(fragment);
            self.opaque_key_condition = true;
        }
        self
    }

    /// Add a raw key condition with explicit placeholder maps.
    #[must_use]
    pub fn key_condition_raw(
        mut self,
        expression: impl Into<String>,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Self {
        let expression = expression.into();
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            raw_fragment(ctx, expression, names, values)
        }) {
            self.key_condition.push(fragment);
            self.opaque_key_condition = true;
        }
        self
    }

    /// Add a typed filter.
    #[must_use]
    pub fn filter(mut self, condition: Condition<E>) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            Translator::new(ctx).condition(condition.expr())
        }) {
            self.filter.push(fragment);
        }
        self
    }

    /// Add a filter from a format template.
    #[must_use]
    pub fn filter_format(mut self, template: &str, args: &[Value]) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            compile_template(ctx, template, args)
        }) {
            self.filter.push(fragment);
        }
        self
    }

    /// Add a raw filter with explicit placeholder maps.
    #[must_use]
    pub fn filter_raw(
        mut self,
        expression: impl Into<String>,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Self {
        let expression = expression.into();
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            raw_fragment(ctx, expression, names, values)
        }) {
            self.filter.push(fragment);
        }
        self
    }

    /// Add a property to the projection.
    #[must_use]
    pub fn project<T>(mut self, property: &Property<E, T>) -> Self {
        let path = property.path();
        if let Some(fragment) = self
            .session
            .run(ValidationMode::None, |ctx| Translator::new(ctx).projection(&path))
        {
            self.projection.push(fragment);
        }
        self
    }

    /// Finish the query.
    pub fn build(self) -> ExpressionResult<CompiledQuery> {
        let ctx = self.session.finish()?;
        let key_condition_expression = join_conditions(&self.key_condition).ok_or_else(|| {
            ExpressionError::unsupported("query", "a key condition is required")
        })?;
        if !self.opaque_key_condition {
            ctx.require_partition_bound()?;
        }
        let filter_expression = join_conditions(&self.filter);
        let projection_expression =
            (!self.projection.is_empty()).then(|| self.projection.join(", "));
        let (names, values) = ctx.finish();

        debug!(
            table = %E::metadata().table_name,
            index = ?self.index_name,
            key_condition = %key_condition_expression,
            names = names.len(),
            values = values.len(),
            "compiled query expression"
        );

        Ok(CompiledQuery {
            index_name: self.index_name,
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
        })
    }
}

impl<E: Entity> Default for QueryExpression<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for QueryExpression<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExpression")
            .field("session", &self.session)
            .field("index_name", &self.index_name)
            .field("key_condition", &self.key_condition)
            .field("opaque_key_condition", &self.opaque_key_condition)
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .finish()
    }
}
