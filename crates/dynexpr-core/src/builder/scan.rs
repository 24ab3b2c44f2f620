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
use crate::error::ExpressionResult;
use crate::expression::{Condition, Entity, Property, Translator};
use crate::template::compile_template;
use crate::value::Value;

/// Compiled `Scan` request fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompiledScan {
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

/// Builds the filter and projection of a scan on `E`.
pub struct ScanExpression<E> {
    session: Session,
    filter: Vec<String>,
    projection: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ScanExpression<E> {
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

    /// Finish the scan. An empty scan is valid and compiles to nothing.
    pub fn build(self) -> ExpressionResult<CompiledScan> {
        let (names, values) = self.session.finish()?.finish();
        let filter_expression = join_conditions(&self.filter);
        let projection_expression =
            (!self.projection.is_empty()).then(|| self.projection.join(", "));

        debug!(
            table = %E::metadata().table_name,
            filter = ?filter_expression,
            names = names.len(),
            values = values.len(),
            "compiled scan expression"
        );

        Ok(CompiledScan {
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
        })
    }
}

impl<E: Entity> Default for ScanExpression<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ScanExpression<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanExpression")
            .field("session", &self.session)
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .finish()
    }
}
