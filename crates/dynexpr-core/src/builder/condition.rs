use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynexpr_model::AttributeValue;
use tracing::debug;

use super::{CompiledExpression, Session, join_conditions, raw_fragment};
use crate::config::CompilerConfig;
use crate::context::ValidationMode;
use crate::encoding::{FieldEncryptor, GeoEncoder};
use crate::error::{ExpressionError, ExpressionResult};
use crate::expression::{Condition, Entity, Translator};
use crate::template::compile_template;
use crate::value::Value;

/// Builds the `ConditionExpression` guarding a put or delete on `E`.
pub struct ConditionExpression<E> {
    session: Session,
    conditions: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ConditionExpression<E> {
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
            conditions: Vec::new(),
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

    /// Add a typed condition.
    #[must_use]
    pub fn condition(mut self, condition: Condition<E>) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            Translator::new(ctx).condition(condition.expr())
        }) {
            self.conditions.push(fragment);
        }
        self
    }

    /// Add a condition from a format template.
    #[must_use]
    pub fn condition_format(mut self, template: &str, args: &[Value]) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            compile_template(ctx, template, args)
        }) {
            self.conditions.push(fragment);
        }
        self
    }

    /// Add a raw condition with explicit placeholder maps.
    #[must_use]
    pub fn condition_raw(
        mut self,
        expression: impl Into<String>,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Self {
        let expression = expression.into();
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            raw_fragment(ctx, expression, names, values)
        }) {
            self.conditions.push(fragment);
        }
        self
    }

    /// Finish the condition.
    pub fn build(self) -> ExpressionResult<CompiledExpression> {
        let (names, values) = self.session.finish()?.finish();
        let expression = join_conditions(&self.conditions).ok_or_else(|| {
            ExpressionError::unsupported("condition", "at least one condition is required")
        })?;

        debug!(
            table = %E::metadata().table_name,
            condition = %expression,
            names = names.len(),
            values = values.len(),
            "compiled condition expression"
        );

        Ok(CompiledExpression {
            expression,
            names,
            values,
        })
    }
}

impl<E: Entity> Default for ConditionExpression<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ConditionExpression<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionExpression")
            .field("session", &self.session)
            .field("conditions", &self.conditions)
            .finish()
    }
}
