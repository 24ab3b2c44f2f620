use std::collections::{BTreeMap, HashMap, HashSet};
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
use crate::expression::{AttributePath, Condition, Entity, Translator, UpdateAction, UpdateClause};
use crate::template::compile_template;
use crate::value::Value;

/// Compiled `UpdateItem` request fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompiledUpdate {
    /// `UpdateExpression`.
    pub update_expression: String,
    /// `ConditionExpression`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// `ExpressionAttributeNames`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// `ExpressionAttributeValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

/// Builds the update expression (and optional condition) of an update on `E`.
///
/// Actions are grouped into `SET`, `ADD`, `REMOVE` and `DELETE` clauses,
/// emitted in that order. Key properties can never be targeted.
pub struct UpdateExpression<E> {
    session: Session,
    clauses: BTreeMap<UpdateClause, Vec<String>>,
    targets: HashSet<AttributePath>,
    conditions: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> UpdateExpression<E> {
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
            clauses: BTreeMap::new(),
            targets: HashSet::new(),
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

    /// Add typed update actions, one per mutated property.
    #[must_use]
    pub fn update(mut self, actions: impl IntoIterator<Item = UpdateAction<E>>) -> Self {
        for action in actions {
            let target = &action.assignment().target;
            if !self.targets.insert(target.clone()) {
                self.session.fail(ExpressionError::unsupported(
                    "update",
                    format!("'{target}' is targeted by more than one action"),
                ));
                break;
            }
            match self.session.run(ValidationMode::None, |ctx| {
                Translator::new(ctx).assignment(action.assignment())
            }) {
                Some((clause, fragment)) => self.push(clause, fragment),
                None => break,
            }
        }
        self
    }

    /// Add a fragment to `clause` from a format template, e.g.
    /// `update_format(UpdateClause::Set, "#n = {0}", ...)`.
    #[must_use]
    pub fn update_format(mut self, clause: UpdateClause, template: &str, args: &[Value]) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            compile_template(ctx, template, args)
        }) {
            self.push(clause, fragment);
        }
        self
    }

    /// Add a raw fragment to `clause` with explicit placeholder maps.
    #[must_use]
    pub fn update_raw(
        mut self,
        clause: UpdateClause,
        expression: impl Into<String>,
        names: HashMap<String, String>,
        values: HashMap<String, AttributeValue>,
    ) -> Self {
        let expression = expression.into();
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            raw_fragment(ctx, expression, names, values)
        }) {
            self.push(clause, fragment);
        }
        self
    }

    /// Guard the update with a typed condition.
    #[must_use]
    pub fn condition(mut self, condition: Condition<E>) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            Translator::new(ctx).condition(condition.expr())
        }) {
            self.conditions.push(fragment);
        }
        self
    }

    /// Guard the update with a condition from a format template.
    #[must_use]
    pub fn condition_format(mut self, template: &str, args: &[Value]) -> Self {
        if let Some(fragment) = self.session.run(ValidationMode::None, |ctx| {
            compile_template(ctx, template, args)
        }) {
            self.conditions.push(fragment);
        }
        self
    }

    /// Guard the update with a raw condition and explicit placeholder maps.
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

    fn push(&mut self, clause: UpdateClause, fragment: String) {
        self.clauses.entry(clause).or_default().push(fragment);
    }

    /// Finish the update.
    pub fn build(self) -> ExpressionResult<CompiledUpdate> {
        let (names, values) = self.session.finish()?.finish();
        if self.clauses.is_empty() {
            return Err(ExpressionError::unsupported(
                "update",
                "at least one update action is required",
            ));
        }

        let update_expression = self
            .clauses
            .iter()
            .map(|(clause, fragments)| format!("{clause} {}", fragments.join(", ")))
            .collect::<Vec<_>>()
            .join(" ");
        let condition_expression = join_conditions(&self.conditions);

        debug!(
            table = %E::metadata().table_name,
            update = %update_expression,
            condition = ?condition_expression,
            names = names.len(),
            values = values.len(),
            "compiled update expression"
        );

        Ok(CompiledUpdate {
            update_expression,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
        })
    }
}

impl<E: Entity> Default for UpdateExpression<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for UpdateExpression<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateExpression")
            .field("session", &self.session)
            .field("clauses", &self.clauses)
            .field("conditions", &self.conditions)
            .finish()
    }
}
