//! Per-operation builders.
//!
//! Each builder owns one [`ExpressionContext`] for its whole lifetime, so every
//! clause it produces (key condition, filter, projection, update, condition)
//! shares one placeholder space. Fragments can be supplied three ways:
//!
//! - typed [`Condition`](crate::Condition) / [`UpdateAction`](crate::UpdateAction) values;
//! - `*_format` templates with positional arguments;
//! - `*_raw` strings with caller-supplied name/value maps. These bypass
//!   property validation and can be disabled with
//!   [`CompilerConfig::allow_raw_expressions`].
//!
//! Builder methods chain by value. The first failure is kept and returned by
//! `build()`; later calls are ignored. Entity metadata is validated when the
//! builder is created.

mod condition;
mod query;
mod scan;
mod update;

use std::collections::HashMap;
use std::sync::Arc;

use dynexpr_model::AttributeValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use condition::ConditionExpression;
pub use query::{CompiledQuery, QueryExpression};
pub use scan::{CompiledScan, ScanExpression};
pub use update::{CompiledUpdate, UpdateExpression};

use crate::config::CompilerConfig;
use crate::context::{ExpressionContext, ValidationMode};
use crate::encoding::{FieldEncryptor, GeoEncoder};
use crate::error::{ExpressionError, ExpressionResult};
use crate::expression::Entity;

/// A single compiled expression with its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledExpression {
    /// Expression text.
    #[serde(rename = "Expression")]
    pub expression: String,
    /// `ExpressionAttributeNames`.
    #[serde(
        rename = "ExpressionAttributeNames",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub names: HashMap<String, String>,
    /// `ExpressionAttributeValues`.
    #[serde(
        rename = "ExpressionAttributeValues",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub values: HashMap<String, AttributeValue>,
}

/// Context plus the first error seen, shared by all builders.
#[derive(Debug)]
pub(crate) struct Session {
    ctx: ExpressionContext<'static>,
    error: Option<ExpressionError>,
}

impl Session {
    /// Fresh session for `E`. Metadata that fails validation is recorded as
    /// the session's error, so no fragment is compiled against it.
    pub(crate) fn for_entity<E: Entity>(config: &CompilerConfig) -> Self {
        let metadata = E::metadata();
        Self {
            ctx: ExpressionContext::for_entity(metadata, config),
            error: metadata.validate().err().map(ExpressionError::from),
        }
    }

    pub(crate) fn set_encryptor(&mut self, encryptor: Arc<dyn FieldEncryptor>) {
        self.ctx.set_encryptor(encryptor);
    }

    pub(crate) fn set_geo_encoder(&mut self, encoder: Arc<dyn GeoEncoder>) {
        self.ctx.set_geo_encoder(encoder);
    }

    /// Run `step` under `mode`, recording its error. Returns `None` once any
    /// step has failed.
    pub(crate) fn run<T>(
        &mut self,
        mode: ValidationMode,
        step: impl FnOnce(&mut ExpressionContext<'static>) -> ExpressionResult<T>,
    ) -> Option<T> {
        if self.error.is_some() {
            return None;
        }
        let previous = self.ctx.set_mode(mode);
        let result = step(&mut self.ctx);
        self.ctx.set_mode(previous);
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    pub(crate) fn fail(&mut self, err: ExpressionError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Hand back the context, or the first recorded error.
    pub(crate) fn finish(self) -> ExpressionResult<ExpressionContext<'static>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.ctx),
        }
    }
}

/// Insert a raw fragment's maps into `ctx` and return its text unchanged.
pub(crate) fn raw_fragment(
    ctx: &mut ExpressionContext<'_>,
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
) -> ExpressionResult<String> {
    if !ctx.allows_raw() {
        return Err(ExpressionError::unsupported(
            "raw expression",
            "raw expressions are disabled by configuration",
        ));
    }
    warn!(%expression, "raw expression bypasses property validation");
    for (token, attribute) in names {
        ctx.insert_name(token, attribute)?;
    }
    for (token, value) in values {
        ctx.insert_value(token, value)?;
    }
    Ok(expression)
}

/// Join condition fragments with `AND`, parenthesizing each when there is
/// more than one.
pub(crate) fn join_conditions(fragments: &[String]) -> Option<String> {
    match fragments {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(
            many.iter()
                .map(|f| format!("({f})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    }
}
