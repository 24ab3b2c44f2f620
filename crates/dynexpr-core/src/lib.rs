//! Expression compiler for DynamoDB requests.
//!
//! Callers describe key conditions, filters, conditions and item updates either
//! with typed [`Property`] wrappers or with positional format templates. Both
//! surfaces compile into the expression string DynamoDB expects plus the two
//! placeholder maps (`ExpressionAttributeNames` / `ExpressionAttributeValues`).
//!
//! The pipeline is:
//!
//! 1. **Context**: one [`ExpressionContext`] per request owns the placeholder
//!    generator and both accumulators.
//! 2. **Translation**: typed expression trees ([`expression`]) and templates
//!    ([`template`]) append bindings to the context and return fragments.
//! 3. **Composition**: builders ([`builder`]) join fragments into clauses and
//!    hand back the finished request fragment.
//!
//! ```
//! use dynexpr_core::compile_format;
//! use dynexpr_core::values;
//!
//! let compiled = compile_format("pk = {0} AND begins_with(sk, {1})", &values!["USER#123", "ORDER#"])?;
//! assert_eq!(compiled.expression, "pk = :p0 AND begins_with(sk, :p1)");
//! assert!(compiled.names.is_empty());
//! # Ok::<(), dynexpr_core::ExpressionError>(())
//! ```
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod accumulator;
pub mod builder;
pub mod config;
pub mod context;
pub mod encoding;
pub mod error;
pub mod expression;
pub mod format;
pub mod params;
pub mod template;
pub mod value;

pub use builder::{
    CompiledExpression, CompiledQuery, CompiledScan, CompiledUpdate, ConditionExpression,
    QueryExpression, ScanExpression, UpdateExpression,
};
pub use config::CompilerConfig;
pub use context::{ExpressionContext, ValidationMode};
pub use encoding::{EncryptionContext, FieldEncryptor, GeoEncoder};
pub use error::{ExpressionError, ExpressionResult};
pub use expression::{Condition, Entity, Property, UpdateAction, UpdateClause};
pub use template::compile_format;
pub use value::{GeoPoint, Value};

pub use dynexpr_model::{AttributeValue, EntityMetadata, KeyRole, PropertyMetadata};
