//! Typed expressions and their translation.
//!
//! 1. **Surface**: [`Property`] wrappers build [`Condition`] and
//!    [`UpdateAction`] values for an [`Entity`].
//! 2. **Tree**: both wrap an [`Expr`] / [`Assignment`] tree.
//! 3. **Translation**: the [`Translator`] walks the tree against an
//!    [`ExpressionContext`](crate::ExpressionContext) and emits expression text.

pub mod ast;
pub mod property;
pub mod translator;

pub use ast::{Assignment, AttributePath, BinaryOp, Expr, PathElement, UpdateClause};
pub use property::{
    AttributeType, Condition, Containable, Entity, IntoOperand, Numeric, Property, SetType,
    SizeOperand, UpdateAction,
};
pub use translator::Translator;
