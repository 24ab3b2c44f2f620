//! Expression tree to DynamoDB expression text.
//!
//! The translator borrows the request's [`ExpressionContext`] and appends
//! every name and value it needs to the context's accumulators, returning only
//! the fragment text. Key-condition rules (`ValidationMode::KeysOnly`) are
//! enforced here: only key attributes, `AND`, the five ordering comparisons,
//! `BETWEEN` and `begins_with` are accepted, and the partition key only with `=`.

use std::borrow::Cow;

use dynexpr_model::{AttributeValue, PropertyMetadata, TimezoneMode};

use super::ast::{Assignment, AttributePath, BinaryOp, Expr, PathElement, UpdateClause};
use crate::context::{ExpressionContext, ValidationMode};
use crate::error::{ExpressionError, ExpressionResult};
use crate::value::Value;

const TYPE_DESCRIPTORS: &[&str] = &["S", "SS", "N", "NS", "B", "BS", "BOOL", "NULL", "L", "M"];

/// A path resolved against the context.
#[derive(Debug)]
struct ResolvedPath<'m> {
    text: String,
    property: Cow<'m, PropertyMetadata>,
    nested: bool,
    rules: Option<Cow<'m, PropertyMetadata>>,
}

impl ResolvedPath<'_> {
    /// Property whose value rules apply to literals compared with this path.
    fn hint(&self) -> Option<&PropertyMetadata> {
        self.rules.as_deref()
    }
}

/// Value rules for literals bound against a path.
///
/// A top-level path uses its property as is. Below an encrypted property only
/// the encryption rule survives: members are still encrypted (under the root
/// attribute) but never formatted, normalized or geo-encoded.
fn value_rules<'m>(
    property: &Cow<'m, PropertyMetadata>,
    nested: bool,
) -> Option<Cow<'m, PropertyMetadata>> {
    if !nested {
        return Some(property.clone());
    }
    property.encrypted.then(|| {
        Cow::Owned(PropertyMetadata {
            format: None,
            timezone: TimezoneMode::None,
            geo: None,
            ..property.as_ref().clone()
        })
    })
}

/// Walks expression trees, binding placeholders into one context.
#[derive(Debug)]
pub struct Translator<'c, 'm> {
    ctx: &'c mut ExpressionContext<'m>,
}

impl<'c, 'm> Translator<'c, 'm> {
    /// Translate into `ctx`.
    pub fn new(ctx: &'c mut ExpressionContext<'m>) -> Self {
        Self { ctx }
    }

    fn keys_only(&self) -> bool {
        self.ctx.mode() == ValidationMode::KeysOnly
    }

    fn reject_in_key_condition(&self, construct: &str) -> ExpressionResult<()> {
        if self.keys_only() {
            return Err(ExpressionError::unsupported(
                construct,
                "not allowed in a key condition",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Translate a boolean expression.
    pub fn condition(&mut self, expr: &Expr) -> ExpressionResult<String> {
        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                self.logical(*op, left, right)
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                if *op == BinaryOp::Ne {
                    self.reject_in_key_condition("<>")?;
                }
                let pins_partition = self.check_partition_comparison(*op, left, right)?;
                let (l, r) = self.operand_pair(left, right)?;
                if pins_partition {
                    self.ctx.mark_partition_bound();
                }
                Ok(format!("{l} {op} {r}"))
            }
            Expr::Binary { op, .. } => Err(ExpressionError::unsupported(
                op.name(),
                "arithmetic is only allowed in update values",
            )),
            Expr::Not(inner) => {
                self.reject_in_key_condition("NOT")?;
                let inner = self.condition(inner)?;
                Ok(format!("NOT ({inner})"))
            }
            Expr::Call { method, args } => self.function(method, args),
            other => Err(ExpressionError::unsupported(
                other.kind(),
                "not a boolean expression",
            )),
        }
    }

    fn logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> ExpressionResult<String> {
        if op == BinaryOp::Or {
            self.reject_in_key_condition("OR")?;
        }
        let l = self.logical_side(op, left)?;
        let r = self.logical_side(op, right)?;
        Ok(format!("{l} {op} {r}"))
    }

    fn logical_side(&mut self, parent: BinaryOp, side: &Expr) -> ExpressionResult<String> {
        let text = self.condition(side)?;
        let needs_parens = parent == BinaryOp::And
            && matches!(side, Expr::Binary { op: BinaryOp::Or, .. });
        Ok(if needs_parens { format!("({text})") } else { text })
    }

    fn function(&mut self, method: &str, args: &[Expr]) -> ExpressionResult<String> {
        match (method, args) {
            ("attribute_exists" | "attribute_not_exists", [Expr::Member(path)]) => {
                self.reject_in_key_condition(method)?;
                let path = self.path(path)?;
                Ok(format!("{method}({})", path.text))
            }
            ("attribute_type", [Expr::Member(path), Expr::Constant(Value::String(descriptor))]) => {
                self.reject_in_key_condition(method)?;
                if !TYPE_DESCRIPTORS.contains(&descriptor.as_str()) {
                    return Err(ExpressionError::unsupported(
                        method,
                        format!("'{descriptor}' is not a DynamoDB type descriptor"),
                    ));
                }
                let path = self.path(path)?;
                let token = self.ctx.bind_value(AttributeValue::S(descriptor.clone()))?;
                Ok(format!("attribute_type({}, {token})", path.text))
            }
            ("begins_with", [subject @ Expr::Member(path), prefix]) => {
                self.reject_on_partition_key(subject, method)?;
                let path = self.path(path)?;
                let prefix = self.operand(prefix, path.hint())?;
                Ok(format!("begins_with({}, {prefix})", path.text))
            }
            ("contains", [Expr::Member(path), element]) => {
                self.reject_in_key_condition(method)?;
                let path = self.path(path)?;
                let element = self.operand(element, path.hint())?;
                Ok(format!("contains({}, {element})", path.text))
            }
            ("between", [subject, low, high]) => {
                self.reject_on_partition_key(subject, "BETWEEN")?;
                let (subject, hint) = self.subject(subject)?;
                let low = self.operand(low, hint.as_deref())?;
                let high = self.operand(high, hint.as_deref())?;
                Ok(format!("{subject} BETWEEN {low} AND {high}"))
            }
            ("in", [subject, candidates @ ..]) => {
                self.reject_in_key_condition("IN")?;
                if candidates.is_empty() {
                    return Err(ExpressionError::unsupported(
                        "IN",
                        "needs at least one candidate",
                    ));
                }
                let (subject, hint) = self.subject(subject)?;
                let candidates = candidates
                    .iter()
                    .map(|c| self.operand(c, hint.as_deref()))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                Ok(format!("{subject} IN ({})", candidates.join(", ")))
            }
            _ => Err(ExpressionError::unsupported(
                method,
                format!("unrecognized method call with {} argument(s)", args.len()),
            )),
        }
    }

    /// Logical name of the partition key `expr` refers to, in key conditions only.
    fn partition_key_of(&self, expr: &Expr) -> ExpressionResult<Option<String>> {
        if !self.keys_only() {
            return Ok(None);
        }
        let Expr::Member(path) = expr else {
            return Ok(None);
        };
        let Some(PathElement::Attribute(root)) = path.elements.first() else {
            return Ok(None);
        };
        let property = self.ctx.resolve(root)?;
        Ok(self
            .ctx
            .is_partition_key(&property)
            .then(|| property.logical_name.clone()))
    }

    /// The partition key only takes `=`. Returns whether the comparison pins it.
    fn check_partition_comparison(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> ExpressionResult<bool> {
        let mut pins = false;
        for side in [left, right] {
            if let Some(property) = self.partition_key_of(side)? {
                if op != BinaryOp::Eq {
                    return Err(ExpressionError::InvalidKeyExpression {
                        property,
                        reason: format!("the partition key only supports =, not {op}"),
                    });
                }
                pins = true;
            }
        }
        Ok(pins)
    }

    fn reject_on_partition_key(&self, subject: &Expr, construct: &str) -> ExpressionResult<()> {
        match self.partition_key_of(subject)? {
            Some(property) => Err(ExpressionError::InvalidKeyExpression {
                property,
                reason: format!("{construct} only applies to the sort key"),
            }),
            None => Ok(()),
        }
    }

    /// Left-hand side of `BETWEEN` / `IN`, with the property hint for literals.
    fn subject(
        &mut self,
        subject: &Expr,
    ) -> ExpressionResult<(String, Option<Cow<'m, PropertyMetadata>>)> {
        if let Expr::Member(path) = subject {
            let path = self.path(path)?;
            return Ok((path.text, path.rules));
        }
        Ok((self.operand(subject, None)?, None))
    }

    /// Translate both sides of a comparison; the member side supplies the
    /// value rules for a literal on the other side.
    fn operand_pair(&mut self, left: &Expr, right: &Expr) -> ExpressionResult<(String, String)> {
        match (left, right) {
            (Expr::Member(path), other) => {
                let path = self.path(path)?;
                let other = self.operand(other, path.hint())?;
                Ok((path.text, other))
            }
            (other, Expr::Member(path)) => {
                let path = self.path(path)?;
                let other = self.operand(other, path.hint())?;
                Ok((other, path.text))
            }
            (l, r) => Ok((self.operand(l, None)?, self.operand(r, None)?)),
        }
    }

    fn operand(&mut self, expr: &Expr, hint: Option<&PropertyMetadata>) -> ExpressionResult<String> {
        match expr {
            Expr::Member(path) => Ok(self.path(path)?.text),
            Expr::Constant(value) => self.ctx.bind_literal(value, hint, None),
            Expr::Call { method, args } if method == "size" => {
                self.reject_in_key_condition("size")?;
                match args.as_slice() {
                    [Expr::Member(path)] => Ok(format!("size({})", self.path(path)?.text)),
                    _ => Err(ExpressionError::unsupported("size", "expects a single path")),
                }
            }
            Expr::Call { method, .. } => Err(ExpressionError::unsupported(
                method.as_str(),
                "not usable as an operand",
            )),
            other => Err(ExpressionError::unsupported(
                other.kind(),
                "not usable as an operand",
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    fn path(&mut self, path: &AttributePath) -> ExpressionResult<ResolvedPath<'m>> {
        let Some((PathElement::Attribute(root), tail)) = path.elements.split_first() else {
            return Err(ExpressionError::unsupported(
                "path",
                format!("'{path}' does not start with a property name"),
            ));
        };
        let property = self.ctx.resolve(root)?;
        self.ctx.check_mode(&property)?;

        let mut text = self.ctx.bind_name(&property.attribute_name);
        for element in tail {
            match element {
                PathElement::Attribute(name) => {
                    let token = self.ctx.bind_name(name);
                    text.push('.');
                    text.push_str(&token);
                }
                PathElement::Index(idx) => text.push_str(&format!("[{idx}]")),
            }
        }

        let nested = !tail.is_empty();
        let resolved = ResolvedPath {
            text,
            rules: value_rules(&property, nested),
            property,
            nested,
        };
        if resolved.nested && self.keys_only() && self.ctx.metadata().is_some() {
            return Err(nested_key(&resolved));
        }
        Ok(resolved)
    }

    /// Translate a projection path.
    pub fn projection(&mut self, path: &AttributePath) -> ExpressionResult<String> {
        Ok(self.path(path)?.text)
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Translate one update assignment into its clause group and fragment.
    pub fn assignment(
        &mut self,
        assignment: &Assignment,
    ) -> ExpressionResult<(UpdateClause, String)> {
        let target = self.path(&assignment.target)?;
        if target.property.key_role.is_key() {
            return Err(ExpressionError::InvalidUpdateOperation {
                property: target.property.logical_name.clone(),
                role: target.property.key_role,
            });
        }

        if let Expr::Call { method, args } = &assignment.value {
            match (method.as_str(), args.as_slice()) {
                ("remove", []) => return Ok((UpdateClause::Remove, target.text)),
                ("increment" | "add_to_set", [value]) => {
                    let value = self.operand(value, target.hint())?;
                    return Ok((UpdateClause::Add, format!("{} {value}", target.text)));
                }
                ("delete_from_set", [value]) => {
                    let value = self.operand(value, target.hint())?;
                    return Ok((UpdateClause::Delete, format!("{} {value}", target.text)));
                }
                _ => {}
            }
        }

        let value = self.update_value(&assignment.value, target.hint())?;
        Ok((UpdateClause::Set, format!("{} = {value}", target.text)))
    }

    fn update_value(
        &mut self,
        expr: &Expr,
        hint: Option<&PropertyMetadata>,
    ) -> ExpressionResult<String> {
        match expr {
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Subtract),
                left,
                right,
            } => {
                let l = self.update_value(left, hint)?;
                let r = self.update_value(right, hint)?;
                Ok(format!("{l} {op} {r}"))
            }
            Expr::Binary { op, .. } => Err(ExpressionError::unsupported(
                op.name(),
                "only + and - are allowed in update values",
            )),
            Expr::Call { method, args } => match (method.as_str(), args.as_slice()) {
                ("if_not_exists", [Expr::Member(path), fallback]) => {
                    let path = self.path(path)?;
                    let fallback = self.update_value(fallback, path.hint())?;
                    Ok(format!("if_not_exists({}, {fallback})", path.text))
                }
                ("list_append", [first, second]) => {
                    let first = self.update_value(first, hint)?;
                    let second = self.update_value(second, hint)?;
                    Ok(format!("list_append({first}, {second})"))
                }
                _ => Err(ExpressionError::unsupported(
                    method.as_str(),
                    "not a recognized update operator",
                )),
            },
            Expr::Member(_) | Expr::Constant(_) => self.operand(expr, hint),
            Expr::Not(_) => Err(ExpressionError::unsupported(
                expr.kind(),
                "not usable as an update value",
            )),
        }
    }
}

fn nested_key(path: &ResolvedPath<'_>) -> ExpressionError {
    ExpressionError::InvalidKeyExpression {
        property: path.property.logical_name.clone(),
        reason: "nested paths cannot appear in a key condition".to_owned(),
    }
}
