//! Expression tree consumed by the translator.
//!
//! Trees are normally produced by the typed [`Property`](super::Property)
//! surface, but every node is public so hosts can build them by hand. The tree
//! is deliberately wider than what DynamoDB accepts (arithmetic operators,
//! arbitrary method names): the translator decides what is supported and
//! rejects the rest with [`ExpressionError::UnsupportedExpression`](crate::ExpressionError).

use std::fmt;

use crate::value::Value;

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Binary operator: logical, comparison or arithmetic.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left-hand side.
        left: Box<Expr>,
        /// Right-hand side.
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Property access, rooted at a logical property name.
    Member(AttributePath),
    /// Literal value.
    Constant(Value),
    /// Pseudo-method call, mapped to a DynamoDB function or update operator.
    Call {
        /// Method name (`begins_with`, `increment`, ...).
        method: String,
        /// Arguments in order.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Binary node.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Call node.
    #[must_use]
    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            method: method.into(),
            args,
        }
    }

    /// Literal node.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Node kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binary { .. } => "binary",
            Self::Not(_) => "not",
            Self::Member(_) => "member",
            Self::Constant(_) => "constant",
            Self::Call { .. } => "call",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Subtract,
    /// Multiplication (`*`).
    Multiply,
    /// Division (`/`).
    Divide,
    /// Remainder (`%`).
    Modulo,
}

impl BinaryOp {
    /// Whether this is `AND` or `OR`.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Whether this is one of the six comparison operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Operator name, used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Eq => "equal",
            Self::Ne => "not_equal",
            Self::Lt => "less_than",
            Self::Le => "less_than_or_equal",
            Self::Gt => "greater_than",
            Self::Ge => "greater_than_or_equal",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Modulo => "modulo",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
            Self::Modulo => write!(f, "%"),
        }
    }
}

/// A document path: a logical property followed by map keys and list indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    /// The path elements in order. The first one names the logical property.
    pub elements: Vec<PathElement>,
}

impl AttributePath {
    /// Path to a top-level logical property.
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            elements: vec![PathElement::Attribute(property.into())],
        }
    }

    /// Logical property the path is rooted at.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        match self.elements.first() {
            Some(PathElement::Attribute(name)) => Some(name),
            _ => None,
        }
    }

    /// Whether the path goes below the top-level property.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.elements.len() > 1
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) if i > 0 => write!(f, ".{name}")?,
                PathElement::Attribute(name) => write!(f, "{name}")?,
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A named attribute or map key.
    Attribute(String),
    /// A list index (`[0]`).
    Index(usize),
}

/// One mutated property of an update: `target <- value`.
///
/// Plain values and `if_not_exists`/`list_append`/`+`/`-` trees compile into
/// `SET`; `increment` and `add_to_set` calls into `ADD`; `delete_from_set` into
/// `DELETE`; a `remove` call into `REMOVE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Property being mutated.
    pub target: AttributePath,
    /// Value tree.
    pub value: Expr,
}

/// Update clause groups, ordered as they are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateClause {
    /// `SET path = value`.
    Set,
    /// `ADD path value`.
    Add,
    /// `REMOVE path`.
    Remove,
    /// `DELETE path value`.
    Delete,
}

impl UpdateClause {
    /// Clause keyword.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for UpdateClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_display_nested_path() {
        let path = AttributePath {
            elements: vec![
                PathElement::Attribute("Profile".to_owned()),
                PathElement::Attribute("tags".to_owned()),
                PathElement::Index(2),
            ],
        };
        assert_eq!(path.to_string(), "Profile.tags[2]");
        assert_eq!(path.root(), Some("Profile"));
        assert!(path.is_nested());
    }

    #[test]
    fn test_should_order_update_clauses() {
        let mut clauses = vec![
            UpdateClause::Delete,
            UpdateClause::Remove,
            UpdateClause::Set,
            UpdateClause::Add,
        ];
        clauses.sort();
        let keywords: Vec<&str> = clauses.into_iter().map(UpdateClause::keyword).collect();
        assert_eq!(keywords, ["SET", "ADD", "REMOVE", "DELETE"]);
    }
}
