//! Typed property wrappers.
//!
//! Generated code exposes one [`Property`] constant per mapped property:
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::LazyLock;
//!
//! use dynexpr_core::{Entity, EntityMetadata, Property, PropertyMetadata};
//!
//! struct Order;
//!
//! impl Order {
//!     const STATUS: Property<Order, String> = Property::new("Status");
//!     const TOTAL: Property<Order, i64> = Property::new("Total");
//!     const TAGS: Property<Order, BTreeSet<String>> = Property::new("Tags");
//! }
//!
//! impl Entity for Order {
//!     fn metadata() -> &'static EntityMetadata {
//!         static METADATA: LazyLock<EntityMetadata> = LazyLock::new(|| {
//!             EntityMetadata::new("orders")
//!                 .with_property(PropertyMetadata::new("Status", "status"))
//!                 .with_property(PropertyMetadata::new("Total", "total"))
//!                 .with_property(PropertyMetadata::new("Tags", "tags"))
//!         });
//!         &METADATA
//!     }
//! }
//!
//! let guard = Order::STATUS.eq("open") & Order::TOTAL.gt(100);
//! let bump = Order::TOTAL.increment(1);
//! let tag = Order::TAGS.add_elements(BTreeSet::from(["rush".to_owned()]));
//! # let _ = (guard, bump, tag);
//! ```
//!
//! Update operators are scoped by the property's value type. A numeric
//! property has no set operators, so this does not compile:
//!
//! ```compile_fail
//! use dynexpr_core::{Entity, EntityMetadata, Property};
//!
//! struct Counter;
//!
//! impl Entity for Counter {
//!     fn metadata() -> &'static EntityMetadata {
//!         unimplemented!()
//!     }
//! }
//!
//! const HITS: Property<Counter, i64> = Property::new("Hits");
//! let _ = HITS.add_elements(5);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{BitAnd, BitOr, Not};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};
use dynexpr_model::EntityMetadata;

use super::ast::{Assignment, AttributePath, BinaryOp, Expr, PathElement};
use crate::value::{GeoPoint, Value};

/// A persisted type with compile-time metadata.
pub trait Entity {
    /// Metadata describing the entity's table and properties.
    fn metadata() -> &'static EntityMetadata;
}

// ---------------------------------------------------------------------------
// Value categories
// ---------------------------------------------------------------------------

/// Rust types that can be stored in a property.
pub trait AttributeType: Into<Value> {}

/// Single-number types: enables `increment`, `set_add`, `set_subtract`.
pub trait Numeric: AttributeType {}

/// DynamoDB set types: enables `add_elements`, `delete_elements`.
pub trait SetType: AttributeType {}

/// Types supporting `contains`: strings (substring), sets and lists (element).
pub trait Containable: AttributeType {
    /// What `contains` looks for.
    type Element: Into<Value>;
}

macro_rules! attribute_types {
    ($($t:ty),* $(,)?) => {
        $(impl AttributeType for $t {})*
    };
}

macro_rules! numeric_types {
    ($($t:ty),* $(,)?) => {
        $(
            impl AttributeType for $t {}
            impl Numeric for $t {}
        )*
    };
}

numeric_types!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

attribute_types!(
    bool,
    String,
    Bytes,
    NaiveDate,
    NaiveDateTime,
    DateTime<FixedOffset>,
    DateTime<Utc>,
    DateTime<Local>,
    GeoPoint,
    Value,
);

impl<T: AttributeType> AttributeType for Option<T> {}
impl<T: AttributeType> AttributeType for Vec<T> {}
impl<T: AttributeType> AttributeType for BTreeMap<String, T> {}
impl<T: AttributeType> AttributeType for HashMap<String, T> {}

macro_rules! set_types {
    ($($t:ty => $elem:ty),* $(,)?) => {
        $(
            impl AttributeType for $t {}
            impl SetType for $t {}
            impl Containable for $t {
                type Element = $elem;
            }
        )*
    };
}

set_types!(
    BTreeSet<String> => String,
    HashSet<String> => String,
    BTreeSet<i64> => i64,
    HashSet<i64> => i64,
    BTreeSet<Vec<u8>> => Bytes,
);

impl Containable for String {
    type Element = String;
}

impl<T: AttributeType> Containable for Vec<T> {
    type Element = T;
}

/// Anything that can stand on the other side of an operator from a
/// `Property<E, T>`: a value of type `T` or another property of the same type.
pub trait IntoOperand<E, T> {
    /// Convert into an expression node.
    fn into_operand(self) -> Expr;
}

impl<E, T: AttributeType> IntoOperand<E, T> for T {
    fn into_operand(self) -> Expr {
        Expr::Constant(self.into())
    }
}

impl<E> IntoOperand<E, String> for &str {
    fn into_operand(self) -> Expr {
        Expr::Constant(Value::from(self))
    }
}

impl<E, T> IntoOperand<E, T> for Property<E, T> {
    fn into_operand(self) -> Expr {
        Expr::Member(self.path())
    }
}

impl<E, T> IntoOperand<E, T> for &Property<E, T> {
    fn into_operand(self) -> Expr {
        Expr::Member(self.path())
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A property of entity `E` holding values of type `T`.
///
/// The wrapper only builds expression trees; it never holds data.
pub struct Property<E, T> {
    root: &'static str,
    tail: Vec<PathElement>,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Property<E, T> {
    /// Property named by its logical (Rust-side) name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            root: name,
            tail: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Member `name` of a map-valued property.
    #[must_use]
    pub fn field<U>(&self, name: &str) -> Property<E, U> {
        let mut tail = self.tail.clone();
        tail.push(PathElement::Attribute(name.to_owned()));
        Property {
            root: self.root,
            tail,
            _marker: PhantomData,
        }
    }

    /// Logical property name at the root of the path.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.root
    }

    /// Full document path.
    #[must_use]
    pub fn path(&self) -> AttributePath {
        let mut elements = Vec::with_capacity(self.tail.len() + 1);
        elements.push(PathElement::Attribute(self.root.to_owned()));
        elements.extend(self.tail.iter().cloned());
        AttributePath { elements }
    }

    fn member(&self) -> Expr {
        Expr::Member(self.path())
    }

    fn compare(&self, op: BinaryOp, other: impl IntoOperand<E, T>) -> Condition<E> {
        Condition::from_expr(Expr::binary(op, self.member(), other.into_operand()))
    }

    fn function(&self, name: &str, mut args: Vec<Expr>) -> Condition<E> {
        args.insert(0, self.member());
        Condition::from_expr(Expr::call(name, args))
    }

    fn action(&self, value: Expr) -> UpdateAction<E> {
        UpdateAction::from_assignment(Assignment {
            target: self.path(),
            value,
        })
    }

    /// `path = other`.
    #[must_use]
    pub fn eq(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Eq, other)
    }

    /// `path <> other`.
    #[must_use]
    pub fn ne(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Ne, other)
    }

    /// `path < other`.
    #[must_use]
    pub fn lt(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Lt, other)
    }

    /// `path <= other`.
    #[must_use]
    pub fn le(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Le, other)
    }

    /// `path > other`.
    #[must_use]
    pub fn gt(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Gt, other)
    }

    /// `path >= other`.
    #[must_use]
    pub fn ge(&self, other: impl IntoOperand<E, T>) -> Condition<E> {
        self.compare(BinaryOp::Ge, other)
    }

    /// `path BETWEEN low AND high`.
    #[must_use]
    pub fn between(
        &self,
        low: impl IntoOperand<E, T>,
        high: impl IntoOperand<E, T>,
    ) -> Condition<E> {
        self.function("between", vec![low.into_operand(), high.into_operand()])
    }

    /// `path IN (a, b, ...)`.
    #[must_use]
    pub fn is_in<I>(&self, candidates: I) -> Condition<E>
    where
        I: IntoIterator,
        I::Item: IntoOperand<E, T>,
    {
        let args = candidates.into_iter().map(IntoOperand::into_operand).collect();
        self.function("in", args)
    }

    /// `attribute_exists(path)`.
    #[must_use]
    pub fn exists(&self) -> Condition<E> {
        self.function("attribute_exists", Vec::new())
    }

    /// `attribute_not_exists(path)`.
    #[must_use]
    pub fn not_exists(&self) -> Condition<E> {
        self.function("attribute_not_exists", Vec::new())
    }

    /// `attribute_type(path, descriptor)`, e.g. `"S"`, `"NS"`, `"M"`.
    #[must_use]
    pub fn attribute_type(&self, descriptor: &str) -> Condition<E> {
        self.function("attribute_type", vec![Expr::constant(descriptor)])
    }

    /// `size(path)`, to be compared against a number.
    #[must_use]
    pub fn size(&self) -> SizeOperand<E> {
        SizeOperand {
            expr: self.function("size", Vec::new()).into_expr(),
            _marker: PhantomData,
        }
    }

    /// `SET path = value`.
    #[must_use]
    pub fn set(&self, value: impl IntoOperand<E, T>) -> UpdateAction<E> {
        self.action(value.into_operand())
    }

    /// `SET path = if_not_exists(path, value)`.
    #[must_use]
    pub fn set_if_not_exists(&self, value: impl IntoOperand<E, T>) -> UpdateAction<E> {
        self.action(Expr::call(
            "if_not_exists",
            vec![self.member(), value.into_operand()],
        ))
    }

    /// `REMOVE path`.
    #[must_use]
    pub fn remove(&self) -> UpdateAction<E> {
        self.action(Expr::call("remove", Vec::new()))
    }
}

impl<E> Property<E, String> {
    /// `begins_with(path, prefix)`.
    #[must_use]
    pub fn begins_with(&self, prefix: impl IntoOperand<E, String>) -> Condition<E> {
        self.function("begins_with", vec![prefix.into_operand()])
    }
}

impl<E, T: Containable> Property<E, T> {
    /// `contains(path, element)`: substring for strings, membership for sets
    /// and lists.
    #[must_use]
    pub fn contains(&self, element: impl Into<T::Element>) -> Condition<E> {
        let element: T::Element = element.into();
        self.function("contains", vec![Expr::Constant(element.into())])
    }
}

impl<E, T: Numeric> Property<E, T> {
    /// `ADD path amount`.
    #[must_use]
    pub fn increment(&self, amount: T) -> UpdateAction<E> {
        self.action(Expr::call("increment", vec![Expr::constant(amount)]))
    }

    /// `SET path = path + amount`.
    #[must_use]
    pub fn set_add(&self, amount: T) -> UpdateAction<E> {
        self.action(Expr::binary(
            BinaryOp::Add,
            self.member(),
            Expr::constant(amount),
        ))
    }

    /// `SET path = path - amount`.
    #[must_use]
    pub fn set_subtract(&self, amount: T) -> UpdateAction<E> {
        self.action(Expr::binary(
            BinaryOp::Subtract,
            self.member(),
            Expr::constant(amount),
        ))
    }
}

impl<E, T: SetType> Property<E, T> {
    /// `ADD path elements`.
    #[must_use]
    pub fn add_elements(&self, elements: T) -> UpdateAction<E> {
        self.action(Expr::call("add_to_set", vec![Expr::constant(elements)]))
    }

    /// `DELETE path elements`.
    #[must_use]
    pub fn delete_elements(&self, elements: T) -> UpdateAction<E> {
        self.action(Expr::call("delete_from_set", vec![Expr::constant(elements)]))
    }
}

impl<E, U: AttributeType> Property<E, Vec<U>> {
    /// Element `index` of a list-valued property.
    #[must_use]
    pub fn index(&self, index: usize) -> Property<E, U> {
        let mut tail = self.tail.clone();
        tail.push(PathElement::Index(index));
        Property {
            root: self.root,
            tail,
            _marker: PhantomData,
        }
    }

    /// `SET path = list_append(path, items)`.
    #[must_use]
    pub fn append(&self, items: Vec<U>) -> UpdateAction<E> {
        self.action(Expr::call(
            "list_append",
            vec![self.member(), Expr::constant(items)],
        ))
    }

    /// `SET path = list_append(items, path)`.
    #[must_use]
    pub fn prepend(&self, items: Vec<U>) -> UpdateAction<E> {
        self.action(Expr::call(
            "list_append",
            vec![Expr::constant(items), self.member()],
        ))
    }
}

impl<E, T> Clone for Property<E, T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            tail: self.tail.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E, T> fmt::Debug for Property<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&self.path().to_string()).finish()
    }
}

// ---------------------------------------------------------------------------
// Conditions and update actions
// ---------------------------------------------------------------------------

/// `size(path)` operand.
pub struct SizeOperand<E> {
    expr: Expr,
    _marker: PhantomData<fn() -> E>,
}

impl<E> SizeOperand<E> {
    fn compare(&self, op: BinaryOp, n: u64) -> Condition<E> {
        Condition::from_expr(Expr::binary(op, self.expr.clone(), Expr::constant(n)))
    }

    /// `size(path) = n`.
    #[must_use]
    pub fn eq(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Eq, n)
    }

    /// `size(path) <> n`.
    #[must_use]
    pub fn ne(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Ne, n)
    }

    /// `size(path) < n`.
    #[must_use]
    pub fn lt(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Lt, n)
    }

    /// `size(path) <= n`.
    #[must_use]
    pub fn le(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Le, n)
    }

    /// `size(path) > n`.
    #[must_use]
    pub fn gt(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Gt, n)
    }

    /// `size(path) >= n`.
    #[must_use]
    pub fn ge(&self, n: u64) -> Condition<E> {
        self.compare(BinaryOp::Ge, n)
    }

    /// `size(path) BETWEEN low AND high`.
    #[must_use]
    pub fn between(&self, low: u64, high: u64) -> Condition<E> {
        Condition::from_expr(Expr::call(
            "between",
            vec![self.expr.clone(), Expr::constant(low), Expr::constant(high)],
        ))
    }
}

impl<E> fmt::Debug for SizeOperand<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SizeOperand").field(&self.expr).finish()
    }
}

/// A boolean expression over entity `E`.
///
/// Combine with `&`, `|` and `!`.
pub struct Condition<E> {
    expr: Expr,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Condition<E> {
    /// Wrap a hand-built tree.
    #[must_use]
    pub fn from_expr(expr: Expr) -> Self {
        Self {
            expr,
            _marker: PhantomData,
        }
    }

    /// The underlying tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Unwrap the tree.
    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }
}

impl<E> BitAnd for Condition<E> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::from_expr(Expr::binary(BinaryOp::And, self.expr, rhs.expr))
    }
}

impl<E> BitOr for Condition<E> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::from_expr(Expr::binary(BinaryOp::Or, self.expr, rhs.expr))
    }
}

impl<E> Not for Condition<E> {
    type Output = Self;

    fn not(self) -> Self {
        Self::from_expr(Expr::Not(Box::new(self.expr)))
    }
}

impl<E> Clone for Condition<E> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<E> fmt::Debug for Condition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.expr).finish()
    }
}

/// One mutated property of an update over entity `E`.
pub struct UpdateAction<E> {
    assignment: Assignment,
    _marker: PhantomData<fn() -> E>,
}

impl<E> UpdateAction<E> {
    /// Wrap a hand-built assignment.
    #[must_use]
    pub fn from_assignment(assignment: Assignment) -> Self {
        Self {
            assignment,
            _marker: PhantomData,
        }
    }

    /// The underlying assignment.
    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }
}

impl<E> Clone for UpdateAction<E> {
    fn clone(&self) -> Self {
        Self::from_assignment(self.assignment.clone())
    }
}

impl<E> fmt::Debug for UpdateAction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdateAction").field(&self.assignment).finish()
    }
}
