//! Typed literal values before formatting.
//!
//! A [`Value`] keeps the Rust-side type of a literal (date, decimal, enum...)
//! so the formatter can apply property- or template-level specifiers before the
//! value is turned into a wire [`AttributeValue`](dynexpr_model::AttributeValue).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a coordinate.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A literal awaiting formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Binary floating point.
    Float(f64),
    /// Exact decimal in canonical text form (`-12.50`).
    Decimal(String),
    /// String.
    String(String),
    /// Enum member, rendered by name.
    Enum(String),
    /// Date and time with offset.
    DateTime(DateTime<FixedOffset>),
    /// Calendar date.
    Date(NaiveDate),
    /// Binary blob.
    Binary(Bytes),
    /// String set.
    StringSet(Vec<String>),
    /// Number set, canonical number text.
    NumberSet(Vec<String>),
    /// Binary set.
    BinarySet(Vec<Bytes>),
    /// List.
    List(Vec<Value>),
    /// Map.
    Map(BTreeMap<String, Value>),
    /// Geographic coordinate.
    Location(GeoPoint),
}

impl Value {
    /// Decimal literal from its text form.
    #[must_use]
    pub fn decimal(text: impl Into<String>) -> Self {
        Self::Decimal(text.into())
    }

    /// Enum literal from the member name.
    #[must_use]
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum(name.into())
    }

    /// Short name of the value category, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Enum(_) => "enum",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Binary(_) => "binary",
            Self::StringSet(_) => "string set",
            Self::NumberSet(_) => "number set",
            Self::BinarySet(_) => "binary set",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Location(_) => "location",
        }
    }

    /// Whether the value is a single number.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::UInt(_) | Self::Float(_) | Self::Decimal(_)
        )
    }
}

/// Build a positional argument list for format templates.
///
/// ```
/// use dynexpr_core::{Value, values};
///
/// let args = values!["USER#123", 42, true];
/// assert_eq!(args[1], Value::Int(42));
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::Value::from($arg)),+]
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::UInt(u64::from(v))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Binary(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v.and_utc().fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v.fixed_offset())
    }
}

impl From<DateTime<Local>> for Value {
    fn from(v: DateTime<Local>) -> Self {
        Self::DateTime(v.fixed_offset())
    }
}

impl From<GeoPoint> for Value {
    fn from(v: GeoPoint) -> Self {
        Self::Location(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Self::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>, S: std::hash::BuildHasher> From<HashMap<String, T, S>> for Value {
    fn from(v: HashMap<String, T, S>) -> Self {
        Self::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(v: BTreeSet<String>) -> Self {
        Self::StringSet(v.into_iter().collect())
    }
}

impl<S: std::hash::BuildHasher> From<HashSet<String, S>> for Value {
    fn from(v: HashSet<String, S>) -> Self {
        let mut items: Vec<String> = v.into_iter().collect();
        items.sort();
        Self::StringSet(items)
    }
}

impl From<BTreeSet<i64>> for Value {
    fn from(v: BTreeSet<i64>) -> Self {
        Self::NumberSet(v.into_iter().map(|n| n.to_string()).collect())
    }
}

impl<S: std::hash::BuildHasher> From<HashSet<i64, S>> for Value {
    fn from(v: HashSet<i64, S>) -> Self {
        let mut items: Vec<i64> = v.into_iter().collect();
        items.sort_unstable();
        Self::NumberSet(items.into_iter().map(|n| n.to_string()).collect())
    }
}

impl From<BTreeSet<Vec<u8>>> for Value {
    fn from(v: BTreeSet<Vec<u8>>) -> Self {
        Self::BinarySet(v.into_iter().map(Bytes::from).collect())
    }
}
