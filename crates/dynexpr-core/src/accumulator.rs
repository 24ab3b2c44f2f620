//! Name and value accumulators.
//!
//! Both accumulators are append-only. Inserting an identical `(token, binding)`
//! pair twice is a no-op; inserting a token that is already bound to something
//! else fails closed with [`ExpressionError::PlaceholderConflict`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use dynexpr_model::AttributeValue;

use crate::error::{ExpressionError, ExpressionResult};

/// Collects `ExpressionAttributeNames` (`#token` -> attribute name).
#[derive(Debug)]
pub struct NameAccumulator {
    prefix: String,
    names: HashMap<String, String>,
    by_attribute: HashMap<String, String>,
}

impl NameAccumulator {
    /// Create an empty accumulator issuing tokens with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            names: HashMap::new(),
            by_attribute: HashMap::new(),
        }
    }

    /// Bind `attribute` to a stable token and return it.
    ///
    /// The token is the attribute name with every character outside
    /// `[A-Za-z0-9_]` replaced by `_`. Binding the same attribute again returns
    /// the same token; a different attribute that sanitizes to a taken token
    /// gets a numeric suffix.
    pub fn bind(&mut self, attribute: &str) -> String {
        if let Some(token) = self.by_attribute.get(attribute) {
            return token.clone();
        }

        let stem: String = attribute
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let base = format!("{}{stem}", self.prefix);
        let mut token = base.clone();
        let mut suffix = 1;
        while self.names.contains_key(&token) {
            token = format!("{base}_{suffix}");
            suffix += 1;
        }

        tracing::trace!(%token, attribute, "bound attribute name");
        self.names.insert(token.clone(), attribute.to_owned());
        self.by_attribute.insert(attribute.to_owned(), token.clone());
        token
    }

    /// Insert an explicit `token -> attribute` binding.
    pub fn insert(
        &mut self,
        token: impl Into<String>,
        attribute: impl Into<String>,
    ) -> ExpressionResult<()> {
        let token = token.into();
        let attribute = attribute.into();
        match self.names.entry(token) {
            Entry::Occupied(entry) => {
                if *entry.get() == attribute {
                    return Ok(());
                }
                Err(ExpressionError::PlaceholderConflict {
                    token: entry.key().clone(),
                    existing: entry.get().clone(),
                    attempted: attribute,
                })
            }
            Entry::Vacant(entry) => {
                self.by_attribute
                    .entry(attribute.clone())
                    .or_insert_with(|| entry.key().clone());
                entry.insert(attribute);
                Ok(())
            }
        }
    }

    /// Attribute bound to `token`, if any.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.names.get(token).map(String::as_str)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the accumulator, returning the name map.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, String> {
        self.names
    }
}

/// Collects `ExpressionAttributeValues` (`:token` -> value).
#[derive(Debug, Default)]
pub struct ValueAccumulator {
    values: HashMap<String, AttributeValue>,
}

impl ValueAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `token -> value` binding.
    pub fn insert(&mut self, token: impl Into<String>, value: AttributeValue) -> ExpressionResult<()> {
        match self.values.entry(token.into()) {
            Entry::Occupied(entry) => {
                if *entry.get() == value {
                    return Ok(());
                }
                Err(ExpressionError::PlaceholderConflict {
                    token: entry.key().clone(),
                    existing: entry.get().to_string(),
                    attempted: value.to_string(),
                })
            }
            Entry::Vacant(entry) => {
                tracing::trace!(token = %entry.key(), %value, "bound attribute value");
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Whether `token` is bound.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.values.contains_key(token)
    }

    /// Value bound to `token`, if any.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&AttributeValue> {
        self.values.get(token)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the accumulator, returning the value map.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, AttributeValue> {
        self.values
    }
}
