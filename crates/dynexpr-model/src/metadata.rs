//! Entity metadata consumed by the expression compiler.
//!
//! Code generation emits one [`EntityMetadata`] per mapped entity type. The
//! compiler only reads these tables: every logical property referenced by a
//! typed expression is resolved here to its physical attribute name, key role,
//! value format and encryption flag.
//!
//! All types derive serde so metadata can also be shipped as JSON next to a
//! table definition.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Errors raised by [`EntityMetadata::validate`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Two properties map onto the same physical attribute.
    #[error("entity {entity}: attribute '{attribute}' is mapped by more than one property")]
    DuplicateAttribute {
        /// Entity (table) name.
        entity: String,
        /// The duplicated attribute name.
        attribute: String,
    },
    /// More than one property carries the same key role.
    #[error("entity {entity}: more than one {role} key property ({first}, {second})")]
    DuplicateKey {
        /// Entity (table) name.
        entity: String,
        /// The repeated role.
        role: KeyRole,
        /// First property holding the role.
        first: String,
        /// Second property holding the role.
        second: String,
    },
    /// An index references an attribute no property maps.
    #[error("entity {entity}: index '{index}' references unknown attribute '{attribute}'")]
    UnknownIndexAttribute {
        /// Entity (table) name.
        entity: String,
        /// Index name.
        index: String,
        /// Attribute name.
        attribute: String,
    },
}

/// Key role a property plays in the table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyRole {
    /// Not part of the primary key.
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// Partition (hash) key.
    #[serde(rename = "HASH")]
    Partition,
    /// Sort (range) key.
    #[serde(rename = "RANGE")]
    Sort,
}

impl KeyRole {
    /// Returns the DynamoDB wire-format string representation of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Partition => "HASH",
            Self::Sort => "RANGE",
        }
    }

    /// Returns `true` for partition and sort keys.
    #[must_use]
    pub fn is_key(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("non-key"),
            Self::Partition => f.write_str("partition"),
            Self::Sort => f.write_str("sort"),
        }
    }
}

/// Timezone normalization applied to date/time values before formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimezoneMode {
    /// Keep the offset the value carries.
    #[default]
    None,
    /// Convert to UTC.
    Utc,
    /// Convert to the host's local timezone.
    Local,
}

/// Geospatial index encoding parameters for a location-typed property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoEncoding {
    /// Cell scheme understood by the registered geo encoder (e.g. `geohash`, `s2`).
    pub scheme: String,
    /// Cell precision / level.
    pub precision: u8,
}

/// Mapping of one logical property onto a physical attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMetadata {
    /// Logical (Rust-side) property name.
    pub logical_name: String,
    /// Physical DynamoDB attribute name.
    pub attribute_name: String,
    /// Key role of the attribute.
    #[serde(default)]
    pub key_role: KeyRole,
    /// Value format specifier (date pattern, numeric pattern).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Timezone normalization for date/time values.
    #[serde(default)]
    pub timezone: TimezoneMode,
    /// Whether values must be encrypted before leaving the compiler.
    #[serde(default)]
    pub encrypted: bool,
    /// Geospatial encoding parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoEncoding>,
}

impl PropertyMetadata {
    /// Create a plain, non-key property mapping.
    #[must_use]
    pub fn new(logical_name: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            attribute_name: attribute_name.into(),
            key_role: KeyRole::None,
            format: None,
            timezone: TimezoneMode::None,
            encrypted: false,
            geo: None,
        }
    }

    /// Mark the property as the partition key.
    #[must_use]
    pub fn partition_key(mut self) -> Self {
        self.key_role = KeyRole::Partition;
        self
    }

    /// Mark the property as the sort key.
    #[must_use]
    pub fn sort_key(mut self) -> Self {
        self.key_role = KeyRole::Sort;
        self
    }

    /// Set the value format specifier.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the timezone normalization mode.
    #[must_use]
    pub fn with_timezone(mut self, timezone: TimezoneMode) -> Self {
        self.timezone = timezone;
        self
    }

    /// Mark the property as encrypted.
    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    /// Attach geospatial encoding parameters.
    #[must_use]
    pub fn with_geo(mut self, geo: GeoEncoding) -> Self {
        self.geo = Some(geo);
        self
    }
}

/// A secondary index and its key attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// Index name.
    pub name: String,
    /// Partition key attribute name.
    pub partition_key: String,
    /// Sort key attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

impl IndexMetadata {
    /// Create an index description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.map(ToOwned::to_owned),
        }
    }

    /// Returns `true` if `attribute` is one of this index's key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        self.partition_key == attribute || self.sort_key.as_deref() == Some(attribute)
    }
}

/// A related entity stored in the same item collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMetadata {
    /// Logical property holding the related entity (or collection).
    pub property_name: String,
    /// Sort key pattern identifying related items (e.g. `ORDER#*`).
    pub sort_key_pattern: String,
    /// Related entity type name.
    pub entity_type: String,
    /// Whether the property holds a collection.
    #[serde(default)]
    pub is_collection: bool,
}

/// Attribute/value pair identifying an entity type in a shared table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatorMetadata {
    /// Attribute holding the type tag.
    pub attribute_name: String,
    /// Tag value for this entity.
    pub value: String,
}

/// Compile-time description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    /// Table the entity lives in.
    pub table_name: String,
    /// Type discriminator for single-table designs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<DiscriminatorMetadata>,
    /// Mapped properties, in declaration order.
    pub properties: Vec<PropertyMetadata>,
    /// Secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexMetadata>,
    /// Related entities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipMetadata>,
    /// Whether one logical entity spans several items.
    #[serde(default)]
    pub multi_item: bool,
}

impl EntityMetadata {
    /// Start the metadata for an entity stored in `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            discriminator: None,
            properties: Vec::new(),
            indexes: Vec::new(),
            relationships: Vec::new(),
            multi_item: false,
        }
    }

    /// Append a property mapping.
    #[must_use]
    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    /// Append a secondary index.
    #[must_use]
    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.indexes.push(index);
        self
    }

    /// Append a relationship.
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipMetadata) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Set the type discriminator.
    #[must_use]
    pub fn with_discriminator(
        mut self,
        attribute_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.discriminator = Some(DiscriminatorMetadata {
            attribute_name: attribute_name.into(),
            value: value.into(),
        });
        self
    }

    /// Mark the entity as spanning multiple items.
    #[must_use]
    pub fn multi_item(mut self) -> Self {
        self.multi_item = true;
        self
    }

    /// Look up a property by its logical name.
    #[must_use]
    pub fn property(&self, logical_name: &str) -> Option<&PropertyMetadata> {
        self.properties
            .iter()
            .find(|p| p.logical_name == logical_name)
    }

    /// Look up a property by its physical attribute name.
    #[must_use]
    pub fn property_by_attribute(&self, attribute_name: &str) -> Option<&PropertyMetadata> {
        self.properties
            .iter()
            .find(|p| p.attribute_name == attribute_name)
    }

    /// The partition key property, if declared.
    #[must_use]
    pub fn partition_key(&self) -> Option<&PropertyMetadata> {
        self.properties
            .iter()
            .find(|p| p.key_role == KeyRole::Partition)
    }

    /// The sort key property, if declared.
    #[must_use]
    pub fn sort_key(&self) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.key_role == KeyRole::Sort)
    }

    /// Look up a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMetadata> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Check the structural invariants: unique attribute names, at most one
    /// partition and one sort key, and index keys that point at mapped attributes.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let mut seen = HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.attribute_name.as_str()) {
                return Err(MetadataError::DuplicateAttribute {
                    entity: self.table_name.clone(),
                    attribute: property.attribute_name.clone(),
                });
            }
        }

        for role in [KeyRole::Partition, KeyRole::Sort] {
            let mut holders = self.properties.iter().filter(|p| p.key_role == role);
            if let (Some(first), Some(second)) = (holders.next(), holders.next()) {
                return Err(MetadataError::DuplicateKey {
                    entity: self.table_name.clone(),
                    role,
                    first: first.logical_name.clone(),
                    second: second.logical_name.clone(),
                });
            }
        }

        for index in &self.indexes {
            let keys = std::iter::once(&index.partition_key).chain(index.sort_key.as_ref());
            for attribute in keys {
                if !seen.contains(attribute.as_str()) {
                    return Err(MetadataError::UnknownIndexAttribute {
                        entity: self.table_name.clone(),
                        index: index.name.clone(),
                        attribute: attribute.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> EntityMetadata {
        EntityMetadata::new("orders")
            .with_property(PropertyMetadata::new("CustomerId", "pk").partition_key())
            .with_property(PropertyMetadata::new("OrderId", "sk").sort_key())
            .with_property(PropertyMetadata::new("Status", "status"))
            .with_index(IndexMetadata::new("by-status", "status", Some("sk")))
    }

    #[test]
    fn test_should_resolve_property_by_logical_name() {
        let meta = orders();
        let status = meta.property("Status").unwrap();
        assert_eq!(status.attribute_name, "status");
        assert_eq!(status.key_role, KeyRole::None);
        assert!(meta.property("Missing").is_none());
    }

    #[test]
    fn test_should_find_key_properties() {
        let meta = orders();
        assert_eq!(meta.partition_key().unwrap().logical_name, "CustomerId");
        assert_eq!(meta.sort_key().unwrap().logical_name, "OrderId");
        assert_eq!(meta.property_by_attribute("sk").unwrap().logical_name, "OrderId");
    }

    #[test]
    fn test_should_validate_well_formed_metadata() {
        assert!(orders().validate().is_ok());
    }

    #[test]
    fn test_should_reject_duplicate_attribute() {
        let meta = orders().with_property(PropertyMetadata::new("State", "status"));
        assert!(matches!(
            meta.validate(),
            Err(MetadataError::DuplicateAttribute { ref attribute, .. }) if attribute == "status"
        ));
    }

    #[test]
    fn test_should_reject_second_partition_key() {
        let meta = orders().with_property(PropertyMetadata::new("Tenant", "tenant").partition_key());
        assert!(matches!(
            meta.validate(),
            Err(MetadataError::DuplicateKey { role: KeyRole::Partition, .. })
        ));
    }

    #[test]
    fn test_should_reject_index_on_unknown_attribute() {
        let meta = orders().with_index(IndexMetadata::new("gsi", "missing", None));
        assert!(matches!(
            meta.validate(),
            Err(MetadataError::UnknownIndexAttribute { ref index, .. }) if index == "gsi"
        ));
    }

    #[test]
    fn test_should_check_index_key_attributes() {
        let meta = orders();
        let index = meta.index("by-status").unwrap();
        assert!(index.is_key_attribute("status"));
        assert!(index.is_key_attribute("sk"));
        assert!(!index.is_key_attribute("pk"));
    }

    #[test]
    fn test_should_deserialize_metadata_from_json() {
        let json = r#"{
            "tableName": "orders",
            "properties": [
                {"logicalName": "CustomerId", "attributeName": "pk", "keyRole": "HASH"},
                {"logicalName": "Card", "attributeName": "card", "encrypted": true}
            ]
        }"#;
        let meta: EntityMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.partition_key().unwrap().attribute_name, "pk");
        assert!(meta.property("Card").unwrap().encrypted);
        assert!(!meta.multi_item);
    }
}
