//! Model types for the dynexpr expression compiler.
//!
//! This crate holds the two pieces of data the compiler reads but never
//! produces on its own: the DynamoDB [`AttributeValue`] wire type that ends up
//! in `ExpressionAttributeValues`, and the [`EntityMetadata`] tables that code
//! generation emits for every mapped entity.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod metadata;

pub use attribute_value::AttributeValue;
pub use metadata::{
    DiscriminatorMetadata, EntityMetadata, GeoEncoding, IndexMetadata, KeyRole, MetadataError,
    PropertyMetadata, RelationshipMetadata, TimezoneMode,
};
