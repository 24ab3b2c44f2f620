//! End-to-end tests for the dynexpr expression compiler.
//!
//! Every test compiles full request fragments through the public builders
//! against the fixture entities defined here.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{LazyLock, Once};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dynexpr_core::error::BoxError;
use dynexpr_core::{EncryptionContext, Entity, FieldEncryptor, Property};
use dynexpr_model::{EntityMetadata, IndexMetadata, PropertyMetadata, TimezoneMode};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize tracing for tests (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Bank account stored in the `accounts` table.
#[derive(Debug)]
pub struct Account;

impl Account {
    /// Partition key.
    pub const ACCOUNT_ID: Property<Account, String> = Property::new("AccountId");
    /// Sort key, stored as a UTC day.
    pub const OPENED_ON: Property<Account, DateTime<Utc>> = Property::new("OpenedOn");
    /// Lifecycle status.
    pub const STATUS: Property<Account, String> = Property::new("Status");
    /// Balance in cents.
    pub const BALANCE: Property<Account, i64> = Property::new("Balance");
    /// Encrypted card number.
    pub const CARD_NUMBER: Property<Account, String> = Property::new("CardNumber");
    /// Free-form labels.
    pub const LABELS: Property<Account, BTreeSet<String>> = Property::new("Labels");
    /// Audit trail.
    pub const HISTORY: Property<Account, Vec<String>> = Property::new("History");
    /// Encrypted map of security answers.
    pub const VAULT: Property<Account, BTreeMap<String, String>> = Property::new("Vault");
    /// Closing day, unset while the account is open.
    pub const CLOSED_ON: Property<Account, Option<DateTime<Utc>>> = Property::new("ClosedOn");
}

impl Entity for Account {
    fn metadata() -> &'static EntityMetadata {
        static METADATA: LazyLock<EntityMetadata> = LazyLock::new(|| {
            EntityMetadata::new("accounts")
                .with_property(PropertyMetadata::new("AccountId", "pk").partition_key())
                .with_property(
                    PropertyMetadata::new("OpenedOn", "sk")
                        .sort_key()
                        .with_format("yyyy-MM-dd")
                        .with_timezone(TimezoneMode::Utc),
                )
                .with_property(PropertyMetadata::new("Status", "status"))
                .with_property(PropertyMetadata::new("Balance", "balance"))
                .with_property(PropertyMetadata::new("CardNumber", "card").encrypted())
                .with_property(PropertyMetadata::new("Labels", "labels"))
                .with_property(PropertyMetadata::new("History", "history"))
                .with_property(PropertyMetadata::new("Vault", "vault").encrypted())
                .with_property(PropertyMetadata::new("ClosedOn", "closed_on").with_format("yyyy-MM-dd"))
                .with_index(IndexMetadata::new("by-status", "status", Some("balance")))
        });
        &METADATA
    }
}

/// Encryptor that tags the plaintext with its destination and reverses it.
#[derive(Debug, Default)]
pub struct TaggingEncryptor;

impl FieldEncryptor for TaggingEncryptor {
    fn encrypt(&self, plaintext: &[u8], context: &EncryptionContext<'_>) -> Result<Bytes, BoxError> {
        let mut out = format!("{}/{}:", context.table, context.attribute).into_bytes();
        out.extend(plaintext.iter().rev());
        Ok(Bytes::from(out))
    }
}

/// Encryptor whose key service is unreachable.
#[derive(Debug, Default)]
pub struct UnavailableEncryptor;

impl FieldEncryptor for UnavailableEncryptor {
    fn encrypt(&self, _plaintext: &[u8], _context: &EncryptionContext<'_>) -> Result<Bytes, BoxError> {
        Err("key service unavailable".into())
    }
}

/// Value placeholders (`:name`) referenced by an expression.
#[must_use]
pub fn value_tokens(expression: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != ':' {
            continue;
        }
        let mut end = start + 1;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if end > start + 1 {
            tokens.push(expression[start..end].to_owned());
        }
    }
    tokens
}

/// Assert no value placeholder is referenced twice across `expressions`.
pub fn assert_distinct_value_tokens<'a>(expressions: impl IntoIterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for expression in expressions {
        for token in value_tokens(expression) {
            assert!(seen.insert(token.clone()), "value token {token} reused");
        }
    }
}

mod test_condition;
mod test_encryption;
mod test_format;
mod test_query;
mod test_update;
