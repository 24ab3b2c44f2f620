//! Compiler configuration.
//!
//! Like every other setting in the stack, configuration is driven by
//! environment variables with sensible defaults.

use std::env;

use serde::{Deserialize, Serialize};

/// Settings shared by every compilation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Prefix of generated value placeholders (`:p0`, `:p1`, ...).
    pub value_prefix: String,
    /// Prefix of generated name placeholders (`#status`).
    pub name_prefix: String,
    /// Date/time format used when a value has no explicit specifier.
    pub default_date_format: String,
    /// Whether raw expression fragments with caller-supplied maps are accepted.
    pub allow_raw_expressions: bool,
}

impl CompilerConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            value_prefix: env::var("DYNEXPR_VALUE_PREFIX").unwrap_or(defaults.value_prefix),
            name_prefix: env::var("DYNEXPR_NAME_PREFIX").unwrap_or(defaults.name_prefix),
            default_date_format: env::var("DYNEXPR_DEFAULT_DATE_FORMAT")
                .unwrap_or(defaults.default_date_format),
            allow_raw_expressions: env_bool(
                "DYNEXPR_ALLOW_RAW_EXPRESSIONS",
                defaults.allow_raw_expressions,
            ),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            value_prefix: ":p".to_owned(),
            name_prefix: "#".to_owned(),
            default_date_format: "o".to_owned(),
            allow_raw_expressions: true,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
