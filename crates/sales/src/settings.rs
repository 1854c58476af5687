//! Module settings.

use serde::{Deserialize, Serialize};

/// Environment variable enabling per-line price lists.
pub const MULTI_PRICELIST_ENABLED: &str = "MULTI_PRICELIST_ENABLED";

/// Configuration for the multi price list feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistSettings {
    /// Show the per-line price list controls.
    pub multi_pricelist_enabled: bool,
}

impl PricelistSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (env, config file, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let multi_pricelist_enabled = match lookup(MULTI_PRICELIST_ENABLED) {
            None => false,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    key = MULTI_PRICELIST_ENABLED,
                    value = %raw,
                    "unrecognized flag value, treating as disabled"
                );
                false
            }),
        };
        Self {
            multi_pricelist_enabled,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
