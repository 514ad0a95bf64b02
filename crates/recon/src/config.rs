use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Column-role table plus input filters. Every section is optional; missing
/// sections fall back to the built-in defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    pub detail: DetailRoles,
    pub external: ExternalRoles,
    pub filter: FilterConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            detail: DetailRoles::default(),
            external: ExternalRoles::default(),
            filter: FilterConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column roles
// ---------------------------------------------------------------------------

/// Header predicates for one column role, matched case-insensitively against
/// trimmed header names. Exact names are tried before substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolePredicates {
    pub exact: Vec<String>,
    pub contains: Vec<String>,
}

impl RolePredicates {
    fn new(exact: &[&str], contains: &[&str]) -> Self {
        Self {
            exact: exact.iter().map(|s| s.to_string()).collect(),
            contains: contains.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn matches_exact(&self, header: &str) -> bool {
        let h = header.trim().to_lowercase();
        self.exact.iter().any(|name| name.trim().to_lowercase() == h)
    }

    pub fn matches_contains(&self, header: &str) -> bool {
        let h = header.trim().to_lowercase();
        self.contains
            .iter()
            .any(|needle| h.contains(&needle.trim().to_lowercase()))
    }

    /// All predicate strings, for error messages.
    pub fn candidates(&self) -> Vec<String> {
        self.exact
            .iter()
            .cloned()
            .chain(self.contains.iter().map(|c| format!("*{c}*")))
            .collect()
    }

    fn validate(&self, section: &str, role: &str) -> Result<(), ReconError> {
        if self.exact.is_empty() && self.contains.is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{section}.{role}: at least one exact or contains name is required"
            )));
        }
        if self.exact.iter().chain(&self.contains).any(|n| n.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(format!(
                "{section}.{role}: column names must not be blank"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetailRoles {
    pub primary_key: RolePredicates,
    pub fallback_key: RolePredicates,
    pub quantity: RolePredicates,
}

impl Default for DetailRoles {
    fn default() -> Self {
        Self {
            primary_key: RolePredicates::new(
                &["iet #", "iet#", "sku", "part number", "part #", "part", "item"],
                &["iet", "sku", "part"],
            ),
            fallback_key: RolePredicates::new(
                &["upc", "alt sku", "alternate sku", "mfr part", "mfr #"],
                &["upc", "alternate"],
            ),
            quantity: RolePredicates::new(
                &["qty", "quantity", "count", "simple", "on hand"],
                &["qty", "quantity"],
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalRoles {
    pub key: RolePredicates,
    pub quantity: RolePredicates,
    pub internal_total: RolePredicates,
    pub external_total: RolePredicates,
    pub variance: RolePredicates,
}

impl Default for ExternalRoles {
    fn default() -> Self {
        Self {
            key: RolePredicates::new(
                &["iet #", "iet#", "sku", "part number", "part #", "part", "item", "barcode"],
                &["iet", "sku", "part", "barcode"],
            ),
            quantity: RolePredicates::new(
                &["qty", "quantity", "count"],
                &["qty", "quantity", "count"],
            ),
            internal_total: RolePredicates::new(
                &["simple", "simple_rt", "internal"],
                &["simple", "internal"],
            ),
            external_total: RolePredicates::new(&["rt", "external", "scanned"], &["external"]),
            variance: RolePredicates::new(&["diff", "diff_rt", "variance"], &["diff", "variance"]),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// External rows whose raw key contains any of these (case-insensitive)
    /// are dropped before aggregation. Pivot exports carry such summary rows.
    pub exclude_key_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_key_patterns: vec![
                "grand total".into(),
                "row labels".into(),
                "(blank)".into(),
            ],
        }
    }
}

impl FilterConfig {
    pub fn excludes(&self, raw_key: &str) -> bool {
        let k = raw_key.to_lowercase();
        self.exclude_key_patterns
            .iter()
            .any(|p| k.contains(&p.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.detail.primary_key.validate("detail", "primary_key")?;
        self.detail.fallback_key.validate("detail", "fallback_key")?;
        self.detail.quantity.validate("detail", "quantity")?;

        self.external.key.validate("external", "key")?;
        self.external.quantity.validate("external", "quantity")?;
        self.external.internal_total.validate("external", "internal_total")?;
        self.external.external_total.validate("external", "external_total")?;
        self.external.variance.validate("external", "variance")?;

        if self.filter.exclude_key_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "filter.exclude_key_patterns: patterns must not be blank".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
