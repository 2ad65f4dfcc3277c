use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::key::{fold_case, sanitize_column, same_text};
use crate::similarity::SimilarityMetric;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub customers: Vec<CustomerConfig>,
}

// ---------------------------------------------------------------------------
// Matching + fuzzy defaults
// ---------------------------------------------------------------------------

/// How cancelled lines are recognised when classifying duplicates.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_order_type_column")]
    pub order_type_column: String,
    #[serde(default = "default_cancelled_value")]
    pub cancelled_value: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            order_type_column: default_order_type_column(),
            cancelled_value: default_cancelled_value(),
        }
    }
}

fn default_order_type_column() -> String {
    "ORDER TYPE".into()
}

fn default_cancelled_value() -> String {
    "CANCELLED".into()
}

/// Global fuzzy matching policy.
///
/// Shipments scoring at least `auto_accept_threshold` are auto-matched;
/// those between `review_threshold` and `auto_accept_threshold` are queued
/// for review; anything lower stays unmatched.
#[derive(Debug, Clone, Deserialize)]
pub struct FuzzyConfig {
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    #[serde(default = "default_auto_accept_threshold")]
    pub auto_accept_threshold: f64,
    #[serde(default)]
    pub metric: SimilarityMetric,
    /// Restrict candidates to orders sharing the anchor (PO) value.
    #[serde(default = "default_true")]
    pub require_anchor: bool,
    #[serde(default = "default_weight")]
    pub default_weight: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            review_threshold: default_review_threshold(),
            auto_accept_threshold: default_auto_accept_threshold(),
            metric: SimilarityMetric::default(),
            require_anchor: true,
            default_weight: default_weight(),
        }
    }
}

fn default_review_threshold() -> f64 {
    0.60
}

fn default_auto_accept_threshold() -> f64 {
    0.85
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Source columns
// ---------------------------------------------------------------------------

/// Columns the record source filters on.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_order_customer_column")]
    pub order_customer_column: String,
    #[serde(default = "default_shipment_customer_column")]
    pub shipment_customer_column: String,
    #[serde(default = "default_po_column")]
    pub order_po_column: String,
    #[serde(default = "default_po_column")]
    pub shipment_po_column: String,
    #[serde(default = "default_shipment_date_column")]
    pub shipment_date_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            order_customer_column: default_order_customer_column(),
            shipment_customer_column: default_shipment_customer_column(),
            order_po_column: default_po_column(),
            shipment_po_column: default_po_column(),
            shipment_date_column: default_shipment_date_column(),
        }
    }
}

fn default_order_customer_column() -> String {
    "CUSTOMER NAME".into()
}

fn default_shipment_customer_column() -> String {
    "SHIPPED TO".into()
}

fn default_po_column() -> String {
    "PO NUMBER".into()
}

fn default_shipment_date_column() -> String {
    "SHIP DATE".into()
}

// ---------------------------------------------------------------------------
// Customer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerConfig {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub master_order_list: Vec<String>,
    #[serde(default)]
    pub shipped: Vec<String>,
    #[serde(default)]
    pub order_key_config: KeyConfig,
    #[serde(default)]
    pub shipment_key_config: ShipmentKeyConfig,
    #[serde(default)]
    pub fuzzy: CustomerFuzzyConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub unique_keys: Vec<String>,
    #[serde(default)]
    pub extra_checks: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentKeyConfig {
    #[serde(default)]
    pub unique_keys: Vec<String>,
    #[serde(default)]
    pub extra_checks: Vec<String>,
    /// Join columns, in match order. The first entry is the default anchor.
    #[serde(default)]
    pub column_mapping: Vec<ColumnPair>,
}

/// An order-side column and the shipment-side column holding the same field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ColumnPair {
    pub order: String,
    pub shipment: String,
}

impl ColumnPair {
    pub fn new(order: impl Into<String>, shipment: impl Into<String>) -> Self {
        Self { order: order.into(), shipment: shipment.into() }
    }
}

/// Per-customer fuzzy overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFuzzyConfig {
    /// Order-side column used to bound the candidate search. Defaults to
    /// the first `column_mapping` entry.
    #[serde(default)]
    pub anchor: Option<String>,
    /// Weight per order-side column; unlisted columns use `default_weight`.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub quantity: Vec<QuantityColumn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuantityColumn {
    pub order: String,
    pub shipment: String,
    /// Fraction of the order quantity treated as an exact hit.
    pub tolerance: f64,
}

impl CustomerConfig {
    /// Every spelling of this customer across source systems, canonical first.
    pub fn names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        std::iter::once(&self.canonical)
            .chain(&self.aliases)
            .chain(&self.master_order_list)
            .chain(&self.shipped)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && seen.insert(fold_case(n)))
            .collect()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        !name.trim().is_empty() && self.names().iter().any(|n| same_text(n, name))
    }

    /// Checks the key lists a run needs. Failing here is fatal for this
    /// customer only.
    pub fn validate_keys(&self) -> Result<(), ReconError> {
        let missing = |field: &str| ReconError::MissingKeyConfig {
            customer: self.canonical.clone(),
            field: field.into(),
        };
        if self.order_key_config.unique_keys.is_empty() {
            return Err(missing("order_key_config.unique_keys"));
        }
        if self.shipment_key_config.unique_keys.is_empty() {
            return Err(missing("shipment_key_config.unique_keys"));
        }
        if self.shipment_key_config.column_mapping.is_empty() {
            return Err(missing("shipment_key_config.column_mapping"));
        }
        Ok(())
    }

    fn validate_structure(&self) -> Result<(), ReconError> {
        let who = &self.canonical;
        let lists = [
            ("order_key_config.unique_keys", &self.order_key_config.unique_keys),
            ("order_key_config.extra_checks", &self.order_key_config.extra_checks),
            ("shipment_key_config.unique_keys", &self.shipment_key_config.unique_keys),
            ("shipment_key_config.extra_checks", &self.shipment_key_config.extra_checks),
        ];
        for (field, columns) in lists {
            if columns.iter().any(|c| sanitize_column(c).is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "customer '{who}': blank column name in {field}"
                )));
            }
        }

        for pair in &self.shipment_key_config.column_mapping {
            if sanitize_column(&pair.order).is_empty() || sanitize_column(&pair.shipment).is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "customer '{who}': blank column name in column_mapping"
                )));
            }
        }

        if let Some(ref anchor) = self.fuzzy.anchor {
            let anchor = sanitize_column(anchor);
            let mapped = self
                .shipment_key_config
                .column_mapping
                .iter()
                .any(|p| sanitize_column(&p.order) == anchor);
            if !mapped {
                return Err(ReconError::ConfigValidation(format!(
                    "customer '{who}': fuzzy anchor '{anchor}' is not in column_mapping"
                )));
            }
        }

        for (column, weight) in &self.fuzzy.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "customer '{who}': weight for '{column}' must be a non-negative number"
                )));
            }
        }

        for q in &self.fuzzy.quantity {
            if !q.tolerance.is_finite() || q.tolerance < 0.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "customer '{who}': quantity tolerance for '{}' must be non-negative",
                    q.order
                )));
            }
        }

        Ok(())
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

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        if self.customers.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one customer is required".into(),
            ));
        }

        let fuzzy = &self.fuzzy;
        let in_range = |t: f64| t > 0.0 && t <= 1.0;
        if !in_range(fuzzy.review_threshold) || !in_range(fuzzy.auto_accept_threshold) {
            return Err(ReconError::ConfigValidation(format!(
                "fuzzy thresholds must be in (0, 1], got review={} auto_accept={}",
                fuzzy.review_threshold, fuzzy.auto_accept_threshold
            )));
        }
        if fuzzy.review_threshold > fuzzy.auto_accept_threshold {
            return Err(ReconError::ConfigValidation(format!(
                "review_threshold ({}) must not exceed auto_accept_threshold ({})",
                fuzzy.review_threshold, fuzzy.auto_accept_threshold
            )));
        }
        if !fuzzy.default_weight.is_finite() || fuzzy.default_weight < 0.0 {
            return Err(ReconError::ConfigValidation(
                "default_weight must be a non-negative number".into(),
            ));
        }

        let mut seen = HashSet::new();
        for customer in &self.customers {
            let canonical = customer.canonical.trim();
            if canonical.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "customer canonical name must not be empty".into(),
                ));
            }
            if !seen.insert(fold_case(canonical)) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate customer '{canonical}'"
                )));
            }
            customer.validate_structure()?;
        }

        Ok(())
    }

    /// Find the customer whose canonical name or any alias matches `name`.
    pub fn customer(&self, name: &str) -> Option<&CustomerConfig> {
        self.customers.iter().find(|c| c.matches_name(name))
    }

    pub fn customer_or_err(&self, name: &str) -> Result<&CustomerConfig, ReconError> {
        self.customer(name)
            .ok_or_else(|| ReconError::MissingCustomerConfig(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
