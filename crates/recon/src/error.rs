use thiserror::Error;

use crate::model::RecordKind;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, duplicate customer, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// None of the configured key columns exist in the record schema.
    #[error("{kind} records: none of the key columns {columns:?} exist in the schema")]
    NoKeyColumns { kind: RecordKind, columns: Vec<String> },
    /// A customer entry lacks a required key list.
    #[error("customer '{customer}': missing required config '{field}'")]
    MissingKeyConfig { customer: String, field: String },
    /// No customer entry matches a name encountered in data.
    #[error("no customer config matches '{0}'")]
    MissingCustomerConfig(String),
    /// Record source failure (CSV read, bad filter value, etc.).
    #[error("record source error: {0}")]
    Source(String),
}
