//! `shipmatch-recon`: order-to-shipment reconciliation engine.
//!
//! Pure engine crate: builds composite keys over order and shipment lines,
//! escalates colliding keys, classifies leftover duplicates, then matches
//! shipments to orders exactly and by weighted similarity. Records come in
//! through [`RecordSource`]; results go out as a serializable
//! [`ReconResult`]. No CLI dependencies.

pub mod classify;
pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod fuzzy;
pub mod key;
pub mod matcher;
pub mod model;
pub mod similarity;
pub mod source;

pub use classify::DuplicateClassifier;
pub use config::{ColumnPair, CustomerConfig, ReconConfig};
pub use engine::{BatchOutcome, CustomerFailure, Phase, Reconciler, RunFilter};
pub use error::ReconError;
pub use key::KeyBuilder;
pub use model::{MatchResult, Record, RecordKind, RecordSet, ReconResult, Value};
pub use similarity::SimilarityMetric;
pub use source::{CsvSource, RecordSource};
