use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ColumnPair;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cell value as delivered by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Null,
}

impl Value {
    /// Render for key construction: integral numbers drop the fraction,
    /// dates use ISO format, null is empty.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Null => String::new(),
        }
    }

    /// Numeric view, parsing text when needed. Thousands separators are tolerated.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse().ok()
                }
            }
            Value::Date(_) | Value::Null => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            Value::Number(_) | Value::Null => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Order,
    Shipment,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Shipment => write!(f, "shipment"),
        }
    }
}

/// One order line or shipment line. `index` is the record's position in
/// its input sequence and its only identity for the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub index: usize,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Rendered and trimmed value, empty when missing.
    pub fn text(&self, column: &str) -> String {
        self.get(column)
            .map(|v| v.render().trim().to_string())
            .unwrap_or_default()
    }
}

/// An ordered record sequence of one kind, with its column schema.
#[derive(Debug, Clone)]
pub struct RecordSet {
    kind: RecordKind,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(kind: RecordKind, columns: Vec<String>) -> Self {
        Self { kind, columns, records: Vec::new() }
    }

    /// Build from rows in input order. Columns seen in rows but missing
    /// from `columns` are appended to the schema.
    pub fn from_rows(
        kind: RecordKind,
        columns: Vec<String>,
        rows: impl IntoIterator<Item = BTreeMap<String, Value>>,
    ) -> Self {
        let mut set = Self::new(kind, columns);
        for fields in rows {
            set.push(fields);
        }
        set
    }

    /// Append a row and return its index.
    pub fn push(&mut self, fields: BTreeMap<String, Value>) -> usize {
        for name in fields.keys() {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.clone());
            }
        }
        let index = self.records.len();
        self.records.push(Record { index, fields });
        index
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep the records passing `keep`, re-indexed in their original order.
    pub fn filtered(&self, mut keep: impl FnMut(&Record) -> bool) -> RecordSet {
        let mut out = RecordSet::new(self.kind, self.columns.clone());
        for record in &self.records {
            if keep(record) {
                out.push(record.fields.clone());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Keys + collisions
// ---------------------------------------------------------------------------

/// Final key assigned to a record after escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyedRecord {
    pub index: usize,
    pub key: String,
}

/// A record whose baseline key collided and was disambiguated by extras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCollision {
    pub index: usize,
    pub baseline_key: String,
    pub escalated_key: String,
    pub used_extras: Vec<String>,
}

/// Records still sharing one key after all extras were tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionGroup {
    pub key: String,
    pub columns: Vec<String>,
    pub used_extras: Vec<String>,
    pub members: Vec<usize>,
}

/// Output of the collision resolver for one record set.
#[derive(Debug, Clone, Serialize)]
pub struct KeyAssignment {
    pub kind: RecordKind,
    pub key_columns: Vec<String>,
    pub keys: Vec<KeyedRecord>,
    pub resolved: Vec<ResolvedCollision>,
    pub unresolved: Vec<CollisionGroup>,
}

impl KeyAssignment {
    pub fn key_of(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(|k| k.key.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub actionable: Vec<CollisionGroup>,
    pub all_cancelled: Vec<CollisionGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SideCollisionLog {
    pub key_columns: Vec<String>,
    pub resolved: Vec<ResolvedCollision>,
    pub duplicates: DuplicateReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollisionLog {
    pub orders: SideCollisionLog,
    pub shipments: SideCollisionLog,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ExactMatch {
    pub order_index: usize,
    pub shipment_index: usize,
    pub matched_columns: Vec<ColumnPair>,
    pub confidence: f64,
    /// Other orders that matched equally well, lowest index first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other_candidates: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyTier {
    AutoAccept,
    Review,
}

impl std::fmt::Display for FuzzyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoAccept => write!(f, "auto_accept"),
            Self::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnScore {
    pub columns: ColumnPair,
    pub weight: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuzzyMatch {
    pub order_index: usize,
    pub shipment_index: usize,
    pub matched_columns: Vec<ColumnPair>,
    pub confidence: f64,
    pub tier: FuzzyTier,
    pub scores: Vec<ColumnScore>,
}

/// Final state of one shipment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    Exact(ExactMatch),
    Fuzzy(FuzzyMatch),
    Unmatched { shipment_index: usize },
}

impl MatchResult {
    pub fn shipment_index(&self) -> usize {
        match self {
            Self::Exact(m) => m.shipment_index,
            Self::Fuzzy(m) => m.shipment_index,
            Self::Unmatched { shipment_index } => *shipment_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub orders: usize,
    pub shipments: usize,
    pub exact: usize,
    pub fuzzy_auto_accept: usize,
    pub fuzzy_review: usize,
    pub unmatched: usize,
    pub ambiguous_exact: usize,
    pub order_collisions_resolved: usize,
    pub shipment_collisions_resolved: usize,
    pub actionable_duplicate_groups: usize,
    pub cancelled_duplicate_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub customer: String,
    pub engine_version: String,
    pub run_at: String,
}

/// Terminal result bundle for one customer.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub join_cols: Vec<ColumnPair>,
    pub exact_matches: Vec<ExactMatch>,
    pub fuzzy_matches: Vec<FuzzyMatch>,
    pub unmatched: Vec<Record>,
    pub collision_log: CollisionLog,
}

impl ReconResult {
    /// Every shipment's final state, ordered by shipment index.
    pub fn outcomes(&self) -> Vec<MatchResult> {
        let mut out: Vec<MatchResult> = self
            .exact_matches
            .iter()
            .cloned()
            .map(MatchResult::Exact)
            .chain(self.fuzzy_matches.iter().cloned().map(MatchResult::Fuzzy))
            .chain(
                self.unmatched
                    .iter()
                    .map(|r| MatchResult::Unmatched { shipment_index: r.index }),
            )
            .collect();
        out.sort_by_key(MatchResult::shipment_index);
        out
    }
}
