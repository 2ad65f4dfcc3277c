//! Composite key construction.
//!
//! A key is the trimmed, rendered values of an ordered column list joined
//! with `|`. Shipment keys are uppercased to absorb case drift between
//! source systems; order keys keep their case. A `|` or `\` inside a value
//! is backslash-escaped, so two different column tuples never render to the
//! same key.

use std::borrow::Cow;

use crate::error::ReconError;
use crate::model::{Record, RecordKind, RecordSet};

pub const KEY_SEPARATOR: &str = "|";

/// Strip a trailing `#annotation` from a configured column name, so
/// `"PO NUMBER #internal"` and `"PO NUMBER"` address the same field.
pub fn sanitize_column(name: &str) -> &str {
    match name.split_once('#') {
        Some((head, _)) => head.trim(),
        None => name.trim(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    Preserve,
    Upper,
}

impl KeyCase {
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Order => Self::Preserve,
            RecordKind::Shipment => Self::Upper,
        }
    }

    fn apply(self, value: String) -> String {
        match self {
            Self::Preserve => value,
            Self::Upper => fold_case(&value),
        }
    }
}

/// Trimmed, uppercased text. The single case-folding rule for keys, join
/// values, customer names and status codes.
pub fn fold_case(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Equality under [`fold_case`].
pub fn same_text(a: &str, b: &str) -> bool {
    fold_case(a) == fold_case(b)
}

/// Key builder bound to the columns of a schema that actually exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    columns: Vec<String>,
    case: KeyCase,
}

impl KeyBuilder {
    /// Resolve `columns` against `schema`. Absent columns are skipped; an
    /// empty overlap is `NoKeyColumns`.
    pub fn for_schema<S: AsRef<str>>(
        schema: &[String],
        columns: &[S],
        kind: RecordKind,
    ) -> Result<Self, ReconError> {
        let present: Vec<String> = columns
            .iter()
            .map(|c| sanitize_column(c.as_ref()))
            .filter(|c| schema.iter().any(|s| s == c))
            .map(str::to_string)
            .collect();

        if present.is_empty() {
            return Err(ReconError::NoKeyColumns {
                kind,
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            });
        }

        Ok(Self { columns: present, case: KeyCase::for_kind(kind) })
    }

    pub fn for_set<S: AsRef<str>>(set: &RecordSet, columns: &[S]) -> Result<Self, ReconError> {
        Self::for_schema(set.columns(), columns, set.kind())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Same builder with one more column appended.
    pub fn with_column(&self, column: &str) -> Self {
        let mut columns = self.columns.clone();
        columns.push(column.to_string());
        Self { columns, case: self.case }
    }

    /// Key components in column order, before joining.
    pub fn parts(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| self.case.apply(record.text(c)))
            .collect()
    }

    pub fn key(&self, record: &Record) -> String {
        join_key(&self.parts(record))
    }
}

/// Join key components with [`KEY_SEPARATOR`], escaping separators and
/// backslashes inside components.
pub fn join_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| escape_part(p.as_ref()))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

fn escape_part(part: &str) -> Cow<'_, str> {
    if part.contains(['|', '\\']) {
        Cow::Owned(part.replace('\\', "\\\\").replace('|', "\\|"))
    } else {
        Cow::Borrowed(part)
    }
}

/// Build a key for a standalone record, using its own fields as the schema.
pub fn build_key<S: AsRef<str>>(
    record: &Record,
    columns: &[S],
    kind: RecordKind,
) -> Result<String, ReconError> {
    let schema: Vec<String> = record.fields.keys().cloned().collect();
    Ok(KeyBuilder::for_schema(&schema, columns, kind)?.key(record))
}
