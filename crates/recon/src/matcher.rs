use std::collections::HashMap;

use log::{debug, warn};

use crate::config::ColumnPair;
use crate::error::ReconError;
use crate::key::{fold_case, join_key, sanitize_column};
use crate::model::{ExactMatch, Record, RecordKind, RecordSet};

#[derive(Debug)]
pub struct ExactOutput {
    pub matched: Vec<ExactMatch>,
    /// Shipment indices left for the fuzzy stage, in input order.
    pub remaining: Vec<usize>,
}

/// Resolve the configured mapping to the pairs present in both schemas,
/// keeping configured order.
pub fn join_columns(
    orders: &RecordSet,
    shipments: &RecordSet,
    mapping: &[ColumnPair],
) -> Result<Vec<ColumnPair>, ReconError> {
    let join: Vec<ColumnPair> = mapping
        .iter()
        .map(|p| ColumnPair::new(sanitize_column(&p.order), sanitize_column(&p.shipment)))
        .filter(|p| {
            let present = orders.has_column(&p.order) && shipments.has_column(&p.shipment);
            if !present {
                debug!("join pair {} -> {} not in both schemas, skipped", p.order, p.shipment);
            }
            present
        })
        .collect();

    if join.is_empty() {
        return Err(ReconError::NoKeyColumns {
            kind: RecordKind::Shipment,
            columns: mapping
                .iter()
                .map(|p| format!("{} -> {}", p.order, p.shipment))
                .collect(),
        });
    }
    Ok(join)
}

/// Trimmed, case-folded value used for equality across systems.
pub fn normalize(record: &Record, column: &str) -> String {
    fold_case(&record.text(column))
}

/// Join key over one side of the pairs. `None` when every component is
/// empty; such rows never match exactly.
fn match_key<'a>(record: &Record, columns: impl Iterator<Item = &'a str>) -> Option<String> {
    let parts: Vec<String> = columns.map(|c| normalize(record, c)).collect();
    if parts.iter().all(String::is_empty) {
        None
    } else {
        Some(join_key(&parts))
    }
}

/// Match shipments to orders by equality on every join pair.
///
/// When several orders match one shipment, the lowest order index wins and
/// the rest are kept as `other_candidates`. Orders are not consumed: one
/// order may be fulfilled by several shipment lines.
pub fn match_exact(orders: &RecordSet, shipments: &RecordSet, join: &[ColumnPair]) -> ExactOutput {
    let mut lookup: HashMap<String, Vec<usize>> = HashMap::new();
    for order in orders.records() {
        if let Some(key) = match_key(order, join.iter().map(|p| p.order.as_str())) {
            lookup.entry(key).or_default().push(order.index);
        }
    }

    let mut matched = Vec::new();
    let mut remaining = Vec::new();

    for shipment in shipments.records() {
        let candidates = match_key(shipment, join.iter().map(|p| p.shipment.as_str()))
            .and_then(|key| lookup.get(&key));

        match candidates.and_then(|c| c.split_first()) {
            Some((&order_index, others)) => {
                if !others.is_empty() {
                    warn!(
                        "shipment {} matches {} orders exactly; taking order {}",
                        shipment.index,
                        others.len() + 1,
                        order_index
                    );
                }
                matched.push(ExactMatch {
                    order_index,
                    shipment_index: shipment.index,
                    matched_columns: join.to_vec(),
                    confidence: 1.0,
                    other_candidates: others.to_vec(),
                });
            }
            None => remaining.push(shipment.index),
        }
    }

    debug!(
        "exact stage: {} matched, {} remaining",
        matched.len(),
        remaining.len()
    );

    ExactOutput { matched, remaining }
}
