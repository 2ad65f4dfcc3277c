//! Similarity matching for shipments the exact stage left behind.
//!
//! Each remaining shipment is scored against candidate orders column by
//! column; the weighted mean is its confidence. Only the best candidate is
//! kept (earliest order index on ties), and it is accepted in one of two
//! tiers or left unmatched.

use std::collections::HashMap;

use log::{debug, warn};

use crate::config::{ColumnPair, CustomerFuzzyConfig, FuzzyConfig};
use crate::key::sanitize_column;
use crate::matcher::normalize;
use crate::model::{ColumnScore, FuzzyMatch, FuzzyTier, Record, RecordSet};
use crate::similarity::{quantity_score, SimilarityMetric};

/// Fuzzy confidence never reaches 1.0; that value is reserved for exact matches.
pub const MAX_FUZZY_CONFIDENCE: f64 = 1.0 - 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreKind {
    Text,
    Quantity { tolerance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredColumn {
    pub columns: ColumnPair,
    pub weight: f64,
    pub kind: ScoreKind,
}

/// Resolved scoring plan for one customer run.
#[derive(Debug, Clone)]
pub struct FuzzyPlan {
    pub columns: Vec<ScoredColumn>,
    /// Candidate orders must share this column's value. `None` scores
    /// against the whole order pool.
    pub anchor: Option<ColumnPair>,
    pub metric: SimilarityMetric,
    pub review_threshold: f64,
    pub auto_accept_threshold: f64,
}

impl FuzzyPlan {
    pub fn build(
        orders: &RecordSet,
        shipments: &RecordSet,
        join: &[ColumnPair],
        global: &FuzzyConfig,
        customer: &CustomerFuzzyConfig,
    ) -> Self {
        let weights: HashMap<&str, f64> = customer
            .weights
            .iter()
            .map(|(k, w)| (sanitize_column(k), *w))
            .collect();
        let weight_of = |order_col: &str| weights.get(order_col).copied().unwrap_or(global.default_weight);

        let quantities: Vec<(ColumnPair, f64)> = customer
            .quantity
            .iter()
            .map(|q| {
                (
                    ColumnPair::new(sanitize_column(&q.order), sanitize_column(&q.shipment)),
                    q.tolerance,
                )
            })
            .collect();

        let mut columns: Vec<ScoredColumn> = join
            .iter()
            .map(|pair| {
                let kind = quantities
                    .iter()
                    .find(|(q, _)| q.order == pair.order)
                    .map_or(ScoreKind::Text, |(_, tolerance)| ScoreKind::Quantity {
                        tolerance: *tolerance,
                    });
                ScoredColumn { columns: pair.clone(), weight: weight_of(&pair.order), kind }
            })
            .collect();

        for (pair, tolerance) in &quantities {
            let already = columns.iter().any(|c| c.columns.order == pair.order);
            if already {
                continue;
            }
            if orders.has_column(&pair.order) && shipments.has_column(&pair.shipment) {
                columns.push(ScoredColumn {
                    columns: pair.clone(),
                    weight: weight_of(&pair.order),
                    kind: ScoreKind::Quantity { tolerance: *tolerance },
                });
            } else {
                debug!("quantity pair {} -> {} not in both schemas, skipped", pair.order, pair.shipment);
            }
        }

        let anchor = if global.require_anchor {
            let wanted = customer
                .anchor
                .as_deref()
                .map(sanitize_column)
                .or_else(|| join.first().map(|p| p.order.as_str()));
            let found = wanted.and_then(|w| join.iter().find(|p| p.order == w)).cloned();
            if found.is_none() {
                warn!("fuzzy anchor {wanted:?} not available in both schemas; scoring all orders");
            }
            found
        } else {
            None
        };

        Self {
            columns,
            anchor,
            metric: global.metric,
            review_threshold: global.review_threshold,
            auto_accept_threshold: global.auto_accept_threshold,
        }
    }

    /// Per-column scores and weighted confidence of one pairing.
    pub fn score(&self, order: &Record, shipment: &Record) -> (f64, Vec<ColumnScore>) {
        let scores: Vec<ColumnScore> = self
            .columns
            .iter()
            .map(|c| {
                let score = match c.kind {
                    ScoreKind::Text => self.metric.score(
                        &normalize(order, &c.columns.order),
                        &normalize(shipment, &c.columns.shipment),
                    ),
                    ScoreKind::Quantity { tolerance } => {
                        let ordered = order.get(&c.columns.order).and_then(|v| v.as_number());
                        let shipped = shipment.get(&c.columns.shipment).and_then(|v| v.as_number());
                        match (shipped, ordered) {
                            (Some(s), Some(o)) => quantity_score(s, o, tolerance),
                            _ => 0.0,
                        }
                    }
                };
                ColumnScore { columns: c.columns.clone(), weight: c.weight, score }
            })
            .collect();

        let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
        let confidence = if total_weight > 0.0 {
            scores.iter().map(|s| s.weight * s.score).sum::<f64>() / total_weight
        } else {
            0.0
        };
        (confidence.clamp(0.0, MAX_FUZZY_CONFIDENCE), scores)
    }

    pub fn tier(&self, confidence: f64) -> Option<FuzzyTier> {
        if confidence >= self.auto_accept_threshold {
            Some(FuzzyTier::AutoAccept)
        } else if confidence >= self.review_threshold {
            Some(FuzzyTier::Review)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct FuzzyOutput {
    pub matched: Vec<FuzzyMatch>,
    /// Shipment indices that cleared neither threshold, in input order.
    pub unmatched: Vec<usize>,
}

pub fn match_fuzzy(
    orders: &RecordSet,
    shipments: &RecordSet,
    remaining: &[usize],
    plan: &FuzzyPlan,
) -> FuzzyOutput {
    let by_anchor: Option<HashMap<String, Vec<usize>>> = plan.anchor.as_ref().map(|anchor| {
        let mut map: HashMap<String, Vec<usize>> = HashMap::new();
        for order in orders.records() {
            let value = normalize(order, &anchor.order);
            if !value.is_empty() {
                map.entry(value).or_default().push(order.index);
            }
        }
        map
    });
    let all_orders: Vec<usize> = (0..orders.len()).collect();

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for &shipment_index in remaining {
        let Some(shipment) = shipments.get(shipment_index) else {
            unmatched.push(shipment_index);
            continue;
        };

        let candidates: &[usize] = match (&plan.anchor, &by_anchor) {
            (Some(anchor), Some(map)) => {
                let value = normalize(shipment, &anchor.shipment);
                map.get(&value).map(Vec::as_slice).unwrap_or(&[])
            }
            _ => &all_orders,
        };

        let mut best: Option<(usize, f64, Vec<ColumnScore>)> = None;
        for &order_index in candidates {
            let Some(order) = orders.get(order_index) else {
                continue;
            };
            let (confidence, scores) = plan.score(order, shipment);
            // Strictly greater keeps the earliest order on ties.
            if best.as_ref().map_or(true, |(_, c, _)| confidence > *c) {
                best = Some((order_index, confidence, scores));
            }
        }

        match best {
            Some((order_index, confidence, scores)) => match plan.tier(confidence) {
                Some(tier) => matched.push(FuzzyMatch {
                    order_index,
                    shipment_index,
                    matched_columns: plan.columns.iter().map(|c| c.columns.clone()).collect(),
                    confidence,
                    tier,
                    scores,
                }),
                None => unmatched.push(shipment_index),
            },
            None => unmatched.push(shipment_index),
        }
    }

    debug!(
        "fuzzy stage: {} matched ({} auto, {} review), {} unmatched",
        matched.len(),
        matched.iter().filter(|m| m.tier == FuzzyTier::AutoAccept).count(),
        matched.iter().filter(|m| m.tier == FuzzyTier::Review).count(),
        unmatched.len()
    );

    FuzzyOutput { matched, unmatched }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::QuantityColumn;
    use crate::model::{RecordKind, Value};

    fn set(kind: RecordKind, rows: &[&[(&str, Value)]]) -> RecordSet {
        let mut out = RecordSet::new(kind, Vec::new());
        for row in rows {
            out.push(
                row.iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect::<BTreeMap<_, _>>(),
            );
        }
        out
    }

    fn join() -> Vec<ColumnPair> {
        vec![
            ColumnPair::new("PO", "PO"),
            ColumnPair::new("STYLE", "STYLE"),
            ColumnPair::new("COLOR", "COLOR"),
        ]
    }

    fn order(po: &str, style: &str, color: &str, qty: f64) -> Vec<(&'static str, Value)> {
        vec![
            ("PO", Value::from(po)),
            ("STYLE", Value::from(style)),
            ("COLOR", Value::from(color)),
            ("QTY", Value::Number(qty)),
        ]
    }

    fn with_qty() -> CustomerFuzzyConfig {
        CustomerFuzzyConfig {
            quantity: vec![QuantityColumn {
                order: "QTY".into(),
                shipment: "QTY".into(),
                tolerance: 0.05,
            }],
            ..CustomerFuzzyConfig::default()
        }
    }

    #[test]
    fn style_variant_is_auto_accepted() {
        let o = order("4755", "LFA25B68", "RED", 100.0);
        let s = order("4755", "LFA25B68-VARIANT", "RED", 100.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert_eq!(out.matched.len(), 1);
        let m = &out.matched[0];
        assert_eq!(m.tier, FuzzyTier::AutoAccept);
        let style = m.scores.iter().find(|s| s.columns.order == "STYLE").unwrap();
        assert!((0.85..=0.92).contains(&style.score));
        assert!(m.confidence < 1.0);
    }

    #[test]
    fn heavy_style_weight_moves_to_review() {
        let o = order("4755", "LFA25B68", "RED", 100.0);
        let s = order("4755", "LFA25B68-VARIANT", "RED", 100.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let customer = CustomerFuzzyConfig {
            weights: HashMap::from([("STYLE".to_string(), 10.0), ("PO".to_string(), 0.0), ("COLOR".to_string(), 0.0)]),
            ..CustomerFuzzyConfig::default()
        };
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &customer);
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        // Confidence equals the style score (~0.90), still auto-accept at 0.85.
        assert_eq!(out.matched[0].tier, FuzzyTier::AutoAccept);

        let strict = FuzzyConfig { auto_accept_threshold: 0.95, ..FuzzyConfig::default() };
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &strict, &customer);
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert_eq!(out.matched[0].tier, FuzzyTier::Review);
    }

    #[test]
    fn quantity_weighted_in() {
        let o = order("4755", "LFA24B05", "476 - WOLF BLUE", 350.0);
        let s = order("4755", "LFA24B05", "476 - WOLF BLU", 353.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &with_qty());
        assert_eq!(plan.columns.len(), 4);
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        let m = &out.matched[0];
        let qty = m.scores.iter().find(|s| s.columns.order == "QTY").unwrap();
        assert_eq!(qty.score, 1.0);
        assert!(m.confidence > 0.95 && m.confidence < 1.0, "confidence {}", m.confidence);
    }

    #[test]
    fn candidates_limited_to_anchor() {
        let o = order("1000", "ABC", "RED", 10.0);
        let s = order("2000", "ABC", "RED", 10.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert!(out.matched.is_empty());
        assert_eq!(out.unmatched, vec![0]);

        let open = FuzzyConfig { require_anchor: false, ..FuzzyConfig::default() };
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &open, &CustomerFuzzyConfig::default());
        assert!(plan.anchor.is_none());
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert_eq!(out.matched.len(), 1);
    }

    #[test]
    fn best_candidate_ties_take_earliest_order() {
        let a = order("1", "STYLE-A", "RED", 10.0);
        let s = order("1", "STYLE-A1", "RED", 10.0);
        let orders = set(RecordKind::Order, &[&a, &a]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert_eq!(out.matched[0].order_index, 0);
    }

    #[test]
    fn best_candidate_wins() {
        let far = order("1", "ZZZ", "GREEN", 10.0);
        let near = order("1", "LFA24B05", "RED", 10.0);
        let s = order("1", "LFA24B05X", "RED", 10.0);
        let orders = set(RecordKind::Order, &[&far, &near]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert_eq!(out.matched[0].order_index, 1);
    }

    #[test]
    fn below_review_stays_unmatched() {
        let o = order("1", "AAAAAA", "RED", 10.0);
        let s = order("1", "ZZZZZZ", "BLUE", 900.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&s]);
        let customer = CustomerFuzzyConfig {
            weights: HashMap::from([("PO".to_string(), 0.1)]),
            ..with_qty()
        };
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &customer);
        let out = match_fuzzy(&orders, &shipments, &[0], &plan);
        assert!(out.matched.is_empty());
        assert_eq!(out.unmatched, vec![0]);
    }

    #[test]
    fn tiers() {
        let orders = set(RecordKind::Order, &[]);
        let plan = FuzzyPlan::build(&orders, &orders, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        assert_eq!(plan.tier(0.90), Some(FuzzyTier::AutoAccept));
        assert_eq!(plan.tier(0.85), Some(FuzzyTier::AutoAccept));
        assert_eq!(plan.tier(0.70), Some(FuzzyTier::Review));
        assert_eq!(plan.tier(0.59), None);
    }

    #[test]
    fn every_remaining_index_is_accounted_for() {
        let o = order("1", "ABC", "RED", 10.0);
        let orders = set(RecordKind::Order, &[&o]);
        let shipments = set(RecordKind::Shipment, &[&o]);
        let plan = FuzzyPlan::build(&orders, &shipments, &join(), &FuzzyConfig::default(), &CustomerFuzzyConfig::default());
        let out = match_fuzzy(&orders, &shipments, &[0, 7], &plan);
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.unmatched, vec![7]);
    }
}
