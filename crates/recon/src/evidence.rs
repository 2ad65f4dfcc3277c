use crate::model::{CollisionLog, ExactMatch, FuzzyMatch, FuzzyTier, ReconSummary};

/// Compute summary statistics for one customer run.
pub fn compute_summary(
    orders: usize,
    shipments: usize,
    exact: &[ExactMatch],
    fuzzy: &[FuzzyMatch],
    unmatched: usize,
    log: &CollisionLog,
) -> ReconSummary {
    let mut fuzzy_auto_accept = 0;
    let mut fuzzy_review = 0;
    for m in fuzzy {
        match m.tier {
            FuzzyTier::AutoAccept => fuzzy_auto_accept += 1,
            FuzzyTier::Review => fuzzy_review += 1,
        }
    }

    ReconSummary {
        orders,
        shipments,
        exact: exact.len(),
        fuzzy_auto_accept,
        fuzzy_review,
        unmatched,
        ambiguous_exact: exact.iter().filter(|m| !m.other_candidates.is_empty()).count(),
        order_collisions_resolved: log.orders.resolved.len(),
        shipment_collisions_resolved: log.shipments.resolved.len(),
        actionable_duplicate_groups: log.orders.duplicates.actionable.len()
            + log.shipments.duplicates.actionable.len(),
        cancelled_duplicate_groups: log.orders.duplicates.all_cancelled.len()
            + log.shipments.duplicates.all_cancelled.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CollisionGroup, DuplicateReport, SideCollisionLog};

    fn side(actionable: usize, cancelled: usize) -> SideCollisionLog {
        let group = CollisionGroup {
            key: "k".into(),
            columns: vec!["PO".into()],
            used_extras: vec![],
            members: vec![0, 1],
        };
        SideCollisionLog {
            key_columns: vec!["PO".into()],
            resolved: vec![],
            duplicates: DuplicateReport {
                actionable: vec![group.clone(); actionable],
                all_cancelled: vec![group; cancelled],
            },
        }
    }

    fn exact(shipment_index: usize, others: Vec<usize>) -> ExactMatch {
        ExactMatch {
            order_index: 0,
            shipment_index,
            matched_columns: vec![],
            confidence: 1.0,
            other_candidates: others,
        }
    }

    fn fuzzy(shipment_index: usize, tier: FuzzyTier) -> FuzzyMatch {
        FuzzyMatch {
            order_index: 0,
            shipment_index,
            matched_columns: vec![],
            confidence: 0.7,
            tier,
            scores: vec![],
        }
    }

    #[test]
    fn summary_counts() {
        let log = CollisionLog { orders: side(1, 2), shipments: side(0, 1) };
        let summary = compute_summary(
            10,
            6,
            &[exact(0, vec![]), exact(1, vec![3, 4])],
            &[
                fuzzy(2, FuzzyTier::AutoAccept),
                fuzzy(3, FuzzyTier::Review),
                fuzzy(4, FuzzyTier::Review),
            ],
            1,
            &log,
        );
        assert_eq!(summary.orders, 10);
        assert_eq!(summary.shipments, 6);
        assert_eq!(summary.exact, 2);
        assert_eq!(summary.ambiguous_exact, 1);
        assert_eq!(summary.fuzzy_auto_accept, 1);
        assert_eq!(summary.fuzzy_review, 2);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.actionable_duplicate_groups, 1);
        assert_eq!(summary.cancelled_duplicate_groups, 3);
    }
}
