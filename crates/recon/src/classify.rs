use log::debug;

use crate::config::MatchingConfig;
use crate::key::same_text;
use crate::model::{CollisionGroup, DuplicateReport, RecordSet};

/// Splits still-colliding groups into real data-quality issues and
/// cancelled-only noise. Classification is per group, never per row.
#[derive(Debug, Clone)]
pub struct DuplicateClassifier {
    order_type_column: String,
    cancelled_value: String,
}

impl DuplicateClassifier {
    pub fn new(order_type_column: impl Into<String>, cancelled_value: impl Into<String>) -> Self {
        Self {
            order_type_column: order_type_column.into(),
            cancelled_value: cancelled_value.into(),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(&config.order_type_column, &config.cancelled_value)
    }

    /// True iff every member's order type equals the cancelled value,
    /// ignoring case and surrounding whitespace. Members without an order
    /// type count as active.
    pub fn is_all_cancelled(&self, set: &RecordSet, group: &CollisionGroup) -> bool {
        !group.members.is_empty()
            && group.members.iter().all(|&i| {
                set.get(i)
                    .map(|r| r.text(&self.order_type_column))
                    .is_some_and(|t| same_text(&t, &self.cancelled_value))
            })
    }

    /// Returns `(actionable, all_cancelled)` for a single group; exactly one
    /// side holds the group.
    pub fn classify(
        &self,
        set: &RecordSet,
        group: &CollisionGroup,
    ) -> (Option<CollisionGroup>, Option<CollisionGroup>) {
        if self.is_all_cancelled(set, group) {
            (None, Some(group.clone()))
        } else {
            (Some(group.clone()), None)
        }
    }

    pub fn classify_all(&self, set: &RecordSet, groups: &[CollisionGroup]) -> DuplicateReport {
        let mut report = DuplicateReport::default();
        for group in groups {
            match self.classify(set, group) {
                (Some(g), _) => report.actionable.push(g),
                (_, Some(g)) => report.all_cancelled.push(g),
                (None, None) => {}
            }
        }
        debug!(
            "{} duplicate groups: {} actionable, {} all cancelled",
            set.kind(),
            report.actionable.len(),
            report.all_cancelled.len()
        );
        report
    }
}
