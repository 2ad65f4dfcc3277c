use std::collections::HashSet;

use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::classify::DuplicateClassifier;
use crate::collision::resolve;
use crate::config::{CustomerConfig, ReconConfig};
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::fuzzy::{match_fuzzy, FuzzyPlan};
use crate::matcher::{join_columns, match_exact};
use crate::model::{
    CollisionLog, KeyAssignment, Record, RecordSet, ReconMeta, ReconResult, SideCollisionLog,
};
use crate::source::RecordSource;

/// Stages of one customer run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Loaded,
    KeysBuilt,
    ExactMatched,
    FuzzyMatched,
    Finalized,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::KeysBuilt => write!(f, "keys_built"),
            Self::ExactMatched => write!(f, "exact_matched"),
            Self::FuzzyMatched => write!(f, "fuzzy_matched"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Narrowing applied when pulling records from a source.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub po: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug)]
pub struct CustomerFailure {
    pub customer: String,
    pub error: ReconError,
}

/// Results of a multi-customer run. A failing customer never stops the
/// others.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<ReconResult>,
    pub failures: Vec<CustomerFailure>,
}

impl BatchOutcome {
    pub fn unmatched_total(&self) -> usize {
        self.results.iter().map(|r| r.summary.unmatched).sum()
    }

    fn record(&mut self, customer: &str, outcome: Result<ReconResult, ReconError>) {
        match outcome {
            Ok(result) => self.results.push(result),
            Err(error) => {
                warn!("customer '{customer}' failed: {error}");
                self.failures.push(CustomerFailure { customer: customer.to_string(), error });
            }
        }
    }
}

/// Runs reconciliation for customers of one config.
pub struct Reconciler<'a> {
    config: &'a ReconConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a ReconConfig) -> Self {
        Self { config }
    }

    /// Reconcile one customer's already-loaded records.
    pub fn reconcile(
        &self,
        customer: &CustomerConfig,
        orders: &RecordSet,
        shipments: &RecordSet,
    ) -> Result<ReconResult, ReconError> {
        let who = customer.canonical.as_str();
        customer.validate_keys()?;
        enter(who, Phase::Loaded);
        debug!("{who}: {} orders, {} shipments", orders.len(), shipments.len());

        let order_keys = resolve(
            orders,
            &customer.order_key_config.unique_keys,
            &customer.order_key_config.extra_checks,
        )?;
        let shipment_keys = resolve(
            shipments,
            &customer.shipment_key_config.unique_keys,
            &customer.shipment_key_config.extra_checks,
        )?;
        let classifier = DuplicateClassifier::from_config(&self.config.matching);
        let collision_log = CollisionLog {
            orders: side_log(&classifier, orders, order_keys),
            shipments: side_log(&classifier, shipments, shipment_keys),
        };
        enter(who, Phase::KeysBuilt);

        let join = join_columns(orders, shipments, &customer.shipment_key_config.column_mapping)?;
        let exact = match_exact(orders, shipments, &join);
        enter(who, Phase::ExactMatched);

        let plan = FuzzyPlan::build(orders, shipments, &join, &self.config.fuzzy, &customer.fuzzy);
        let fuzzy = match_fuzzy(orders, shipments, &exact.remaining, &plan);
        enter(who, Phase::FuzzyMatched);

        let unmatched: Vec<Record> = fuzzy
            .unmatched
            .iter()
            .filter_map(|&i| shipments.get(i).cloned())
            .collect();
        let summary = compute_summary(
            orders.len(),
            shipments.len(),
            &exact.matched,
            &fuzzy.matched,
            unmatched.len(),
            &collision_log,
        );
        enter(who, Phase::Finalized);

        info!(
            "{who}: {} exact, {} fuzzy ({} for review), {} unmatched of {} shipments",
            summary.exact,
            summary.fuzzy_auto_accept + summary.fuzzy_review,
            summary.fuzzy_review,
            summary.unmatched,
            summary.shipments
        );

        Ok(ReconResult {
            meta: ReconMeta {
                config_name: self.config.name.clone(),
                customer: customer.canonical.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
            },
            summary,
            join_cols: join,
            exact_matches: exact.matched,
            fuzzy_matches: fuzzy.matched,
            unmatched,
            collision_log,
        })
    }

    /// Pull one customer's records from `source` under every spelling of
    /// its name, then reconcile.
    pub fn reconcile_from_source<S: RecordSource + ?Sized>(
        &self,
        source: &S,
        customer: &CustomerConfig,
        filter: &RunFilter,
    ) -> Result<ReconResult, ReconError> {
        customer.validate_keys()?;
        let names = customer.names();
        let po = filter.po.as_deref();
        let orders = source.orders(&names, po)?;
        let shipments = source.shipments(&names, po, filter.date_from, filter.date_to)?;
        self.reconcile(customer, &orders, &shipments)
    }

    /// Run every configured customer. Shipment customers with no config
    /// entry are reported as failures and skipped.
    pub fn run_batch<S: RecordSource + ?Sized>(&self, source: &S, filter: &RunFilter) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for customer in &self.config.customers {
            outcome.record(
                &customer.canonical,
                self.reconcile_from_source(source, customer, filter),
            );
        }

        for name in source.shipment_customers() {
            if self.config.customer(&name).is_none() {
                outcome.record(&name, Err(ReconError::MissingCustomerConfig(name.clone())));
            }
        }
        outcome
    }

    /// Run the customers behind raw `names` as spelled in data. Several
    /// spellings of one customer run it once.
    pub fn run_for_names<S: RecordSource + ?Sized>(
        &self,
        source: &S,
        names: &[String],
        filter: &RunFilter,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut done = HashSet::new();
        for name in names {
            match self.config.customer_or_err(name) {
                Ok(customer) => {
                    if done.insert(customer.canonical.as_str()) {
                        outcome.record(
                            &customer.canonical,
                            self.reconcile_from_source(source, customer, filter),
                        );
                    }
                }
                Err(error) => outcome.record(name, Err(error)),
            }
        }
        outcome
    }
}

fn enter(customer: &str, phase: Phase) {
    debug!("{customer}: -> {phase}");
}

fn side_log(
    classifier: &DuplicateClassifier,
    set: &RecordSet,
    keys: KeyAssignment,
) -> SideCollisionLog {
    SideCollisionLog {
        duplicates: classifier.classify_all(set, &keys.unresolved),
        key_columns: keys.key_columns,
        resolved: keys.resolved,
    }
}
