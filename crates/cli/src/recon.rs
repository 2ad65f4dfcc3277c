//! `shipmatch run` / `shipmatch validate`: config-driven reconciliation.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use shipmatch_recon::{BatchOutcome, CsvSource, ReconConfig, ReconResult, Reconciler, RunFilter};

use crate::exit_codes::{EXIT_CONFIG_INVALID, EXIT_RUNTIME, EXIT_UNMATCHED};
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub orders: PathBuf,
    pub shipments: PathBuf,
    pub customers: Vec<String>,
    pub po: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub json: bool,
    pub output: Option<PathBuf>,
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

fn read_file(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {what} {}: {e}", path.display())))
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = read_file(path, "config")?;
    ReconConfig::from_toml(&config_str).map_err(|e| recon_err(EXIT_CONFIG_INVALID, e.to_string()))
}

/// JSON document written by `--json` / `--output`.
#[derive(Serialize)]
struct BatchReport<'a> {
    config_name: &'a str,
    engine_version: &'static str,
    results: &'a [ReconResult],
    failures: Vec<FailureReport>,
}

#[derive(Serialize)]
struct FailureReport {
    customer: String,
    error: String,
}

fn batch_report<'a>(config: &'a ReconConfig, outcome: &'a BatchOutcome) -> BatchReport<'a> {
    BatchReport {
        config_name: &config.name,
        engine_version: env!("CARGO_PKG_VERSION"),
        results: &outcome.results,
        failures: outcome
            .failures
            .iter()
            .map(|f| FailureReport { customer: f.customer.clone(), error: f.error.to_string() })
            .collect(),
    }
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            return Err(CliError::usage(format!("--from {from} is after --to {to}")));
        }
    }

    let config = load_config(&args.config)?;
    let orders_csv = read_file(&args.orders, "orders")?;
    let shipments_csv = read_file(&args.shipments, "shipments")?;
    let source = CsvSource::from_csv(&orders_csv, &shipments_csv, &config.source)
        .map_err(|e| recon_err(EXIT_RUNTIME, e.to_string()))?;

    let filter = RunFilter { po: args.po, date_from: args.from, date_to: args.to };
    let reconciler = Reconciler::new(&config);
    let outcome = if args.customers.is_empty() {
        reconciler.run_batch(&source, &filter)
    } else {
        reconciler.run_for_names(&source, &args.customers, &filter)
    };

    let json_str = serde_json::to_string_pretty(&batch_report(&config, &outcome))
        .map_err(|e| recon_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    // Human summary to stderr
    for result in &outcome.results {
        eprintln!("{}", summary_line(result));
    }
    for failure in &outcome.failures {
        eprintln!("{}: failed: {}", failure.customer, failure.error);
    }

    exit_status(&outcome)
}

fn summary_line(result: &ReconResult) -> String {
    let s = &result.summary;
    let mut line = format!(
        "{}: {} shipments vs {} orders: {} exact, {} fuzzy ({} auto, {} review), {} unmatched",
        result.meta.customer,
        s.shipments,
        s.orders,
        s.exact,
        s.fuzzy_auto_accept + s.fuzzy_review,
        s.fuzzy_auto_accept,
        s.fuzzy_review,
        s.unmatched,
    );
    if s.ambiguous_exact > 0 {
        line.push_str(&format!("; {} ambiguous exact", s.ambiguous_exact));
    }
    if s.actionable_duplicate_groups > 0 || s.cancelled_duplicate_groups > 0 {
        line.push_str(&format!(
            "; duplicate groups: {} actionable, {} cancelled",
            s.actionable_duplicate_groups, s.cancelled_duplicate_groups
        ));
    }
    line
}

fn exit_status(outcome: &BatchOutcome) -> Result<(), CliError> {
    if !outcome.failures.is_empty() {
        return Err(recon_err(
            EXIT_RUNTIME,
            format!("{} customer(s) failed", outcome.failures.len()),
        )
        .with_hint("check the customer entries in the config against the CSV headers"));
    }
    match outcome.unmatched_total() {
        0 => Ok(()),
        n => Err(recon_err(EXIT_UNMATCHED, format!("{n} unmatched shipment(s)"))),
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let incomplete: Vec<String> = config
        .customers
        .iter()
        .filter_map(|c| c.validate_keys().err())
        .map(|e| e.to_string())
        .collect();

    eprintln!(
        "valid: recon '{}' with {} customer(s), metric {}, thresholds review={} auto_accept={}",
        config.name,
        config.customers.len(),
        config.fuzzy.metric,
        config.fuzzy.review_threshold,
        config.fuzzy.auto_accept_threshold,
    );
    for warning in &incomplete {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipmatch_recon::model::{
        CollisionLog, DuplicateReport, ReconMeta, ReconSummary, SideCollisionLog,
    };
    use shipmatch_recon::{CustomerFailure, ReconError};

    fn side() -> SideCollisionLog {
        SideCollisionLog {
            key_columns: vec!["PO NUMBER".into()],
            resolved: vec![],
            duplicates: DuplicateReport::default(),
        }
    }

    fn result(summary: ReconSummary) -> ReconResult {
        ReconResult {
            meta: ReconMeta {
                config_name: "test".into(),
                customer: "Northwind".into(),
                engine_version: "0.1.0".into(),
                run_at: "2024-03-01T00:00:00+00:00".into(),
            },
            summary,
            join_cols: vec![],
            exact_matches: vec![],
            fuzzy_matches: vec![],
            unmatched: vec![],
            collision_log: CollisionLog { orders: side(), shipments: side() },
        }
    }

    #[test]
    fn summary_line_format() {
        let line = summary_line(&result(ReconSummary {
            orders: 8,
            shipments: 4,
            exact: 2,
            fuzzy_auto_accept: 1,
            unmatched: 1,
            ambiguous_exact: 2,
            actionable_duplicate_groups: 1,
            cancelled_duplicate_groups: 1,
            ..ReconSummary::default()
        }));
        assert_eq!(
            line,
            "Northwind: 4 shipments vs 8 orders: 2 exact, 1 fuzzy (1 auto, 0 review), 1 unmatched; \
             2 ambiguous exact; duplicate groups: 1 actionable, 1 cancelled"
        );
    }

    #[test]
    fn clean_summary_has_no_extras() {
        let line = summary_line(&result(ReconSummary { shipments: 1, orders: 1, exact: 1, ..ReconSummary::default() }));
        assert!(line.ends_with("0 unmatched"));
    }

    #[test]
    fn exit_codes_follow_outcome() {
        let clean = BatchOutcome { results: vec![result(ReconSummary::default())], failures: vec![] };
        assert!(exit_status(&clean).is_ok());

        let unmatched = BatchOutcome {
            results: vec![result(ReconSummary { unmatched: 2, ..ReconSummary::default() })],
            failures: vec![],
        };
        assert_eq!(exit_status(&unmatched).unwrap_err().code, EXIT_UNMATCHED);

        let failed = BatchOutcome {
            results: vec![result(ReconSummary { unmatched: 2, ..ReconSummary::default() })],
            failures: vec![CustomerFailure {
                customer: "Contoso".into(),
                error: ReconError::MissingCustomerConfig("Contoso".into()),
            }],
        };
        let err = exit_status(&failed).unwrap_err();
        assert_eq!(err.code, EXIT_RUNTIME);
        assert!(err.hint.is_some());
    }

    #[test]
    fn report_stringifies_failures() {
        let config = ReconConfig::from_toml(
            r#"
name = "r"
[[customers]]
canonical = "Northwind"
"#,
        )
        .unwrap();
        let outcome = BatchOutcome {
            results: vec![],
            failures: vec![CustomerFailure {
                customer: "Fabrikam".into(),
                error: ReconError::MissingCustomerConfig("Fabrikam".into()),
            }],
        };
        let json = serde_json::to_value(batch_report(&config, &outcome)).unwrap();
        assert_eq!(json["config_name"], "r");
        assert_eq!(json["failures"][0]["customer"], "Fabrikam");
        assert_eq!(json["failures"][0]["error"], "no customer config matches 'Fabrikam'");
    }
}
