//! Record acquisition.
//!
//! The driver pulls records through [`RecordSource`]; [`CsvSource`] is the
//! bundled implementation over two CSV exports (order book and shipment
//! log) with a header row each.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::SourceConfig;
use crate::error::ReconError;
use crate::key::{fold_case, same_text};
use crate::model::{Record, RecordKind, RecordSet, Value};

pub trait RecordSource {
    /// Orders placed under any of `names`, optionally narrowed to one PO.
    fn orders(&self, names: &[String], po: Option<&str>) -> Result<RecordSet, ReconError>;

    /// Shipments sent to any of `names`, optionally narrowed to one PO and
    /// an inclusive ship-date window.
    fn shipments(
        &self,
        names: &[String],
        po: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<RecordSet, ReconError>;

    /// Distinct customer names as spelled in the shipment data.
    fn shipment_customers(&self) -> Vec<String>;
}

/// In-memory source loaded from CSV text.
#[derive(Debug, Clone)]
pub struct CsvSource {
    orders: RecordSet,
    shipments: RecordSet,
    columns: SourceConfig,
}

impl CsvSource {
    pub fn from_csv(
        orders_csv: &str,
        shipments_csv: &str,
        columns: &SourceConfig,
    ) -> Result<Self, ReconError> {
        Ok(Self {
            orders: load_csv_records(RecordKind::Order, orders_csv)?,
            shipments: load_csv_records(RecordKind::Shipment, shipments_csv)?,
            columns: columns.clone(),
        })
    }
}

impl RecordSource for CsvSource {
    fn orders(&self, names: &[String], po: Option<&str>) -> Result<RecordSet, ReconError> {
        let customer = require_column(&self.orders, &self.columns.order_customer_column)?;
        let po_column = po
            .map(|_| require_column(&self.orders, &self.columns.order_po_column))
            .transpose()?;

        Ok(self.orders.filtered(|r| {
            name_matches(r, customer, names) && po_matches(r, po_column, po)
        }))
    }

    fn shipments(
        &self,
        names: &[String],
        po: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<RecordSet, ReconError> {
        let customer = require_column(&self.shipments, &self.columns.shipment_customer_column)?;
        let po_column = po
            .map(|_| require_column(&self.shipments, &self.columns.shipment_po_column))
            .transpose()?;
        let date_column = if date_from.is_some() || date_to.is_some() {
            Some(require_column(&self.shipments, &self.columns.shipment_date_column)?)
        } else {
            None
        };

        Ok(self.shipments.filtered(|r| {
            name_matches(r, customer, names)
                && po_matches(r, po_column, po)
                && date_column.map_or(true, |c| in_window(r, c, date_from, date_to))
        }))
    }

    fn shipment_customers(&self) -> Vec<String> {
        let column = &self.columns.shipment_customer_column;
        let mut seen = std::collections::HashSet::new();
        self.shipments
            .records()
            .iter()
            .map(|r| r.text(column))
            .filter(|n| !n.is_empty() && seen.insert(fold_case(n)))
            .collect()
    }
}

fn require_column<'a>(set: &RecordSet, column: &'a str) -> Result<&'a str, ReconError> {
    if set.has_column(column) {
        Ok(column)
    } else {
        Err(ReconError::Source(format!(
            "{} data has no '{column}' column",
            set.kind()
        )))
    }
}

fn name_matches(record: &Record, column: &str, names: &[String]) -> bool {
    let value = record.text(column);
    !value.is_empty() && names.iter().any(|n| same_text(n, &value))
}

fn po_matches(record: &Record, column: Option<&str>, po: Option<&str>) -> bool {
    match (column, po) {
        (Some(column), Some(po)) => same_text(&record.text(column), po),
        _ => true,
    }
}

/// Rows without a parseable date fall outside any window.
fn in_window(
    record: &Record,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> bool {
    match record.get(column).and_then(Value::as_date) {
        Some(date) => from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t),
        None => false,
    }
}

/// Load CSV text into a record set. Header names are trimmed; cells are
/// typed by [`parse_cell`].
pub fn load_csv_records(kind: RecordKind, csv_data: &str) -> Result<RecordSet, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Source(format!("{kind} csv: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut set = RecordSet::new(kind, headers.clone());
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ReconError::Source(format!("{kind} csv row {}: {e}", line + 1)))?;
        let fields: BTreeMap<String, Value> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), parse_cell(row.get(i).unwrap_or(""))))
            .collect();
        set.push(fields);
    }
    Ok(set)
}

/// Type one raw cell. Codes with leading zeros stay text so `"00123"`
/// keeps its zeros in keys.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Value::Date(date);
    }
    if looks_numeric(s) {
        if let Ok(n) = s.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
    }
    Value::Text(s.to_string())
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    !digits.is_empty()
        && !leading_zero
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = "\
CUSTOMER NAME,PO NUMBER,STYLE,COLOR,QTY,ORDER TYPE
Northwind,4755,LFA24B05,476 - Wolf Blue,350,BULK
NORTHWIND LTD,4755,LFA24B05,476 - Wolf Blue,20,SAMPLE
Contoso,9001,CT100,Black,10,BULK
";

    const SHIPMENTS: &str = "\
SHIPPED TO,PO NUMBER,STYLE,COLOR,QTY,SHIP DATE
Northwind DC,4755,LFA24B05,476 - WOLF BLUE,353,2024-03-02
northwind dc,4755,LFA24B05,476 - WOLF BLUE,20,2024-04-10
Contoso,9001,CT100,BLACK,10,
";

    fn source() -> CsvSource {
        CsvSource::from_csv(ORDERS, SHIPMENTS, &SourceConfig::default()).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn typed_cells() {
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell(" 350 "), Value::Number(350.0));
        assert_eq!(parse_cell("-2.5"), Value::Number(-2.5));
        assert_eq!(parse_cell("00123"), Value::Text("00123".into()));
        assert_eq!(parse_cell("0.5"), Value::Number(0.5));
        assert_eq!(parse_cell("24E10"), Value::Text("24E10".into()));
        assert_eq!(parse_cell("inf"), Value::Text("inf".into()));
        assert_eq!(
            parse_cell("2024-03-02"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
        );
    }

    #[test]
    fn orders_filtered_by_any_alias() {
        let s = source();
        let orders = s.orders(&names(&["Northwind"]), None).unwrap();
        assert_eq!(orders.len(), 1);
        let orders = s.orders(&names(&["northwind", "NORTHWIND LTD"]), None).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders.records()[1].index, 1);
        assert_eq!(orders.records()[1].text("ORDER TYPE"), "SAMPLE");
    }

    #[test]
    fn po_filter() {
        let s = source();
        let orders = s.orders(&names(&["Contoso"]), Some("9001")).unwrap();
        assert_eq!(orders.len(), 1);
        let orders = s.orders(&names(&["Contoso"]), Some("4755")).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn date_window_is_inclusive() {
        let s = source();
        let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d);
        let shipped = s
            .shipments(&names(&["Northwind DC"]), None, day(3, 2), day(3, 31))
            .unwrap();
        assert_eq!(shipped.len(), 1);
        let shipped = s.shipments(&names(&["Northwind DC"]), None, None, None).unwrap();
        assert_eq!(shipped.len(), 2);
        // Undated rows drop out once a window is set.
        let shipped = s.shipments(&names(&["Contoso"]), None, day(1, 1), None).unwrap();
        assert!(shipped.is_empty());
    }

    #[test]
    fn missing_filter_column_is_source_error() {
        let s = CsvSource::from_csv("PO NUMBER\n1\n", SHIPMENTS, &SourceConfig::default()).unwrap();
        let err = s.orders(&names(&["x"]), None).unwrap_err();
        assert!(matches!(err, ReconError::Source(_)));
    }

    #[test]
    fn distinct_shipment_customers() {
        assert_eq!(source().shipment_customers(), vec!["Northwind DC", "Contoso"]);
    }
}
