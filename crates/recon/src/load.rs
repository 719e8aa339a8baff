//! Source loading: CSV / JSON exports into raw string tables, then typed rows.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::{OrderColumns, PipelineConfig, ReceiptColumns, SourceFormat};
use crate::error::ReconError;
use crate::model::{DeliveryEvent, OrderLine, PipelineInput, Quantity};

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// Untyped table as read from the export. Empty cells are `None`.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn from_csv(source: &str, data: &str) -> Result<Self, ReconError> {
        let decode = |e: csv::Error| ReconError::Decode {
            source_name: source.into(),
            message: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(decode)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(decode)?;
            rows.push(
                (0..headers.len())
                    .map(|i| record.get(i).and_then(non_empty))
                    .collect(),
            );
        }

        Ok(Self {
            source: source.into(),
            headers,
            rows,
        })
    }

    /// Accepts an array of records or an object whose values are records.
    pub fn from_json(source: &str, data: &str) -> Result<Self, ReconError> {
        let doc: Value = serde_json::from_str(data).map_err(|e| ReconError::Decode {
            source_name: source.into(),
            message: e.to_string(),
        })?;

        let records: Vec<&Value> = match &doc {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            other => {
                return Err(ReconError::UnsupportedJson {
                    source_name: source.into(),
                    found: json_kind(other).into(),
                })
            }
        };

        let mut headers: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<Vec<(usize, Option<String>)>> = Vec::with_capacity(records.len());

        for record in records {
            let Value::Object(fields) = record else {
                return Err(ReconError::UnsupportedJson {
                    source_name: source.into(),
                    found: format!("record is {}", json_kind(record)),
                });
            };
            let mut row = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                let pos = match positions.get(key) {
                    Some(&p) => p,
                    None => {
                        headers.push(key.clone());
                        positions.insert(key.clone(), headers.len() - 1);
                        headers.len() - 1
                    }
                };
                row.push((pos, json_cell(value)));
            }
            cells.push(row);
        }

        let width = headers.len();
        let rows = cells
            .into_iter()
            .map(|sparse| {
                let mut row = vec![None; width];
                for (pos, cell) in sparse {
                    row[pos] = cell;
                }
                row
            })
            .collect();

        Ok(Self {
            source: source.into(),
            headers,
            rows,
        })
    }

    pub fn column(&self, name: &str) -> Result<usize, ReconError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::MissingColumn {
                source_name: self.source.clone(),
                column: name.into(),
            })
    }

    fn optional_column(&self, name: Option<&str>) -> Result<Option<usize>, ReconError> {
        name.map(|n| self.column(n)).transpose()
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// How a raw cell is turned into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    Date,
    Quantity,
}

/// A coerced cell. `Invalid` keeps the raw text of a failed coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Date(NaiveDate),
    Quantity(f64),
    Invalid(String),
}

impl Coercion {
    pub fn apply(self, raw: Option<&str>) -> Cell {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Cell::Missing;
        };
        match self {
            Self::Text => Cell::Text(raw.to_string()),
            Self::Date => parse_date(raw).map_or_else(|| Cell::Invalid(raw.to_string()), Cell::Date),
            Self::Quantity => parse_quantity(raw).map_or_else(|| Cell::Invalid(raw.to_string()), Cell::Quantity),
        }
    }
}

impl Cell {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Text(s) | Self::Invalid(s) => Some(s),
            Self::Date(d) => Some(d.to_string()),
            Self::Quantity(q) => Some(q.to_string()),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn into_quantity(self) -> Quantity {
        match self {
            Self::Quantity(q) => Quantity::Value(q),
            Self::Missing => Quantity::Missing,
            other => Quantity::Invalid(other.into_text().unwrap_or_default()),
        }
    }
}

/// ISO dates, ISO / RFC 3339 date-times (normalised to UTC), `dd-mm-yyyy`
/// and the `/Date(<millis>)/` form some ERP JSON exports use.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix("/Date(").and_then(|s| s.strip_suffix(")/")) {
        let digits_end = inner
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
            .map_or(inner.len(), |(i, _)| i);
        let millis: i64 = inner[..digits_end].parse().ok()?;
        return DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Plain non-negative decimals; a lone decimal comma is accepted.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let normalized = if raw.contains(',') && !raw.contains('.') {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

// ---------------------------------------------------------------------------
// Typed rows
// ---------------------------------------------------------------------------

/// Typed rows plus the number of date cells that failed coercion.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub unparsable_dates: usize,
}

struct RowReader<'a> {
    row: &'a [Option<String>],
    unparsable_dates: usize,
}

impl<'a> RowReader<'a> {
    fn cell(&self, idx: usize, coercion: Coercion) -> Cell {
        coercion.apply(self.row.get(idx).and_then(|c| c.as_deref()))
    }

    fn text(&self, idx: usize) -> Option<String> {
        self.cell(idx, Coercion::Text).into_text()
    }

    fn opt_text(&self, idx: Option<usize>) -> Option<String> {
        idx.and_then(|i| self.text(i))
    }

    fn date(&mut self, idx: usize) -> Option<NaiveDate> {
        let cell = self.cell(idx, Coercion::Date);
        if cell.is_invalid() {
            self.unparsable_dates += 1;
        }
        cell.date()
    }

    fn quantity(&self, idx: usize) -> Quantity {
        self.cell(idx, Coercion::Quantity).into_quantity()
    }
}

pub fn order_lines_from_table(table: &RawTable, columns: &OrderColumns) -> Result<Loaded<OrderLine>, ReconError> {
    let line_id = table.column(&columns.line_id)?;
    let order_id = table.column(&columns.order_id)?;
    let order_date = table.column(&columns.order_date)?;
    let promised = table.column(&columns.promised_date)?;
    let override_date = table.column(&columns.override_date)?;
    let quantity = table.column(&columns.quantity)?;
    let supplier = table.column(&columns.supplier)?;
    let responsible = table.optional_column(columns.responsible_party.as_deref())?;
    let status = table.optional_column(columns.status.as_deref())?;

    let mut unparsable_dates = 0;
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut r = RowReader { row, unparsable_dates: 0 };
        rows.push(OrderLine {
            line_id: r.text(line_id).unwrap_or_default(),
            order_id: r.text(order_id).unwrap_or_default(),
            order_date: r.date(order_date),
            promised_date: r.date(promised),
            override_date: r.date(override_date),
            quantity_ordered: r.quantity(quantity),
            supplier_name: r.text(supplier).unwrap_or_default(),
            responsible_party: r.opt_text(responsible),
            status: r.opt_text(status),
        });
        unparsable_dates += r.unparsable_dates;
    }

    Ok(Loaded { rows, unparsable_dates })
}

pub fn delivery_events_from_table(
    table: &RawTable,
    columns: &ReceiptColumns,
) -> Result<Loaded<DeliveryEvent>, ReconError> {
    let source_line_id = table.column(&columns.source_line_id)?;
    let received_date = table.column(&columns.received_date)?;
    let quantity = table.column(&columns.quantity)?;
    let status = table.optional_column(columns.status.as_deref())?;
    let item_code = table.optional_column(columns.item_code.as_deref())?;
    let item_name = table.optional_column(columns.item_name.as_deref())?;

    let mut unparsable_dates = 0;
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut r = RowReader { row, unparsable_dates: 0 };
        rows.push(DeliveryEvent {
            source_line_id: r.text(source_line_id),
            received_date: r.date(received_date),
            quantity_received: r.quantity(quantity),
            status: r.opt_text(status),
            item_code: r.opt_text(item_code),
            item_name: r.opt_text(item_name),
        });
        unparsable_dates += r.unparsable_dates;
    }

    Ok(Loaded { rows, unparsable_dates })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub fn read_table(path: &Path, format: SourceFormat) -> Result<RawTable, ReconError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
    let source = path.display().to_string();
    match format {
        SourceFormat::Csv => RawTable::from_csv(&source, &data),
        SourceFormat::Json => RawTable::from_json(&source, &data),
    }
}

/// Load both source tables, resolving file paths relative to `base_dir`.
pub fn load_input(config: &PipelineConfig, base_dir: &Path) -> Result<PipelineInput, ReconError> {
    let orders_path = base_dir.join(&config.orders.file);
    let orders_table = read_table(&orders_path, SourceFormat::resolve(config.orders.format, &config.orders.file))?;
    let lines = order_lines_from_table(&orders_table, &config.orders.columns)?;

    let receipts_path = base_dir.join(&config.receipts.file);
    let receipts_table = read_table(
        &receipts_path,
        SourceFormat::resolve(config.receipts.format, &config.receipts.file),
    )?;
    let events = delivery_events_from_table(&receipts_table, &config.receipts.columns)?;

    log::info!(
        "loaded {} order lines from {} and {} delivery events from {}",
        lines.rows.len(),
        orders_path.display(),
        events.rows.len(),
        receipts_path.display()
    );

    Ok(PipelineInput {
        lines: lines.rows,
        events: events.rows,
        unparsable_dates: lines.unparsable_dates + events.unparsable_dates,
    })
}
