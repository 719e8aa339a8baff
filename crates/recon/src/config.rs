use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub orders: OrderSource,
    pub receipts: ReceiptSource,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// Explicit format wins; otherwise guess from the extension (JSON unless `.csv`).
    pub fn resolve(explicit: Option<SourceFormat>, file: &str) -> SourceFormat {
        explicit.unwrap_or_else(|| {
            let is_csv = Path::new(file)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv {
                SourceFormat::Csv
            } else {
                SourceFormat::Json
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSource {
    pub file: String,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    pub columns: OrderColumns,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptSource {
    pub file: String,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    pub columns: ReceiptColumns,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OrderColumns {
    pub line_id: String,
    pub order_id: String,
    pub order_date: String,
    pub promised_date: String,
    pub override_date: String,
    pub quantity: String,
    pub supplier: String,
    #[serde(default)]
    pub responsible_party: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl OrderColumns {
    fn required(&self) -> [&str; 7] {
        [
            self.line_id.as_str(),
            self.order_id.as_str(),
            self.order_date.as_str(),
            self.promised_date.as_str(),
            self.override_date.as_str(),
            self.quantity.as_str(),
            self.supplier.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptColumns {
    pub source_line_id: String,
    pub received_date: String,
    pub quantity: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub item_code: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
}

impl ReceiptColumns {
    fn required(&self) -> [&str; 3] {
        [self.source_line_id.as_str(), self.received_date.as_str(), self.quantity.as_str()]
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Order years left out of the analysis.
    #[serde(default)]
    pub exclude_years: Vec<i32>,
    /// Line status codes left out of the analysis.
    #[serde(default)]
    pub exclude_statuses: Vec<String>,
    /// Lines promised further than this many days after ordering are dropped.
    #[serde(default)]
    pub max_lead_time_days: Option<i64>,
    #[serde(default)]
    pub drop_expected_before_order: bool,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Supplier,
    ResponsibleParty,
    Status,
    DelayCategory,
    FullyDelivered,
    OrderYear,
    OrderMonth,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supplier => write!(f, "supplier"),
            Self::ResponsibleParty => write!(f, "responsible_party"),
            Self::Status => write!(f, "status"),
            Self::DelayCategory => write!(f, "delay_category"),
            Self::FullyDelivered => write!(f, "fully_delivered"),
            Self::OrderYear => write!(f, "order_year"),
            Self::OrderMonth => write!(f, "order_month"),
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supplier" => Ok(Self::Supplier),
            "responsible_party" => Ok(Self::ResponsibleParty),
            "status" => Ok(Self::Status),
            "delay_category" => Ok(Self::DelayCategory),
            "fully_delivered" => Ok(Self::FullyDelivered),
            "order_year" => Ok(Self::OrderYear),
            "order_month" => Ok(Self::OrderMonth),
            other => Err(format!("unknown dimension: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Line,
    #[default]
    Order,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_rows")]
    pub rows: Dimension,
    #[serde(default = "default_columns")]
    pub columns: Dimension,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub yates_correction: bool,
}

fn default_rows() -> Dimension {
    Dimension::ResponsibleParty
}

fn default_columns() -> Dimension {
    Dimension::Status
}

fn default_top_n() -> usize {
    5
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: default_columns(),
            top_n: default_top_n(),
            granularity: Granularity::default(),
            yates_correction: false,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.top_n == 0 {
            return Err(ReconError::ConfigValidation("analysis.top_n must be at least 1".into()));
        }
        if self.rows == self.columns {
            return Err(ReconError::ConfigValidation(format!(
                "analysis rows and columns must differ, both are '{}'",
                self.rows
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        check_columns("orders", &self.orders.columns.required())?;
        check_columns("receipts", &self.receipts.columns.required())?;

        if let Some(days) = self.filters.max_lead_time_days {
            if days < 0 {
                return Err(ReconError::ConfigValidation(format!(
                    "filters.max_lead_time_days must be >= 0, got {days}"
                )));
            }
        }

        self.analysis.validate()
    }
}

fn check_columns(source: &str, columns: &[&str]) -> Result<(), ReconError> {
    let mut seen = HashSet::new();
    for column in columns {
        if column.trim().is_empty() {
            return Err(ReconError::ConfigValidation(format!(
                "{source}: column names must not be empty"
            )));
        }
        if !seen.insert(*column) {
            return Err(ReconError::ConfigValidation(format!(
                "{source}: column '{column}' is mapped more than once"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
